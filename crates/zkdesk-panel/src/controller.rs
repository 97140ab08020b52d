use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use zkdesk_engine::ExecutorHandle;
use zkdesk_proto::{
    CircuitFamily, OpResult, Operation, OperationKind, Outcome, PanelId, Params, Request,
    ResponseEnvelope,
};

use crate::error::PanelError;
use crate::presenter::{PresentationUpdate, Presenter};

/// Per-operation workflow state. There is no terminal state; panels stay
/// re-triggerable for the life of the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpState {
    Idle,
    Pending { request_id: Uuid },
    Succeeded,
    Failed { message: String },
}

impl OpState {
    pub fn is_pending(&self) -> bool {
        matches!(self, OpState::Pending { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamsOrigin {
    Memory,
    File,
}

impl ParamsOrigin {
    pub fn placeholder(self) -> &'static str {
        match self {
            ParamsOrigin::Memory => "Loaded from memory",
            ParamsOrigin::File => "Loaded from file",
        }
    }
}

/// Owns one panel's workflow: its three operation states, the held
/// parameter blob, prove outputs and verify prefills. All transitions
/// happen here and nowhere else.
pub struct PanelController {
    panel: PanelId,
    family: CircuitFamily,
    depth_input: u32,

    generate: OpState,
    prove: OpState,
    verify: OpState,

    /// Latest request (or import) generation per operation kind. A
    /// response whose id is not the latest for its kind is stale and is
    /// dropped, so even a bypassed re-trigger guard cannot let an old
    /// response overwrite newer state.
    issued: HashMap<OperationKind, Uuid>,
    inflight_generate_depth: Option<u32>,

    params: Option<Params>,
    params_origin: ParamsOrigin,
    params_depth: Option<u32>,

    proof: Option<String>,
    h: Option<String>,
    verify_proof: Option<String>,
    verify_h: Option<String>,
    verify_status: Option<bool>,
}

impl PanelController {
    pub fn new(panel: PanelId, family: CircuitFamily) -> Self {
        Self {
            panel,
            family,
            depth_input: 0,
            generate: OpState::Idle,
            prove: OpState::Idle,
            verify: OpState::Idle,
            issued: HashMap::new(),
            inflight_generate_depth: None,
            params: None,
            params_origin: ParamsOrigin::Memory,
            params_depth: None,
            proof: None,
            h: None,
            verify_proof: None,
            verify_h: None,
            verify_status: None,
        }
    }

    pub fn panel(&self) -> &PanelId {
        &self.panel
    }

    pub fn set_depth_input(&mut self, depth: u32) {
        self.depth_input = depth;
    }

    pub fn op_state(&self, kind: OperationKind) -> &OpState {
        match kind {
            OperationKind::Generate => &self.generate,
            OperationKind::Prove => &self.prove,
            OperationKind::Verify => &self.verify,
        }
    }

    pub fn params(&self) -> Option<&Params> {
        self.params.as_ref()
    }

    pub fn params_origin(&self) -> ParamsOrigin {
        self.params_origin
    }

    pub fn proof(&self) -> Option<&str> {
        self.proof.as_deref()
    }

    pub fn derived_value(&self) -> Option<&str> {
        self.h.as_deref()
    }

    pub fn verify_status(&self) -> Option<bool> {
        self.verify_status
    }

    fn state_mut(&mut self, kind: OperationKind) -> &mut OpState {
        match kind {
            OperationKind::Generate => &mut self.generate,
            OperationKind::Prove => &mut self.prove,
            OperationKind::Verify => &mut self.verify,
        }
    }

    fn ensure_not_pending(&self, kind: OperationKind) -> Result<(), PanelError> {
        if self.op_state(kind).is_pending() {
            return Err(PanelError::OperationPending(kind));
        }
        Ok(())
    }

    /// Depth tag for operations that consume the held params: the depth the
    /// params were generated with wins over the current input field.
    fn depth_for_params_ops(&self) -> u32 {
        self.params_depth.unwrap_or(self.depth_input)
    }

    pub async fn request_generate(&mut self, exec: &ExecutorHandle) -> Result<Uuid, PanelError> {
        self.ensure_not_pending(OperationKind::Generate)?;

        let circuit = self.family.at_depth(self.depth_input);
        let request = Request::new(self.panel.clone(), circuit, Operation::Generate);
        let request_id = request.request_id;
        let depth = circuit.depth();

        exec.submit(request).await?;
        self.generate = OpState::Pending { request_id };
        self.issued.insert(OperationKind::Generate, request_id);
        self.inflight_generate_depth = depth;
        Ok(request_id)
    }

    pub async fn request_prove(
        &mut self,
        exec: &ExecutorHandle,
        x: &str,
    ) -> Result<Uuid, PanelError> {
        self.ensure_not_pending(OperationKind::Prove)?;
        let params = self.params.clone().ok_or(PanelError::MissingParams)?;

        let circuit = self.family.at_depth(self.depth_for_params_ops());
        let request = Request::new(
            self.panel.clone(),
            circuit,
            Operation::Prove {
                params,
                x: x.to_string(),
            },
        );
        let request_id = request.request_id;

        exec.submit(request).await?;
        self.prove = OpState::Pending { request_id };
        self.issued.insert(OperationKind::Prove, request_id);
        Ok(request_id)
    }

    /// Verify with explicit inputs, falling back to the prefills produced
    /// by the last successful prove.
    pub async fn request_verify(
        &mut self,
        exec: &ExecutorHandle,
        proof: Option<&str>,
        h: Option<&str>,
    ) -> Result<Uuid, PanelError> {
        self.ensure_not_pending(OperationKind::Verify)?;
        let params = self.params.clone().ok_or(PanelError::MissingParams)?;
        let proof = proof
            .map(str::to_string)
            .or_else(|| self.verify_proof.clone())
            .ok_or(PanelError::MissingVerifyInputs)?;
        let h = h
            .map(str::to_string)
            .or_else(|| self.verify_h.clone())
            .ok_or(PanelError::MissingVerifyInputs)?;

        let circuit = self.family.at_depth(self.depth_for_params_ops());
        let request = Request::new(
            self.panel.clone(),
            circuit,
            Operation::Verify { params, proof, h },
        );
        let request_id = request.request_id;

        exec.submit(request).await?;
        self.verify = OpState::Pending { request_id };
        self.issued.insert(OperationKind::Verify, request_id);
        Ok(request_id)
    }

    /// Route one envelope into this panel. Returns `None` when the envelope
    /// is stale (not the latest generation for its kind) and was dropped.
    pub fn apply_response(&mut self, env: &ResponseEnvelope) -> Option<PresentationUpdate> {
        if self.issued.get(&env.kind) != Some(&env.request_id) {
            warn!(panel = %self.panel, kind = %env.kind, request_id = %env.request_id,
                "dropping stale response");
            return None;
        }
        let update = match env.kind {
            OperationKind::Generate => self.apply_generate(env),
            OperationKind::Prove => self.apply_prove(env),
            OperationKind::Verify => self.apply_verify(env),
        };
        Some(update)
    }

    fn apply_generate(&mut self, env: &ResponseEnvelope) -> PresentationUpdate {
        match &env.outcome {
            Outcome::Ok {
                result: OpResult::Generated { params, millis },
            } => {
                let depth = self.inflight_generate_depth.take();
                self.apply_generate_result(
                    params.clone(),
                    ParamsOrigin::Memory,
                    depth,
                    Some(*millis),
                )
            }
            Outcome::Ok { .. } => self.fail(OperationKind::Generate, "malformed response payload"),
            Outcome::Err { error } => {
                let message = error.clone();
                self.fail(OperationKind::Generate, &message)
            }
        }
    }

    fn apply_prove(&mut self, env: &ResponseEnvelope) -> PresentationUpdate {
        match &env.outcome {
            Outcome::Ok {
                result: OpResult::Proved { proof, h, millis },
            } => {
                self.proof = Some(proof.clone());
                self.h = Some(h.clone());
                // Convenience defaults for verify; nothing runs until asked.
                self.verify_proof = Some(proof.clone());
                self.verify_h = Some(h.clone());
                self.prove = OpState::Succeeded;
                Presenter::prove_ok(&self.panel, proof, h, *millis)
            }
            Outcome::Ok { .. } => self.fail(OperationKind::Prove, "malformed response payload"),
            Outcome::Err { error } => {
                let message = error.clone();
                self.fail(OperationKind::Prove, &message)
            }
        }
    }

    fn apply_verify(&mut self, env: &ResponseEnvelope) -> PresentationUpdate {
        match &env.outcome {
            Outcome::Ok {
                result: OpResult::Verified { result, millis },
            } => {
                self.verify_status = Some(*result);
                self.verify = OpState::Succeeded;
                Presenter::verify_ok(&self.panel, *result, *millis)
            }
            Outcome::Ok { .. } => self.fail(OperationKind::Verify, "malformed response payload"),
            Outcome::Err { error } => {
                let message = error.clone();
                self.fail(OperationKind::Verify, &message)
            }
        }
    }

    /// A failure never discards held params; it only flips the failed
    /// operation's state and clears its success display.
    fn fail(&mut self, kind: OperationKind, message: &str) -> PresentationUpdate {
        if kind == OperationKind::Generate {
            self.inflight_generate_depth = None;
        }
        *self.state_mut(kind) = OpState::Failed {
            message: message.to_string(),
        };
        Presenter::failed(&self.panel, kind, message)
    }

    /// The single shared "generate succeeded" path, used by the live
    /// response handler and by the file importer alike.
    fn apply_generate_result(
        &mut self,
        params: Params,
        origin: ParamsOrigin,
        depth: Option<u32>,
        millis: Option<u64>,
    ) -> PresentationUpdate {
        let size_kb = params.size_kb();
        self.params = Some(params);
        self.params_origin = origin;
        self.params_depth = depth;
        self.generate = OpState::Succeeded;
        Presenter::generate_ok(&self.panel, size_kb, origin, depth, millis)
    }

    /// Install params read from a file, exactly as if a generate had just
    /// succeeded. Takes a fresh generation id, so a live generate response
    /// still in flight is superseded and will be dropped as stale.
    pub fn import_params(&mut self, params: Params) -> PresentationUpdate {
        self.issued.insert(OperationKind::Generate, Uuid::new_v4());
        self.inflight_generate_depth = None;
        self.apply_generate_result(params, ParamsOrigin::File, None, None)
    }
}
