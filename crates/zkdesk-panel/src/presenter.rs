use tracing::info;
use zkdesk_proto::{OpResult, OperationKind, Outcome, PanelId};

use crate::controller::ParamsOrigin;

/// One presentation change, scoped to a single operation of a single
/// panel. Rendering is the front end's business; this is everything it
/// needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresentationUpdate {
    GenerateOk {
        panel: PanelId,
        size_kb: u64,
        /// Placeholder text for downstream params inputs, distinguishing
        /// an in-memory result from a file-backed load.
        params_placeholder: &'static str,
        depth: Option<u32>,
    },
    ProveOk {
        panel: PanelId,
        proof: String,
        h: String,
    },
    VerifyOk {
        panel: PanelId,
        accepted: bool,
    },
    /// Shows the message and hides prior success details for this
    /// operation only; other operations and panels are untouched.
    OperationFailed {
        panel: PanelId,
        kind: OperationKind,
        message: String,
    },
}

/// Pure reducer from (panel, kind, outcome) to a presentation update. The
/// same functions serve the live response path and the file importer.
pub struct Presenter;

impl Presenter {
    pub fn generate_ok(
        panel: &PanelId,
        size_kb: u64,
        origin: ParamsOrigin,
        depth: Option<u32>,
        millis: Option<u64>,
    ) -> PresentationUpdate {
        if let Some(millis) = millis {
            info!(panel = %panel, kind = %OperationKind::Generate, millis, "operation completed");
        }
        PresentationUpdate::GenerateOk {
            panel: panel.clone(),
            size_kb,
            params_placeholder: origin.placeholder(),
            depth,
        }
    }

    pub fn prove_ok(panel: &PanelId, proof: &str, h: &str, millis: u64) -> PresentationUpdate {
        info!(panel = %panel, kind = %OperationKind::Prove, millis, "operation completed");
        PresentationUpdate::ProveOk {
            panel: panel.clone(),
            proof: proof.to_string(),
            h: h.to_string(),
        }
    }

    pub fn verify_ok(panel: &PanelId, accepted: bool, millis: u64) -> PresentationUpdate {
        info!(panel = %panel, kind = %OperationKind::Verify, millis, "operation completed");
        PresentationUpdate::VerifyOk {
            panel: panel.clone(),
            accepted,
        }
    }

    pub fn failed(panel: &PanelId, kind: OperationKind, message: &str) -> PresentationUpdate {
        PresentationUpdate::OperationFailed {
            panel: panel.clone(),
            kind,
            message: message.to_string(),
        }
    }

    /// Reduce a live envelope outcome. Mismatched payloads are treated as a
    /// transport fault and presented as a failure of the tagged operation.
    pub fn present(
        panel: &PanelId,
        kind: OperationKind,
        outcome: &Outcome,
        origin: ParamsOrigin,
        depth: Option<u32>,
    ) -> PresentationUpdate {
        match outcome {
            Outcome::Ok { result } if result.kind() == kind => match result {
                OpResult::Generated { params, millis } => {
                    Self::generate_ok(panel, params.size_kb(), origin, depth, Some(*millis))
                }
                OpResult::Proved { proof, h, millis } => {
                    Self::prove_ok(panel, proof, h, *millis)
                }
                OpResult::Verified { result, millis } => {
                    Self::verify_ok(panel, *result, *millis)
                }
            },
            Outcome::Ok { .. } => Self::failed(panel, kind, "malformed response payload"),
            Outcome::Err { error } => Self::failed(panel, kind, error),
        }
    }
}
