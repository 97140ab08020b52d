use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use zkdesk_engine::ExecutorHandle;
use zkdesk_proto::{CircuitFamily, ExecutorMsg, PanelId};

use crate::controller::PanelController;
use crate::error::PanelError;
use crate::presenter::PresentationUpdate;

/// One foreground-visible event from the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    /// The executor finished loading its backend. Broadcast once, not tied
    /// to any panel; gates affordances like a "loading" indicator.
    ExecutorReady,
    Panel(PresentationUpdate),
}

/// Routes executor messages to the panel that issued the request. Many
/// panels share the one executor and the one channel; the envelope tag is
/// what demultiplexes them, never arrival order.
pub struct Session {
    exec: ExecutorHandle,
    msgs: mpsc::Receiver<ExecutorMsg>,
    panels: HashMap<PanelId, PanelController>,
}

impl Session {
    pub fn new(exec: ExecutorHandle, msgs: mpsc::Receiver<ExecutorMsg>) -> Self {
        Self {
            exec,
            msgs,
            panels: HashMap::new(),
        }
    }

    pub fn executor(&self) -> &ExecutorHandle {
        &self.exec
    }

    pub fn open_panel(&mut self, panel: PanelId, family: CircuitFamily) -> &mut PanelController {
        self.panels
            .entry(panel.clone())
            .or_insert_with(|| PanelController::new(panel, family))
    }

    pub fn panel(&self, panel: &PanelId) -> Option<&PanelController> {
        self.panels.get(panel)
    }

    pub fn panel_mut(&mut self, panel: &PanelId) -> Option<&mut PanelController> {
        self.panels.get_mut(panel)
    }

    fn require_panel(&mut self, panel: &PanelId) -> Result<&mut PanelController, PanelError> {
        self.panels
            .get_mut(panel)
            .ok_or_else(|| PanelError::UnknownPanel(panel.to_string()))
    }

    pub async fn generate(&mut self, panel: &PanelId) -> Result<Uuid, PanelError> {
        let exec = self.exec.clone();
        self.require_panel(panel)?.request_generate(&exec).await
    }

    pub async fn prove(&mut self, panel: &PanelId, x: &str) -> Result<Uuid, PanelError> {
        let exec = self.exec.clone();
        self.require_panel(panel)?.request_prove(&exec, x).await
    }

    pub async fn verify(
        &mut self,
        panel: &PanelId,
        proof: Option<&str>,
        h: Option<&str>,
    ) -> Result<Uuid, PanelError> {
        let exec = self.exec.clone();
        self.require_panel(panel)?
            .request_verify(&exec, proof, h)
            .await
    }

    /// Wait for the next routable event. Envelopes for unknown panels and
    /// stale responses are dropped here; `None` means the executor is gone.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            match self.msgs.recv().await? {
                ExecutorMsg::Ready => return Some(SessionUpdate::ExecutorReady),
                ExecutorMsg::Response(env) => {
                    let Some(ctrl) = self.panels.get_mut(&env.panel) else {
                        warn!(panel = %env.panel, kind = %env.kind,
                            "response for unknown panel dropped");
                        continue;
                    };
                    if let Some(update) = ctrl.apply_response(&env) {
                        return Some(SessionUpdate::Panel(update));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::oneshot;
    use tokio::time::timeout;

    use zkdesk_engine::{
        EngineError, EngineResult, Executor, FixedSeedSource, ProofOutput, ProofSystem, Seed,
        SystemSeedSource, SEED_LEN,
    };
    use zkdesk_proto::{
        Circuit, Operation, OperationKind, Params, Request, NOT_READY_MSG,
    };

    use crate::controller::OpState;

    const WAIT: Duration = Duration::from_secs(5);

    /// Succeeds for the discrete-log family, fails for trees. Lets one
    /// panel fail while another succeeds on the same executor.
    struct TreeRejectingBackend;

    impl ProofSystem for TreeRejectingBackend {
        fn generate(&self, _seed: Seed, circuit: Circuit) -> EngineResult<Params> {
            match circuit {
                Circuit::DiscreteLog => Ok(Params::new("AAA")),
                Circuit::Tree { .. } => {
                    Err(EngineError::InvalidInput("tree setup exploded".into()))
                }
            }
        }

        fn prove(
            &self,
            _seed: Seed,
            _circuit: Circuit,
            _params: &Params,
            _x: &str,
        ) -> EngineResult<ProofOutput> {
            Ok(ProofOutput {
                proof: "PPP".into(),
                h: "HHH".into(),
            })
        }

        fn verify(
            &self,
            _circuit: Circuit,
            _params: &Params,
            proof: &str,
            h: &str,
        ) -> EngineResult<bool> {
            Ok(proof == "PPP" && h == "HHH")
        }
    }

    fn seeds() -> Arc<dyn zkdesk_engine::SeedSource> {
        Arc::new(FixedSeedSource::new(Seed::from_bytes([1; SEED_LEN])))
    }

    async fn ready_session(backend: Arc<dyn ProofSystem>) -> Session {
        let (handle, rx, _task) = Executor::spawn(async move { backend }, seeds());
        let mut session = Session::new(handle, rx);
        match timeout(WAIT, session.next_update()).await.unwrap().unwrap() {
            SessionUpdate::ExecutorReady => session,
            other => panic!("expected ready, got {other:?}"),
        }
    }

    async fn next(session: &mut Session) -> SessionUpdate {
        timeout(WAIT, session.next_update()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn a_failure_in_one_panel_leaves_the_other_untouched() {
        let mut session = ready_session(Arc::new(TreeRejectingBackend)).await;
        let dl = PanelId::from("dl");
        let tree = PanelId::from("tree-3");
        session.open_panel(dl.clone(), CircuitFamily::DiscreteLog);
        session
            .open_panel(tree.clone(), CircuitFamily::Tree)
            .set_depth_input(3);

        session.generate(&dl).await.unwrap();
        session.generate(&tree).await.unwrap();

        let mut dl_ok = false;
        let mut tree_failed = false;
        for _ in 0..2 {
            match next(&mut session).await {
                SessionUpdate::Panel(PresentationUpdate::GenerateOk { panel, .. }) => {
                    assert_eq!(panel, dl);
                    dl_ok = true;
                }
                SessionUpdate::Panel(PresentationUpdate::OperationFailed {
                    panel,
                    kind,
                    message,
                }) => {
                    assert_eq!(panel, tree);
                    assert_eq!(kind, OperationKind::Generate);
                    assert!(message.contains("tree setup exploded"));
                    tree_failed = true;
                }
                other => panic!("unexpected update {other:?}"),
            }
        }
        assert!(dl_ok && tree_failed);

        let dl_panel = session.panel(&dl).unwrap();
        assert_eq!(dl_panel.op_state(OperationKind::Generate), &OpState::Succeeded);
        assert_eq!(dl_panel.params().unwrap().as_str(), "AAA");
        assert_eq!(dl_panel.op_state(OperationKind::Prove), &OpState::Idle);

        let tree_panel = session.panel(&tree).unwrap();
        assert!(matches!(
            tree_panel.op_state(OperationKind::Generate),
            OpState::Failed { .. }
        ));
        assert!(tree_panel.params().is_none());
    }

    #[tokio::test]
    async fn responses_for_unknown_panels_are_skipped() {
        let mut session = ready_session(Arc::new(TreeRejectingBackend)).await;
        let dl = PanelId::from("dl");
        session.open_panel(dl.clone(), CircuitFamily::DiscreteLog);

        // A request the session never issued: its response must not surface.
        session
            .executor()
            .submit(Request::new(
                PanelId::from("ghost"),
                Circuit::DiscreteLog,
                Operation::Generate,
            ))
            .await
            .unwrap();
        session.generate(&dl).await.unwrap();

        match next(&mut session).await {
            SessionUpdate::Panel(PresentationUpdate::GenerateOk { panel, .. }) => {
                assert_eq!(panel, dl)
            }
            other => panic!("unexpected update {other:?}"),
        }
    }

    #[tokio::test]
    async fn requests_before_readiness_fail_and_succeed_after() {
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let backend: Arc<dyn ProofSystem> = Arc::new(TreeRejectingBackend);
        let loader = async move {
            let _ = gate_rx.await;
            backend
        };
        let (handle, rx, _task) = Executor::spawn(loader, Arc::new(SystemSeedSource));
        let mut session = Session::new(handle, rx);
        let dl = PanelId::from("dl");
        session.open_panel(dl.clone(), CircuitFamily::DiscreteLog);

        assert!(!session.executor().ready());
        session.generate(&dl).await.unwrap();
        match next(&mut session).await {
            SessionUpdate::Panel(PresentationUpdate::OperationFailed { message, .. }) => {
                assert_eq!(message, NOT_READY_MSG)
            }
            other => panic!("unexpected update {other:?}"),
        }

        gate_tx.send(()).unwrap();
        assert_eq!(next(&mut session).await, SessionUpdate::ExecutorReady);
        assert!(session.executor().ready());

        session.generate(&dl).await.unwrap();
        assert!(matches!(
            next(&mut session).await,
            SessionUpdate::Panel(PresentationUpdate::GenerateOk { .. })
        ));
    }

    #[tokio::test]
    async fn full_generate_prove_verify_flow_over_the_session() {
        let mut session = ready_session(Arc::new(TreeRejectingBackend)).await;
        let dl = PanelId::from("dl");
        session.open_panel(dl.clone(), CircuitFamily::DiscreteLog);

        session.generate(&dl).await.unwrap();
        assert!(matches!(
            next(&mut session).await,
            SessionUpdate::Panel(PresentationUpdate::GenerateOk { .. })
        ));

        session.prove(&dl, "5").await.unwrap();
        match next(&mut session).await {
            SessionUpdate::Panel(PresentationUpdate::ProveOk { proof, h, .. }) => {
                assert_eq!((proof.as_str(), h.as_str()), ("PPP", "HHH"));
            }
            other => panic!("unexpected update {other:?}"),
        }

        // Verify runs on the inputs prefilled by prove.
        session.verify(&dl, None, None).await.unwrap();
        match next(&mut session).await {
            SessionUpdate::Panel(PresentationUpdate::VerifyOk { accepted, .. }) => {
                assert!(accepted)
            }
            other => panic!("unexpected update {other:?}"),
        }

        // A tampered proof must never verify as true.
        session.verify(&dl, Some("XXX"), None).await.unwrap();
        match next(&mut session).await {
            SessionUpdate::Panel(PresentationUpdate::VerifyOk { accepted, .. }) => {
                assert!(!accepted)
            }
            other => panic!("unexpected update {other:?}"),
        }
    }
}
