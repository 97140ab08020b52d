use thiserror::Error;
use zkdesk_proto::OperationKind;

/// Local, synchronous failures. None of these ever cross the request
/// channel; they are surfaced directly to the caller that triggered the
/// operation.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("a {0} request for this panel is still pending")]
    OperationPending(OperationKind),
    #[error("no parameters loaded; generate or import params first")]
    MissingParams,
    #[error("no proof to verify; run prove first or supply proof and h")]
    MissingVerifyInputs,
    #[error("unknown panel: {0}")]
    UnknownPanel(String),
    #[error(transparent)]
    Executor(#[from] zkdesk_engine::EngineError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
