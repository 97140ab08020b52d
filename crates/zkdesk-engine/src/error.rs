use thiserror::Error;

/// Failures raised by a proving capability or by the transport around it.
/// These cross the channel only as the message string of an `Err` envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Params are empty. Did you generate or load params?")]
    EmptyParams,
    #[error("malformed parameters: {0}")]
    MalformedParams(String),
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unsupported tree depth {depth}, the maximum is {max}")]
    UnsupportedDepth { depth: u32, max: u32 },
    #[error("executor channel closed")]
    ChannelClosed,
}

pub type EngineResult<T> = Result<T, EngineError>;
