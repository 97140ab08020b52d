use zkdesk_proto::{Circuit, Params};

use crate::error::EngineResult;
use crate::seed::Seed;

/// Output of a prove call: the opaque proof and the public derived value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofOutput {
    pub proof: String,
    pub h: String,
}

/// The opaque proving capability the executor dispatches into. The circuit
/// tag selects the family-specific (and, for trees, depth-specific) variant
/// inside the implementation; input validation is the implementation's and
/// rejections are propagated to the caller unchanged.
pub trait ProofSystem: Send + Sync {
    fn generate(&self, seed: Seed, circuit: Circuit) -> EngineResult<Params>;

    fn prove(&self, seed: Seed, circuit: Circuit, params: &Params, x: &str)
        -> EngineResult<ProofOutput>;

    fn verify(&self, circuit: Circuit, params: &Params, proof: &str, h: &str)
        -> EngineResult<bool>;
}
