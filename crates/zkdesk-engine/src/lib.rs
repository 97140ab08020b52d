//! Background side of the offload protocol: the proving capability trait,
//! the seed source, the executor task that owns the capability, and the
//! handle the foreground uses to reach it.

mod backend;
mod error;
mod executor;
mod hashcommit;
mod seed;

pub use backend::{ProofOutput, ProofSystem};
pub use error::{EngineError, EngineResult};
pub use executor::{Executor, ExecutorHandle, MSG_QUEUE_SIZE, REQUEST_QUEUE_SIZE};
pub use hashcommit::{HashCommitBackend, MAX_TREE_DEPTH};
pub use seed::{FixedSeedSource, Seed, SeedSource, SystemSeedSource, SEED_LEN};
