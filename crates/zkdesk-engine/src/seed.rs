use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;

pub const SEED_LEN: usize = 16;

/// Fresh random bytes handed to the capability for Generate and Prove.
/// Drawn immediately before each dispatch and never reused. The `Debug`
/// impl redacts the bytes so a seed cannot leak through logging.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}

pub trait SeedSource: Send + Sync {
    fn next_seed(&self) -> Seed;
}

/// Operating-system CSPRNG, the only source used outside of tests.
pub struct SystemSeedSource;

impl SeedSource for SystemSeedSource {
    fn next_seed(&self) -> Seed {
        let mut bytes = [0u8; SEED_LEN];
        OsRng.fill_bytes(&mut bytes);
        Seed(bytes)
    }
}

/// Deterministic source for tests and reproducible sessions.
pub struct FixedSeedSource(Seed);

impl FixedSeedSource {
    pub fn new(seed: Seed) -> Self {
        Self(seed)
    }
}

impl SeedSource for FixedSeedSource {
    fn next_seed(&self) -> Seed {
        self.0
    }
}
