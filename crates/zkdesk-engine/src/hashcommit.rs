//! Built-in demo capability. Parameters are a seed-derived reference blob,
//! the derived value folds a hash chain over the tree depth (one round for
//! the discrete-log family), and the proof is a blinded tag binding the
//! parameters to the derived value. This stands in for a real proof system
//! so the workbench runs end-to-end; it makes no soundness claim.

use sha2::{Digest, Sha256};
use zkdesk_proto::{Circuit, Params};

use crate::backend::{ProofOutput, ProofSystem};
use crate::error::{EngineError, EngineResult};
use crate::seed::Seed;

pub const MAX_TREE_DEPTH: u32 = 64;

const MAGIC: &[u8; 6] = b"zkdsk1";
const FAMILY_DL: u8 = 1;
const FAMILY_TREE: u8 = 2;
const HEADER_LEN: usize = MAGIC.len() + 1 + 4;

const DL_SRS_BYTES: usize = 2048;
const TREE_SRS_BASE_BYTES: usize = 1024;
const TREE_SRS_PER_LEVEL_BYTES: usize = 512;

const MAX_X_HEX_DIGITS: usize = 64;
const PROOF_BYTES: usize = 64;

pub struct HashCommitBackend;

impl HashCommitBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HashCommitBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn digest(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn family_byte(circuit: Circuit) -> u8 {
    match circuit {
        Circuit::DiscreteLog => FAMILY_DL,
        Circuit::Tree { .. } => FAMILY_TREE,
    }
}

fn family_name(byte: u8) -> &'static str {
    match byte {
        FAMILY_DL => "dl",
        FAMILY_TREE => "tree",
        _ => "unknown",
    }
}

fn srs_len(circuit: Circuit) -> EngineResult<usize> {
    match circuit {
        Circuit::DiscreteLog => Ok(DL_SRS_BYTES),
        Circuit::Tree { depth } if depth <= MAX_TREE_DEPTH => {
            Ok(TREE_SRS_BASE_BYTES + depth as usize * TREE_SRS_PER_LEVEL_BYTES)
        }
        Circuit::Tree { depth } => Err(EngineError::UnsupportedDepth {
            depth,
            max: MAX_TREE_DEPTH,
        }),
    }
}

fn parse_srs(params: &Params, circuit: Circuit) -> EngineResult<Vec<u8>> {
    if params.is_empty() {
        return Err(EngineError::EmptyParams);
    }
    let blob = hex::decode(params.as_str())
        .map_err(|_| EngineError::MalformedParams("not valid hex".into()))?;
    if blob.len() <= HEADER_LEN {
        return Err(EngineError::MalformedParams("truncated header".into()));
    }
    if &blob[..MAGIC.len()] != MAGIC {
        return Err(EngineError::MalformedParams("unrecognized format".into()));
    }
    let family = blob[MAGIC.len()];
    if family != family_byte(circuit) {
        return Err(EngineError::InvalidInput(format!(
            "params were generated for the {} circuit",
            family_name(family)
        )));
    }
    Ok(blob[HEADER_LEN..].to_vec())
}

fn canonical_x(x: &str) -> EngineResult<String> {
    let x = x.trim();
    if x.is_empty() {
        return Err(EngineError::InvalidInput(
            "x must be a non-empty hex scalar".into(),
        ));
    }
    if !x.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EngineError::InvalidInput("x must be a hex scalar".into()));
    }
    if x.len() > MAX_X_HEX_DIGITS {
        return Err(EngineError::InvalidInput(format!(
            "x must be at most {MAX_X_HEX_DIGITS} hex digits"
        )));
    }
    let canonical = x.to_ascii_lowercase();
    let canonical = canonical.trim_start_matches('0');
    if canonical.is_empty() {
        Ok("0".into())
    } else {
        Ok(canonical.into())
    }
}

fn srs_digest(srs: &[u8]) -> [u8; 32] {
    digest(&[b"zkdesk.srs.digest", srs])
}

fn derive_h(circuit: Circuit, srs_digest: &[u8; 32], x: &str) -> [u8; 32] {
    let mut h = digest(&[b"zkdesk.h", srs_digest, x.as_bytes()]);
    if let Circuit::Tree { depth } = circuit {
        // Fold level by level with an all-zero sibling path.
        for level in 0..depth {
            h = digest(&[b"zkdesk.node", &level.to_le_bytes(), &h, &[0u8; 32]]);
        }
    }
    h
}

fn proof_tag(srs_digest: &[u8; 32], h: &[u8; 32], blind: &[u8; 32]) -> [u8; 32] {
    digest(&[b"zkdesk.tag", srs_digest, h, blind])
}

impl ProofSystem for HashCommitBackend {
    fn generate(&self, seed: Seed, circuit: Circuit) -> EngineResult<Params> {
        let len = srs_len(circuit)?;
        let depth = circuit.depth().unwrap_or(0);

        let mut block = digest(&[
            b"zkdesk.srs",
            MAGIC,
            &[family_byte(circuit)],
            &depth.to_le_bytes(),
            seed.as_bytes(),
        ]);
        let mut srs = Vec::with_capacity(len);
        while srs.len() < len {
            srs.extend_from_slice(&block);
            block = digest(&[b"zkdesk.srs.block", &block]);
        }
        srs.truncate(len);

        let mut blob = Vec::with_capacity(HEADER_LEN + len);
        blob.extend_from_slice(MAGIC);
        blob.push(family_byte(circuit));
        blob.extend_from_slice(&depth.to_le_bytes());
        blob.extend_from_slice(&srs);
        Ok(Params::new(hex::encode(blob)))
    }

    fn prove(
        &self,
        seed: Seed,
        circuit: Circuit,
        params: &Params,
        x: &str,
    ) -> EngineResult<ProofOutput> {
        let srs = parse_srs(params, circuit)?;
        let x = canonical_x(x)?;

        let srs_digest = srs_digest(&srs);
        let h = derive_h(circuit, &srs_digest, &x);
        let blind = digest(&[b"zkdesk.blind", seed.as_bytes(), &srs_digest, &h]);
        let tag = proof_tag(&srs_digest, &h, &blind);

        let mut proof = Vec::with_capacity(PROOF_BYTES);
        proof.extend_from_slice(&blind);
        proof.extend_from_slice(&tag);
        Ok(ProofOutput {
            proof: hex::encode(proof),
            h: hex::encode(h),
        })
    }

    fn verify(&self, circuit: Circuit, params: &Params, proof: &str, h: &str)
        -> EngineResult<bool>
    {
        let srs = parse_srs(params, circuit)?;

        let proof = hex::decode(proof.trim())
            .map_err(|_| EngineError::MalformedProof("not valid hex".into()))?;
        if proof.len() != PROOF_BYTES {
            return Err(EngineError::MalformedProof(format!(
                "proof must be {PROOF_BYTES} bytes"
            )));
        }
        let h = hex::decode(h.trim())
            .map_err(|_| EngineError::InvalidInput("h must be hex encoded".into()))?;
        let h: [u8; 32] = h
            .try_into()
            .map_err(|_| EngineError::InvalidInput("h must be 32 bytes".into()))?;

        let mut blind = [0u8; 32];
        blind.copy_from_slice(&proof[..32]);
        let srs_digest = srs_digest(&srs);
        let expected = proof_tag(&srs_digest, &h, &blind);
        Ok(expected[..] == proof[32..])
    }
}
