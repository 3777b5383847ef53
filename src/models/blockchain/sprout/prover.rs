use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::joinsplit::JsInput;
use super::note::SproutNote;
use crate::models::blockchain::amount::Amount;
use crate::models::blockchain::digest::Hash256;

/// Size of a Groth16 Sprout proof.
pub const SPROUT_PROOF_SIZE: usize = 192;

/// An opaque zero-knowledge proof of one JoinSplit statement.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SproutProof(Vec<u8>);

impl SproutProof {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SproutProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SproutProof({} bytes)", self.0.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("Sprout proof generation failed: {0}")]
pub struct ProofError(pub String);

/// Public inputs and private witness of one JoinSplit, as handed to the
/// prover.
#[derive(Debug, Clone, Copy)]
pub struct JoinSplitStatement<'a> {
    pub anchor: &'a Hash256,
    pub h_sig: &'a Hash256,
    pub phi: &'a [u8; 32],
    pub nullifiers: &'a [Hash256; 2],
    pub commitments: &'a [Hash256; 2],
    pub macs: &'a [Hash256; 2],
    pub vpub_old: Amount,
    pub vpub_new: Amount,
    pub inputs: &'a [JsInput; 2],
    pub output_notes: &'a [SproutNote; 2],
}

/// Produces Sprout JoinSplit proofs.
///
/// Implementations wrap the proving parameters; the builder only requires
/// that a proof be produced for the statement it assembled.
pub trait SproutProver: fmt::Debug + Send + Sync {
    fn prove(&self, statement: &JoinSplitStatement<'_>) -> Result<SproutProof, ProofError>;
}
