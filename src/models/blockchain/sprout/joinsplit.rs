use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use super::keys::SproutPaymentAddress;
use super::keys::SproutSpendingKey;
use super::merkle_tree::MerkleTreeError;
use super::merkle_tree::SproutMerkleTree;
use super::merkle_tree::SproutWitness;
use super::note::SproutNote;
use super::note_encryption::NoteCiphertext;
use super::prf::prf_rho;
use super::prover::SproutProof;
use crate::models::blockchain::amount::Amount;
use crate::models::blockchain::digest::blake2b_personal;
use crate::models::blockchain::digest::Hash256;
use crate::models::blockchain::shielded::Memo;

/// Number of inputs and of outputs of every JoinSplit.
pub const ZC_NUM_JS_INPUTS: usize = 2;
pub const ZC_NUM_JS_OUTPUTS: usize = 2;

/// `h_sig = BLAKE2b-256("ZcashComputehSig", randomSeed || nf_1 || nf_2 || joinSplitPubKey)`.
pub fn h_sig(random_seed: &Hash256, nullifiers: &[Hash256; 2], join_split_pub_key: &[u8; 32]) -> Hash256 {
    blake2b_personal(
        b"ZcashComputehSig",
        &[
            random_seed.as_bytes(),
            nullifiers[0].as_bytes(),
            nullifiers[1].as_bytes(),
            join_split_pub_key,
        ],
    )
}

/// One JoinSplit description, as carried by a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsDescription {
    pub vpub_old: Amount,
    pub vpub_new: Amount,
    pub anchor: Hash256,
    pub nullifiers: [Hash256; 2],
    pub commitments: [Hash256; 2],
    pub ephemeral_key: [u8; 32],
    pub random_seed: Hash256,
    pub macs: [Hash256; 2],
    pub proof: SproutProof,
    pub ciphertexts: [NoteCiphertext; 2],
}

impl JsDescription {
    pub fn h_sig(&self, join_split_pub_key: &[u8; 32]) -> Hash256 {
        h_sig(&self.random_seed, &self.nullifiers, join_split_pub_key)
    }

    /// Consensus encoding of the description, as committed to by signature
    /// hashes.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.vpub_old.to_le_bytes());
        out.extend_from_slice(&self.vpub_new.to_le_bytes());
        out.extend_from_slice(self.anchor.as_bytes());
        for nf in &self.nullifiers {
            out.extend_from_slice(nf.as_bytes());
        }
        for cm in &self.commitments {
            out.extend_from_slice(cm.as_bytes());
        }
        out.extend_from_slice(&self.ephemeral_key);
        out.extend_from_slice(self.random_seed.as_bytes());
        for mac in &self.macs {
            out.extend_from_slice(mac.as_bytes());
        }
        out.extend_from_slice(self.proof.as_bytes());
        for ct in &self.ciphertexts {
            out.extend_from_slice(ct.as_bytes());
        }
    }
}

/// A note to spend inside a JoinSplit, with its witness and spending key.
#[derive(Clone, Debug)]
pub struct JsInput {
    pub witness: SproutWitness,
    pub note: SproutNote,
    pub key: SproutSpendingKey,
}

impl JsInput {
    pub fn new(witness: SproutWitness, note: SproutNote, key: SproutSpendingKey) -> Self {
        Self { witness, note, key }
    }

    /// A zero-value note owned by a throwaway key, witnessed in a fresh tree
    /// that contains only that note.
    pub fn dummy() -> Result<Self, MerkleTreeError> {
        let mut rng = rand::rng();
        let key = SproutSpendingKey::random_from(&mut rng);
        let note = SproutNote::random_to(&key.address(), Amount::ZERO, &mut rng);

        let mut tree = SproutMerkleTree::new();
        tree.append(note.commitment())?;
        Ok(Self::new(tree.witness(), note, key))
    }

    pub fn nullifier(&self) -> Hash256 {
        self.note.nullifier(&self.key)
    }
}

/// A payment created inside a JoinSplit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsOutput {
    pub address: SproutPaymentAddress,
    pub value: Amount,
    pub memo: Memo,
}

impl JsOutput {
    pub fn new(address: SproutPaymentAddress, value: Amount) -> Self {
        Self {
            address,
            value,
            memo: Memo::default(),
        }
    }

    pub fn with_memo(address: SproutPaymentAddress, value: Amount, memo: Memo) -> Self {
        Self {
            address,
            value,
            memo,
        }
    }

    /// A zero-value output to a throwaway address.
    pub fn dummy() -> Self {
        Self::new(SproutSpendingKey::random().address(), Amount::ZERO)
    }

    /// The note this output creates in slot `index`.
    pub fn note<R: Rng + ?Sized>(
        &self,
        phi: &[u8; 32],
        index: usize,
        h_sig: &Hash256,
        rng: &mut R,
    ) -> SproutNote {
        SproutNote::new(
            self.address.a_pk,
            self.value,
            prf_rho(phi, index, h_sig),
            Hash256::random(rng),
        )
    }
}
