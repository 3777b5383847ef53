//! Contract between the transaction builder and the Sapling and Orchard
//! proving backends.
//!
//! A backend accumulates spends and recipients while the builder is being
//! filled, hands back an [`UnauthorizedBundle`] (effecting data with proofs
//! pending) when the builder finalizes, and turns that into an
//! [`AuthorizedBundle`] once the transaction signature hash is known.
//!
//! Backends are free to choose their encoding of effecting data. The builder
//! commits to it through [`UnauthorizedBundle::effects_digest`], which is the
//! same for a bundle before and after authorization.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::orchard::OrchardRawAddress;
use super::orchard::OrchardSpendingKey;
use super::sapling::SaplingExtendedSpendingKey;
use super::sapling::SaplingPaymentAddress;
use super::Memo;
use super::OutgoingViewingKey;
use super::ShieldedPool;
use crate::models::blockchain::amount::Amount;
use crate::models::blockchain::block_height::BlockHeight;
use crate::models::blockchain::digest::blake2b_personal;
use crate::models::blockchain::digest::Hash256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum BundleError {
    #[error("{pool} backend rejected spend: {reason}")]
    SpendRejected { pool: ShieldedPool, reason: String },

    #[error("{pool} backend rejected output: {reason}")]
    OutputRejected { pool: ShieldedPool, reason: String },

    #[error("{pool} proving failed: {reason}")]
    Proving { pool: ShieldedPool, reason: String },

    #[error("{pool} signing failed: {reason}")]
    Signing { pool: ShieldedPool, reason: String },

    #[error("{pool} backend has no bundle to authorize")]
    NotFinalized { pool: ShieldedPool },
}

/// A note selected for spending, with the data the backend needs to prove
/// its membership in the note commitment tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendInfo<A> {
    pub address: A,
    pub value: Amount,
    pub anchor: Hash256,

    /// backend encoding of the note.
    pub note: Vec<u8>,

    /// backend encoding of the note's Merkle path.
    pub merkle_path: Vec<u8>,
}

/// A shielded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient<A> {
    /// outgoing viewing key the output is recoverable with; `None` makes the
    /// output unrecoverable by the sender.
    pub ovk: Option<OutgoingViewingKey>,
    pub address: A,
    pub value: Amount,
    pub memo: Memo,
}

/// Effecting data of a bundle whose proofs and signatures are still pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnauthorizedBundle {
    pub pool: ShieldedPool,
    pub value_balance: Amount,
    pub num_spends: usize,
    pub num_outputs: usize,
    pub effects: Vec<u8>,
}

impl UnauthorizedBundle {
    pub fn effects_digest(&self) -> Hash256 {
        effects_digest(self.pool, &self.effects)
    }

    pub fn authorize(self, authorization: Vec<u8>) -> AuthorizedBundle {
        AuthorizedBundle {
            pool: self.pool,
            value_balance: self.value_balance,
            num_spends: self.num_spends,
            num_outputs: self.num_outputs,
            effects: self.effects,
            authorization,
        }
    }
}

/// A bundle ready for inclusion in a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedBundle {
    pub pool: ShieldedPool,
    pub value_balance: Amount,
    pub num_spends: usize,
    pub num_outputs: usize,
    pub effects: Vec<u8>,

    /// proofs, spend authorization signatures and binding signature.
    pub authorization: Vec<u8>,
}

impl AuthorizedBundle {
    pub fn effects_digest(&self) -> Hash256 {
        effects_digest(self.pool, &self.effects)
    }
}

fn effects_digest(pool: ShieldedPool, effects: &[u8]) -> Hash256 {
    blake2b_personal(pool.effects_personalization(), &[effects])
}

/// Digest committed to for a pool that contributes no bundle.
pub fn empty_effects_digest(pool: ShieldedPool) -> Hash256 {
    effects_digest(pool, &[])
}

/// A Sapling or Orchard proving backend.
pub trait BundleBackend: fmt::Debug + Send {
    type SpendingKey: Clone + fmt::Debug + Send;
    type Address: Clone + fmt::Debug + Send;

    fn pool(&self) -> ShieldedPool;

    fn add_spend(
        &mut self,
        key: &Self::SpendingKey,
        spend: SpendInfo<Self::Address>,
    ) -> Result<(), BundleError>;

    fn add_recipient(&mut self, recipient: Recipient<Self::Address>) -> Result<(), BundleError>;

    /// Whether any spend or recipient has been added.
    fn has_actions(&self) -> bool;

    /// Net value leaving the pool: spends minus outputs.
    fn value_balance(&self) -> Amount;

    /// Outgoing viewing key used for change sent back into this pool.
    fn change_ovk(&self, key: &Self::SpendingKey) -> OutgoingViewingKey;

    /// Produce the unauthorized bundle. `Ok(None)` when nothing was added.
    fn finalize(
        &mut self,
        target_height: BlockHeight,
    ) -> Result<Option<UnauthorizedBundle>, BundleError>;

    /// Create proofs and signatures over `sighash`.
    fn sign(
        &mut self,
        bundle: UnauthorizedBundle,
        keys: &[Self::SpendingKey],
        sighash: &Hash256,
    ) -> Result<AuthorizedBundle, BundleError>;
}

pub type SaplingBackend =
    dyn BundleBackend<SpendingKey = SaplingExtendedSpendingKey, Address = SaplingPaymentAddress>;

pub type OrchardBackend =
    dyn BundleBackend<SpendingKey = OrchardSpendingKey, Address = OrchardRawAddress>;
