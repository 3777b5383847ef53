//! provides error types related to building transactions.
//!
//! Usage errors surface from the `add_*` methods of the
//! [TransactionBuilder](super::builder::transaction_builder::TransactionBuilder)
//! as [AddError]. Everything that goes wrong inside `build()` is captured as a
//! [BuildError] in the returned
//! [TransactionBuilderResult](super::builder::transaction_builder_result::TransactionBuilderResult).

use serde::Deserialize;
use serde::Serialize;

use crate::config_models::consensus_params::NetworkUpgrade;
use crate::models::blockchain::amount::Amount;
use crate::models::blockchain::digest::Hash256;
use crate::models::blockchain::shielded::bundle::BundleError;
use crate::models::blockchain::shielded::ShieldedPool;
use crate::models::blockchain::sprout::merkle_tree::MerkleTreeError;
use crate::models::blockchain::sprout::prover::ProofError;
use crate::models::blockchain::transaction::sighash::SigHashError;

/// something a caller asks a builder to do with a shielded pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[non_exhaustive]
pub enum ShieldedAction {
    #[strum(to_string = "spend Orchard notes")]
    OrchardSpend,
    #[strum(to_string = "add Orchard outputs")]
    OrchardOutput,
    #[strum(to_string = "spend Sapling notes")]
    SaplingSpend,
    #[strum(to_string = "add Sapling outputs")]
    SaplingOutput,
    #[strum(to_string = "spend Sprout notes")]
    SproutSpend,
    #[strum(to_string = "add Sprout outputs")]
    SproutOutput,
    #[strum(to_string = "send change to a Sprout address")]
    SproutChange,
}

/// Sprout and Orchard cannot appear in the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PoolConflict {
    #[error("TransactionBuilder cannot {0} in a Sprout transaction")]
    OrchardInSproutTransaction(ShieldedAction),

    #[error("TransactionBuilder cannot {0} in an Orchard transaction")]
    SproutInOrchardTransaction(ShieldedAction),
}

/// enumerates usage errors of the transaction builder
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AddError {
    #[error(transparent)]
    PoolMixing(#[from] PoolConflict),

    #[error("TransactionBuilder cannot {action} before {upgrade} activation")]
    PreActivation {
        action: ShieldedAction,
        upgrade: NetworkUpgrade,
    },

    #[error("TransactionBuilder cannot {0} without a bundle backend")]
    MissingBackend(ShieldedAction),

    #[error("Cannot add transparent inputs to a TransactionBuilder without a keystore")]
    MissingKeystore,

    #[error("Cannot add Sprout inputs or outputs to a TransactionBuilder without a Sprout prover")]
    MissingSproutProver,

    #[error("Cannot add Sprout inputs or outputs to a TransactionBuilder without a Sprout tree view")]
    MissingSproutTreeView,

    #[error("Anchor does not match previously-added Sprout spends.")]
    AnchorMismatch,

    #[error("amount {0} is outside the valid money range")]
    InvalidAmount(Amount),

    #[error(transparent)]
    Backend(#[from] BundleError),
}

/// enumerates reasons a single JoinSplit description cannot be built
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum JoinSplitError {
    #[error("Invalid joinsplit balance")]
    InvalidBalance,

    #[error("JoinSplit input witness root does not match anchor")]
    AnchorMismatch,

    #[error("JoinSplit input {0} is not owned by its spending key")]
    InputNotOwned(usize),

    #[error("JoinSplit note encryption failed: {0}")]
    Encryption(String),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    MerkleTree(#[from] MerkleTreeError),
}

/// enumerates failures of `TransactionBuilder::build()`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum BuildError {
    #[error("Change cannot be negative: {change}")]
    ValueImbalance { change: Amount },

    #[error("Change cannot be negative: value balance overflows the money range")]
    ValueOverflow,

    #[error("Could not determine change address")]
    ChangeAddressUnresolved,

    #[error("Could not add change output: {0}")]
    ChangeOutput(AddError),

    #[error("Cannot build Sprout JoinSplits: {0}")]
    SproutUnavailable(AddError),

    #[error("Failed to build {pool} bundle: {reason}")]
    BundleConstruction { pool: ShieldedPool, reason: String },

    #[error("{pool} bundle value balance {actual} does not match the builder's {expected}")]
    BundleValueMismatch {
        pool: ShieldedPool,
        expected: Amount,
        actual: Amount,
    },

    #[error("Could not find previous JoinSplit anchor {0}")]
    MissingAnchor(Hash256),

    #[error("Error decrypting output note of previous JoinSplit: {0}")]
    NoteDecryption(String),

    #[error("Witness for spendable note does not have same anchor as change input")]
    WitnessAnchorMismatch,

    #[error(
        "Insufficient funds for vpub_new {vpub_new_target} (fee {fee}, taddr outputs {taddr_outputs})"
    )]
    InsufficientFunds {
        vpub_new_target: Amount,
        fee: Amount,
        taddr_outputs: Amount,
    },

    #[error(transparent)]
    InvalidJoinSplit(#[from] JoinSplitError),

    #[error("Sprout note commitment tree: {0}")]
    MerkleTree(#[from] MerkleTreeError),

    #[error("Could not construct signature hash: {0}")]
    SignatureHash(#[from] SigHashError),

    #[error("Failed to create {pool} proof or signatures: {reason}")]
    Signature { pool: ShieldedPool, reason: String },

    #[error(transparent)]
    SaplingSignature(BundleError),

    #[error("Failed to create Sprout joinSplitSig")]
    JoinSplitSig,

    #[error("Sprout joinSplitSig sanity check failed")]
    JoinSplitSigCheck,

    #[error("Failed to sign transaction (input {index}): {reason}")]
    TransparentSignature { index: usize, reason: String },
}
