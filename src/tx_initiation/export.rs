//! These are types used in the tx_initiation public API, including inputs,
//! outputs, collaborators and errors.
//!
//! They are exported here in one location for caller convenience.

pub use crate::config_models::consensus_params::ConsensusParams;
pub use crate::config_models::consensus_params::NetworkUpgrade;
pub use crate::config_models::network::Network;
pub use crate::models::blockchain::amount::Amount;
pub use crate::models::blockchain::block_height::BlockHeight;
pub use crate::models::blockchain::digest::Hash256;
pub use crate::models::blockchain::shielded::bundle::AuthorizedBundle;
pub use crate::models::blockchain::shielded::bundle::BundleBackend;
pub use crate::models::blockchain::shielded::bundle::BundleError;
pub use crate::models::blockchain::shielded::bundle::OrchardBackend;
pub use crate::models::blockchain::shielded::bundle::Recipient;
pub use crate::models::blockchain::shielded::bundle::SaplingBackend;
pub use crate::models::blockchain::shielded::bundle::SpendInfo;
pub use crate::models::blockchain::shielded::bundle::UnauthorizedBundle;
pub use crate::models::blockchain::shielded::orchard::OrchardRawAddress;
pub use crate::models::blockchain::shielded::orchard::OrchardSpendingKey;
pub use crate::models::blockchain::shielded::sapling::SaplingExtendedSpendingKey;
pub use crate::models::blockchain::shielded::sapling::SaplingPaymentAddress;
pub use crate::models::blockchain::shielded::Memo;
pub use crate::models::blockchain::shielded::OutgoingViewingKey;
pub use crate::models::blockchain::shielded::ShieldedPool;
pub use crate::models::blockchain::sprout::joinsplit::JsDescription;
pub use crate::models::blockchain::sprout::keys::SproutPaymentAddress;
pub use crate::models::blockchain::sprout::keys::SproutSpendingKey;
pub use crate::models::blockchain::sprout::merkle_tree::SproutMerkleTree;
pub use crate::models::blockchain::sprout::merkle_tree::SproutWitness;
pub use crate::models::blockchain::sprout::note::SproutNote;
pub use crate::models::blockchain::sprout::prover::JoinSplitStatement;
pub use crate::models::blockchain::sprout::prover::ProofError;
pub use crate::models::blockchain::sprout::prover::SproutProof;
pub use crate::models::blockchain::sprout::prover::SproutProver;
pub use crate::models::blockchain::transaction::transparent::OutPoint;
pub use crate::models::blockchain::transaction::transparent::Script;
pub use crate::models::blockchain::transaction::transparent::TransparentAddress;
pub use crate::models::blockchain::transaction::Transaction;
pub use crate::models::blockchain::transaction::TxVersion;
pub use crate::models::state::wallet::change_policy::ChangeDestination;
pub use crate::models::state::wallet::keystore::InMemoryKeyStore;
pub use crate::models::state::wallet::keystore::KeyStore;
pub use crate::models::state::wallet::keystore::TransparentSecretKey;
pub use crate::models::state::wallet::sprout_tree_view::InMemorySproutTrees;
pub use crate::models::state::wallet::sprout_tree_view::SproutTreeView;
pub use crate::tx_initiation::builder::transaction_builder::TransactionBuilder;
pub use crate::tx_initiation::builder::transaction_builder::DEFAULT_FEE;
pub use crate::tx_initiation::builder::transaction_builder_result::TransactionBuilderResult;
pub use crate::tx_initiation::error::AddError;
pub use crate::tx_initiation::error::BuildError;
pub use crate::tx_initiation::error::JoinSplitError;
pub use crate::tx_initiation::error::PoolConflict;
pub use crate::tx_initiation::error::ShieldedAction;
