//! Some example usage of the transaction builder.
//!
//! -----------
//!
//! use case: shield transparent coins into Sapling, change to a Sapling
//! address.
//!
//! given:
//!   1. params:       ConsensusParams  (network upgrade schedule)
//!   2. tip_height:   BlockHeight
//!   3. sapling:      Box<SaplingBackend>  (the Sapling prover)
//!   4. keystore:     Arc<dyn KeyStore>
//!   5. coins:        Vec<(OutPoint, Script, Amount)>  (selected by the wallet)
//!
//! ```ignore
//! let mut builder = TransactionBuilder::new(&params, tip_height.next(), sapling)
//!     .keystore(keystore);
//!
//! for (outpoint, script_pubkey, value) in coins {
//!     builder.add_transparent_input(outpoint, script_pubkey, value)?;
//! }
//! builder.add_sapling_output(Some(ovk), recipient, amount, memo)?;
//! builder.send_change_to(ChangeDestination::sapling(ovk, change_address))?;
//!
//! // the builder is consumed; failures come back inside the result.
//! let tx = builder.build().into_result()?;
//! ```
//!
//! ------------
//!
//! use case: pay from Sprout notes.
//!
//! Sprout needs a prover and a view of the committed note commitment trees.
//! Once a Sprout input or output is added, Orchard can no longer be used in
//! the same transaction, and a v5 transaction falls back to v4.
//!
//! ```ignore
//! let mut builder = TransactionBuilder::new(&params, height, sapling)
//!     .sprout_prover(prover)
//!     .sprout_tree_view(tree_view);
//!
//! for (key, note, witness) in sprout_notes {
//!     builder.add_sprout_input(key, note, witness)?;
//! }
//! builder.add_sprout_output(recipient, amount, memo)?;
//!
//! let result = builder.build();
//! if result.is_error() {
//!     // unlock the selected notes, then report
//!     warn!("{}", result.error_message());
//! }
//! ```

pub mod joinsplit_chainer;
pub mod js_description_info;
pub mod transaction_builder;
pub mod transaction_builder_result;
pub mod transparent_signer;
