// If code coverage tool `cargo-llvm-cov` is running with the nightly toolchain,
// enable the unstable “coverage” attribute. This allows using the annotation
// `#[coverage(off)]` to explicitly exclude certain parts of the code from
// being considered as “code under test.” Most prominently, the annotation
// should be added to every `#[cfg(test)]` module. Since the “coverage”
// feature is enable only conditionally, the annotation to use is:
// `#[cfg_attr(coverage_nightly, coverage(off))]`.
//
// See also:
// - https://github.com/taiki-e/cargo-llvm-cov#exclude-code-from-coverage
// - https://github.com/rust-lang/rust/issues/84605
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Shielded transaction construction for Komodo/Zcash lineage full nodes.
//!
//! [TransactionBuilder](tx_initiation::builder::transaction_builder::TransactionBuilder)
//! assembles one value-balanced transaction from transparent coins and
//! Sprout, Sapling and Orchard notes. Sprout spends and payments are packed
//! into chained 2-in/2-out JoinSplits.
//!
//! The proving systems are not part of this crate. Sapling and Orchard
//! bundles are produced by a
//! [BundleBackend](models::blockchain::shielded::bundle::BundleBackend) and
//! Sprout proofs by a
//! [SproutProver](models::blockchain::sprout::prover::SproutProver).
//!
//! Most callers only need [tx_initiation::export].

pub mod config_models;
pub mod models;
pub mod tx_initiation;

#[cfg(any(test, feature = "mock-backends"))]
#[cfg_attr(coverage_nightly, coverage(off))]
pub mod mock;
