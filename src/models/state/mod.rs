//! wallet-side collaborators of the transaction builder.

pub mod wallet;
