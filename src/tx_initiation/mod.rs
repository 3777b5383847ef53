// these represent the public tx_initiation API
pub mod builder;
pub mod error;
pub mod export;
