pub mod blockchain;
pub mod state;
