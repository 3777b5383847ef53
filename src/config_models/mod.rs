pub mod consensus_params;
pub mod network;
