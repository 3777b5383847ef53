pub mod amount;
pub mod block_height;
pub mod digest;
pub mod shielded;
pub mod sprout;
pub mod transaction;
