//! The Sprout shielded pool: keys, notes, note encryption, the note
//! commitment tree and JoinSplit descriptions.

pub mod joinsplit;
pub mod keys;
pub mod merkle_tree;
pub mod note;
pub mod note_encryption;
pub(crate) mod prf;
pub mod prover;
