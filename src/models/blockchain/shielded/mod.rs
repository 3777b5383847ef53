//! Types shared by the shielded pools.
//!
//! Sapling and Orchard proving and signing are delegated to external
//! [`bundle::BundleBackend`] implementations; this crate only sees their keys
//! and addresses as opaque byte strings.

pub mod bundle;
pub mod orchard;
pub mod sapling;

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::models::blockchain::digest::byte_array;

pub const MEMO_SIZE: usize = 512;

/// 512-byte memo field attached to every shielded output.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Memo(#[serde(with = "byte_array")] [u8; MEMO_SIZE]);

impl Memo {
    /// Memo text longer than 512 bytes is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MEMO_SIZE {
            return None;
        }
        let mut memo = [0u8; MEMO_SIZE];
        memo[..bytes.len()].copy_from_slice(bytes);
        Some(Self(memo))
    }

    pub fn from_array(bytes: [u8; MEMO_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MEMO_SIZE] {
        &self.0
    }

    /// The "no memo" marker: `0xF6` followed by zeros.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Default for Memo {
    fn default() -> Self {
        let mut memo = [0u8; MEMO_SIZE];
        memo[0] = 0xf6;
        Self(memo)
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Memo(empty)");
        }
        let end = self.0.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        write!(f, "Memo({})", hex::encode(&self.0[..end]))
    }
}

/// Key that lets the sender recover outputs it created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutgoingViewingKey(pub [u8; 32]);

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
pub enum ShieldedPool {
    Sapling,
    Orchard,
}

impl ShieldedPool {
    /// BLAKE2b personalisation of the pool's effecting-data digest.
    pub(crate) fn effects_personalization(&self) -> &'static [u8; 16] {
        match self {
            ShieldedPool::Sapling => b"ZTxIdSaplingHash",
            ShieldedPool::Orchard => b"ZTxIdOrchardHash",
        }
    }
}
