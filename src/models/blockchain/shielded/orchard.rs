use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::models::blockchain::digest::byte_array;

pub const RAW_ADDRESS_SIZE: usize = 43;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchardSpendingKey([u8; 32]);

impl OrchardSpendingKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for OrchardSpendingKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for OrchardSpendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OrchardSpendingKey(..)")
    }
}

/// Orchard raw address: diversifier (11 bytes) || pk_d (32 bytes).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrchardRawAddress(#[serde(with = "byte_array")] [u8; RAW_ADDRESS_SIZE]);

impl OrchardRawAddress {
    pub fn from_bytes(bytes: [u8; RAW_ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; RAW_ADDRESS_SIZE] {
        &self.0
    }
}

impl fmt::Debug for OrchardRawAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrchardRawAddress({})", hex::encode(self.0))
    }
}
