use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::OutgoingViewingKey;
use crate::models::blockchain::digest::byte_array;

pub const EXTENDED_SPENDING_KEY_SIZE: usize = 169;
pub const PAYMENT_ADDRESS_SIZE: usize = 43;

/// byte offset of `ovk` in a ZIP-32 extended spending key:
/// depth (1) || parent tag (4) || child index (4) || chain code (32) ||
/// ask (32) || nsk (32) || ovk (32) || dk (32).
const OVK_OFFSET: usize = 105;

/// ZIP-32 Sapling extended spending key, in its 169-byte encoding.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaplingExtendedSpendingKey(
    #[serde(with = "byte_array")] [u8; EXTENDED_SPENDING_KEY_SIZE],
);

impl SaplingExtendedSpendingKey {
    pub fn from_bytes(bytes: [u8; EXTENDED_SPENDING_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; EXTENDED_SPENDING_KEY_SIZE] {
        &self.0
    }

    /// Outgoing viewing key of the expanded spending key.
    pub fn ovk(&self) -> OutgoingViewingKey {
        let mut ovk = [0u8; 32];
        ovk.copy_from_slice(&self.0[OVK_OFFSET..OVK_OFFSET + 32]);
        OutgoingViewingKey(ovk)
    }
}

impl AsRef<[u8]> for SaplingExtendedSpendingKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SaplingExtendedSpendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SaplingExtendedSpendingKey(ovk={})", hex::encode(self.ovk().0))
    }
}

/// Sapling payment address: diversifier (11 bytes) || pk_d (32 bytes).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaplingPaymentAddress(#[serde(with = "byte_array")] [u8; PAYMENT_ADDRESS_SIZE]);

impl SaplingPaymentAddress {
    pub fn from_bytes(bytes: [u8; PAYMENT_ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PAYMENT_ADDRESS_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SaplingPaymentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SaplingPaymentAddress({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ovk_is_read_from_its_slot() {
        let mut bytes = [0u8; EXTENDED_SPENDING_KEY_SIZE];
        bytes[OVK_OFFSET..OVK_OFFSET + 32].copy_from_slice(&[0xabu8; 32]);
        let key = SaplingExtendedSpendingKey::from_bytes(bytes);
        assert_eq!(OutgoingViewingKey([0xabu8; 32]), key.ovk());
    }
}
