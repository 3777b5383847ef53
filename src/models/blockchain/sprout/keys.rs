use std::fmt;

use curve25519_dalek::montgomery::MontgomeryPoint;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use zeroize::Zeroize;

use super::prf::prf_addr;
use crate::models::blockchain::digest::Hash256;

/// A Sprout spending key `a_sk`: 252 random bits stored big-endian in 32
/// bytes, top four bits clear.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SproutSpendingKey([u8; 32]);

impl SproutSpendingKey {
    pub fn random() -> Self {
        Self::random_from(&mut rand::rng())
    }

    pub fn random_from<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes: [u8; 32] = rng.random();
        bytes[0] &= 0x0f;
        Self(bytes)
    }

    /// Interpret 32 bytes as a spending key. Returns `None` when any of the
    /// top four bits are set.
    pub fn from_bytes(bytes: [u8; 32]) -> Option<Self> {
        (bytes[0] & 0xf0 == 0).then_some(Self(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn paying_key(&self) -> Hash256 {
        prf_addr(&self.0, 0)
    }

    pub fn receiving_key(&self) -> SproutReceivingKey {
        let mut sk_enc = prf_addr(&self.0, 1).to_bytes();
        clamp_curve25519(&mut sk_enc);
        SproutReceivingKey(sk_enc)
    }

    pub fn viewing_key(&self) -> SproutViewingKey {
        SproutViewingKey {
            a_pk: self.paying_key(),
            sk_enc: self.receiving_key(),
        }
    }

    pub fn address(&self) -> SproutPaymentAddress {
        self.viewing_key().address()
    }
}

impl fmt::Debug for SproutSpendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SproutSpendingKey(..)")
    }
}

impl Drop for SproutSpendingKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Curve25519 private key `sk_enc` used to decrypt notes sent to an address.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SproutReceivingKey([u8; 32]);

impl SproutReceivingKey {
    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn pk_enc(&self) -> [u8; 32] {
        MontgomeryPoint::mul_base_clamped(self.0).to_bytes()
    }
}

impl fmt::Debug for SproutReceivingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SproutReceivingKey(..)")
    }
}

impl Drop for SproutReceivingKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SproutViewingKey {
    pub a_pk: Hash256,
    pub sk_enc: SproutReceivingKey,
}

impl SproutViewingKey {
    pub fn address(&self) -> SproutPaymentAddress {
        SproutPaymentAddress {
            a_pk: self.a_pk,
            pk_enc: self.sk_enc.pk_enc(),
        }
    }
}

/// A Sprout payment address `(a_pk, pk_enc)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SproutPaymentAddress {
    pub a_pk: Hash256,
    pub pk_enc: [u8; 32],
}

impl fmt::Display for SproutPaymentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zc:{}{}", self.a_pk.to_hex(), hex::encode(self.pk_enc))
    }
}

/// Clamp a Curve25519 scalar as X25519 does.
pub(crate) fn clamp_curve25519(key: &mut [u8; 32]) {
    key[0] &= 248;
    key[31] &= 127;
    key[31] |= 64;
}
