//! 256-bit digests and the hash functions shared by every pool.
//!
//! Three families are in use:
//!
//! * personalised BLAKE2b-256 (`blake2b_personal`) for signature hashes,
//!   `h_sig`, the note-encryption KDF and bundle effect digests.
//! * the raw SHA-256 compression function (`sha256_compress`) for the Sprout
//!   note commitment tree and the Sprout PRFs.
//! * Bitcoin-style `sha256d` and `hash160` for the transparent pool.

use std::fmt;

use rand::Rng;
use ripemd::Ripemd160;
use serde::Deserialize;
use serde::Serialize;
use sha2::digest::generic_array::GenericArray;
use sha2::Digest;
use sha2::Sha256;

/// Length in bytes of a BLAKE2b personalisation string.
pub const PERSONALIZATION_LENGTH: usize = 16;

/// SHA-256 initial hash value (FIPS 180-4, section 5.3.3).
const SHA256_IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.random())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

/// BLAKE2b-256 with a 16-byte personalisation over the concatenation of
/// `parts`.
pub fn blake2b_personal(personal: &[u8; PERSONALIZATION_LENGTH], parts: &[&[u8]]) -> Hash256 {
    let mut state = blake2b_simd::Params::new()
        .hash_length(32)
        .personal(personal)
        .to_state();
    for part in parts {
        state.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(state.finalize().as_bytes());
    Hash256(out)
}

/// The SHA-256 compression function applied to a single 64-byte block, with
/// no padding or length encoding.
pub fn sha256_compress(left: &[u8; 32], right: &[u8; 32]) -> Hash256 {
    let mut block = [0u8; 64];
    block[..32].copy_from_slice(left);
    block[32..].copy_from_slice(right);

    let mut state = SHA256_IV;
    sha2::compress256(&mut state, &[GenericArray::from(block)]);

    let mut out = [0u8; 32];
    for (chunk, word) in out.chunks_exact_mut(4).zip(state) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    Hash256(out)
}

/// Double SHA-256, as used by the classic transparent signature hash.
pub fn sha256d(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    Hash256(Sha256::digest(first).into())
}

/// RIPEMD-160 of SHA-256.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// Serde adapter for byte arrays longer than serde's built-in support.
///
/// Encodes as a length-prefixed byte string, which bincode reads back the
/// same way it reads a `Vec<u8>`.
pub(crate) mod byte_array {
    use serde::de::Error;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub(crate) fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| D::Error::invalid_length(len, &"a fixed-size byte array"))
    }
}
