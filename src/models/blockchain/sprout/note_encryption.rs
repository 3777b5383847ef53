//! In-band encryption of Sprout note plaintexts to a payment address.
//!
//! The sender picks one ephemeral Curve25519 key per JoinSplit and performs
//! a Diffie-Hellman exchange with each output's `pk_enc`. The symmetric key
//! is a personalised BLAKE2b digest of `h_sig`, the shared secret, the
//! ephemeral public key and `pk_enc`, with the output index in the
//! personalisation so that the two outputs of a JoinSplit never share a key.
//! The payload is sealed with AES-256-GCM under an all-zero nonce, which is
//! sound because every key is used exactly once.

use std::fmt;

use aead::Aead;
use aead::Key;
use aead::KeyInit;
use aes_gcm::Aes256Gcm;
use aes_gcm::Nonce;
use curve25519_dalek::montgomery::MontgomeryPoint;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use zeroize::Zeroize;

use super::keys::clamp_curve25519;
use super::keys::SproutReceivingKey;
use crate::models::blockchain::digest::blake2b_personal;
use crate::models::blockchain::digest::byte_array;
use crate::models::blockchain::digest::Hash256;

pub const NOTE_PLAINTEXT_SIZE: usize = 1 + 8 + 32 + 32 + 512;
pub const NOTE_CIPHERTEXT_SIZE: usize = NOTE_PLAINTEXT_SIZE + 16;

const GCM_NONCE: [u8; 12] = [0u8; 12];

/// represents a note decryption error
#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("ephemeral key is a low-order point")]
    LowOrderPoint,

    #[error("decryption failed")]
    DecryptionFailed(#[from] aead::Error),

    #[error("decrypted plaintext has length {0}, expected {NOTE_PLAINTEXT_SIZE}")]
    InvalidLength(usize),

    #[error("invalid note plaintext: {0}")]
    InvalidPlaintext(String),
}

/// represents a note encryption error
#[derive(Debug, thiserror::Error)]
pub enum EncryptError {
    #[error("note encryption nonce exhausted")]
    NonceExhausted,

    #[error("recipient encryption key is a low-order point")]
    LowOrderPoint,

    #[error("encryption failed")]
    EncryptionFailed(#[from] aead::Error),

    #[error("ciphertext has length {0}, expected {NOTE_CIPHERTEXT_SIZE}")]
    InvalidLength(usize),
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteCiphertext(#[serde(with = "byte_array")] [u8; NOTE_CIPHERTEXT_SIZE]);

impl NoteCiphertext {
    pub fn as_bytes(&self) -> &[u8; NOTE_CIPHERTEXT_SIZE] {
        &self.0
    }
}

impl fmt::Debug for NoteCiphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NoteCiphertext({}..)", hex::encode(&self.0[..8]))
    }
}

fn kdf(dh: &[u8; 32], epk: &[u8; 32], pk_enc: &[u8; 32], h_sig: &Hash256, nonce: u8) -> Key<Aes256Gcm> {
    let mut personal = [0u8; 16];
    personal[..8].copy_from_slice(b"ZcashKDF");
    personal[8] = nonce;
    let key = blake2b_personal(&personal, &[h_sig.as_bytes(), dh, epk, pk_enc]);
    Key::<Aes256Gcm>::from(key.to_bytes())
}

/// Encrypts the outputs of one JoinSplit under a shared ephemeral key.
pub struct NoteEncryption {
    esk: [u8; 32],
    epk: [u8; 32],
    h_sig: Hash256,
    nonce: u8,
}

impl NoteEncryption {
    pub fn new<R: Rng + ?Sized>(h_sig: Hash256, rng: &mut R) -> Self {
        let mut esk: [u8; 32] = rng.random();
        clamp_curve25519(&mut esk);
        let epk = MontgomeryPoint::mul_base_clamped(esk).to_bytes();
        Self {
            esk,
            epk,
            h_sig,
            nonce: 0,
        }
    }

    /// The ephemeral public key, published in the JoinSplit description.
    pub fn epk(&self) -> [u8; 32] {
        self.epk
    }

    /// Encrypt the next output. The n-th call uses nonce n, so the caller
    /// must encrypt outputs in slot order.
    pub fn encrypt(
        &mut self,
        pk_enc: &[u8; 32],
        plaintext: &[u8; NOTE_PLAINTEXT_SIZE],
    ) -> Result<NoteCiphertext, EncryptError> {
        if self.nonce == u8::MAX {
            return Err(EncryptError::NonceExhausted);
        }

        // 1. shared secret with the recipient
        let dh = MontgomeryPoint(*pk_enc).mul_clamped(self.esk).to_bytes();
        if dh == [0u8; 32] {
            return Err(EncryptError::LowOrderPoint);
        }

        // 2. derive the one-time symmetric key
        let key = kdf(&dh, &self.epk, pk_enc, &self.h_sig, self.nonce);
        self.nonce += 1;

        // 3. seal
        let cipher = Aes256Gcm::new(&key);
        let ciphertext = cipher.encrypt(Nonce::from_slice(&GCM_NONCE), plaintext.as_ref())?;
        let len = ciphertext.len();
        ciphertext
            .try_into()
            .map(NoteCiphertext)
            .map_err(|_| EncryptError::InvalidLength(len))
    }
}

impl fmt::Debug for NoteEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteEncryption")
            .field("epk", &hex::encode(self.epk))
            .field("h_sig", &self.h_sig)
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

impl Drop for NoteEncryption {
    fn drop(&mut self) {
        self.esk.zeroize();
    }
}

/// Decrypts notes sent to the address of one receiving key.
#[derive(Debug, Clone)]
pub struct NoteDecryption {
    sk_enc: SproutReceivingKey,
    pk_enc: [u8; 32],
}

impl NoteDecryption {
    pub fn new(sk_enc: SproutReceivingKey) -> Self {
        let pk_enc = sk_enc.pk_enc();
        Self { sk_enc, pk_enc }
    }

    pub fn decrypt(
        &self,
        ciphertext: &NoteCiphertext,
        epk: &[u8; 32],
        h_sig: &Hash256,
        nonce: u8,
    ) -> Result<[u8; NOTE_PLAINTEXT_SIZE], DecryptError> {
        // 1. shared secret with the sender's ephemeral key
        let dh = MontgomeryPoint(*epk)
            .mul_clamped(*self.sk_enc.as_bytes())
            .to_bytes();
        if dh == [0u8; 32] {
            return Err(DecryptError::LowOrderPoint);
        }

        // 2. derive the symmetric key the sender used
        let key = kdf(&dh, epk, &self.pk_enc, h_sig, nonce);

        // 3. open
        let cipher = Aes256Gcm::new(&key);
        let plaintext = cipher.decrypt(Nonce::from_slice(&GCM_NONCE), ciphertext.0.as_ref())?;
        let len = plaintext.len();
        plaintext
            .try_into()
            .map_err(|_| DecryptError::InvalidLength(len))
    }
}
