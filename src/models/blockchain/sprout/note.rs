use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use super::keys::SproutPaymentAddress;
use super::keys::SproutSpendingKey;
use super::note_encryption::DecryptError;
use super::note_encryption::EncryptError;
use super::note_encryption::NoteCiphertext;
use super::note_encryption::NoteDecryption;
use super::note_encryption::NoteEncryption;
use super::note_encryption::NOTE_PLAINTEXT_SIZE;
use super::prf::prf_nf;
use crate::models::blockchain::amount::Amount;
use crate::models::blockchain::digest::Hash256;
use crate::models::blockchain::shielded::Memo;
use crate::models::blockchain::shielded::MEMO_SIZE;

/// Leading byte of a Sprout note commitment preimage.
const NOTE_COMMITMENT_LEAD_BYTE: u8 = 0xb0;

/// Leading byte of a Sprout note plaintext.
const NOTE_PLAINTEXT_LEAD_BYTE: u8 = 0x00;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SproutNote {
    pub a_pk: Hash256,
    pub value: Amount,
    pub rho: Hash256,
    pub r: Hash256,
}

impl SproutNote {
    pub fn new(a_pk: Hash256, value: Amount, rho: Hash256, r: Hash256) -> Self {
        Self { a_pk, value, rho, r }
    }

    /// A note of `value` to `address` with fresh randomness.
    pub fn random_to<R: Rng + ?Sized>(address: &SproutPaymentAddress, value: Amount, rng: &mut R) -> Self {
        Self {
            a_pk: address.a_pk,
            value,
            rho: Hash256::random(rng),
            r: Hash256::random(rng),
        }
    }

    /// `cm = SHA256(0xb0 || a_pk || v || rho || r)`.
    pub fn commitment(&self) -> Hash256 {
        let mut hasher = Sha256::new();
        hasher.update([NOTE_COMMITMENT_LEAD_BYTE]);
        hasher.update(self.a_pk.as_bytes());
        hasher.update(self.value.to_le_bytes());
        hasher.update(self.rho.as_bytes());
        hasher.update(self.r.as_bytes());
        Hash256(hasher.finalize().into())
    }

    pub fn nullifier(&self, key: &SproutSpendingKey) -> Hash256 {
        prf_nf(key.as_bytes(), &self.rho)
    }
}

/// The secret part of a note that is encrypted to its recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SproutNotePlaintext {
    pub value: Amount,
    pub rho: Hash256,
    pub r: Hash256,
    pub memo: Memo,
}

impl SproutNotePlaintext {
    pub fn new(note: &SproutNote, memo: Memo) -> Self {
        Self {
            value: note.value,
            rho: note.rho,
            r: note.r,
            memo,
        }
    }

    pub fn note(&self, address: &SproutPaymentAddress) -> SproutNote {
        SproutNote::new(address.a_pk, self.value, self.rho, self.r)
    }

    pub fn to_bytes(&self) -> [u8; NOTE_PLAINTEXT_SIZE] {
        let mut bytes = [0u8; NOTE_PLAINTEXT_SIZE];
        bytes[0] = NOTE_PLAINTEXT_LEAD_BYTE;
        bytes[1..9].copy_from_slice(&self.value.to_le_bytes());
        bytes[9..41].copy_from_slice(self.rho.as_bytes());
        bytes[41..73].copy_from_slice(self.r.as_bytes());
        bytes[73..].copy_from_slice(self.memo.as_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; NOTE_PLAINTEXT_SIZE]) -> Result<Self, DecryptError> {
        if bytes[0] != NOTE_PLAINTEXT_LEAD_BYTE {
            return Err(DecryptError::InvalidPlaintext(format!(
                "lead byte {:#04x}",
                bytes[0]
            )));
        }

        let mut value = [0u8; 8];
        value.copy_from_slice(&bytes[1..9]);
        let value = Amount::from_u64(u64::from_le_bytes(value))
            .ok_or_else(|| DecryptError::InvalidPlaintext("value out of range".to_string()))?;

        let mut rho = [0u8; 32];
        rho.copy_from_slice(&bytes[9..41]);
        let mut r = [0u8; 32];
        r.copy_from_slice(&bytes[41..73]);
        let mut memo = [0u8; MEMO_SIZE];
        memo.copy_from_slice(&bytes[73..]);

        Ok(Self {
            value,
            rho: Hash256(rho),
            r: Hash256(r),
            memo: Memo::from_array(memo),
        })
    }

    pub fn encrypt(
        &self,
        encryptor: &mut NoteEncryption,
        pk_enc: &[u8; 32],
    ) -> Result<NoteCiphertext, EncryptError> {
        encryptor.encrypt(pk_enc, &self.to_bytes())
    }

    pub fn decrypt(
        decryptor: &NoteDecryption,
        ciphertext: &NoteCiphertext,
        epk: &[u8; 32],
        h_sig: &Hash256,
        nonce: u8,
    ) -> Result<Self, DecryptError> {
        let plaintext = decryptor.decrypt(ciphertext, epk, h_sig, nonce)?;
        Self::from_bytes(&plaintext)
    }
}
