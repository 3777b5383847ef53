//! Access to the wallet's transparent signing keys.

use std::collections::HashMap;
use std::fmt;

use rand::Rng;
use secp256k1::PublicKey;
use secp256k1::Secp256k1;
use secp256k1::SecretKey;

use crate::models::blockchain::transaction::transparent::KeyId;
use crate::models::blockchain::transaction::transparent::TransparentAddress;

/// A secp256k1 secret key controlling transparent P2PKH coins.
#[derive(Clone, PartialEq, Eq)]
pub struct TransparentSecretKey(SecretKey);

impl TransparentSecretKey {
    /// `None` unless `bytes` is a valid scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        SecretKey::from_slice(bytes).ok().map(Self)
    }

    pub fn random() -> Self {
        Self::random_from(&mut rand::rng())
    }

    pub fn random_from<R: Rng + ?Sized>(rng: &mut R) -> Self {
        loop {
            let bytes: [u8; 32] = rng.random();
            if let Some(key) = Self::from_bytes(&bytes) {
                return key;
            }
        }
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.0
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(&Secp256k1::signing_only(), &self.0)
    }

    /// compressed SEC1 encoding, as pushed in P2PKH script signatures.
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public_key().serialize()
    }

    pub fn key_id(&self) -> KeyId {
        KeyId::from_pubkey(&self.public_key_bytes())
    }

    pub fn address(&self) -> TransparentAddress {
        TransparentAddress::PublicKeyHash(self.key_id())
    }
}

impl fmt::Debug for TransparentSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransparentSecretKey(key_id={})", self.key_id())
    }
}

impl Drop for TransparentSecretKey {
    fn drop(&mut self) {
        self.0.non_secure_erase();
    }
}

/// Source of transparent secret keys.
///
/// Shared between concurrently running wallet operations, so implementations
/// do their own locking.
pub trait KeyStore: fmt::Debug + Send + Sync {
    fn transparent_secret_key(&self, key_id: &KeyId) -> Option<TransparentSecretKey>;
}

/// A keystore holding its keys in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyStore {
    keys: HashMap<KeyId, TransparentSecretKey>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Store `key`, returning the id it is found under.
    pub fn add(&mut self, key: TransparentSecretKey) -> KeyId {
        let key_id = key.key_id();
        self.keys.insert(key_id, key);
        key_id
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn transparent_secret_key(&self, key_id: &KeyId) -> Option<TransparentSecretKey> {
        self.keys.get(key_id).cloned()
    }
}
