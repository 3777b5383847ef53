//! The transparent (Bitcoin-style) part of a transaction.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::models::blockchain::amount::Amount;
use crate::models::blockchain::digest::hash160;
use crate::models::blockchain::digest::Hash256;

pub const OP_DUP: u8 = 0x76;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xac;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;

/// `nSequence` of inputs that do not opt into relative lock-time.
pub const SEQUENCE_FINAL: u32 = u32::MAX;

/// Bitcoin-style variable length integer.
pub fn write_compact_size(out: &mut Vec<u8>, n: usize) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&(n as u64).to_le_bytes());
        }
    }
}

/// Hash160 of a compressed secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId(pub [u8; 20]);

impl KeyId {
    pub fn from_pubkey(serialized_pubkey: &[u8]) -> Self {
        Self(hash160(serialized_pubkey))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", hex::encode(self.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransparentAddress {
    PublicKeyHash(KeyId),
    ScriptHash([u8; 20]),
}

impl TransparentAddress {
    pub fn script_pubkey(&self) -> Script {
        match self {
            TransparentAddress::PublicKeyHash(key_id) => Script::p2pkh(key_id),
            TransparentAddress::ScriptHash(script_id) => Script::p2sh(script_id),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Script(pub Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Default::default()
    }

    /// `OP_DUP OP_HASH160 <key id> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn p2pkh(key_id: &KeyId) -> Self {
        let mut script = Self(vec![OP_DUP, OP_HASH160]);
        script.push_data(&key_id.0);
        script.0.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        script
    }

    /// `OP_HASH160 <script id> OP_EQUAL`
    pub fn p2sh(script_id: &[u8; 20]) -> Self {
        let mut script = Self(vec![OP_HASH160]);
        script.push_data(script_id);
        script.0.push(OP_EQUAL);
        script
    }

    /// The key id of a pay-to-public-key-hash script.
    pub fn p2pkh_key_id(&self) -> Option<KeyId> {
        match self.0.as_slice() {
            [OP_DUP, OP_HASH160, 20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
                let mut key_id = [0u8; 20];
                key_id.copy_from_slice(hash);
                Some(KeyId(key_id))
            }
            _ => None,
        }
    }

    pub fn push_data(&mut self, data: &[u8]) {
        let len = data.len();
        if len < usize::from(OP_PUSHDATA1) {
            self.0.push(len as u8);
        } else if len <= 0xff {
            self.0.extend_from_slice(&[OP_PUSHDATA1, len as u8]);
        } else if len <= 0xffff {
            self.0.push(OP_PUSHDATA2);
            self.0.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.0.push(OP_PUSHDATA4);
            self.0.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.0.extend_from_slice(data);
    }

    /// Split a script made only of data pushes into the pushed items.
    pub fn push_items(&self) -> Option<Vec<&[u8]>> {
        let mut items = vec![];
        let mut rest = self.0.as_slice();
        while let Some((&op, tail)) = rest.split_first() {
            let (len, tail) = match op {
                0..=0x4b => (usize::from(op), tail),
                OP_PUSHDATA1 => {
                    let (&len, tail) = tail.split_first()?;
                    (usize::from(len), tail)
                }
                OP_PUSHDATA2 => {
                    let (len, tail) = tail.split_at_checked(2)?;
                    (usize::from(u16::from_le_bytes([len[0], len[1]])), tail)
                }
                _ => return None,
            };
            let (item, tail) = tail.split_at_checked(len)?;
            items.push(item);
            rest = tail;
        }
        Some(items)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        write_compact_size(out, self.0.len());
        out.extend_from_slice(&self.0);
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub n: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, n: u32) -> Self {
        Self { txid, n }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.txid.as_bytes());
        out.extend_from_slice(&self.n.to_le_bytes());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prevout: OutPoint) -> Self {
        Self {
            prevout,
            script_sig: Script::new(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: Amount,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(value: Amount, script_pubkey: Script) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value.to_le_bytes());
        self.script_pubkey.write_to(out);
    }
}

/// The coin spent by a transparent input: the script it is locked with and
/// its value. Kept alongside `vin` for signing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransparentInputInfo {
    pub script_pubkey: Script,
    pub value: Amount,
}

impl TransparentInputInfo {
    pub fn new(script_pubkey: Script, value: Amount) -> Self {
        Self {
            script_pubkey,
            value,
        }
    }
}
