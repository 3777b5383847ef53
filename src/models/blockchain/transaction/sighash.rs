//! Transaction signature hashes.
//!
//! Three algorithms are in use, chosen by transaction version:
//!
//! * v5: a tree of personalised BLAKE2b digests over the header, the
//!   transparent part and the effecting data of each shielded bundle, in the
//!   manner of ZIP 244.
//! * v3 and v4: a flat personalised BLAKE2b digest in the manner of
//!   ZIP 143/243. The Sapling part is committed to through the bundle's
//!   effects digest.
//! * v1 and v2: the classic double SHA-256 over a modified serialization.
//!
//! Every algorithm commits to the consensus branch id except the classic
//! one, which predates network upgrades.
//!
//! Only `SIGHASH_ALL` is supported.

use serde::Deserialize;
use serde::Serialize;

use super::transparent::write_compact_size;
use super::transparent::Script;
use super::transparent::TransparentInputInfo;
use super::Transaction;
use crate::models::blockchain::amount::Amount;
use crate::models::blockchain::digest::blake2b_personal;
use crate::models::blockchain::digest::sha256d;
use crate::models::blockchain::digest::Hash256;
use crate::models::blockchain::shielded::bundle::empty_effects_digest;
use crate::models::blockchain::shielded::bundle::UnauthorizedBundle;
use crate::models::blockchain::shielded::ShieldedPool;

pub const SIGHASH_ALL: u8 = 0x01;

/// What a signature hash is computed for.
#[derive(Debug, Clone, Copy)]
pub enum SignableInput<'a> {
    /// The whole transaction, as signed by shielded components
    /// (`NOT_AN_INPUT`).
    Shielded,

    /// One transparent input spending a coin locked by `script_code`.
    Transparent {
        index: usize,
        script_code: &'a Script,
        value: Amount,
    },
}

/// What a signature hash commits to for one shielded bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleCommitment {
    pub effects_digest: Hash256,
    pub value_balance: Amount,
}

/// Shielded bundles of a transaction, reduced to what its signature hash
/// commits to. Identical whether computed from unauthorized bundles during
/// building or from the authorized bundles of the finished transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShieldedEffects {
    pub sapling: Option<BundleCommitment>,
    pub orchard: Option<BundleCommitment>,
}

impl ShieldedEffects {
    pub fn from_bundles(
        sapling: Option<&UnauthorizedBundle>,
        orchard: Option<&UnauthorizedBundle>,
    ) -> Self {
        let commit = |b: &UnauthorizedBundle| BundleCommitment {
            effects_digest: b.effects_digest(),
            value_balance: b.value_balance,
        };
        Self {
            sapling: sapling.map(commit),
            orchard: orchard.map(commit),
        }
    }

    pub fn of_transaction(tx: &Transaction) -> Self {
        Self {
            sapling: tx.sapling_bundle.as_ref().map(|b| BundleCommitment {
                effects_digest: b.effects_digest(),
                value_balance: b.value_balance,
            }),
            orchard: tx.orchard_bundle.as_ref().map(|b| BundleCommitment {
                effects_digest: b.effects_digest(),
                value_balance: b.value_balance,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SigHashError {
    #[error("transparent input index {index} out of range ({len} inputs)")]
    InputIndexOutOfRange { index: usize, len: usize },

    #[error("{infos} transparent input infos for {inputs} inputs")]
    InputInfoMismatch { infos: usize, inputs: usize },

    #[error("version {0} transactions cannot carry JoinSplits")]
    JoinSplitsUnsupported(u32),

    #[error("version {version} transactions cannot carry {pool} bundles")]
    BundleUnsupported { version: u32, pool: ShieldedPool },

    #[error("unsupported hash type {0:#04x}")]
    UnsupportedHashType(u8),
}

/// Compute the signature hash of `tx` for `input`.
///
/// `inputs` describes the coins spent by `tx.vin`, in the same order.
pub fn signature_hash(
    tx: &Transaction,
    input: SignableInput<'_>,
    hash_type: u8,
    inputs: &[TransparentInputInfo],
    shielded: &ShieldedEffects,
) -> Result<Hash256, SigHashError> {
    if hash_type != SIGHASH_ALL {
        return Err(SigHashError::UnsupportedHashType(hash_type));
    }
    if inputs.len() != tx.vin.len() {
        return Err(SigHashError::InputInfoMismatch {
            infos: inputs.len(),
            inputs: tx.vin.len(),
        });
    }
    if let SignableInput::Transparent { index, .. } = input {
        if index >= tx.vin.len() {
            return Err(SigHashError::InputIndexOutOfRange {
                index,
                len: tx.vin.len(),
            });
        }
    }
    if !tx.join_splits.is_empty() && !tx.version.supports_join_splits() {
        return Err(SigHashError::JoinSplitsUnsupported(tx.version.version));
    }
    if shielded.sapling.is_some() && !tx.version.supports_sapling() {
        return Err(SigHashError::BundleUnsupported {
            version: tx.version.version,
            pool: ShieldedPool::Sapling,
        });
    }
    if shielded.orchard.is_some() && !tx.version.supports_orchard() {
        return Err(SigHashError::BundleUnsupported {
            version: tx.version.version,
            pool: ShieldedPool::Orchard,
        });
    }

    let digest = if tx.version.supports_orchard() {
        v5_signature_hash(tx, input, hash_type, inputs, shielded)
    } else if tx.version.overwintered {
        overwinter_signature_hash(tx, input, hash_type, shielded)
    } else {
        sprout_signature_hash(tx, input, hash_type)
    };
    Ok(digest)
}

fn branch_personalization(prefix: &[u8; 12], branch_id: u32) -> [u8; 16] {
    let mut personal = [0u8; 16];
    personal[..12].copy_from_slice(prefix);
    personal[12..].copy_from_slice(&branch_id.to_le_bytes());
    personal
}

fn prevouts_bytes(tx: &Transaction) -> Vec<u8> {
    let mut data = vec![];
    for txin in &tx.vin {
        txin.prevout.write_to(&mut data);
    }
    data
}

fn sequence_bytes(tx: &Transaction) -> Vec<u8> {
    tx.vin
        .iter()
        .flat_map(|txin| txin.sequence.to_le_bytes())
        .collect()
}

fn outputs_bytes(tx: &Transaction) -> Vec<u8> {
    let mut data = vec![];
    for out in &tx.vout {
        out.write_to(&mut data);
    }
    data
}

fn v5_signature_hash(
    tx: &Transaction,
    input: SignableInput<'_>,
    hash_type: u8,
    inputs: &[TransparentInputInfo],
    shielded: &ShieldedEffects,
) -> Hash256 {
    let header_digest = blake2b_personal(
        b"ZTxIdHeadersHash",
        &[
            &tx.version.header().to_le_bytes(),
            &tx.version.version_group_id.to_le_bytes(),
            &tx.consensus_branch_id.to_le_bytes(),
            &tx.lock_time.to_le_bytes(),
            &tx.expiry_height.to_le_bytes(),
        ],
    );

    let prevouts_digest = blake2b_personal(b"ZTxIdPrevoutHash", &[&prevouts_bytes(tx)]);
    let sequence_digest = blake2b_personal(b"ZTxIdSequencHash", &[&sequence_bytes(tx)]);
    let outputs_digest = blake2b_personal(b"ZTxIdOutputsHash", &[&outputs_bytes(tx)]);

    let transparent_digest = if tx.vin.is_empty() && tx.vout.is_empty() {
        blake2b_personal(b"ZTxIdTranspaHash", &[])
    } else if tx.vin.is_empty() {
        blake2b_personal(
            b"ZTxIdTranspaHash",
            &[
                prevouts_digest.as_bytes(),
                sequence_digest.as_bytes(),
                outputs_digest.as_bytes(),
            ],
        )
    } else {
        let amounts: Vec<u8> = inputs
            .iter()
            .flat_map(|info| info.value.to_le_bytes())
            .collect();
        let mut scripts = vec![];
        for info in inputs {
            info.script_pubkey.write_to(&mut scripts);
        }
        let amounts_digest = blake2b_personal(b"ZTxTrAmountsHash", &[&amounts]);
        let scripts_digest = blake2b_personal(b"ZTxTrScriptsHash", &[&scripts]);

        let txin_digest = match input {
            SignableInput::Shielded => blake2b_personal(b"Zcash___TxInHash", &[]),
            SignableInput::Transparent {
                index,
                script_code,
                value,
            } => {
                let txin = &tx.vin[index];
                let mut data = vec![];
                txin.prevout.write_to(&mut data);
                data.extend_from_slice(&value.to_le_bytes());
                script_code.write_to(&mut data);
                data.extend_from_slice(&txin.sequence.to_le_bytes());
                blake2b_personal(b"Zcash___TxInHash", &[&data])
            }
        };

        blake2b_personal(
            b"ZTxIdTranspaHash",
            &[
                &[hash_type],
                prevouts_digest.as_bytes(),
                amounts_digest.as_bytes(),
                scripts_digest.as_bytes(),
                sequence_digest.as_bytes(),
                outputs_digest.as_bytes(),
                txin_digest.as_bytes(),
            ],
        )
    };

    let sapling_digest = shielded
        .sapling
        .map_or_else(|| empty_effects_digest(ShieldedPool::Sapling), |b| b.effects_digest);
    let orchard_digest = shielded
        .orchard
        .map_or_else(|| empty_effects_digest(ShieldedPool::Orchard), |b| b.effects_digest);

    blake2b_personal(
        &branch_personalization(b"ZcashTxHash_", tx.consensus_branch_id),
        &[
            header_digest.as_bytes(),
            transparent_digest.as_bytes(),
            sapling_digest.as_bytes(),
            orchard_digest.as_bytes(),
        ],
    )
}

fn overwinter_signature_hash(
    tx: &Transaction,
    input: SignableInput<'_>,
    hash_type: u8,
    shielded: &ShieldedEffects,
) -> Hash256 {
    let digest_or_zero = |empty: bool, personal: &[u8; 16], data: &[u8]| {
        if empty {
            Hash256::ZERO
        } else {
            blake2b_personal(personal, &[data])
        }
    };

    let hash_prevouts = digest_or_zero(tx.vin.is_empty(), b"ZcashPrevoutHash", &prevouts_bytes(tx));
    let hash_sequence = digest_or_zero(tx.vin.is_empty(), b"ZcashSequencHash", &sequence_bytes(tx));
    let hash_outputs = digest_or_zero(tx.vout.is_empty(), b"ZcashOutputsHash", &outputs_bytes(tx));

    let hash_join_splits = {
        let mut data = vec![];
        for js in &tx.join_splits {
            js.write_to(&mut data);
        }
        data.extend_from_slice(&tx.join_split_pub_key);
        digest_or_zero(tx.join_splits.is_empty(), b"ZcashJSplitsHash", &data)
    };

    let mut data = vec![];
    data.extend_from_slice(&tx.version.header().to_le_bytes());
    data.extend_from_slice(&tx.version.version_group_id.to_le_bytes());
    data.extend_from_slice(hash_prevouts.as_bytes());
    data.extend_from_slice(hash_sequence.as_bytes());
    data.extend_from_slice(hash_outputs.as_bytes());
    data.extend_from_slice(hash_join_splits.as_bytes());
    if tx.version.supports_sapling() {
        let hash_sapling = shielded
            .sapling
            .map_or(Hash256::ZERO, |b| b.effects_digest);
        data.extend_from_slice(hash_sapling.as_bytes());
    }
    data.extend_from_slice(&tx.lock_time.to_le_bytes());
    data.extend_from_slice(&tx.expiry_height.to_le_bytes());
    if tx.version.supports_sapling() {
        let value_balance = shielded
            .sapling
            .map_or(Amount::ZERO, |b| b.value_balance);
        data.extend_from_slice(&value_balance.to_le_bytes());
    }
    data.extend_from_slice(&u32::from(hash_type).to_le_bytes());

    if let SignableInput::Transparent {
        index,
        script_code,
        value,
    } = input
    {
        let txin = &tx.vin[index];
        txin.prevout.write_to(&mut data);
        script_code.write_to(&mut data);
        data.extend_from_slice(&value.to_le_bytes());
        data.extend_from_slice(&txin.sequence.to_le_bytes());
    }

    blake2b_personal(
        &branch_personalization(b"ZcashSigHash", tx.consensus_branch_id),
        &[&data],
    )
}

fn sprout_signature_hash(tx: &Transaction, input: SignableInput<'_>, hash_type: u8) -> Hash256 {
    let signed_index = match input {
        SignableInput::Transparent {
            index, script_code, ..
        } => Some((index, script_code)),
        SignableInput::Shielded => None,
    };

    let mut data = vec![];
    data.extend_from_slice(&tx.version.header().to_le_bytes());

    write_compact_size(&mut data, tx.vin.len());
    for (i, txin) in tx.vin.iter().enumerate() {
        txin.prevout.write_to(&mut data);
        match signed_index {
            Some((index, script_code)) if index == i => script_code.write_to(&mut data),
            _ => Script::new().write_to(&mut data),
        }
        data.extend_from_slice(&txin.sequence.to_le_bytes());
    }

    write_compact_size(&mut data, tx.vout.len());
    data.extend_from_slice(&outputs_bytes(tx));
    data.extend_from_slice(&tx.lock_time.to_le_bytes());

    if tx.version.supports_join_splits() {
        write_compact_size(&mut data, tx.join_splits.len());
        for js in &tx.join_splits {
            js.write_to(&mut data);
        }
        if !tx.join_splits.is_empty() {
            data.extend_from_slice(&tx.join_split_pub_key);
        }
    }

    data.extend_from_slice(&u32::from(hash_type).to_le_bytes());
    sha256d(&data)
}
