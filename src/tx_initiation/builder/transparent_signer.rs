//! P2PKH script signatures for transparent inputs.

use anyhow::bail;
use anyhow::Context;
use secp256k1::ecdsa::Signature;
use secp256k1::Message;
use secp256k1::PublicKey;
use secp256k1::Secp256k1;

use crate::models::blockchain::digest::Hash256;
use crate::models::blockchain::transaction::sighash::signature_hash;
use crate::models::blockchain::transaction::sighash::ShieldedEffects;
use crate::models::blockchain::transaction::sighash::SignableInput;
use crate::models::blockchain::transaction::sighash::SIGHASH_ALL;
use crate::models::blockchain::transaction::transparent::KeyId;
use crate::models::blockchain::transaction::transparent::Script;
use crate::models::blockchain::transaction::transparent::TransparentInputInfo;
use crate::models::blockchain::transaction::Transaction;
use crate::models::state::wallet::keystore::KeyStore;
use crate::models::state::wallet::keystore::TransparentSecretKey;

/// `<DER signature || hash type> <compressed public key>`
pub fn p2pkh_script_sig(key: &TransparentSecretKey, sighash: &Hash256, hash_type: u8) -> Script {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(sighash.to_bytes());
    let signature = secp.sign_ecdsa(&message, key.secret_key());

    let mut sig_bytes = signature.serialize_der().to_vec();
    sig_bytes.push(hash_type);

    let mut script_sig = Script::new();
    script_sig.push_data(&sig_bytes);
    script_sig.push_data(&key.public_key_bytes());
    script_sig
}

/// Sign input `index` of `tx`, which spends the P2PKH coin `infos[index]`.
pub fn sign_input(
    tx: &Transaction,
    index: usize,
    infos: &[TransparentInputInfo],
    shielded: &ShieldedEffects,
    keystore: &dyn KeyStore,
) -> anyhow::Result<Script> {
    let info = infos
        .get(index)
        .with_context(|| format!("no coin information for input {index}"))?;
    let Some(key_id) = info.script_pubkey.p2pkh_key_id() else {
        bail!("scriptPubKey {:?} is not pay-to-public-key-hash", info.script_pubkey);
    };
    let key = keystore
        .transparent_secret_key(&key_id)
        .with_context(|| format!("keystore has no key for {key_id}"))?;

    let sighash = signature_hash(
        tx,
        SignableInput::Transparent {
            index,
            script_code: &info.script_pubkey,
            value: info.value,
        },
        SIGHASH_ALL,
        infos,
        shielded,
    )?;
    Ok(p2pkh_script_sig(&key, &sighash, SIGHASH_ALL))
}

/// Check the script signature of input `index` against the coin it spends.
pub fn verify_input(
    tx: &Transaction,
    index: usize,
    infos: &[TransparentInputInfo],
    shielded: &ShieldedEffects,
) -> anyhow::Result<()> {
    let txin = tx
        .vin
        .get(index)
        .with_context(|| format!("no input {index}"))?;
    let info = infos
        .get(index)
        .with_context(|| format!("no coin information for input {index}"))?;
    let expected_key_id = info
        .script_pubkey
        .p2pkh_key_id()
        .context("scriptPubKey is not pay-to-public-key-hash")?;

    let items = txin
        .script_sig
        .push_items()
        .context("scriptSig is not push-only")?;
    let [sig_bytes, pubkey_bytes] = items.as_slice() else {
        bail!("scriptSig has {} items, expected 2", items.len());
    };
    let Some((&hash_type, der)) = sig_bytes.split_last() else {
        bail!("empty signature");
    };

    if KeyId::from_pubkey(pubkey_bytes) != expected_key_id {
        bail!("public key does not hash to {expected_key_id}");
    }
    let public_key = PublicKey::from_slice(pubkey_bytes).context("invalid public key")?;
    let signature = Signature::from_der(der).context("invalid DER signature")?;

    let sighash = signature_hash(
        tx,
        SignableInput::Transparent {
            index,
            script_code: &info.script_pubkey,
            value: info.value,
        },
        hash_type,
        infos,
        shielded,
    )?;
    Secp256k1::verification_only()
        .verify_ecdsa(&Message::from_digest(sighash.to_bytes()), &signature, &public_key)
        .context("signature does not verify")?;
    Ok(())
}
