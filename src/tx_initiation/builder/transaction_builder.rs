//! assembles one value-balanced transaction across the transparent, Sprout,
//! Sapling and Orchard pools.
//!
//! Inputs and outputs are added one at a time; every misuse (mixing Sprout
//! with Orchard, using a pool before it activates, a missing collaborator) is
//! rejected right there as an [AddError]. [TransactionBuilder::build()] then
//! runs to completion and always hands back a [TransactionBuilderResult].
//!
//! see [module docs](super) for an example.

use std::sync::Arc;

use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::VerifyingKey;
use num_traits::CheckedAdd;
use num_traits::CheckedSub;
use rand::Rng;
use tracing::debug;
use tracing::info;
use tracing::warn;
use zeroize::Zeroize;

use super::joinsplit_chainer::JoinSplitChainer;
use super::transaction_builder_result::TransactionBuilderResult;
use super::transparent_signer;
use crate::config_models::consensus_params::ConsensusParams;
use crate::config_models::consensus_params::NetworkUpgrade;
use crate::models::blockchain::amount::checked_sum;
use crate::models::blockchain::amount::Amount;
use crate::models::blockchain::block_height::BlockHeight;
use crate::models::blockchain::shielded::bundle::OrchardBackend;
use crate::models::blockchain::shielded::bundle::Recipient;
use crate::models::blockchain::shielded::bundle::SaplingBackend;
use crate::models::blockchain::shielded::bundle::SpendInfo;
use crate::models::blockchain::shielded::bundle::UnauthorizedBundle;
use crate::models::blockchain::shielded::orchard::OrchardRawAddress;
use crate::models::blockchain::shielded::orchard::OrchardSpendingKey;
use crate::models::blockchain::shielded::sapling::SaplingExtendedSpendingKey;
use crate::models::blockchain::shielded::sapling::SaplingPaymentAddress;
use crate::models::blockchain::shielded::Memo;
use crate::models::blockchain::shielded::OutgoingViewingKey;
use crate::models::blockchain::shielded::ShieldedPool;
use crate::models::blockchain::sprout::joinsplit::JsInput;
use crate::models::blockchain::sprout::joinsplit::JsOutput;
use crate::models::blockchain::sprout::keys::SproutPaymentAddress;
use crate::models::blockchain::sprout::keys::SproutSpendingKey;
use crate::models::blockchain::sprout::merkle_tree::SproutWitness;
use crate::models::blockchain::sprout::note::SproutNote;
use crate::models::blockchain::sprout::prover::SproutProver;
use crate::models::blockchain::transaction::sighash::signature_hash;
use crate::models::blockchain::transaction::sighash::ShieldedEffects;
use crate::models::blockchain::transaction::sighash::SignableInput;
use crate::models::blockchain::transaction::sighash::SIGHASH_ALL;
use crate::models::blockchain::transaction::transparent::OutPoint;
use crate::models::blockchain::transaction::transparent::Script;
use crate::models::blockchain::transaction::transparent::TransparentAddress;
use crate::models::blockchain::transaction::transparent::TransparentInputInfo;
use crate::models::blockchain::transaction::transparent::TxIn;
use crate::models::blockchain::transaction::transparent::TxOut;
use crate::models::blockchain::transaction::Transaction;
use crate::models::state::wallet::change_policy::ChangeDestination;
use crate::models::state::wallet::keystore::KeyStore;
use crate::models::state::wallet::sprout_tree_view::SproutTreeView;
use crate::tx_initiation::error::AddError;
use crate::tx_initiation::error::BuildError;
use crate::tx_initiation::error::PoolConflict;
use crate::tx_initiation::error::ShieldedAction;

/// flat fee used until [TransactionBuilder::set_fee()] is called.
pub const DEFAULT_FEE: Amount = Amount::from_zat(10_000);

/// builds a single transaction. `build()` consumes the builder.
#[derive(Debug)]
pub struct TransactionBuilder {
    target_height: BlockHeight,
    tx: Transaction,
    fee: Amount,

    keystore: Option<Arc<dyn KeyStore>>,
    sprout_prover: Option<Arc<dyn SproutProver>>,
    sprout_tree_view: Option<Arc<dyn SproutTreeView>>,

    sapling: Box<SaplingBackend>,
    /// only present for v5 transactions; dropped once Sprout is used.
    orchard: Option<Box<OrchardBackend>>,
    sprout_in_use: bool,

    value_balance_sapling: Amount,
    value_balance_orchard: Amount,

    /// parallel to `tx.vin`.
    transparent_inputs: Vec<TransparentInputInfo>,
    sprout_inputs: Vec<JsInput>,
    sprout_outputs: Vec<JsOutput>,

    sapling_keys: Vec<SaplingExtendedSpendingKey>,
    orchard_keys: Vec<OrchardSpendingKey>,
    first_sapling_spend: Option<(OutgoingViewingKey, SaplingPaymentAddress)>,
    first_orchard_spend: Option<(OutgoingViewingKey, OrchardRawAddress)>,

    change_destination: Option<ChangeDestination>,
}

impl TransactionBuilder {
    /// a builder for a transaction to be mined at `target_height`, in the
    /// newest format `params` allows there.
    pub fn new(
        params: &ConsensusParams,
        target_height: BlockHeight,
        sapling: Box<SaplingBackend>,
    ) -> Self {
        let tx = Transaction::new_contextual(params, target_height);
        debug!(
            "new {} transaction builder at height {target_height}: v{}",
            params.network, tx.version.version
        );
        Self {
            target_height,
            tx,
            fee: DEFAULT_FEE,
            keystore: None,
            sprout_prover: None,
            sprout_tree_view: None,
            sapling,
            orchard: None,
            sprout_in_use: false,
            value_balance_sapling: Amount::ZERO,
            value_balance_orchard: Amount::ZERO,
            transparent_inputs: vec![],
            sprout_inputs: vec![],
            sprout_outputs: vec![],
            sapling_keys: vec![],
            orchard_keys: vec![],
            first_sapling_spend: None,
            first_orchard_spend: None,
            change_destination: None,
        }
    }

    /// required for transparent inputs.
    pub fn keystore(mut self, keystore: Arc<dyn KeyStore>) -> Self {
        self.keystore = Some(keystore);
        self
    }

    /// ignored unless the transaction is v5 and Sprout is not in use.
    pub fn orchard(mut self, backend: Box<OrchardBackend>) -> Self {
        if self.tx.version.supports_orchard() && !self.sprout_in_use {
            self.orchard = Some(backend);
        }
        self
    }

    /// required for Sprout inputs and outputs.
    pub fn sprout_prover(mut self, prover: Arc<dyn SproutProver>) -> Self {
        self.sprout_prover = Some(prover);
        self
    }

    /// required for Sprout inputs and outputs.
    pub fn sprout_tree_view(mut self, tree_view: Arc<dyn SproutTreeView>) -> Self {
        self.sprout_tree_view = Some(tree_view);
        self
    }

    /// the transaction as built so far.
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }

    /// the fee must lie in the money range.
    pub fn set_fee(&mut self, fee: Amount) -> Result<(), AddError> {
        check_money_range(fee)?;
        self.fee = fee;
        Ok(())
    }

    pub fn set_expiry_height(&mut self, expiry_height: BlockHeight) {
        self.tx.expiry_height = expiry_height;
    }

    pub fn set_lock_time(&mut self, lock_time: u32) {
        self.tx.lock_time = lock_time;
    }

    /// replaces any earlier change destination.
    pub fn send_change_to(&mut self, destination: ChangeDestination) -> Result<(), AddError> {
        if destination.is_sprout() {
            self.check_sprout_usable(ShieldedAction::SproutChange)?;
        }
        self.change_destination = Some(destination);
        Ok(())
    }

    pub fn add_orchard_spend(
        &mut self,
        key: OrchardSpendingKey,
        spend: SpendInfo<OrchardRawAddress>,
    ) -> Result<(), AddError> {
        let value_balance = checked_credit(self.value_balance_orchard, spend.value)?;
        let address = spend.address.clone();
        let backend = self.orchard_backend(ShieldedAction::OrchardSpend)?;
        let ovk = backend.change_ovk(&key);
        backend.add_spend(&key, spend)?;

        self.first_orchard_spend.get_or_insert((ovk, address));
        self.orchard_keys.push(key);
        self.value_balance_orchard = value_balance;
        Ok(())
    }

    pub fn add_orchard_output(
        &mut self,
        ovk: Option<OutgoingViewingKey>,
        to: OrchardRawAddress,
        value: Amount,
        memo: Memo,
    ) -> Result<(), AddError> {
        let value_balance = checked_debit(self.value_balance_orchard, value)?;
        self.orchard_backend(ShieldedAction::OrchardOutput)?
            .add_recipient(Recipient {
                ovk,
                address: to,
                value,
                memo,
            })?;

        self.value_balance_orchard = value_balance;
        Ok(())
    }

    pub fn add_sapling_spend(
        &mut self,
        key: SaplingExtendedSpendingKey,
        spend: SpendInfo<SaplingPaymentAddress>,
    ) -> Result<(), AddError> {
        self.check_sapling_active(ShieldedAction::SaplingSpend)?;
        let value_balance = checked_credit(self.value_balance_sapling, spend.value)?;
        let address = spend.address.clone();
        self.sapling.add_spend(&key, spend)?;

        self.first_sapling_spend.get_or_insert((key.ovk(), address));
        self.sapling_keys.push(key);
        self.value_balance_sapling = value_balance;
        Ok(())
    }

    pub fn add_sapling_output(
        &mut self,
        ovk: Option<OutgoingViewingKey>,
        to: SaplingPaymentAddress,
        value: Amount,
        memo: Memo,
    ) -> Result<(), AddError> {
        self.check_sapling_active(ShieldedAction::SaplingOutput)?;
        let value_balance = checked_debit(self.value_balance_sapling, value)?;
        self.sapling.add_recipient(Recipient {
            ovk,
            address: to,
            value,
            memo,
        })?;

        self.value_balance_sapling = value_balance;
        Ok(())
    }

    /// all Sprout inputs of a transaction must share one anchor.
    pub fn add_sprout_input(
        &mut self,
        key: SproutSpendingKey,
        note: SproutNote,
        witness: SproutWitness,
    ) -> Result<(), AddError> {
        check_money_range(note.value)?;
        self.check_sprout_usable(ShieldedAction::SproutSpend)?;
        if let Some(first) = self.sprout_inputs.first() {
            if first.witness.root() != witness.root() {
                return Err(AddError::AnchorMismatch);
            }
        }

        self.sprout_inputs.push(JsInput::new(witness, note, key));
        Ok(())
    }

    pub fn add_sprout_output(
        &mut self,
        to: SproutPaymentAddress,
        value: Amount,
        memo: Memo,
    ) -> Result<(), AddError> {
        check_money_range(value)?;
        self.check_sprout_usable(ShieldedAction::SproutOutput)?;

        self.sprout_outputs.push(JsOutput::with_memo(to, value, memo));
        Ok(())
    }

    /// `script_pubkey` must be pay-to-public-key-hash to a key in the
    /// keystore for the input to be signable.
    pub fn add_transparent_input(
        &mut self,
        outpoint: OutPoint,
        script_pubkey: Script,
        value: Amount,
    ) -> Result<(), AddError> {
        if self.keystore.is_none() {
            return Err(AddError::MissingKeystore);
        }
        check_money_range(value)?;

        self.tx.vin.push(TxIn::new(outpoint));
        self.transparent_inputs
            .push(TransparentInputInfo::new(script_pubkey, value));
        Ok(())
    }

    pub fn add_transparent_output(
        &mut self,
        to: &TransparentAddress,
        value: Amount,
    ) -> Result<(), AddError> {
        check_money_range(value)?;

        self.tx.vout.push(TxOut::new(value, to.script_pubkey()));
        Ok(())
    }

    fn check_sapling_active(&self, action: ShieldedAction) -> Result<(), AddError> {
        if self.tx.version.supports_sapling() {
            Ok(())
        } else {
            Err(AddError::PreActivation {
                action,
                upgrade: NetworkUpgrade::Sapling,
            })
        }
    }

    fn orchard_backend(&mut self, action: ShieldedAction) -> Result<&mut OrchardBackend, AddError> {
        if self.sprout_in_use {
            return Err(PoolConflict::OrchardInSproutTransaction(action).into());
        }
        if !self.tx.version.supports_orchard() {
            return Err(AddError::PreActivation {
                action,
                upgrade: NetworkUpgrade::Nu5,
            });
        }
        self.orchard
            .as_deref_mut()
            .ok_or(AddError::MissingBackend(action))
    }

    /// Sprout and Orchard are mutually exclusive. The first Sprout action
    /// drops the Orchard backend and, for v5, falls back to v4, which is the
    /// newest format able to carry JoinSplits.
    fn check_sprout_usable(&mut self, action: ShieldedAction) -> Result<(), AddError> {
        if self.orchard.as_ref().is_some_and(|o| o.has_actions()) {
            return Err(PoolConflict::SproutInOrchardTransaction(action).into());
        }
        if self.sprout_prover.is_none() {
            return Err(AddError::MissingSproutProver);
        }
        if self.sprout_tree_view.is_none() {
            return Err(AddError::MissingSproutTreeView);
        }

        if !self.sprout_in_use {
            self.orchard = None;
            self.tx.downgrade_for_join_splits();
            self.sprout_in_use = true;
        }
        Ok(())
    }

    /// build the transaction.
    ///
    /// Failures are reported through the returned value, never by panicking
    /// or returning early.
    pub fn build(self) -> TransactionBuilderResult {
        match self.build_inner() {
            Ok(tx) => {
                info!(
                    "built v{} transaction: {} transparent inputs, {} transparent outputs, {} JoinSplits",
                    tx.version.version,
                    tx.vin.len(),
                    tx.vout.len(),
                    tx.join_splits.len()
                );
                TransactionBuilderResult::Tx(tx)
            }
            Err(e) => {
                warn!("failed to build transaction: {e}");
                TransactionBuilderResult::Error(e)
            }
        }
    }

    fn build_inner(mut self) -> Result<Transaction, BuildError> {
        let mut rng = rand::rng();

        // 1. value balance
        let change = self.change()?;
        if change.is_negative() {
            return Err(BuildError::ValueImbalance { change });
        }

        // 2. change output
        if change.is_positive() {
            self.add_change_output(change)?;
        }

        // 3. orchard bundle
        let mut orchard = self.orchard.take();
        let orchard_bundle = match orchard.as_mut() {
            Some(backend) if backend.has_actions() => {
                match backend.finalize(self.target_height) {
                    Ok(Some(bundle)) => Some(bundle),
                    Ok(None) => {
                        return Err(BuildError::BundleConstruction {
                            pool: ShieldedPool::Orchard,
                            reason: "backend produced no bundle".to_string(),
                        })
                    }
                    Err(e) => {
                        return Err(BuildError::BundleConstruction {
                            pool: ShieldedPool::Orchard,
                            reason: e.to_string(),
                        })
                    }
                }
            }
            _ => None,
        };
        check_bundle_balance(
            ShieldedPool::Orchard,
            orchard_bundle.as_ref(),
            self.value_balance_orchard,
        )?;

        // 4. sapling bundle
        let sapling_bundle = self.sapling.finalize(self.target_height).map_err(|e| {
            BuildError::BundleConstruction {
                pool: ShieldedPool::Sapling,
                reason: e.to_string(),
            }
        })?;
        check_bundle_balance(
            ShieldedPool::Sapling,
            sapling_bundle.as_ref(),
            self.value_balance_sapling,
        )?;

        // 5. JoinSplit signing key
        let join_split_key = self.tx.version.supports_join_splits().then(|| {
            let mut seed: [u8; 32] = rng.random();
            let key = SigningKey::from_bytes(&seed);
            seed.zeroize();
            key
        });
        if let Some(key) = &join_split_key {
            self.tx.join_split_pub_key = key.verifying_key().to_bytes();
        }

        // 6. JoinSplits
        if !self.sprout_inputs.is_empty() || !self.sprout_outputs.is_empty() {
            let prover = self
                .sprout_prover
                .as_deref()
                .ok_or(BuildError::SproutUnavailable(AddError::MissingSproutProver))?;
            let tree_view = self
                .sprout_tree_view
                .as_deref()
                .ok_or(BuildError::SproutUnavailable(AddError::MissingSproutTreeView))?;

            let taddr_outputs = self
                .tx
                .transparent_value_out()
                .ok_or(BuildError::ValueOverflow)?;
            let chainer = JoinSplitChainer::new(prover, tree_view, self.tx.join_split_pub_key)
                .reporting(self.fee, taddr_outputs);
            self.tx.join_splits = chainer.chain(
                std::mem::take(&mut self.sprout_inputs),
                std::mem::take(&mut self.sprout_outputs),
                &mut rng,
            )?;
        }

        // 7. signature hash over the unauthorized transaction
        let effects = ShieldedEffects::from_bundles(sapling_bundle.as_ref(), orchard_bundle.as_ref());
        let sighash = signature_hash(
            &self.tx,
            SignableInput::Shielded,
            SIGHASH_ALL,
            &self.transparent_inputs,
            &effects,
        )?;
        debug!("transaction signature hash {sighash}");

        // 8. orchard proofs and signatures
        if let (Some(bundle), Some(backend)) = (orchard_bundle, orchard.as_mut()) {
            let authorized = backend
                .sign(bundle, &self.orchard_keys, &sighash)
                .map_err(|e| BuildError::Signature {
                    pool: ShieldedPool::Orchard,
                    reason: e.to_string(),
                })?;
            self.tx.orchard_bundle = Some(authorized);
        }

        // 9. sapling proofs and signatures
        if let Some(bundle) = sapling_bundle {
            let authorized = self
                .sapling
                .sign(bundle, &self.sapling_keys, &sighash)
                .map_err(BuildError::SaplingSignature)?;
            self.tx.sapling_bundle = Some(authorized);
        }

        // 10. joinSplitSig, checked straight away
        if let Some(key) = join_split_key {
            let signature = key
                .try_sign(sighash.as_bytes())
                .map_err(|_| BuildError::JoinSplitSig)?;
            self.tx.join_split_sig = signature.to_bytes();

            VerifyingKey::from_bytes(&self.tx.join_split_pub_key)
                .and_then(|vk| {
                    vk.verify_strict(
                        sighash.as_bytes(),
                        &Signature::from_bytes(&self.tx.join_split_sig),
                    )
                })
                .map_err(|_| BuildError::JoinSplitSigCheck)?;
        }

        // 11. transparent signatures
        if !self.tx.vin.is_empty() {
            let keystore = self
                .keystore
                .as_deref()
                .ok_or_else(|| BuildError::TransparentSignature {
                    index: 0,
                    reason: AddError::MissingKeystore.to_string(),
                })?;
            for index in 0..self.tx.vin.len() {
                let script_sig = transparent_signer::sign_input(
                    &self.tx,
                    index,
                    &self.transparent_inputs,
                    &effects,
                    keystore,
                )
                .map_err(|e| BuildError::TransparentSignature {
                    index,
                    reason: format!("{e:#}"),
                })?;
                self.tx.vin[index].script_sig = script_sig;
            }
        }

        // 12. done
        Ok(self.tx)
    }

    /// `Δsapling + Δorchard - fee + Σsprout_in - Σsprout_out + Σt_in - Σt_out`
    fn change(&self) -> Result<Amount, BuildError> {
        let sprout_in = checked_sum(self.sprout_inputs.iter().map(|i| i.note.value));
        let sprout_out = checked_sum(self.sprout_outputs.iter().map(|o| o.value));
        let transparent_in = checked_sum(self.transparent_inputs.iter().map(|i| i.value));
        let transparent_out = self.tx.transparent_value_out();

        [
            Some(self.value_balance_sapling),
            Some(self.value_balance_orchard),
            Some(-self.fee),
            sprout_in,
            sprout_out.map(|v| -v),
            transparent_in,
            transparent_out.map(|v| -v),
        ]
        .into_iter()
        .collect::<Option<Vec<Amount>>>()
        .and_then(checked_sum)
        .ok_or(BuildError::ValueOverflow)
    }

    /// Explicit destination first, then the first Orchard spend, the first
    /// Sapling spend and the first Sprout input, in that order. Transparent
    /// change is never chosen automatically.
    fn add_change_output(&mut self, change: Amount) -> Result<(), BuildError> {
        let memo = Memo::default();
        let added = match self.change_destination.take() {
            Some(ChangeDestination::Orchard { ovk, address }) => {
                self.add_orchard_output(Some(ovk), address, change, memo)
            }
            Some(ChangeDestination::Sapling { ovk, address }) => {
                self.add_sapling_output(Some(ovk), address, change, memo)
            }
            Some(ChangeDestination::Sprout(address)) => {
                self.add_sprout_output(address, change, memo)
            }
            Some(ChangeDestination::Transparent(address)) => {
                self.add_transparent_output(&address, change)
            }
            None => {
                if let Some((ovk, address)) = self.first_orchard_spend.clone() {
                    self.add_orchard_output(Some(ovk), address, change, memo)
                } else if let Some((ovk, address)) = self.first_sapling_spend.clone() {
                    self.add_sapling_output(Some(ovk), address, change, memo)
                } else if let Some(first) = self.sprout_inputs.first() {
                    let address = first.key.address();
                    self.add_sprout_output(address, change, memo)
                } else {
                    return Err(BuildError::ChangeAddressUnresolved);
                }
            }
        };
        added.map_err(BuildError::ChangeOutput)?;

        debug!("sending change of {change} back to the wallet");
        Ok(())
    }
}

fn check_money_range(value: Amount) -> Result<(), AddError> {
    if value.in_money_range() {
        Ok(())
    } else {
        Err(AddError::InvalidAmount(value))
    }
}

fn checked_credit(balance: Amount, value: Amount) -> Result<Amount, AddError> {
    check_money_range(value)?;
    balance
        .checked_add(&value)
        .ok_or(AddError::InvalidAmount(value))
}

fn checked_debit(balance: Amount, value: Amount) -> Result<Amount, AddError> {
    check_money_range(value)?;
    balance
        .checked_sub(&value)
        .ok_or(AddError::InvalidAmount(value))
}

fn check_bundle_balance(
    pool: ShieldedPool,
    bundle: Option<&UnauthorizedBundle>,
    expected: Amount,
) -> Result<(), BuildError> {
    let actual = bundle.map_or(Amount::ZERO, |b| b.value_balance);
    if actual == expected {
        Ok(())
    } else {
        Err(BuildError::BundleValueMismatch {
            pool,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::let_assert;
    use proptest::prop_assert;
    use test_strategy::proptest;
    use tracing_test::traced_test;

    use super::*;
    use crate::mock::orchard_address;
    use crate::mock::orchard_key;
    use crate::mock::sapling_address;
    use crate::mock::sapling_key;
    use crate::mock::sprout_inputs;
    use crate::mock::MockOrchardBackend;
    use crate::mock::MockSaplingBackend;
    use crate::mock::MockSproutProver;
    use crate::models::blockchain::digest::Hash256;
    use crate::models::blockchain::transaction::TxVersion;
    use crate::models::state::wallet::keystore::InMemoryKeyStore;
    use crate::models::state::wallet::keystore::TransparentSecretKey;
    use crate::models::state::wallet::sprout_tree_view::InMemorySproutTrees;

    const HEIGHT: BlockHeight = BlockHeight::new(10);

    fn nu5() -> ConsensusParams {
        ConsensusParams::regtest_with(Some(1), Some(1), Some(1))
    }

    fn sapling_era() -> ConsensusParams {
        ConsensusParams::regtest_with(Some(1), Some(1), None)
    }

    fn sprout_era() -> ConsensusParams {
        ConsensusParams::regtest_with(None, None, None)
    }

    fn new_builder(params: &ConsensusParams) -> TransactionBuilder {
        TransactionBuilder::new(params, HEIGHT, Box::new(MockSaplingBackend::sapling()))
    }

    /// a builder whose keystore holds `key`.
    fn transparent_builder(params: &ConsensusParams) -> (TransactionBuilder, TransparentSecretKey) {
        let key = TransparentSecretKey::random();
        let mut keystore = InMemoryKeyStore::new();
        keystore.add(key.clone());
        (new_builder(params).keystore(Arc::new(keystore)), key)
    }

    fn add_coin(
        builder: &mut TransactionBuilder,
        key: &TransparentSecretKey,
        n: u8,
        value: i64,
    ) -> TransparentInputInfo {
        let info = TransparentInputInfo::new(key.address().script_pubkey(), Amount::from_zat(value));
        builder
            .add_transparent_input(
                OutPoint::new(Hash256([n; 32]), 0),
                info.script_pubkey.clone(),
                info.value,
            )
            .unwrap();
        info
    }

    fn sapling_spend(seed: u8, value: i64) -> SpendInfo<SaplingPaymentAddress> {
        SpendInfo {
            address: sapling_address(seed),
            value: Amount::from_zat(value),
            anchor: Hash256([seed; 32]),
            note: vec![seed],
            merkle_path: vec![],
        }
    }

    fn orchard_spend(seed: u8, value: i64) -> SpendInfo<OrchardRawAddress> {
        SpendInfo {
            address: orchard_address(seed),
            value: Amount::from_zat(value),
            anchor: Hash256([seed; 32]),
            note: vec![seed],
            merkle_path: vec![],
        }
    }

    fn stranger() -> TransparentAddress {
        TransparentSecretKey::random().address()
    }

    /// a builder able to spend Sprout notes of `values`, all owned by the
    /// returned key.
    fn sprout_builder(
        params: &ConsensusParams,
        values: &[i64],
    ) -> (TransactionBuilder, SproutSpendingKey) {
        let key = SproutSpendingKey::random();
        let values: Vec<Amount> = values.iter().copied().map(Amount::from_zat).collect();
        let (trees, inputs) = sprout_inputs(&key, &values).unwrap();

        let mut builder = new_builder(params)
            .sprout_prover(Arc::new(MockSproutProver::new()))
            .sprout_tree_view(Arc::new(trees));
        for input in inputs {
            builder
                .add_sprout_input(input.key, input.note, input.witness)
                .unwrap();
        }
        (builder, key)
    }

    /// value entering the transaction equals value leaving it plus the fee.
    fn conserves_value(tx: &Transaction, transparent_in: Amount, fee: Amount) -> bool {
        let shielded_in = tx.value_balance_sapling()
            + tx.value_balance_orchard()
            + tx.join_split_value_balance().unwrap();
        transparent_in + shielded_in == tx.transparent_value_out().unwrap() + fee
    }

    fn assert_signatures_valid(tx: &Transaction, infos: &[TransparentInputInfo]) {
        let effects = ShieldedEffects::of_transaction(tx);
        let sighash = signature_hash(tx, SignableInput::Shielded, SIGHASH_ALL, infos, &effects).unwrap();

        if tx.version.supports_join_splits() {
            let verifying_key = VerifyingKey::from_bytes(&tx.join_split_pub_key).unwrap();
            verifying_key
                .verify_strict(sighash.as_bytes(), &Signature::from_bytes(&tx.join_split_sig))
                .unwrap();
        }
        for index in 0..tx.vin.len() {
            transparent_signer::verify_input(tx, index, infos, &effects).unwrap();
        }
    }

    #[traced_test]
    #[test]
    fn transparent_to_sapling_with_explicit_change() {
        let (mut builder, key) = transparent_builder(&sapling_era());
        let infos = vec![
            add_coin(&mut builder, &key, 1, 100_000),
            add_coin(&mut builder, &key, 2, 50_000),
        ];
        builder
            .add_sapling_output(None, sapling_address(2), Amount::from_zat(60_000), Memo::default())
            .unwrap();
        builder
            .send_change_to(ChangeDestination::sapling(sapling_key(3).ovk(), sapling_address(3)))
            .unwrap();

        let tx = builder.build().into_result().unwrap();

        assert_eq!(TxVersion::SAPLING, tx.version);
        let_assert!(Some(bundle) = &tx.sapling_bundle);
        assert_eq!(Amount::from_zat(-140_000), bundle.value_balance);
        assert_eq!(2, bundle.num_outputs);
        assert!(conserves_value(&tx, Amount::from_zat(150_000), DEFAULT_FEE));
        assert_signatures_valid(&tx, &infos);
    }

    #[test]
    fn change_returns_to_first_sapling_spend() {
        let mut builder = new_builder(&sapling_era());
        builder
            .add_sapling_spend(sapling_key(1), sapling_spend(1, 200_000))
            .unwrap();
        builder
            .add_sapling_spend(sapling_key(2), sapling_spend(2, 10_000))
            .unwrap();
        builder
            .add_transparent_output(&stranger(), Amount::from_zat(150_000))
            .unwrap();

        let tx = builder.build().into_result().unwrap();

        let_assert!(Some(bundle) = &tx.sapling_bundle);
        assert_eq!(2, bundle.num_spends);
        assert_eq!(1, bundle.num_outputs);
        assert_eq!(Amount::from_zat(160_000), bundle.value_balance);
        assert!(conserves_value(&tx, Amount::ZERO, DEFAULT_FEE));
        assert_signatures_valid(&tx, &[]);
    }

    #[test]
    fn change_returns_to_first_orchard_spend() {
        let mut builder = new_builder(&nu5()).orchard(Box::new(MockOrchardBackend::orchard()));
        builder
            .add_orchard_spend(orchard_key(1), orchard_spend(1, 100_000))
            .unwrap();
        builder
            .add_transparent_output(&stranger(), Amount::from_zat(50_000))
            .unwrap();

        let tx = builder.build().into_result().unwrap();

        assert_eq!(TxVersion::ZIP225, tx.version);
        assert!(tx.sapling_bundle.is_none());
        let_assert!(Some(bundle) = &tx.orchard_bundle);
        assert_eq!(1, bundle.num_outputs);
        assert_eq!(Amount::from_zat(50_000 + DEFAULT_FEE.to_zat()), bundle.value_balance);
        assert!(conserves_value(&tx, Amount::ZERO, DEFAULT_FEE));
        assert_signatures_valid(&tx, &[]);
    }

    #[test]
    fn negative_change_is_rejected() {
        let (mut builder, key) = transparent_builder(&nu5());
        add_coin(&mut builder, &key, 1, 5_000);
        builder
            .add_transparent_output(&stranger(), Amount::from_zat(10_000))
            .unwrap();

        let result = builder.build();
        assert!(result.is_error());
        assert!(result.error_message().contains("Change cannot be negative"));
    }

    #[test]
    fn transparent_change_must_be_explicit() {
        let build = |explicit_change: bool| {
            let (mut builder, key) = transparent_builder(&nu5());
            let info = add_coin(&mut builder, &key, 1, 100_000);
            builder
                .add_transparent_output(&stranger(), Amount::from_zat(50_000))
                .unwrap();
            if explicit_change {
                builder
                    .send_change_to(ChangeDestination::transparent(key.address()))
                    .unwrap();
            }
            (builder.build(), info)
        };

        let (result, _) = build(false);
        assert_eq!("Could not determine change address", result.error_message());

        let (result, info) = build(true);
        let_assert!(Some(tx) = result.tx());
        assert_eq!(2, tx.vout.len());
        assert_eq!(Amount::from_zat(40_000), tx.vout[1].value);
        assert_eq!(info.script_pubkey, tx.vout[1].script_pubkey);
        assert_signatures_valid(tx, &[info]);
    }

    #[traced_test]
    #[test]
    fn sprout_payments_are_chained() {
        let (mut builder, _) = sprout_builder(&sapling_era(), &[100_000]);
        for _ in 0..2 {
            builder
                .add_sprout_output(
                    SproutSpendingKey::random().address(),
                    Amount::from_zat(40_000),
                    Memo::default(),
                )
                .unwrap();
        }
        builder.set_fee(Amount::from_zat(20_000)).unwrap();

        let tx = builder.build().into_result().unwrap();

        assert_eq!(2, tx.join_splits.len());
        assert_eq!(Amount::ZERO, tx.join_splits[0].vpub_new);
        assert_eq!(Amount::from_zat(20_000), tx.join_splits[1].vpub_new);
        assert!(conserves_value(&tx, Amount::ZERO, Amount::from_zat(20_000)));
        assert_signatures_valid(&tx, &[]);
    }

    #[test]
    fn change_returns_to_first_sprout_input() {
        let (mut builder, _) = sprout_builder(&sapling_era(), &[100_000]);
        builder
            .add_sprout_output(
                SproutSpendingKey::random().address(),
                Amount::from_zat(50_000),
                Memo::default(),
            )
            .unwrap();

        let tx = builder.build().into_result().unwrap();

        assert_eq!(
            Some(DEFAULT_FEE),
            tx.join_split_value_balance(),
            "only the fee leaves the Sprout pool"
        );
        assert!(conserves_value(&tx, Amount::ZERO, DEFAULT_FEE));
        assert_signatures_valid(&tx, &[]);
    }

    #[test]
    fn shielding_into_sprout_downgrades_v5() {
        let (builder, key) = transparent_builder(&nu5());
        let mut builder = builder
            .orchard(Box::new(MockOrchardBackend::orchard()))
            .sprout_prover(Arc::new(MockSproutProver::new()))
            .sprout_tree_view(Arc::new(InMemorySproutTrees::new()));
        assert_eq!(TxVersion::ZIP225, builder.transaction().version);

        let info = add_coin(&mut builder, &key, 1, 100_000);
        builder
            .add_sprout_output(
                SproutSpendingKey::random().address(),
                Amount::from_zat(50_000),
                Memo::default(),
            )
            .unwrap();
        assert_eq!(TxVersion::SAPLING, builder.transaction().version);

        let_assert!(
            Err(AddError::PoolMixing(PoolConflict::OrchardInSproutTransaction(
                ShieldedAction::OrchardOutput
            ))) = builder.add_orchard_output(
                None,
                orchard_address(1),
                Amount::from_zat(1),
                Memo::default()
            )
        );

        builder
            .send_change_to(ChangeDestination::transparent(key.address()))
            .unwrap();
        let tx = builder.build().into_result().unwrap();

        assert_eq!(1, tx.join_splits.len());
        assert_eq!(Amount::from_zat(50_000), tx.join_splits[0].vpub_old);
        assert!(conserves_value(&tx, Amount::from_zat(100_000), DEFAULT_FEE));
        assert_signatures_valid(&tx, &[info]);
    }

    #[test]
    fn sprout_and_orchard_exclude_each_other() {
        let (mut builder, _) = sprout_builder(&nu5(), &[100_000]);
        let_assert!(
            Err(AddError::PoolMixing(PoolConflict::OrchardInSproutTransaction(
                ShieldedAction::OrchardSpend
            ))) = builder.add_orchard_spend(orchard_key(1), orchard_spend(1, 10))
        );

        let key = SproutSpendingKey::random();
        let (trees, inputs) = sprout_inputs(&key, &[Amount::from_zat(100_000)]).unwrap();
        let mut builder = new_builder(&nu5())
            .orchard(Box::new(MockOrchardBackend::orchard()))
            .sprout_prover(Arc::new(MockSproutProver::new()))
            .sprout_tree_view(Arc::new(trees));
        builder
            .add_orchard_spend(orchard_key(1), orchard_spend(1, 10))
            .unwrap();
        let_assert!(Some(input) = inputs.into_iter().next());
        let_assert!(
            Err(AddError::PoolMixing(PoolConflict::SproutInOrchardTransaction(
                ShieldedAction::SproutSpend
            ))) = builder.add_sprout_input(input.key, input.note, input.witness)
        );
    }

    #[test]
    fn pools_are_gated_by_activation() {
        let mut builder = new_builder(&sprout_era());
        let_assert!(
            Err(AddError::PreActivation {
                action: ShieldedAction::SaplingOutput,
                upgrade: NetworkUpgrade::Sapling,
            }) = builder.add_sapling_output(None, sapling_address(1), Amount::from_zat(1), Memo::default())
        );

        let mut builder = new_builder(&sapling_era()).orchard(Box::new(MockOrchardBackend::orchard()));
        let_assert!(
            Err(AddError::PreActivation {
                action: ShieldedAction::OrchardSpend,
                upgrade: NetworkUpgrade::Nu5,
            }) = builder.add_orchard_spend(orchard_key(1), orchard_spend(1, 10))
        );

        let mut builder = new_builder(&nu5());
        let_assert!(
            Err(AddError::MissingBackend(ShieldedAction::OrchardSpend)) =
                builder.add_orchard_spend(orchard_key(1), orchard_spend(1, 10))
        );
    }

    #[test]
    fn collaborators_are_required() {
        let mut builder = new_builder(&nu5());
        let_assert!(
            Err(AddError::MissingKeystore) = builder.add_transparent_input(
                OutPoint::new(Hash256([1; 32]), 0),
                stranger().script_pubkey(),
                Amount::from_zat(1)
            )
        );

        let to = SproutSpendingKey::random().address();
        let_assert!(
            Err(AddError::MissingSproutProver) =
                builder.add_sprout_output(to.clone(), Amount::from_zat(1), Memo::default())
        );

        let mut builder = builder.sprout_prover(Arc::new(MockSproutProver::new()));
        let_assert!(
            Err(AddError::MissingSproutTreeView) =
                builder.add_sprout_output(to, Amount::from_zat(1), Memo::default())
        );
    }

    #[test]
    fn sprout_inputs_share_one_anchor() {
        let (mut builder, key) = sprout_builder(&sapling_era(), &[100_000]);
        let (_, inputs) = sprout_inputs(&key, &[Amount::from_zat(7), Amount::from_zat(8)]).unwrap();
        let_assert!(Some(input) = inputs.into_iter().next());

        let_assert!(
            Err(AddError::AnchorMismatch) =
                builder.add_sprout_input(input.key, input.note, input.witness)
        );
    }

    #[test]
    fn amounts_outside_money_range_are_rejected() {
        let mut builder = new_builder(&nu5());
        let_assert!(
            Err(AddError::InvalidAmount(_)) =
                builder.add_transparent_output(&stranger(), Amount::from_zat(-1))
        );
        let_assert!(
            Err(AddError::InvalidAmount(_)) = builder.add_sapling_output(
                None,
                sapling_address(1),
                Amount::max_money() + Amount::from_zat(1),
                Memo::default()
            )
        );
    }

    /// a balanced transparent-to-Sapling builder over the given backend.
    fn shielding_builder(sapling: MockSaplingBackend) -> TransactionBuilder {
        let key = TransparentSecretKey::random();
        let mut keystore = InMemoryKeyStore::new();
        keystore.add(key.clone());
        let mut builder = TransactionBuilder::new(&sapling_era(), HEIGHT, Box::new(sapling))
            .keystore(Arc::new(keystore));
        add_coin(&mut builder, &key, 1, 100_000);
        builder
            .add_sapling_output(None, sapling_address(1), Amount::from_zat(90_000), Memo::default())
            .unwrap();
        builder
    }

    #[test]
    fn backend_failures_are_reported() {
        let result = shielding_builder(MockSaplingBackend::sapling().failing_finalize()).build();
        assert!(result
            .error_message()
            .starts_with("Failed to build Sapling bundle"));

        let result = shielding_builder(MockSaplingBackend::sapling().failing_sign()).build();
        assert_eq!(
            "Sapling signing failed: mock backend fails to sign",
            result.error_message()
        );

        let mut builder = new_builder(&nu5()).orchard(Box::new(MockOrchardBackend::orchard().failing_sign()));
        builder
            .add_orchard_spend(orchard_key(1), orchard_spend(1, 100_000))
            .unwrap();
        builder
            .send_change_to(ChangeDestination::orchard(
                OutgoingViewingKey([9; 32]),
                orchard_address(9),
            ))
            .unwrap();
        let result = builder.build();
        assert!(result
            .error_message()
            .starts_with("Failed to create Orchard proof or signatures"));

        let mut builder = new_builder(&sapling_era())
            .sprout_prover(Arc::new(MockSproutProver::failing()))
            .sprout_tree_view(Arc::new(InMemorySproutTrees::new()));
        builder
            .add_sapling_spend(sapling_key(1), sapling_spend(1, 100_000))
            .unwrap();
        builder
            .add_sprout_output(
                SproutSpendingKey::random().address(),
                Amount::from_zat(90_000),
                Memo::default(),
            )
            .unwrap();
        let result = builder.build();
        let_assert!(Some(BuildError::InvalidJoinSplit(_)) = result.error());
    }

    #[test]
    fn misreported_bundle_balance_is_caught() {
        let result = shielding_builder(MockSaplingBackend::sapling().misreporting_balance()).build();
        let_assert!(
            Some(BuildError::BundleValueMismatch {
                pool: ShieldedPool::Sapling,
                expected,
                actual,
            }) = result.error()
        );
        assert_eq!(Amount::from_zat(-90_000), *expected);
        assert_eq!(Amount::from_zat(-89_999), *actual);
    }

    #[test]
    fn change_to_a_dropped_pool_is_a_build_error() {
        let (mut builder, _) = sprout_builder(&nu5(), &[100_000]);
        builder
            .add_sprout_output(
                SproutSpendingKey::random().address(),
                Amount::from_zat(50_000),
                Memo::default(),
            )
            .unwrap();
        builder
            .send_change_to(ChangeDestination::orchard(
                OutgoingViewingKey([9; 32]),
                orchard_address(9),
            ))
            .unwrap();

        let result = builder.build();

        let_assert!(
            Some(BuildError::ChangeOutput(AddError::PoolMixing(
                PoolConflict::OrchardInSproutTransaction(ShieldedAction::OrchardOutput)
            ))) = result.error()
        );
        assert_eq!(
            "Could not add change output: TransactionBuilder cannot add Orchard outputs in a Sprout transaction",
            result.error_message()
        );
    }

    #[test]
    fn fee_must_lie_in_money_range() {
        let (mut builder, key) = transparent_builder(&sapling_era());
        add_coin(&mut builder, &key, 1, 100_000);
        builder
            .add_transparent_output(&stranger(), Amount::from_zat(100_000))
            .unwrap();
        builder
            .send_change_to(ChangeDestination::transparent(key.address()))
            .unwrap();

        let_assert!(Err(AddError::InvalidAmount(_)) = builder.set_fee(Amount::from_zat(-50_000)));
        let_assert!(Err(AddError::InvalidAmount(_)) = builder.set_fee(Amount::from_zat(i64::MIN)));
        assert_eq!(DEFAULT_FEE, builder.fee());

        // the coin covers the payment but not the fee
        let result = builder.build();
        assert!(result.error_message().contains("Change cannot be negative"));
    }

    #[test]
    fn expiry_height_and_lock_time_are_signed() {
        let (mut builder, key) = transparent_builder(&sapling_era());
        let info = add_coin(&mut builder, &key, 1, 100_000);
        builder
            .add_transparent_output(&stranger(), Amount::from_zat(90_000))
            .unwrap();
        builder.set_expiry_height(BlockHeight::new(500));
        builder.set_lock_time(400);

        let tx = builder.build().into_result().unwrap();

        assert_eq!(BlockHeight::new(500), tx.expiry_height);
        assert_eq!(400, tx.lock_time);
        assert_signatures_valid(&tx, std::slice::from_ref(&info));

        let mut postponed = tx.clone();
        postponed.lock_time = 401;
        let effects = ShieldedEffects::of_transaction(&postponed);
        assert!(transparent_signer::verify_input(&postponed, 0, &[info], &effects).is_err());
    }

    #[test]
    fn rejected_spend_leaves_balance_untouched() {
        let mut builder = TransactionBuilder::new(
            &sapling_era(),
            HEIGHT,
            Box::new(MockSaplingBackend::sapling().rejecting_spends()),
        );
        let_assert!(
            Err(AddError::Backend(_)) =
                builder.add_sapling_spend(sapling_key(1), sapling_spend(1, 100_000))
        );
        assert_eq!(Amount::ZERO, builder.value_balance_sapling);
        assert!(builder.first_sapling_spend.is_none());
    }

    #[proptest(cases = 16)]
    fn built_transactions_conserve_value(
        #[strategy(proptest::collection::vec(20_000i64..5_000_000, 1..4))] coins: Vec<i64>,
        #[strategy(0i64..=100)] percent_paid: i64,
    ) {
        let total: i64 = coins.iter().sum();
        let paid = (total - DEFAULT_FEE.to_zat()) * percent_paid / 100;

        let (mut builder, key) = transparent_builder(&nu5());
        let infos: Vec<TransparentInputInfo> = coins
            .iter()
            .enumerate()
            .map(|(n, value)| add_coin(&mut builder, &key, n as u8, *value))
            .collect();
        builder
            .add_sapling_output(None, sapling_address(1), Amount::from_zat(paid), Memo::default())
            .unwrap();
        builder
            .send_change_to(ChangeDestination::sapling(OutgoingViewingKey([2; 32]), sapling_address(2)))
            .unwrap();

        let tx = builder.build().into_result().unwrap();
        prop_assert!(conserves_value(&tx, Amount::from_zat(total), DEFAULT_FEE));
        assert_signatures_valid(&tx, &infos);
    }
}
