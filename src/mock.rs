//! Deterministic stand-ins for the external proving backends.
//!
//! They keep enough bookkeeping to make the builder's value flow and
//! signature digest observable, and can be told to fail at each stage.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;

use crate::models::blockchain::amount::Amount;
use crate::models::blockchain::block_height::BlockHeight;
use crate::models::blockchain::digest::blake2b_personal;
use crate::models::blockchain::digest::Hash256;
use crate::models::blockchain::shielded::bundle::AuthorizedBundle;
use crate::models::blockchain::shielded::bundle::BundleBackend;
use crate::models::blockchain::shielded::bundle::BundleError;
use crate::models::blockchain::shielded::bundle::Recipient;
use crate::models::blockchain::shielded::bundle::SpendInfo;
use crate::models::blockchain::shielded::bundle::UnauthorizedBundle;
use crate::models::blockchain::shielded::orchard::OrchardRawAddress;
use crate::models::blockchain::shielded::orchard::OrchardSpendingKey;
use crate::models::blockchain::shielded::sapling::SaplingExtendedSpendingKey;
use crate::models::blockchain::shielded::sapling::SaplingPaymentAddress;
use crate::models::blockchain::shielded::sapling::EXTENDED_SPENDING_KEY_SIZE;
use crate::models::blockchain::shielded::OutgoingViewingKey;
use crate::models::blockchain::shielded::ShieldedPool;
use crate::models::blockchain::sprout::joinsplit::JsInput;
use crate::models::blockchain::sprout::keys::SproutSpendingKey;
use crate::models::blockchain::sprout::merkle_tree::MerkleTreeError;
use crate::models::blockchain::sprout::merkle_tree::SproutMerkleTree;
use crate::models::blockchain::sprout::merkle_tree::SproutWitness;
use crate::models::blockchain::sprout::note::SproutNote;
use crate::models::blockchain::sprout::prover::JoinSplitStatement;
use crate::models::blockchain::sprout::prover::ProofError;
use crate::models::blockchain::sprout::prover::SproutProof;
use crate::models::blockchain::sprout::prover::SproutProver;
use crate::models::blockchain::sprout::prover::SPROUT_PROOF_SIZE;
use crate::models::state::wallet::sprout_tree_view::InMemorySproutTrees;

/// Records spends and recipients and "proves" by hashing them.
pub struct MockBundleBackend<K, A> {
    pool: ShieldedPool,
    spends: Vec<SpendInfo<A>>,
    recipients: Vec<Recipient<A>>,

    pub reject_spends: bool,
    pub fail_finalize: bool,
    pub fail_sign: bool,
    /// reported by `finalize`, off by one zatoshi.
    pub misreport_balance: bool,

    key_type: PhantomData<fn() -> K>,
}

pub type MockSaplingBackend = MockBundleBackend<SaplingExtendedSpendingKey, SaplingPaymentAddress>;
pub type MockOrchardBackend = MockBundleBackend<OrchardSpendingKey, OrchardRawAddress>;

impl MockSaplingBackend {
    pub fn sapling() -> Self {
        Self::for_pool(ShieldedPool::Sapling)
    }
}

impl MockOrchardBackend {
    pub fn orchard() -> Self {
        Self::for_pool(ShieldedPool::Orchard)
    }
}

impl<K, A> MockBundleBackend<K, A> {
    fn for_pool(pool: ShieldedPool) -> Self {
        Self {
            pool,
            spends: vec![],
            recipients: vec![],
            reject_spends: false,
            fail_finalize: false,
            fail_sign: false,
            misreport_balance: false,
            key_type: PhantomData,
        }
    }

    pub fn rejecting_spends(mut self) -> Self {
        self.reject_spends = true;
        self
    }

    pub fn failing_finalize(mut self) -> Self {
        self.fail_finalize = true;
        self
    }

    pub fn failing_sign(mut self) -> Self {
        self.fail_sign = true;
        self
    }

    pub fn misreporting_balance(mut self) -> Self {
        self.misreport_balance = true;
        self
    }
}

impl<K, A: fmt::Debug> fmt::Debug for MockBundleBackend<K, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBundleBackend")
            .field("pool", &self.pool)
            .field("spends", &self.spends.len())
            .field("recipients", &self.recipients.len())
            .finish_non_exhaustive()
    }
}

impl<K, A> BundleBackend for MockBundleBackend<K, A>
where
    K: Clone + fmt::Debug + Send + AsRef<[u8]>,
    A: Clone + fmt::Debug + Send + Serialize,
{
    type SpendingKey = K;
    type Address = A;

    fn pool(&self) -> ShieldedPool {
        self.pool
    }

    fn add_spend(&mut self, _key: &K, spend: SpendInfo<A>) -> Result<(), BundleError> {
        if self.reject_spends {
            return Err(BundleError::SpendRejected {
                pool: self.pool,
                reason: "mock backend rejects spends".to_string(),
            });
        }
        self.spends.push(spend);
        Ok(())
    }

    fn add_recipient(&mut self, recipient: Recipient<A>) -> Result<(), BundleError> {
        self.recipients.push(recipient);
        Ok(())
    }

    fn has_actions(&self) -> bool {
        !self.spends.is_empty() || !self.recipients.is_empty()
    }

    fn value_balance(&self) -> Amount {
        let spent: Amount = self.spends.iter().map(|s| s.value).sum();
        let sent: Amount = self.recipients.iter().map(|r| r.value).sum();
        spent - sent
    }

    fn change_ovk(&self, key: &K) -> OutgoingViewingKey {
        OutgoingViewingKey(blake2b_personal(b"MockBackendOvk__", &[key.as_ref()]).to_bytes())
    }

    fn finalize(
        &mut self,
        _target_height: BlockHeight,
    ) -> Result<Option<UnauthorizedBundle>, BundleError> {
        if self.fail_finalize {
            return Err(BundleError::Proving {
                pool: self.pool,
                reason: "mock backend fails to finalize".to_string(),
            });
        }
        if !self.has_actions() {
            return Ok(None);
        }

        let effects = bincode::serialize(&(&self.spends, &self.recipients)).map_err(|e| {
            BundleError::Proving {
                pool: self.pool,
                reason: e.to_string(),
            }
        })?;
        let value_balance = if self.misreport_balance {
            self.value_balance() + Amount::from_zat(1)
        } else {
            self.value_balance()
        };
        Ok(Some(UnauthorizedBundle {
            pool: self.pool,
            value_balance,
            num_spends: self.spends.len(),
            num_outputs: self.recipients.len(),
            effects,
        }))
    }

    fn sign(
        &mut self,
        bundle: UnauthorizedBundle,
        keys: &[K],
        sighash: &Hash256,
    ) -> Result<AuthorizedBundle, BundleError> {
        if self.fail_sign {
            return Err(BundleError::Signing {
                pool: self.pool,
                reason: "mock backend fails to sign".to_string(),
            });
        }
        if keys.len() != bundle.num_spends {
            return Err(BundleError::Signing {
                pool: self.pool,
                reason: format!("{} keys for {} spends", keys.len(), bundle.num_spends),
            });
        }

        let mut authorization = sighash.to_bytes().to_vec();
        for key in keys {
            let signature = blake2b_personal(b"MockBackendSig__", &[sighash.as_bytes(), key.as_ref()]);
            authorization.extend_from_slice(signature.as_bytes());
        }
        Ok(bundle.authorize(authorization))
    }
}

/// "Proves" a JoinSplit by hashing its public inputs, after checking that
/// they are consistent with the private witness.
#[derive(Debug, Clone, Default)]
pub struct MockSproutProver {
    pub fail: bool,
}

impl MockSproutProver {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl SproutProver for MockSproutProver {
    fn prove(&self, statement: &JoinSplitStatement<'_>) -> Result<SproutProof, ProofError> {
        if self.fail {
            return Err(ProofError("mock prover configured to fail".to_string()));
        }

        for (i, input) in statement.inputs.iter().enumerate() {
            if input.nullifier() != statement.nullifiers[i] {
                return Err(ProofError(format!("nullifier {i} does not match input")));
            }
        }
        for (i, note) in statement.output_notes.iter().enumerate() {
            if note.commitment() != statement.commitments[i] {
                return Err(ProofError(format!("commitment {i} does not match output")));
            }
        }

        let digest = blake2b_personal(
            b"MockSproutProof_",
            &[
                statement.anchor.as_bytes(),
                statement.h_sig.as_bytes(),
                statement.commitments[0].as_bytes(),
                statement.commitments[1].as_bytes(),
                &statement.vpub_old.to_le_bytes(),
                &statement.vpub_new.to_le_bytes(),
            ],
        );
        let proof = digest
            .as_bytes()
            .iter()
            .copied()
            .cycle()
            .take(SPROUT_PROOF_SIZE)
            .collect();
        Ok(SproutProof::from_bytes(proof))
    }
}

/// A Sapling extended spending key whose bytes are all `seed`.
pub fn sapling_key(seed: u8) -> SaplingExtendedSpendingKey {
    SaplingExtendedSpendingKey::from_bytes([seed; EXTENDED_SPENDING_KEY_SIZE])
}

pub fn sapling_address(seed: u8) -> SaplingPaymentAddress {
    SaplingPaymentAddress::from_bytes([seed; 43])
}

pub fn orchard_key(seed: u8) -> OrchardSpendingKey {
    OrchardSpendingKey::from_bytes([seed; 32])
}

pub fn orchard_address(seed: u8) -> OrchardRawAddress {
    OrchardRawAddress::from_bytes([seed; 43])
}

/// Sprout notes of `values`, all owned by `key`, committed to one tree that
/// is registered in a tree view. The inputs' witnesses share the tree's root
/// as anchor.
pub fn sprout_inputs(
    key: &SproutSpendingKey,
    values: &[Amount],
) -> Result<(InMemorySproutTrees, Vec<JsInput>), MerkleTreeError> {
    let mut rng = rand::rng();
    let address = key.address();
    let notes: Vec<SproutNote> = values
        .iter()
        .map(|value| SproutNote::random_to(&address, *value, &mut rng))
        .collect();

    // witness each note at its own position, then bring every witness up to
    // the final tree
    let mut tree = SproutMerkleTree::new();
    let mut witnesses: Vec<SproutWitness> = vec![];
    for note in &notes {
        tree.append(note.commitment())?;
        for witness in &mut witnesses {
            witness.append(note.commitment())?;
        }
        witnesses.push(tree.witness());
    }

    let mut trees = InMemorySproutTrees::new();
    trees.insert(tree);
    let inputs = notes
        .into_iter()
        .zip(witnesses)
        .map(|(note, witness)| JsInput::new(witness, note, key.clone()))
        .collect();
    Ok((trees, inputs))
}
