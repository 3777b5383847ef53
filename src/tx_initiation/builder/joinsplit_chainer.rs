//! packs any number of Sprout spends and payments into a chain of 2-in/2-out
//! JoinSplits.
//!
//! Each JoinSplit in a chain carries its surplus forward as a change note,
//! which the next JoinSplit spends. That change note only exists inside the
//! transaction being built, so its witness is synthesized from the previous
//! link's tree state plus the previous link's output commitments.
//!
//! The public value crosses the boundary at most twice: `vpub_old` on the
//! first link and `vpub_new` on the last.

use std::collections::HashMap;
use std::collections::VecDeque;

use rand::Rng;
use tracing::debug;

use super::js_description_info::JsDescriptionInfo;
use super::js_description_info::ShuffledJsDescription;
use crate::models::blockchain::amount::checked_sum;
use crate::models::blockchain::amount::Amount;
use crate::models::blockchain::digest::Hash256;
use crate::models::blockchain::sprout::joinsplit::JsDescription;
use crate::models::blockchain::sprout::joinsplit::JsInput;
use crate::models::blockchain::sprout::joinsplit::JsOutput;
use crate::models::blockchain::sprout::joinsplit::ZC_NUM_JS_INPUTS;
use crate::models::blockchain::sprout::keys::SproutSpendingKey;
use crate::models::blockchain::sprout::merkle_tree::SproutMerkleTree;
use crate::models::blockchain::sprout::merkle_tree::SproutWitness;
use crate::models::blockchain::sprout::note::SproutNotePlaintext;
use crate::models::blockchain::sprout::note_encryption::NoteDecryption;
use crate::models::blockchain::sprout::prover::SproutProver;
use crate::models::state::wallet::sprout_tree_view::SproutTreeView;
use crate::tx_initiation::error::BuildError;

/// Builds the JoinSplits of one transaction.
#[derive(Debug)]
pub struct JoinSplitChainer<'a> {
    prover: &'a dyn SproutProver,
    tree_view: &'a dyn SproutTreeView,
    join_split_pub_key: [u8; 32],

    /// only reported in errors.
    fee: Amount,
    taddr_outputs: Amount,
}

impl<'a> JoinSplitChainer<'a> {
    pub fn new(
        prover: &'a dyn SproutProver,
        tree_view: &'a dyn SproutTreeView,
        join_split_pub_key: [u8; 32],
    ) -> Self {
        Self {
            prover,
            tree_view,
            join_split_pub_key,
            fee: Amount::ZERO,
            taddr_outputs: Amount::ZERO,
        }
    }

    /// fee and transparent outputs of the enclosing transaction, quoted when
    /// the Sprout notes cannot cover what leaves the pool.
    pub fn reporting(mut self, fee: Amount, taddr_outputs: Amount) -> Self {
        self.fee = fee;
        self.taddr_outputs = taddr_outputs;
        self
    }

    /// Spend `inputs` and pay `outputs`, moving any shortfall in from the
    /// transparent pool and any surplus out to it.
    pub fn chain<R: Rng + ?Sized>(
        &self,
        inputs: Vec<JsInput>,
        outputs: Vec<JsOutput>,
        rng: &mut R,
    ) -> Result<Vec<JsDescription>, BuildError> {
        let mut outputs: VecDeque<JsOutput> = outputs.into();
        if inputs.is_empty() {
            return self.fund_outputs(outputs, rng);
        }
        let mut spendable: VecDeque<JsInput> = inputs.into();

        let total_in = checked_sum(spendable.iter().map(|i| i.note.value))
            .ok_or(BuildError::ValueOverflow)?;
        let total_out =
            checked_sum(outputs.iter().map(|o| o.value)).ok_or(BuildError::ValueOverflow)?;
        let vpub_old_target = (total_out - total_in).max(Amount::ZERO);
        let vpub_new_target = (total_in - total_out).max(Amount::ZERO);

        // change returns to the owner of the first note
        let change_key = spendable[0].key.clone();
        let change_address = change_key.address();

        let mut descriptions: Vec<JsDescription> = vec![];
        let mut intermediates: HashMap<Hash256, SproutMerkleTree> = HashMap::new();
        let mut previous_commitments: Vec<Hash256> = vec![];
        let mut js_change = Amount::ZERO;
        let mut change_output_index = 0;
        let mut vpub_old_processed = false;
        let mut vpub_new_processed = false;

        while !vpub_new_processed {
            let mut vjsin: Vec<JsInput> = Vec::with_capacity(ZC_NUM_JS_INPUTS);
            let mut vjsout = [JsOutput::dummy(), JsOutput::dummy()];
            let mut vpub_old = Amount::ZERO;
            let mut vpub_new = Amount::ZERO;
            let mut js_anchor: Option<Hash256> = None;
            let mut js_input_value = Amount::ZERO;

            // a. spend the change of the previous link
            if js_change > Amount::ZERO {
                let previous = descriptions
                    .last()
                    .ok_or(BuildError::MissingAnchor(Hash256::ZERO))?;
                let tree = match intermediates.get(&previous.anchor) {
                    Some(tree) => tree.clone(),
                    None => self
                        .tree_view
                        .sprout_tree_at(&previous.anchor)
                        .ok_or(BuildError::MissingAnchor(previous.anchor))?,
                };

                let (change_input, tree) =
                    self.spend_change(previous, change_output_index, tree, &change_key)?;
                previous_commitments.extend(previous.commitments);
                let anchor = tree.root();
                intermediates.insert(anchor, tree);
                js_anchor = Some(anchor);

                js_input_value = js_input_value + change_input.note.value;
                vjsin.push(change_input);
            }

            // b. fill the remaining input slots
            while vjsin.len() < ZC_NUM_JS_INPUTS {
                let Some(mut input) = spendable.pop_front() else {
                    break;
                };
                if js_change > Amount::ZERO {
                    for commitment in &previous_commitments {
                        input.witness.append(*commitment)?;
                    }
                    if Some(input.witness.root()) != js_anchor {
                        return Err(BuildError::WitnessAnchorMismatch);
                    }
                }
                // no anchor yet: this link starts a new chain
                js_anchor.get_or_insert_with(|| input.witness.root());
                js_input_value = js_input_value + input.note.value;
                vjsin.push(input);
            }

            // c. at most one recipient per link
            let mut recipient = outputs.pop_front().unwrap_or_else(JsOutput::dummy);
            let mut out_amount = recipient.value;
            js_change = Amount::ZERO;

            // d. public value enters on the first link and leaves on the last
            if !vpub_old_processed {
                js_input_value = js_input_value + vpub_old_target;
                vpub_old = vpub_old_target;
                vpub_old_processed = true;
            }

            if spendable.is_empty() && outputs.is_empty() {
                out_amount = out_amount + vpub_new_target;
                if js_input_value < out_amount {
                    return Err(self.shortfall(vpub_new_target));
                }
                vpub_new = vpub_new_target;
                vpub_new_processed = true;
                js_change = js_input_value - out_amount;
            } else if js_input_value > out_amount {
                // e. carry the surplus forward
                js_change = js_input_value - out_amount;
            } else {
                // pay what is available now; the rest is due in a later link
                let due = out_amount - js_input_value;
                if due > Amount::ZERO {
                    outputs.push_front(JsOutput::with_memo(
                        recipient.address.clone(),
                        due,
                        recipient.memo.clone(),
                    ));
                    recipient.value = js_input_value;
                }
            }

            // f. slot 0 pays the recipient, slot 1 carries change
            vjsout[0] = recipient;
            if js_change > Amount::ZERO {
                debug!("generating note for change (amount={js_change})");
                vjsout[1] = JsOutput::new(change_address.clone(), js_change);
            }

            // g, h. shuffle, prove and append
            let shuffled = self.create_description(vjsin, vjsout, js_anchor, vpub_old, vpub_new, rng)?;
            if js_change > Amount::ZERO {
                change_output_index = shuffled
                    .output_map
                    .iter()
                    .position(|old| *old == 1)
                    .unwrap_or(1);
            } else {
                // chain ends here; a following link starts from committed state
                intermediates.clear();
                previous_commitments.clear();
            }
            descriptions.push(shuffled.description);
        }

        Ok(descriptions)
    }

    /// The change note in `slot` of `previous`, witnessed under `tree` after
    /// `previous`'s commitments are appended. Returns the extended tree too.
    fn spend_change(
        &self,
        previous: &JsDescription,
        slot: usize,
        mut tree: SproutMerkleTree,
        change_key: &SproutSpendingKey,
    ) -> Result<(JsInput, SproutMerkleTree), BuildError> {
        let ciphertext = previous.ciphertexts.get(slot).ok_or_else(|| {
            BuildError::NoteDecryption(format!("change output index {slot} out of range"))
        })?;

        let mut change_witness: Option<SproutWitness> = None;
        for (n, commitment) in previous.commitments.iter().enumerate() {
            tree.append(*commitment)?;
            if let Some(witness) = change_witness.as_mut() {
                witness.append(*commitment)?;
            } else if n == slot {
                change_witness = Some(tree.witness());
            }
        }
        let change_witness = change_witness.ok_or_else(|| {
            BuildError::NoteDecryption(format!("no commitment for change output {slot}"))
        })?;

        let decryptor = NoteDecryption::new(change_key.receiving_key());
        let h_sig = previous.h_sig(&self.join_split_pub_key);
        let plaintext = SproutNotePlaintext::decrypt(
            &decryptor,
            ciphertext,
            &previous.ephemeral_key,
            &h_sig,
            slot as u8,
        )
        .map_err(|e| BuildError::NoteDecryption(e.to_string()))?;
        debug!(
            "spending change note of previous JoinSplit (amount={})",
            plaintext.value
        );

        let note = plaintext.note(&change_key.address());
        Ok((JsInput::new(change_witness, note, change_key.clone()), tree))
    }

    fn shortfall(&self, vpub_new_target: Amount) -> BuildError {
        BuildError::InsufficientFunds {
            vpub_new_target,
            fee: self.fee,
            taddr_outputs: self.taddr_outputs,
        }
    }

    /// No notes to spend: fund pairs of outputs directly from the transparent
    /// pool, with dummy inputs.
    fn fund_outputs<R: Rng + ?Sized>(
        &self,
        mut outputs: VecDeque<JsOutput>,
        rng: &mut R,
    ) -> Result<Vec<JsDescription>, BuildError> {
        let mut descriptions = vec![];
        while !outputs.is_empty() {
            let mut vjsout = [JsOutput::dummy(), JsOutput::dummy()];
            let mut vpub_old = Amount::ZERO;
            for slot in &mut vjsout {
                if let Some(output) = outputs.pop_front() {
                    vpub_old = vpub_old + output.value;
                    *slot = output;
                }
            }
            let shuffled = self.create_description(vec![], vjsout, None, vpub_old, Amount::ZERO, rng)?;
            descriptions.push(shuffled.description);
        }
        Ok(descriptions)
    }

    fn create_description<R: Rng + ?Sized>(
        &self,
        vjsin: Vec<JsInput>,
        vjsout: [JsOutput; 2],
        anchor: Option<Hash256>,
        vpub_old: Amount,
        vpub_new: Amount,
        rng: &mut R,
    ) -> Result<ShuffledJsDescription, BuildError> {
        let mut vjsin = vjsin.into_iter();
        let first = match vjsin.next() {
            Some(input) => input,
            None => JsInput::dummy()?,
        };
        let second = match vjsin.next() {
            Some(input) => input,
            None => JsInput::dummy()?,
        };
        let anchor = anchor.unwrap_or_else(|| first.witness.root());
        let inputs = [first, second];

        debug!(
            "creating JoinSplit (vpub_old={vpub_old}, vpub_new={vpub_new}, outputs={}+{})",
            vjsout[0].value, vjsout[1].value
        );
        let info = JsDescriptionInfo::new(
            self.join_split_pub_key,
            anchor,
            inputs,
            vjsout,
            vpub_old,
            vpub_new,
        );
        Ok(info.build_randomized(self.prover, rng)?)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::let_assert;
    use test_strategy::proptest;
    use tracing_test::traced_test;

    use super::*;
    use crate::mock::sprout_inputs;
    use crate::mock::MockSproutProver;
    use crate::models::blockchain::sprout::keys::SproutSpendingKey;
    use crate::models::state::wallet::sprout_tree_view::InMemorySproutTrees;

    const PUB_KEY: [u8; 32] = [5u8; 32];

    fn zat(value: i64) -> Amount {
        Amount::from_zat(value)
    }

    /// value of the note in `slot` of `js`, if it was sent to `key`.
    fn received(js: &JsDescription, key: &SproutSpendingKey, slot: usize) -> Option<Amount> {
        let decryptor = NoteDecryption::new(key.receiving_key());
        SproutNotePlaintext::decrypt(
            &decryptor,
            &js.ciphertexts[slot],
            &js.ephemeral_key,
            &js.h_sig(&PUB_KEY),
            slot as u8,
        )
        .ok()
        .map(|plaintext| plaintext.value)
    }

    fn received_any(js: &JsDescription, key: &SproutSpendingKey) -> Vec<Amount> {
        (0..2).filter_map(|slot| received(js, key, slot)).collect()
    }

    #[traced_test]
    #[test]
    fn one_note_two_recipients_chains_through_change() {
        let sender = SproutSpendingKey::random();
        let (trees, inputs) = sprout_inputs(&sender, &[zat(100_000)]).unwrap();
        let first = SproutSpendingKey::random();
        let second = SproutSpendingKey::random();
        let outputs = vec![
            JsOutput::new(first.address(), zat(40_000)),
            JsOutput::new(second.address(), zat(40_000)),
        ];

        let prover = MockSproutProver::new();
        let chainer = JoinSplitChainer::new(&prover, &trees, PUB_KEY);
        let js = chainer.chain(inputs, outputs, &mut rand::rng()).unwrap();

        assert_eq!(2, js.len());
        assert_eq!(Amount::ZERO, js[0].vpub_old);
        assert_eq!(Amount::ZERO, js[0].vpub_new);
        assert_eq!(Amount::ZERO, js[1].vpub_old);
        assert_eq!(zat(20_000), js[1].vpub_new);

        // link 1 pays the first recipient and carries 60000 back to the sender
        assert_eq!(vec![zat(40_000)], received_any(&js[0], &first));
        assert_eq!(vec![zat(60_000)], received_any(&js[0], &sender));

        // link 2 pays the second recipient and leaves no change
        assert_eq!(vec![zat(40_000)], received_any(&js[1], &second));
        assert!(received_any(&js[1], &sender).is_empty());

        // link 2 spends under the tree extended by link 1's commitments
        let mut tree = trees.sprout_tree_at(&js[0].anchor).unwrap();
        for commitment in js[0].commitments {
            tree.append(commitment).unwrap();
        }
        assert_eq!(tree.root(), js[1].anchor);
    }

    #[test]
    fn chained_links_pay_at_most_one_recipient() {
        let sender = SproutSpendingKey::random();
        let (trees, inputs) =
            sprout_inputs(&sender, &[zat(30), zat(30), zat(30), zat(30)]).unwrap();
        let recipients: Vec<SproutSpendingKey> = (0..3).map(|_| SproutSpendingKey::random()).collect();
        let outputs = recipients
            .iter()
            .map(|key| JsOutput::new(key.address(), zat(25)))
            .collect();

        let prover = MockSproutProver::new();
        let chainer = JoinSplitChainer::new(&prover, &trees, PUB_KEY);
        let js = chainer.chain(inputs, outputs, &mut rand::rng()).unwrap();

        for link in &js {
            let paid: usize = recipients
                .iter()
                .map(|key| received_any(link, key).len())
                .sum();
            assert!(paid <= 1);
        }
        let total_new: Amount = js.iter().map(|link| link.vpub_new).sum();
        assert_eq!(zat(120 - 75), total_new);
    }

    #[test]
    fn large_payment_is_split_across_links() {
        let sender = SproutSpendingKey::random();
        let (trees, inputs) = sprout_inputs(&sender, &[zat(50), zat(50), zat(50)]).unwrap();
        let recipient = SproutSpendingKey::random();
        let outputs = vec![JsOutput::new(recipient.address(), zat(140))];

        let prover = MockSproutProver::new();
        let chainer = JoinSplitChainer::new(&prover, &trees, PUB_KEY);
        let js = chainer.chain(inputs, outputs, &mut rand::rng()).unwrap();

        let paid: Amount = js
            .iter()
            .flat_map(|link| received_any(link, &recipient))
            .sum();
        assert_eq!(zat(140), paid);
        assert_eq!(zat(10), js.last().unwrap().vpub_new);
    }

    #[test]
    fn outputs_without_inputs_are_funded_in_pairs() {
        let trees = InMemorySproutTrees::new();
        let outputs = [1, 2, 3]
            .into_iter()
            .map(|value| JsOutput::new(SproutSpendingKey::random().address(), zat(value)))
            .collect();

        let prover = MockSproutProver::new();
        let chainer = JoinSplitChainer::new(&prover, &trees, PUB_KEY);
        let js = chainer.chain(vec![], outputs, &mut rand::rng()).unwrap();

        assert_eq!(2, js.len());
        assert_eq!(zat(3), js[0].vpub_old);
        assert_eq!(zat(3), js[1].vpub_old);
        assert!(js.iter().all(|link| link.vpub_new == Amount::ZERO));
    }

    #[test]
    fn unknown_anchor_stops_the_chain() {
        let sender = SproutSpendingKey::random();
        let (_, inputs) = sprout_inputs(&sender, &[zat(100)]).unwrap();
        let anchor = inputs[0].witness.root();
        let outputs = vec![
            JsOutput::new(SproutSpendingKey::random().address(), zat(10)),
            JsOutput::new(SproutSpendingKey::random().address(), zat(10)),
        ];

        let prover = MockSproutProver::new();
        let empty = InMemorySproutTrees::new();
        let chainer = JoinSplitChainer::new(&prover, &empty, PUB_KEY);
        let_assert!(
            Err(BuildError::MissingAnchor(missing)) =
                chainer.chain(inputs, outputs, &mut rand::rng())
        );
        assert_eq!(anchor, missing);
    }

    #[test]
    fn note_from_another_tree_cannot_join_a_chain() {
        let sender = SproutSpendingKey::random();
        let (trees, mut inputs) = sprout_inputs(&sender, &[zat(50), zat(50)]).unwrap();
        let (_, stranger) = sprout_inputs(&sender, &[zat(50)]).unwrap();
        inputs.extend(stranger);
        let outputs = vec![JsOutput::new(SproutSpendingKey::random().address(), zat(10))];

        let prover = MockSproutProver::new();
        let chainer = JoinSplitChainer::new(&prover, &trees, PUB_KEY);
        let_assert!(
            Err(BuildError::WitnessAnchorMismatch) =
                chainer.chain(inputs, outputs, &mut rand::rng())
        );
    }

    #[test]
    fn prover_failure_is_propagated() {
        let sender = SproutSpendingKey::random();
        let (trees, inputs) = sprout_inputs(&sender, &[zat(50)]).unwrap();
        let prover = MockSproutProver::failing();
        let chainer = JoinSplitChainer::new(&prover, &trees, PUB_KEY);
        let_assert!(
            Err(BuildError::InvalidJoinSplit(_)) = chainer.chain(inputs, vec![], &mut rand::rng())
        );
    }

    /// the first link of a two-recipient chain, and the slot holding the
    /// change note it returns to `sender`.
    fn first_link_with_change(sender: &SproutSpendingKey) -> (InMemorySproutTrees, JsDescription, usize) {
        let (trees, inputs) = sprout_inputs(sender, &[zat(100)]).unwrap();
        let outputs = vec![
            JsOutput::new(SproutSpendingKey::random().address(), zat(30)),
            JsOutput::new(SproutSpendingKey::random().address(), zat(30)),
        ];
        let prover = MockSproutProver::new();
        let js = JoinSplitChainer::new(&prover, &trees, PUB_KEY)
            .chain(inputs, outputs, &mut rand::rng())
            .unwrap();
        let slot = (0..2)
            .find(|slot| received(&js[0], sender, *slot).is_some())
            .unwrap();
        (trees, js[0].clone(), slot)
    }

    #[test]
    fn change_note_is_recovered_from_previous_link() {
        let sender = SproutSpendingKey::random();
        let (trees, link, slot) = first_link_with_change(&sender);
        let prover = MockSproutProver::new();
        let chainer = JoinSplitChainer::new(&prover, &trees, PUB_KEY);
        let tree = trees.sprout_tree_at(&link.anchor).unwrap();

        let (input, extended) = chainer.spend_change(&link, slot, tree, &sender).unwrap();

        assert_eq!(zat(70), input.note.value);
        assert_eq!(link.commitments[slot], input.witness.element().unwrap());
        assert_eq!(extended.root(), input.witness.root());
    }

    #[test]
    fn undecryptable_change_note_stops_the_chain() {
        let sender = SproutSpendingKey::random();
        let (trees, link, slot) = first_link_with_change(&sender);
        let prover = MockSproutProver::new();
        let chainer = JoinSplitChainer::new(&prover, &trees, PUB_KEY);
        let tree = || trees.sprout_tree_at(&link.anchor).unwrap();

        let stranger = SproutSpendingKey::random();
        let_assert!(
            Err(BuildError::NoteDecryption(_)) = chainer.spend_change(&link, slot, tree(), &stranger)
        );

        let mut tampered = link.clone();
        tampered.ephemeral_key[0] ^= 1;
        let_assert!(
            Err(BuildError::NoteDecryption(_)) = chainer.spend_change(&tampered, slot, tree(), &sender)
        );

        let_assert!(
            Err(BuildError::NoteDecryption(reason)) = chainer.spend_change(&link, 2, tree(), &sender)
        );
        assert!(reason.contains("out of range"));
    }

    #[test]
    fn shortfall_quotes_fee_and_transparent_outputs() {
        let trees = InMemorySproutTrees::new();
        let prover = MockSproutProver::new();
        let chainer =
            JoinSplitChainer::new(&prover, &trees, PUB_KEY).reporting(zat(10_000), zat(25_000));

        let_assert!(
            BuildError::InsufficientFunds {
                taddr_outputs,
                ..
            } = chainer.shortfall(zat(5_000))
        );
        assert_eq!(zat(25_000), taddr_outputs);
        assert_eq!(
            "Insufficient funds for vpub_new 0.00005 (fee 0.0001, taddr outputs 0.00025)",
            chainer.shortfall(zat(5_000)).to_string()
        );
    }

    #[proptest(cases = 12)]
    fn chain_conserves_value(
        #[strategy(proptest::collection::vec(1i64..1_000, 1..5))] input_values: Vec<i64>,
        #[strategy(proptest::collection::vec(1i64..1_000, 0..4))] output_values: Vec<i64>,
    ) {
        let sender = SproutSpendingKey::random();
        let values: Vec<Amount> = input_values.iter().copied().map(zat).collect();
        let (trees, inputs) = sprout_inputs(&sender, &values).unwrap();
        let outputs = output_values
            .iter()
            .map(|value| JsOutput::new(SproutSpendingKey::random().address(), zat(*value)))
            .collect();

        let prover = MockSproutProver::new();
        let chainer = JoinSplitChainer::new(&prover, &trees, PUB_KEY);
        let js = chainer.chain(inputs, outputs, &mut rand::rng()).unwrap();

        let vpub_old: Amount = js.iter().map(|link| link.vpub_old).sum();
        let vpub_new: Amount = js.iter().map(|link| link.vpub_new).sum();
        let spent: i64 = input_values.iter().sum();
        let paid: i64 = output_values.iter().sum();
        assert_eq!(zat(spent - paid), vpub_new - vpub_old);

        assert!(js.iter().filter(|link| link.vpub_old > Amount::ZERO).count() <= 1);
        assert!(js.iter().filter(|link| link.vpub_new > Amount::ZERO).count() <= 1);
    }
}
