//! the working set of one JoinSplit proof.

use rand::Rng;

use crate::models::blockchain::amount::Amount;
use crate::models::blockchain::digest::Hash256;
use crate::models::blockchain::sprout::joinsplit::h_sig;
use crate::models::blockchain::sprout::joinsplit::JsDescription;
use crate::models::blockchain::sprout::joinsplit::JsInput;
use crate::models::blockchain::sprout::joinsplit::JsOutput;
use crate::models::blockchain::sprout::note::SproutNotePlaintext;
use crate::models::blockchain::sprout::note_encryption::NoteEncryption;
use crate::models::blockchain::sprout::prf::prf_pk;
use crate::models::blockchain::sprout::prover::JoinSplitStatement;
use crate::models::blockchain::sprout::prover::SproutProver;
use crate::tx_initiation::error::JoinSplitError;

/// Shuffle `items` with Fisher-Yates, applying the same swaps to `map`.
///
/// With `map` starting as the identity, afterwards `map[new] == old`: the
/// item now in slot `new` came from slot `old`.
pub fn mapped_shuffle<T, R: Rng + ?Sized>(items: &mut [T], map: &mut [usize], rng: &mut R) {
    debug_assert_eq!(items.len(), map.len());
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
        map.swap(i, j);
    }
}

/// A JoinSplit with its slots shuffled, and where each slot came from.
#[derive(Debug, Clone)]
pub struct ShuffledJsDescription {
    pub description: JsDescription,

    /// `input_map[new] == old`
    pub input_map: [usize; 2],

    /// `output_map[new] == old`
    pub output_map: [usize; 2],
}

/// Two inputs, two outputs and the public values of one JoinSplit, before
/// proving.
#[derive(Debug, Clone)]
pub struct JsDescriptionInfo {
    pub join_split_pub_key: [u8; 32],
    pub anchor: Hash256,
    pub inputs: [JsInput; 2],
    pub outputs: [JsOutput; 2],
    pub vpub_old: Amount,
    pub vpub_new: Amount,
}

impl JsDescriptionInfo {
    pub fn new(
        join_split_pub_key: [u8; 32],
        anchor: Hash256,
        inputs: [JsInput; 2],
        outputs: [JsOutput; 2],
        vpub_old: Amount,
        vpub_new: Amount,
    ) -> Self {
        Self {
            join_split_pub_key,
            anchor,
            inputs,
            outputs,
            vpub_old,
            vpub_new,
        }
    }

    /// Shuffle input and output slots, then build the description.
    ///
    /// The returned maps tell where each slot's content came from, so the
    /// caller can locate a particular output (such as change) afterwards.
    pub fn build_randomized<R: Rng + ?Sized>(
        mut self,
        prover: &dyn SproutProver,
        rng: &mut R,
    ) -> Result<ShuffledJsDescription, JoinSplitError> {
        let mut input_map = [0, 1];
        let mut output_map = [0, 1];
        mapped_shuffle(&mut self.inputs, &mut input_map, rng);
        mapped_shuffle(&mut self.outputs, &mut output_map, rng);

        let description = self.build(prover, rng)?;
        Ok(ShuffledJsDescription {
            description,
            input_map,
            output_map,
        })
    }

    /// Build the description with slots in their current order.
    pub fn build<R: Rng + ?Sized>(
        &self,
        prover: &dyn SproutProver,
        rng: &mut R,
    ) -> Result<JsDescription, JoinSplitError> {
        // 1. value balance and input validity
        self.check_balance()?;
        for (i, input) in self.inputs.iter().enumerate() {
            if input.key.paying_key() != input.note.a_pk {
                return Err(JoinSplitError::InputNotOwned(i));
            }
            // zero-valued inputs need not exist under the anchor
            if input.note.value != Amount::ZERO && input.witness.root() != self.anchor {
                return Err(JoinSplitError::AnchorMismatch);
            }
        }

        // 2. nullifiers and h_sig
        let random_seed = Hash256::random(rng);
        let nullifiers = [self.inputs[0].nullifier(), self.inputs[1].nullifier()];
        let h_sig = h_sig(&random_seed, &nullifiers, &self.join_split_pub_key);

        // 3. output notes, derived from a fresh 252-bit phi
        let mut phi: [u8; 32] = rng.random();
        phi[0] &= 0x0f;
        let output_notes = [
            self.outputs[0].note(&phi, 0, &h_sig, rng),
            self.outputs[1].note(&phi, 1, &h_sig, rng),
        ];
        let commitments = [output_notes[0].commitment(), output_notes[1].commitment()];

        // 4. encrypt outputs to their recipients, in slot order
        let mut encryptor = NoteEncryption::new(h_sig, rng);
        let mut ciphertexts = Vec::with_capacity(2);
        for (note, output) in output_notes.iter().zip(&self.outputs) {
            let plaintext = SproutNotePlaintext::new(note, output.memo.clone());
            let ciphertext = plaintext
                .encrypt(&mut encryptor, &output.address.pk_enc)
                .map_err(|e| JoinSplitError::Encryption(e.to_string()))?;
            ciphertexts.push(ciphertext);
        }
        let ciphertexts: [_; 2] = ciphertexts
            .try_into()
            .map_err(|_| JoinSplitError::Encryption("expected two ciphertexts".to_string()))?;

        // 5. bind each input's spending key to h_sig
        let macs = [
            prf_pk(self.inputs[0].key.as_bytes(), 0, &h_sig),
            prf_pk(self.inputs[1].key.as_bytes(), 1, &h_sig),
        ];

        // 6. prove
        let proof = prover.prove(&JoinSplitStatement {
            anchor: &self.anchor,
            h_sig: &h_sig,
            phi: &phi,
            nullifiers: &nullifiers,
            commitments: &commitments,
            macs: &macs,
            vpub_old: self.vpub_old,
            vpub_new: self.vpub_new,
            inputs: &self.inputs,
            output_notes: &output_notes,
        })?;

        Ok(JsDescription {
            vpub_old: self.vpub_old,
            vpub_new: self.vpub_new,
            anchor: self.anchor,
            nullifiers,
            commitments,
            ephemeral_key: encryptor.epk(),
            random_seed,
            macs,
            proof,
            ciphertexts,
        })
    }

    /// `vpub_old + sum(inputs) == vpub_new + sum(outputs)`, with every value
    /// in the money range.
    fn check_balance(&self) -> Result<(), JoinSplitError> {
        let values_in = [self.vpub_old, self.inputs[0].note.value, self.inputs[1].note.value];
        let values_out = [self.vpub_new, self.outputs[0].value, self.outputs[1].value];
        if values_in
            .iter()
            .chain(&values_out)
            .any(|v| v.is_negative() || !v.in_money_range())
        {
            return Err(JoinSplitError::InvalidBalance);
        }

        let lhs: Amount = values_in.into_iter().sum();
        let rhs: Amount = values_out.into_iter().sum();
        if lhs != rhs || !lhs.in_money_range() {
            return Err(JoinSplitError::InvalidBalance);
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::let_assert;
    use test_strategy::proptest;

    use super::*;
    use crate::mock::sprout_inputs;
    use crate::mock::MockSproutProver;
    use crate::models::blockchain::sprout::keys::SproutSpendingKey;
    use crate::models::blockchain::sprout::note_encryption::NoteDecryption;

    fn info_spending(values: &[Amount], outputs: [JsOutput; 2], vpub_new: Amount) -> (SproutSpendingKey, JsDescriptionInfo) {
        let key = SproutSpendingKey::random();
        let (_, inputs) = sprout_inputs(&key, values).unwrap();
        let anchor = inputs[0].witness.root();
        let mut inputs = inputs.into_iter();
        let first = inputs.next().unwrap();
        let second = inputs.next().unwrap_or_else(|| JsInput::dummy().unwrap());
        let info = JsDescriptionInfo::new(
            [9u8; 32],
            anchor,
            [first, second],
            outputs,
            Amount::ZERO,
            vpub_new,
        );
        (key, info)
    }

    #[test]
    fn balanced_joinsplit_builds_and_decrypts() {
        let recipient = SproutSpendingKey::random();
        let outputs = [
            JsOutput::new(recipient.address(), Amount::from_zat(70)),
            JsOutput::dummy(),
        ];
        let (_, info) = info_spending(&[Amount::from_zat(50), Amount::from_zat(30)], outputs, Amount::from_zat(10));

        let js = info.build(&MockSproutProver::new(), &mut rand::rng()).unwrap();
        assert_eq!(Amount::from_zat(10), js.vpub_new);
        assert_ne!(js.nullifiers[0], js.nullifiers[1]);

        let decryptor = NoteDecryption::new(recipient.receiving_key());
        let plaintext = SproutNotePlaintext::decrypt(
            &decryptor,
            &js.ciphertexts[0],
            &js.ephemeral_key,
            &js.h_sig(&[9u8; 32]),
            0,
        )
        .unwrap();
        let note = plaintext.note(&recipient.address());
        assert_eq!(Amount::from_zat(70), note.value);
        assert_eq!(js.commitments[0], note.commitment());
    }

    #[test]
    fn unbalanced_joinsplit_is_rejected() {
        let outputs = [
            JsOutput::new(SproutSpendingKey::random().address(), Amount::from_zat(81)),
            JsOutput::dummy(),
        ];
        let (_, info) = info_spending(&[Amount::from_zat(80)], outputs, Amount::ZERO);
        let_assert!(
            Err(JoinSplitError::InvalidBalance) =
                info.build(&MockSproutProver::new(), &mut rand::rng())
        );
    }

    #[test]
    fn input_outside_anchor_is_rejected() {
        let outputs = [JsOutput::dummy(), JsOutput::dummy()];
        let (_, mut info) = info_spending(&[Amount::from_zat(5)], outputs, Amount::from_zat(5));
        info.anchor = Hash256([1u8; 32]);
        let_assert!(
            Err(JoinSplitError::AnchorMismatch) =
                info.build(&MockSproutProver::new(), &mut rand::rng())
        );
    }

    #[test]
    fn input_with_foreign_key_is_rejected() {
        let outputs = [JsOutput::dummy(), JsOutput::dummy()];
        let (_, mut info) = info_spending(&[Amount::from_zat(5)], outputs, Amount::from_zat(5));
        info.inputs[0].key = SproutSpendingKey::random();
        let_assert!(
            Err(JoinSplitError::InputNotOwned(0)) =
                info.build(&MockSproutProver::new(), &mut rand::rng())
        );
    }

    #[test]
    fn prover_failure_is_reported() {
        let outputs = [JsOutput::dummy(), JsOutput::dummy()];
        let (_, info) = info_spending(&[Amount::from_zat(5)], outputs, Amount::from_zat(5));
        let_assert!(
            Err(JoinSplitError::Proof(_)) = info.build(&MockSproutProver::failing(), &mut rand::rng())
        );
    }

    #[test]
    fn randomized_build_reports_slot_origin() {
        let recipient = SproutSpendingKey::random();
        let outputs = [
            JsOutput::new(recipient.address(), Amount::from_zat(5)),
            JsOutput::dummy(),
        ];
        let (_, info) = info_spending(&[Amount::from_zat(5)], outputs, Amount::ZERO);
        let shuffled = info
            .build_randomized(&MockSproutProver::new(), &mut rand::rng())
            .unwrap();

        let slot = shuffled.output_map.iter().position(|old| *old == 0).unwrap();
        let decryptor = NoteDecryption::new(recipient.receiving_key());
        let js = &shuffled.description;
        let plaintext = SproutNotePlaintext::decrypt(
            &decryptor,
            &js.ciphertexts[slot],
            &js.ephemeral_key,
            &js.h_sig(&[9u8; 32]),
            slot as u8,
        )
        .unwrap();
        assert_eq!(Amount::from_zat(5), plaintext.value);
    }

    #[proptest(cases = 64)]
    fn mapped_shuffle_records_origin(#[strategy(1usize..12)] len: usize) {
        let original: Vec<usize> = (100..100 + len).collect();
        let mut items = original.clone();
        let mut map: Vec<usize> = (0..len).collect();
        mapped_shuffle(&mut items, &mut map, &mut rand::rng());

        for (new, old) in map.iter().enumerate() {
            assert_eq!(original[*old], items[new]);
        }
        let mut sorted = map.clone();
        sorted.sort_unstable();
        assert_eq!((0..len).collect::<Vec<_>>(), sorted);
    }
}
