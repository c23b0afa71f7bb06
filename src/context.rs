//! Read-only view of the input being verified.

use bitcoin::{Transaction, TxIn, TxOut};

use crate::{
    error::ScriptError,
    forks::RuleForks,
    sighash::SigningInput,
    token::WrappedScript,
    tx::{ensure_input_index, PrecomputedTransactionData},
};

/// Binds an evaluation to one input of a transaction and the outputs it spends.
#[derive(Debug, Clone)]
pub struct ExecutionContext<'a> {
    tx: &'a Transaction,
    input_index: usize,
    spent_outputs: &'a [TxOut],
    precomputed: PrecomputedTransactionData,
}

impl<'a> ExecutionContext<'a> {
    /// `spent_outputs[i]` must be the output spent by `tx.input[i]`.
    pub fn new(
        tx: &'a Transaction,
        input_index: usize,
        spent_outputs: &'a [TxOut],
    ) -> Result<Self, ScriptError> {
        ensure_input_index(tx, input_index)?;
        if spent_outputs.len() != tx.input.len() {
            return Err(ScriptError::MissingPreviousOutput);
        }
        Ok(Self {
            tx,
            input_index,
            spent_outputs,
            precomputed: PrecomputedTransactionData::new(tx, Some(spent_outputs)),
        })
    }

    pub fn tx(&self) -> &'a Transaction {
        self.tx
    }

    pub fn input_index(&self) -> usize {
        self.input_index
    }

    pub fn input(&self) -> &'a TxIn {
        &self.tx.input[self.input_index]
    }

    /// Output spent by the input under evaluation.
    pub fn spent_output(&self) -> &'a TxOut {
        &self.spent_outputs[self.input_index]
    }

    pub fn spent_outputs(&self) -> &'a [TxOut] {
        self.spent_outputs
    }

    pub fn utxo(&self, index: usize) -> Option<&'a TxOut> {
        self.spent_outputs.get(index)
    }

    pub fn precomputed(&self) -> &PrecomputedTransactionData {
        &self.precomputed
    }

    /// Digest inputs for a signature made by the input under evaluation.
    pub(crate) fn signing_input(&self, forks: RuleForks) -> SigningInput<'_> {
        let spent = self.spent_output();
        SigningInput {
            tx: self.tx,
            input_index: self.input_index,
            value: spent.value.to_sat(),
            token_prefix: WrappedScript::split_for(spent.script_pubkey.as_bytes(), forks)
                .prefix,
            precomputed: &self.precomputed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::{
        absolute::LockTime, hashes::Hash, transaction::Version, Amount, OutPoint, ScriptBuf,
        Sequence, Txid, Witness,
    };

    fn tx(inputs: usize) -> Transaction {
        Transaction {
            version: Version(2),
            lock_time: LockTime::ZERO,
            input: (0..inputs)
                .map(|vout| TxIn {
                    previous_output: OutPoint {
                        txid: Txid::from_byte_array([7u8; 32]),
                        vout: vout as u32,
                    },
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: Vec::new(),
        }
    }

    fn spent(value: u64) -> TxOut {
        TxOut {
            value: Amount::from_sat(value),
            script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
        }
    }

    #[test]
    fn binds_input_and_spent_output() {
        let tx = tx(2);
        let outputs = [spent(10), spent(20)];
        let ctx = ExecutionContext::new(&tx, 1, &outputs).unwrap();
        assert_eq!(ctx.input().previous_output.vout, 1);
        assert_eq!(ctx.spent_output().value.to_sat(), 20);
        assert!(ctx.utxo(2).is_none());
        assert!(ctx.precomputed().hash_utxos.is_some());
        assert_eq!(ctx.signing_input(RuleForks::ALL).value, 20);
    }

    #[test]
    fn rejects_bad_bindings() {
        let tx = tx(2);
        let outputs = [spent(10), spent(20)];
        assert_eq!(
            ExecutionContext::new(&tx, 2, &outputs).unwrap_err(),
            ScriptError::InputIndexOutOfRange
        );
        assert_eq!(
            ExecutionContext::new(&tx, 0, &outputs[..1]).unwrap_err(),
            ScriptError::MissingPreviousOutput
        );
    }

    #[test]
    fn token_prefix_signed_once_descartes_is_active() {
        let tx = tx(1);
        let mut script_pubkey = vec![crate::token::PREFIX_TOKEN];
        script_pubkey.extend_from_slice(&[0x33; 32]);
        script_pubkey.extend_from_slice(&[0x10, 0x07, 0x51]);
        let outputs = [TxOut {
            value: Amount::from_sat(5),
            script_pubkey: ScriptBuf::from_bytes(script_pubkey.clone()),
        }];
        let ctx = ExecutionContext::new(&tx, 0, &outputs).unwrap();

        let before = ctx.signing_input(RuleForks::through(RuleForks::BCH_GAUSS));
        assert!(before.token_prefix.is_empty());
        let after = ctx.signing_input(RuleForks::through(RuleForks::BCH_DESCARTES));
        assert_eq!(after.token_prefix, &script_pubkey[..35]);
    }
}
