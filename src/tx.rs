//! Transaction parsing and the per-transaction digests used by signature hashing.

use bitcoin::{
    consensus,
    hashes::{sha256d, Hash, HashEngine},
    Transaction, TxOut,
};

use crate::error::ScriptError;

/// A transaction decoded from its wire form.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    tx: Transaction,
}

impl TransactionContext {
    /// Parses a transaction and rejects encodings with trailing or
    /// non-canonical bytes.
    pub fn parse(tx_bytes: &[u8]) -> Result<Self, ScriptError> {
        let tx: Transaction =
            consensus::deserialize(tx_bytes).map_err(|_| ScriptError::InvalidTransaction)?;

        let canonical = consensus::serialize(&tx);
        if canonical.len() != tx_bytes.len() {
            return Err(ScriptError::InvalidTransaction);
        }

        Ok(Self { tx })
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn into_tx(self) -> Transaction {
        self.tx
    }
}

/// Ensures `input_index` points to an existing transaction input.
pub fn ensure_input_index(tx: &Transaction, input_index: usize) -> Result<(), ScriptError> {
    if input_index >= tx.input.len() {
        Err(ScriptError::InputIndexOutOfRange)
    } else {
        Ok(())
    }
}

/// Digests shared by every fork-id signature hash of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecomputedTransactionData {
    pub hash_prevouts: sha256d::Hash,
    pub hash_sequence: sha256d::Hash,
    pub hash_outputs: sha256d::Hash,
    /// Digest of every spent output, available when they are all known.
    pub hash_utxos: Option<sha256d::Hash>,
}

impl PrecomputedTransactionData {
    pub fn new(tx: &Transaction, spent_outputs: Option<&[TxOut]>) -> Self {
        Self {
            hash_prevouts: hash_serialized(tx.input.iter().map(|input| &input.previous_output)),
            hash_sequence: hash_serialized(tx.input.iter().map(|input| &input.sequence)),
            hash_outputs: hash_serialized(tx.output.iter()),
            hash_utxos: spent_outputs
                .filter(|spent| spent.len() == tx.input.len())
                .map(|spent| hash_serialized(spent.iter())),
        }
    }
}

/// Double SHA-256 of a single serialized output.
pub fn hash_output(output: &TxOut) -> sha256d::Hash {
    sha256d::Hash::hash(&consensus::serialize(output))
}

/// Double SHA-256 of the concatenated serializations of `items`.
fn hash_serialized<'a, I, T>(items: I) -> sha256d::Hash
where
    I: IntoIterator<Item = &'a T>,
    T: consensus::Encodable + 'a,
{
    let mut engine = sha256d::Hash::engine();
    for item in items {
        engine.input(&consensus::serialize(item));
    }
    sha256d::Hash::from_engine(engine)
}
