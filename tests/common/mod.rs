#![allow(dead_code)]

use bch_consensus::{signature, Operation, Script};
use bitcoin::{
    absolute::LockTime,
    hashes::{hash160, Hash},
    hex::{DisplayHex, FromHex},
    transaction::Version,
    Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};

pub const SECRET_HEX: &str = "ce8f4b713ffdd2658900845251890f30371856be201cd1f5b3d970f793634333";

pub fn secret() -> [u8; 32] {
    Vec::<u8>::from_hex(SECRET_HEX).unwrap().try_into().unwrap()
}

/// Distinct deterministic secrets for multisig fixtures.
pub fn secret_n(n: u8) -> [u8; 32] {
    let mut secret = [0x5a; 32];
    secret[31] = n + 1;
    secret
}

pub fn pubkey(secret: &[u8; 32]) -> Vec<u8> {
    signature::public_key(secret, true).unwrap()
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.to_lower_hex_string()
}

pub fn script(text: &str) -> Script {
    Script::from_string(text).unwrap()
}

pub fn to_buf(script: &Script) -> ScriptBuf {
    ScriptBuf::from_bytes(script.to_data(false))
}

/// Push-only unlocking script using the shortest push for every element.
pub fn pushes(elements: &[Vec<u8>]) -> Script {
    Script::new(elements.iter().cloned().map(Operation::push_minimal).collect())
}

pub fn p2pkh(pubkey: &[u8]) -> Script {
    let hash = hash160::Hash::hash(pubkey).to_byte_array();
    script(&format!("dup hash160 [{}] equalverify checksig", hex(&hash)))
}

pub fn p2sh(redeem: &Script) -> Script {
    let hash = hash160::Hash::hash(&redeem.to_data(false)).to_byte_array();
    script(&format!("hash160 [{}] equal", hex(&hash)))
}

pub fn spent(value: u64, script_pubkey: ScriptBuf) -> TxOut {
    TxOut {
        value: Amount::from_sat(value),
        script_pubkey,
    }
}

/// One input spending `vout` of a fixed funding transaction, paying `outputs`.
pub fn spending_tx(outputs: Vec<TxOut>) -> Transaction {
    Transaction {
        version: Version(2),
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: Txid::from_byte_array([0x42; 32]),
                vout: 0,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: outputs,
    }
}

pub fn set_unlocking(tx: &mut Transaction, index: usize, unlocking: &Script) {
    tx.input[index].script_sig = to_buf(unlocking);
}
