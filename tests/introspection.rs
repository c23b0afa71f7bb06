mod common;

use bch_consensus::{token::PREFIX_TOKEN, verify, RuleForks, ScriptError};
use bitcoin::{ScriptBuf, TxOut};
use common::*;

const CATEGORY: [u8; 32] = [0x77; 32];

/// Token prefix carrying a fungible amount below 253.
fn fungible_prefix(amount: u8) -> Vec<u8> {
    let mut prefix = vec![PREFIX_TOKEN];
    prefix.extend_from_slice(&CATEGORY);
    prefix.push(0x10);
    prefix.push(amount);
    prefix
}

/// Minting NFT with a two byte commitment.
fn minting_prefix() -> Vec<u8> {
    let mut prefix = vec![PREFIX_TOKEN];
    prefix.extend_from_slice(&CATEGORY);
    prefix.push(0x20 | 0x40 | 0x02);
    prefix.extend_from_slice(&[0x02, 0xca, 0xfe]);
    prefix
}

fn with_prefix(prefix: &[u8], locking: &str) -> ScriptBuf {
    let mut bytes = prefix.to_vec();
    bytes.extend_from_slice(&script(locking).to_data(false));
    ScriptBuf::from_bytes(bytes)
}

fn run(locking: ScriptBuf, outputs: Vec<TxOut>, forks: RuleForks) -> Result<(), ScriptError> {
    let tx = spending_tx(outputs);
    verify(&tx, 0, &[spent(1_000, locking)], forks)
}

#[test]
fn value_preserving_covenant() {
    let covenant = "0 outputvalue 0 utxovalue numequal";
    let locking = || to_buf(&script(covenant));

    let paid = vec![spent(1_000, ScriptBuf::new())];
    assert_eq!(run(locking(), paid.clone(), RuleForks::ALL), Ok(()));

    let short = vec![spent(999, ScriptBuf::new())];
    assert_eq!(run(locking(), short, RuleForks::ALL), Err(ScriptError::StackFalse));

    // Introspection opcodes are reserved before their upgrade.
    assert_eq!(
        run(locking(), paid, RuleForks::through(RuleForks::BCH_FERMAT)),
        Err(ScriptError::OpReserved)
    );
}

#[test]
fn transaction_fields() {
    let locking = to_buf(&script(
        "txversion 2 numequalverify \
         txinputcount 1 numequalverify \
         txoutputcount 2 numequalverify \
         txlocktime 0 numequalverify \
         inputindex 0 numequal",
    ));
    let outputs = vec![spent(1, ScriptBuf::new()), spent(2, ScriptBuf::new())];
    assert_eq!(run(locking, outputs, RuleForks::ALL), Ok(()));
}

#[test]
fn input_fields() {
    let tx = spending_tx(Vec::new());
    let outpoint = tx.input[0].previous_output;
    let locking = to_buf(&script(&format!(
        "0 outpointtxhash [{}] equalverify 0 outpointindex 0 numequalverify \
         0 inputbytecode 0 equalverify 0 inputsequencenumber [ffffffff00] numequal",
        hex(&bitcoin::hashes::Hash::to_byte_array(outpoint.txid)),
    )));
    assert_eq!(run(locking, Vec::new(), RuleForks::ALL), Ok(()));
}

#[test]
fn active_bytecode_matches_spent_bytecode() {
    let locking = "0 utxobytecode activebytecode equal";
    assert_eq!(run(to_buf(&script(locking)), Vec::new(), RuleForks::ALL), Ok(()));
    // The token prefix is not part of the bytecode.
    assert_eq!(
        run(with_prefix(&fungible_prefix(5), locking), Vec::new(), RuleForks::ALL),
        Ok(())
    );
}

#[test]
fn index_errors_are_specific() {
    let cases = [
        ("1 utxovalue", ScriptError::OpUtxoValue),
        ("1 utxobytecode", ScriptError::OpUtxoBytecode),
        ("1 outpointtxhash", ScriptError::OpOutpointTxHash),
        ("1 outpointindex", ScriptError::OpOutpointIndex),
        ("1 inputbytecode", ScriptError::OpInputBytecode),
        ("1 inputsequencenumber", ScriptError::OpInputSequenceNumber),
        ("0 outputvalue", ScriptError::OpOutputValue),
        ("-1 outputbytecode", ScriptError::OpOutputBytecode),
        ("1 utxotokencategory", ScriptError::OpUtxoTokenCategory),
        ("0 outputtokenamount", ScriptError::OpOutputTokenAmount),
    ];
    for (locking, expected) in cases {
        assert_eq!(
            run(to_buf(&script(locking)), Vec::new(), RuleForks::ALL),
            Err(expected),
            "{locking}"
        );
    }
}

#[test]
fn fungible_token_fields() {
    let locking = format!(
        "0 utxotokenamount 5 numequalverify \
         0 utxotokencategory [{}] equalverify \
         0 utxotokencommitment 0 equalverify \
         0 outputtokenamount 5 numequalverify \
         0 outputtokencategory 0 utxotokencategory equal",
        hex(&CATEGORY),
    );
    let outputs = vec![spent(600, ScriptBuf::from_bytes(fungible_prefix(5)))];
    assert_eq!(
        run(with_prefix(&fungible_prefix(5), &locking), outputs, RuleForks::ALL),
        Ok(())
    );
}

#[test]
fn nft_fields() {
    let mut category_with_capability = CATEGORY.to_vec();
    category_with_capability.push(0x02);
    let locking = format!(
        "0 utxotokencategory [{}] equalverify \
         0 utxotokencommitment [cafe] equalverify \
         0 utxotokenamount 0 numequal",
        hex(&category_with_capability),
    );
    assert_eq!(
        run(with_prefix(&minting_prefix(), &locking), Vec::new(), RuleForks::ALL),
        Ok(())
    );
}

#[test]
fn token_opcodes_need_descartes() {
    let locking = to_buf(&script("0 utxotokenamount 0 numequal"));
    assert_eq!(run(locking.clone(), Vec::new(), RuleForks::ALL), Ok(()));
    assert_eq!(
        run(locking, Vec::new(), RuleForks::through(RuleForks::BCH_GAUSS)),
        Err(ScriptError::OpReserved)
    );
}

#[test]
fn token_prefix_is_plain_bytecode_before_descartes() {
    let locking = || with_prefix(&fungible_prefix(1), "1");
    // The leading 0xef is an unassigned opcode until token prefixes exist.
    assert_eq!(
        run(locking(), Vec::new(), RuleForks::through(RuleForks::BCH_GAUSS)),
        Err(ScriptError::OpReserved)
    );
    assert_eq!(
        run(locking(), Vec::new(), RuleForks::through(RuleForks::BCH_DESCARTES)),
        Ok(())
    );
}

#[test]
fn output_bytecode_keeps_prefix_before_descartes() {
    let output = with_prefix(&fungible_prefix(5), "1");
    let whole = to_buf(&script(&format!("0 outputbytecode [{}] equal", hex(output.as_bytes()))));
    let bare = to_buf(&script("0 outputbytecode [51] equal"));
    let outputs = || vec![spent(600, output.clone())];

    let gauss = RuleForks::through(RuleForks::BCH_GAUSS);
    assert_eq!(run(whole.clone(), outputs(), gauss), Ok(()));
    assert_eq!(run(bare.clone(), outputs(), gauss), Err(ScriptError::StackFalse));

    let descartes = RuleForks::through(RuleForks::BCH_DESCARTES);
    assert_eq!(run(whole, outputs(), descartes), Err(ScriptError::StackFalse));
    assert_eq!(run(bare, outputs(), descartes), Ok(()));
}
