mod common;

use bch_consensus::{
    create_endorsement, create_schnorr_endorsement, verify, Operation, RuleForks, Script,
    ScriptError, SighashType,
};
use common::*;

fn forkid() -> SighashType {
    SighashType::ALL | SighashType::FORKID
}

fn redeem_2_of_3() -> Script {
    let keys: Vec<String> = (0..3).map(|n| format!("[{}]", hex(&pubkey(&secret_n(n))))).collect();
    script(&format!("2 {} 3 checkmultisig", keys.join(" ")))
}

/// P2SH spend of the 2-of-3 redeem script; `sign` supplies the operations
/// in front of the redeem script push.
fn p2sh_spend(
    sign: impl Fn(&bitcoin::Transaction, &Script) -> Vec<Operation>,
) -> (bitcoin::Transaction, [bitcoin::TxOut; 1]) {
    let redeem = redeem_2_of_3();
    let mut tx = spending_tx(vec![spent(5_000, to_buf(&script("1")))]);
    let mut ops = sign(&tx, &redeem);
    ops.push(Operation::push(redeem.to_data(false)));
    set_unlocking(&mut tx, 0, &Script::new(ops));
    (tx, [spent(10_000, to_buf(&p2sh(&redeem)))])
}

fn ecdsa(tx: &bitcoin::Transaction, redeem: &Script, signer: u8) -> Vec<u8> {
    create_endorsement(&secret_n(signer), redeem, tx, 0, forkid(), RuleForks::ALL, 10_000).unwrap()
}

fn schnorr(tx: &bitcoin::Transaction, redeem: &Script, signer: u8) -> Vec<u8> {
    create_schnorr_endorsement(&secret_n(signer), redeem, tx, 0, forkid(), RuleForks::ALL, 10_000)
        .unwrap()
}

#[test]
fn legacy_multisig_in_key_order() {
    let (tx, outputs) = p2sh_spend(|tx, redeem| {
        vec![
            Operation::push_minimal(Vec::new()),
            Operation::push(ecdsa(tx, redeem, 0)),
            Operation::push(ecdsa(tx, redeem, 2)),
        ]
    });
    assert_eq!(verify(&tx, 0, &outputs, RuleForks::ALL), Ok(()));
}

#[test]
fn legacy_multisig_rejects_reordered_signatures() {
    let (tx, outputs) = p2sh_spend(|tx, redeem| {
        vec![
            Operation::push_minimal(Vec::new()),
            Operation::push(ecdsa(tx, redeem, 2)),
            Operation::push(ecdsa(tx, redeem, 0)),
        ]
    });
    assert_eq!(verify(&tx, 0, &outputs, RuleForks::ALL), Err(ScriptError::SigNullfail));
    assert_eq!(
        verify(&tx, 0, &outputs, RuleForks::through(RuleForks::BCH_UAHF)),
        Err(ScriptError::StackFalse)
    );
}

#[test]
fn dummy_element_rules() {
    let (tx, outputs) = p2sh_spend(|tx, redeem| {
        vec![
            Operation::push(vec![0xaa]),
            Operation::push(ecdsa(tx, redeem, 0)),
            Operation::push(ecdsa(tx, redeem, 1)),
        ]
    });
    // The historical extra pop accepts anything until it must be empty.
    let mut lax = RuleForks::through(RuleForks::BCH_UAHF);
    lax.remove(RuleForks::BIP147);
    assert_eq!(verify(&tx, 0, &outputs, lax), Ok(()));
    assert_eq!(
        verify(&tx, 0, &outputs, RuleForks::through(RuleForks::BCH_PISANO)),
        Err(ScriptError::MultisigSatoshiBug)
    );
    // Once the dummy doubles as a bitfield, 0xaa selects keys that do not exist.
    assert_eq!(verify(&tx, 0, &outputs, RuleForks::ALL), Err(ScriptError::InvalidBitfield));
}

#[test]
fn schnorr_multisig_with_bitfield() {
    let (tx, outputs) = p2sh_spend(|tx, redeem| {
        vec![
            Operation::push_minimal(vec![0b101]),
            Operation::push(schnorr(tx, redeem, 0)),
            Operation::push(schnorr(tx, redeem, 2)),
        ]
    });
    assert_eq!(verify(&tx, 0, &outputs, RuleForks::ALL), Ok(()));
}

#[test]
fn schnorr_multisig_signature_must_match_selected_key() {
    let (tx, outputs) = p2sh_spend(|tx, redeem| {
        vec![
            Operation::push_minimal(vec![0b011]),
            Operation::push(schnorr(tx, redeem, 0)),
            Operation::push(schnorr(tx, redeem, 2)),
        ]
    });
    assert_eq!(verify(&tx, 0, &outputs, RuleForks::ALL), Err(ScriptError::SigNullfail));
}

#[test]
fn bitfield_popcount_must_match_signature_count() {
    let (tx, outputs) = p2sh_spend(|tx, redeem| {
        vec![
            Operation::push_minimal(vec![0b111]),
            Operation::push(schnorr(tx, redeem, 0)),
            Operation::push(schnorr(tx, redeem, 1)),
        ]
    });
    assert_eq!(verify(&tx, 0, &outputs, RuleForks::ALL), Err(ScriptError::InvalidBitfield));
}

#[test]
fn bitfield_mode_forbids_ecdsa() {
    let (tx, outputs) = p2sh_spend(|tx, redeem| {
        vec![
            Operation::push_minimal(vec![0b011]),
            Operation::push(ecdsa(tx, redeem, 0)),
            Operation::push(ecdsa(tx, redeem, 1)),
        ]
    });
    assert_eq!(verify(&tx, 0, &outputs, RuleForks::ALL), Err(ScriptError::SigNonschnorr));
}

#[test]
fn legacy_mode_forbids_schnorr() {
    let (tx, outputs) = p2sh_spend(|tx, redeem| {
        vec![
            Operation::push_minimal(Vec::new()),
            Operation::push(schnorr(tx, redeem, 0)),
            Operation::push(schnorr(tx, redeem, 1)),
        ]
    });
    assert_eq!(verify(&tx, 0, &outputs, RuleForks::ALL), Err(ScriptError::SigBadlength));
}

#[test]
fn key_and_signature_counts() {
    let outputs = |text: &str| [spent(1, to_buf(&script(text)))];
    let tx = spending_tx(Vec::new());
    let key = format!("[{}]", hex(&pubkey(&secret())));

    assert_eq!(
        verify(&tx, 0, &outputs("0 0 21 checkmultisig"), RuleForks::NONE),
        Err(ScriptError::MultisigInvalidKeyCount)
    );
    assert_eq!(
        verify(&tx, 0, &outputs(&format!("0 0 0 2 {key} 1 checkmultisig")), RuleForks::NONE),
        Err(ScriptError::MultisigInvalidSignatureCount)
    );
    assert_eq!(
        verify(&tx, 0, &outputs(&format!("1 {key} 1 checkmultisig")), RuleForks::NONE),
        Err(ScriptError::InvalidStackScope)
    );
    // Zero signatures always succeed.
    assert_eq!(
        verify(&tx, 0, &outputs(&format!("0 0 {key} 1 checkmultisig")), RuleForks::ALL),
        Ok(())
    );
}
