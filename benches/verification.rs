use bch_consensus::{
    create_endorsement, create_schnorr_endorsement, signature, verify, Operation, RuleForks, Script,
    SighashType,
};
use bitcoin::{
    absolute::LockTime,
    hashes::{hash160, Hash},
    hex::DisplayHex,
    transaction::Version,
    Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const VALUE: u64 = 50_000;

struct BenchCase {
    name: &'static str,
    tx: Transaction,
    spent: Vec<TxOut>,
}

pub fn verification_bench(c: &mut Criterion) {
    let cases = vec![p2pkh_case(), p2sh_multisig_case(), covenant_case()];

    let mut group = c.benchmark_group("verify");
    for case in cases {
        group.bench_with_input(BenchmarkId::new("all_forks", case.name), &case, |b, case| {
            b.iter(|| verify(&case.tx, 0, &case.spent, RuleForks::ALL).expect("verification"));
        });
    }
    group.finish();
}

fn secret(n: u8) -> [u8; 32] {
    let mut secret = [0x3c; 32];
    secret[0] = n + 1;
    secret
}

fn pubkey(n: u8) -> Vec<u8> {
    signature::public_key(&secret(n), true).expect("public key")
}

fn hex(bytes: &[u8]) -> String {
    bytes.to_lower_hex_string()
}

fn script(text: &str) -> Script {
    Script::from_string(text).expect("script text")
}

fn to_buf(script: &Script) -> ScriptBuf {
    ScriptBuf::from_bytes(script.to_data(false))
}

fn unsigned_tx(outputs: Vec<TxOut>) -> Transaction {
    Transaction {
        version: Version(2),
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: Txid::from_byte_array([0x17; 32]),
                vout: 1,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: outputs,
    }
}

fn payout() -> TxOut {
    TxOut {
        value: Amount::from_sat(VALUE - 1_000),
        script_pubkey: to_buf(&script("1")),
    }
}

fn forkid() -> SighashType {
    SighashType::ALL | SighashType::FORKID
}

fn p2pkh_case() -> BenchCase {
    let key = pubkey(0);
    let hash = hash160::Hash::hash(&key).to_byte_array();
    let locking = script(&format!("dup hash160 [{}] equalverify checksig", hex(&hash)));

    let mut tx = unsigned_tx(vec![payout()]);
    let sig = create_endorsement(&secret(0), &locking, &tx, 0, forkid(), RuleForks::ALL, VALUE)
        .expect("endorsement");
    tx.input[0].script_sig = to_buf(&Script::new(vec![Operation::push(sig), Operation::push(key)]));

    BenchCase {
        name: "p2pkh",
        tx,
        spent: vec![TxOut {
            value: Amount::from_sat(VALUE),
            script_pubkey: to_buf(&locking),
        }],
    }
}

fn p2sh_multisig_case() -> BenchCase {
    let keys: Vec<String> = (0..3).map(|n| format!("[{}]", hex(&pubkey(n)))).collect();
    let redeem = script(&format!("2 {} 3 checkmultisig", keys.join(" ")));
    let redeem_bytes = redeem.to_data(false);
    let hash = hash160::Hash::hash(&redeem_bytes).to_byte_array();
    let locking = script(&format!("hash160 [{}] equal", hex(&hash)));

    let mut tx = unsigned_tx(vec![payout()]);
    let sign = |n: u8| {
        create_schnorr_endorsement(&secret(n), &redeem, &tx, 0, forkid(), RuleForks::ALL, VALUE)
            .expect("endorsement")
    };
    let unlocking = Script::new(vec![
        Operation::push_minimal(vec![0b110]),
        Operation::push(sign(1)),
        Operation::push(sign(2)),
        Operation::push(redeem_bytes.clone()),
    ]);
    tx.input[0].script_sig = to_buf(&unlocking);

    BenchCase {
        name: "p2sh_multisig",
        tx,
        spent: vec![TxOut {
            value: Amount::from_sat(VALUE),
            script_pubkey: to_buf(&locking),
        }],
    }
}

/// Output 0 must carry the spent value to the same bytecode.
fn covenant_case() -> BenchCase {
    let locking = to_buf(&script(
        "0 outputvalue 0 utxovalue numequalverify 0 outputbytecode 0 utxobytecode equal",
    ));
    let tx = unsigned_tx(vec![TxOut {
        value: Amount::from_sat(VALUE),
        script_pubkey: locking.clone(),
    }]);

    BenchCase {
        name: "covenant",
        tx,
        spent: vec![TxOut {
            value: Amount::from_sat(VALUE),
            script_pubkey: locking,
        }],
    }
}

criterion_group!(benches, verification_bench);
criterion_main!(benches);
