//! Pure-Rust Bitcoin Cash script execution engine.
//!
//! [`verify`] checks one input of a transaction against the output it spends
//! under a set of active [`RuleForks`]. The pieces it is built from (scripts,
//! the interpreter, signature hashing) are public so tooling and tests can
//! drive them directly.

pub mod config;
pub mod context;
pub mod error;
pub mod forks;
pub mod interpreter;
pub mod number;
pub mod opcode;
pub mod operation;
pub mod script;
pub mod sighash;
pub mod signature;
pub mod token;
pub mod tx;

use bitcoin::{Transaction, TxOut};
use tracing::debug;

pub use crate::{
    config::{ActivationSchedule, ScriptLimits, VmBudget},
    context::ExecutionContext,
    error::{error_code, ParseError, ScriptError, SUCCESS_CODE},
    forks::RuleForks,
    interpreter::{Interpreter, ScriptMetrics, ScriptStack},
    number::ScriptNumber,
    opcode::Opcode,
    operation::Operation,
    script::{Script, ScriptPattern},
    sighash::{create_endorsement, create_schnorr_endorsement, generate_signature_hash, SighashType},
    signature::verify_signature,
    token::{TokenData, WrappedScript},
    tx::TransactionContext,
};

use crate::script::{is_p2sh32_bytes, is_p2sh_bytes, is_witness_program_bytes};

/// Verifies input `input_index` of `tx`.
///
/// `spent_outputs[i]` must be the output spent by `tx.input[i]`; every input's
/// output is needed by the introspection opcodes and by SIGHASH_UTXOS.
pub fn verify(
    tx: &Transaction,
    input_index: u32,
    spent_outputs: &[TxOut],
    forks: RuleForks,
) -> Result<(), ScriptError> {
    let result = ExecutionContext::new(tx, input_index as usize, spent_outputs)
        .and_then(|ctx| verify_input(&ctx, forks));
    if let Err(error) = &result {
        debug!(input_index, %forks, %error, "input verification failed");
    }
    result
}

/// Like [`verify`], for a transaction in wire format.
pub fn verify_serialized(
    spending_transaction: &[u8],
    input_index: u32,
    spent_outputs: &[TxOut],
    forks: RuleForks,
) -> Result<(), ScriptError> {
    let tx_ctx = TransactionContext::parse(spending_transaction).map_err(|error| {
        debug!(input_index, %forks, %error, "transaction rejected");
        error
    })?;
    verify(tx_ctx.tx(), input_index, spent_outputs, forks)
}

/// Verifies the input an execution context is bound to.
///
/// The unlocking script, the locking script and, for pay-to-script-hash
/// outputs, the redeem script run in turn over one shared stack.
pub fn verify_input(ctx: &ExecutionContext<'_>, forks: RuleForks) -> Result<(), ScriptError> {
    let unlocking_bytes = ctx.input().script_sig.as_bytes();
    let unlocking = Script::from_bytes(unlocking_bytes);
    let locking_bytes =
        WrappedScript::split_for(ctx.spent_output().script_pubkey.as_bytes(), forks).bytecode;
    let locking = Script::from_bytes(locking_bytes);

    if forks.contains(RuleForks::BCH_EUCLID) && !unlocking.is_push_only() {
        return Err(ScriptError::SigPushonly);
    }

    let mut interpreter = Interpreter::new(forks, Some(ctx));
    if forks.contains(RuleForks::BCH_GALOIS) {
        interpreter = interpreter.with_budget(VmBudget::for_unlocking_size(unlocking_bytes.len()));
    }

    run_segment(&mut interpreter, &unlocking, "unlocking")?;
    let unlocked = interpreter.stack().clone();
    run_segment(&mut interpreter, &locking, "locking")?;
    if !interpreter.is_true() {
        return Err(ScriptError::StackFalse);
    }

    let pay_to_script_hash = (forks.contains(RuleForks::BIP16) && is_p2sh_bytes(locking_bytes))
        || (forks.contains(RuleForks::BCH_DESCARTES) && is_p2sh32_bytes(locking_bytes));
    if pay_to_script_hash {
        if !unlocking.is_push_only() {
            return Err(ScriptError::SigPushonly);
        }

        let mut stack = unlocked;
        let redeem_bytes = stack.pop()?;
        let redeem = Script::from_bytes(&redeem_bytes);
        if !redeem.is_valid() {
            return Err(ScriptError::InvalidScriptEmbed);
        }

        // Coins sent to P2SH-wrapped segwit programs stay spendable by
        // revealing the program alone.
        if forks.contains(RuleForks::BCH_PISANO)
            && forks.contains(RuleForks::BCH_EUCLID)
            && stack.is_empty()
            && is_witness_program_bytes(&redeem_bytes)
        {
            return Ok(());
        }

        interpreter.set_stack(stack);
        run_segment(&mut interpreter, &redeem, "redeem")?;
        if !interpreter.is_true() {
            return Err(ScriptError::StackFalse);
        }
    }

    if forks.contains(RuleForks::BCH_EUCLID) && interpreter.stack().len() != 1 {
        return Err(ScriptError::Cleanstack);
    }

    if forks.contains(RuleForks::BCH_FERMAT) {
        let allowed = (unlocking_bytes.len() as u64 + 60) / 43;
        if interpreter.metrics().sigchecks > allowed {
            return Err(ScriptError::InputSigchecks);
        }
    }
    Ok(())
}

fn run_segment(
    interpreter: &mut Interpreter<'_>,
    script: &Script,
    segment: &'static str,
) -> Result<(), ScriptError> {
    interpreter.evaluate(script).map_err(|error| {
        debug!(segment, %error, "script segment failed");
        error
    })
}
