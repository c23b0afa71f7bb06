//! The script stack machine.

use bitcoin::hashes::{hash160, ripemd160, sha1, sha256, sha256d, Hash};
use tracing::trace;

use crate::{
    config::{ScriptLimits, VmBudget},
    context::ExecutionContext,
    error::ScriptError,
    forks::RuleForks,
    number::{self, ScriptNumber, LOCKTIME_NUMBER_SIZE},
    opcode::Opcode,
    operation::Operation,
    script::Script,
    sighash::{self, check_sighash_encoding, SighashType},
    signature::{self, SCHNORR_SIGNATURE_SIZE},
    token::WrappedScript,
};

const LOCKTIME_THRESHOLD: i64 = 500_000_000;
const SEQUENCE_FINAL: u32 = 0xffff_ffff;
const SEQUENCE_LOCKTIME_DISABLE_FLAG: i64 = 1 << 31;
const SEQUENCE_LOCKTIME_TYPE_FLAG: i64 = 1 << 22;
const SEQUENCE_LOCKTIME_MASK: i64 = 0x0000_ffff;

/// Value stack shared between the segments of one verification.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScriptStack {
    items: Vec<Vec<u8>>,
}

impl ScriptStack {
    /// An empty stack.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn from_items(items: Vec<Vec<u8>>) -> Self {
        Self { items }
    }

    /// Bottom first.
    pub fn items(&self) -> &[Vec<u8>] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Vec<u8>> {
        self.items
    }

    /// Pushes without size checks; the interpreter enforces its limits itself.
    pub fn push(&mut self, data: Vec<u8>) {
        self.items.push(data);
    }

    /// Removes the top element, failing on an empty stack.
    pub fn pop(&mut self) -> Result<Vec<u8>, ScriptError> {
        self.items.pop().ok_or(ScriptError::InvalidStackScope)
    }

    pub fn last(&self) -> Option<&Vec<u8>> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element `depth` places below the top.
    fn top(&self, depth: usize) -> Result<&Vec<u8>, ScriptError> {
        self.items
            .len()
            .checked_sub(depth + 1)
            .and_then(|index| self.items.get(index))
            .ok_or(ScriptError::InvalidStackScope)
    }

    fn require(&self, count: usize) -> Result<(), ScriptError> {
        if self.items.len() < count {
            Err(ScriptError::InvalidStackScope)
        } else {
            Ok(())
        }
    }
}

/// Resource usage accumulated across every segment run by one interpreter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptMetrics {
    pub sigchecks: u64,
    pub op_cost: u64,
    pub hash_iterations: u64,
}

/// Evaluates scripts under a fixed rule set, optionally bound to a
/// transaction input.
pub struct Interpreter<'a> {
    forks: RuleForks,
    limits: ScriptLimits,
    context: Option<&'a ExecutionContext<'a>>,
    budget: Option<VmBudget>,
    stack: ScriptStack,
    altstack: Vec<Vec<u8>>,
    exec_stack: Vec<bool>,
    op_count: usize,
    metrics: ScriptMetrics,
}

impl<'a> Interpreter<'a> {
    /// Interpreter with the limits of `forks`. Without a context, opcodes
    /// that read the transaction fail.
    pub fn new(forks: RuleForks, context: Option<&'a ExecutionContext<'a>>) -> Self {
        Self {
            forks,
            limits: ScriptLimits::for_forks(forks),
            context,
            budget: None,
            stack: ScriptStack::new(),
            altstack: Vec::new(),
            exec_stack: Vec::new(),
            op_count: 0,
            metrics: ScriptMetrics::default(),
        }
    }

    /// Enforces operation cost and hash iteration budgets.
    pub fn with_budget(mut self, budget: VmBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Rules in force for this evaluation.
    pub fn forks(&self) -> RuleForks {
        self.forks
    }

    /// Ceilings selected by the active rules.
    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }

    /// Costs tallied so far, whether or not a budget is enforced.
    pub fn metrics(&self) -> ScriptMetrics {
        self.metrics
    }

    pub fn stack(&self) -> &ScriptStack {
        &self.stack
    }

    pub fn set_stack(&mut self, stack: ScriptStack) {
        self.stack = stack;
    }

    pub fn take_stack(&mut self) -> ScriptStack {
        std::mem::take(&mut self.stack)
    }

    /// Whether the top of the stack is true.
    pub fn is_true(&self) -> bool {
        self.stack.last().is_some_and(|top| cast_to_bool(top))
    }

    /// Runs `script` against the current stack.
    ///
    /// The alternate and conditional stacks start empty for every script.
    pub fn evaluate(&mut self, script: &Script) -> Result<(), ScriptError> {
        if script.serialized_size(false) > self.limits.max_script_size {
            return Err(ScriptError::InvalidScriptSize);
        }

        self.exec_stack.clear();
        self.altstack.clear();
        self.op_count = 0;
        let mut code_separator = 0usize;

        for (index, op) in script.operations().iter().enumerate() {
            let code = op.code();
            let executing = self.is_executing();

            if op.data().len() > self.limits.max_element_size {
                return Err(ScriptError::OpPushSize);
            }
            if code.is_counted() {
                self.add_ops(1)?;
            }
            if self.is_disabled(code) {
                return Err(ScriptError::OpDisabled);
            }
            if matches!(code, Opcode::VerIf | Opcode::VerNotIf) {
                return Err(ScriptError::OpReserved);
            }
            self.charge(VmBudget::BASE_OP_COST)?;

            if code.push_length().is_some() {
                if executing {
                    if self.require_minimal() && !op.is_minimal_push() {
                        return Err(ScriptError::Minimaldata);
                    }
                    self.push_element(op.data().to_vec())?;
                }
            } else if code.is_conditional() {
                self.handle_control_flow(code, executing)?;
            } else if executing {
                trace!(opcode = %code, depth = self.stack.len(), "execute");
                if code == Opcode::CodeSeparator {
                    code_separator = index + 1;
                } else {
                    self.execute_opcode(code, script, code_separator)?;
                }
            }

            if self.stack.len() + self.altstack.len() > self.limits.max_stack_size {
                return Err(ScriptError::InvalidStackSize);
            }
        }

        if !script.is_valid() {
            return Err(ScriptError::InvalidScript);
        }
        if !self.exec_stack.is_empty() {
            return Err(ScriptError::UnbalancedConditional);
        }
        Ok(())
    }

    fn active(&self, fork: RuleForks) -> bool {
        self.forks.contains(fork)
    }

    fn require_minimal(&self) -> bool {
        self.active(RuleForks::BCH_MERSENNE)
    }

    fn is_executing(&self) -> bool {
        self.exec_stack.iter().all(|&branch| branch)
    }

    /// Opcodes that fail wherever they appear, executed or not.
    fn is_disabled(&self, code: Opcode) -> bool {
        use Opcode::*;

        match code {
            Invert | Mul2 | Div2 | LShift | RShift => true,
            Mul => !self.active(RuleForks::BCH_GAUSS),
            Cat | Split | Num2Bin | Bin2Num | And | Or | Xor | Div | Mod => {
                !self.active(RuleForks::BCH_PYTHAGORAS)
            }
            _ => false,
        }
    }

    fn add_ops(&mut self, count: usize) -> Result<(), ScriptError> {
        if let Some(max) = self.limits.max_operations {
            self.op_count += count;
            if self.op_count > max {
                return Err(ScriptError::InvalidOperationCount);
            }
        }
        Ok(())
    }

    fn charge(&mut self, cost: u64) -> Result<(), ScriptError> {
        self.metrics.op_cost = self.metrics.op_cost.saturating_add(cost);
        match self.budget {
            Some(budget) if self.metrics.op_cost > budget.op_cost => Err(ScriptError::OpCost),
            _ => Ok(()),
        }
    }

    fn charge_hash(&mut self, message_len: usize, two_rounds: bool) -> Result<(), ScriptError> {
        let iterations = VmBudget::hash_iterations(message_len, two_rounds);
        self.metrics.hash_iterations = self.metrics.hash_iterations.saturating_add(iterations);
        if let Some(budget) = self.budget {
            if self.metrics.hash_iterations > budget.hash_iterations {
                return Err(ScriptError::TooManyHashIters);
            }
        }
        self.charge(iterations * VmBudget::HASH_ITERATION_COST)
    }

    fn count_sigchecks(&mut self, count: u64) -> Result<(), ScriptError> {
        self.metrics.sigchecks += count;
        self.charge(count * VmBudget::SIGCHECK_COST)
    }

    fn push_element(&mut self, data: Vec<u8>) -> Result<(), ScriptError> {
        self.charge(data.len() as u64)?;
        self.stack.push(data);
        Ok(())
    }

    fn push_bool(&mut self, value: bool) -> Result<(), ScriptError> {
        self.push_element(if value { vec![1] } else { Vec::new() })
    }

    fn push_number(&mut self, value: ScriptNumber) -> Result<(), ScriptError> {
        self.push_element(value.encode())
    }

    fn push_int(&mut self, value: i64) -> Result<(), ScriptError> {
        self.push_number(ScriptNumber::new(value)?)
    }

    fn push_unsigned(&mut self, value: u64) -> Result<(), ScriptError> {
        let value = i64::try_from(value).map_err(|_| ScriptError::OutOfRange)?;
        self.push_int(value)
    }

    fn decode_number(&self, bytes: &[u8]) -> Result<ScriptNumber, ScriptError> {
        ScriptNumber::decode(bytes, self.limits.max_number_size, self.require_minimal())
    }

    fn pop_number(&mut self) -> Result<ScriptNumber, ScriptError> {
        let bytes = self.stack.pop()?;
        self.decode_number(&bytes)
    }

    /// Pops an index; negative values come back as `None`.
    fn pop_index(&mut self) -> Result<Option<usize>, ScriptError> {
        let value = self.pop_number()?.value();
        Ok(usize::try_from(value).ok())
    }

    fn handle_control_flow(&mut self, code: Opcode, executing: bool) -> Result<(), ScriptError> {
        match code {
            Opcode::If | Opcode::NotIf => {
                let mut value = false;
                if executing {
                    let condition = self
                        .stack
                        .pop()
                        .map_err(|_| ScriptError::UnbalancedConditional)?;
                    value = cast_to_bool(&condition);
                    if code == Opcode::NotIf {
                        value = !value;
                    }
                }
                if let Some(max) = self.limits.max_conditional_depth {
                    if self.exec_stack.len() >= max {
                        return Err(ScriptError::ConditionalStackDepth);
                    }
                }
                self.exec_stack.push(value);
            }
            Opcode::Else => {
                let Some(top) = self.exec_stack.last_mut() else {
                    return Err(ScriptError::UnbalancedConditional);
                };
                *top = !*top;
            }
            Opcode::EndIf => {
                if self.exec_stack.pop().is_none() {
                    return Err(ScriptError::UnbalancedConditional);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn execute_opcode(
        &mut self,
        code: Opcode,
        script: &Script,
        code_separator: usize,
    ) -> Result<(), ScriptError> {
        use Opcode::*;

        if let Some(value) = code.small_number() {
            return self.push_int(value);
        }

        match code {
            Nop | Nop1 | Nop4 | Nop5 | Nop6 | Nop7 | Nop8 | Nop9 | Nop10 => {}
            Verify => self.op_verify(ScriptError::OpVerifyFailed)?,
            Return => return Err(ScriptError::OpReturn),

            ToAltStack => {
                let value = self.stack.pop()?;
                self.altstack.push(value);
            }
            FromAltStack => {
                let value = self.altstack.pop().ok_or(ScriptError::InvalidStackScope)?;
                self.push_element(value)?;
            }
            TwoDrop => {
                self.stack.require(2)?;
                self.stack.pop()?;
                self.stack.pop()?;
            }
            TwoDup => {
                let first = self.stack.top(1)?.clone();
                let second = self.stack.top(0)?.clone();
                self.push_element(first)?;
                self.push_element(second)?;
            }
            ThreeDup => {
                let first = self.stack.top(2)?.clone();
                let second = self.stack.top(1)?.clone();
                let third = self.stack.top(0)?.clone();
                self.push_element(first)?;
                self.push_element(second)?;
                self.push_element(third)?;
            }
            TwoOver => {
                let first = self.stack.top(3)?.clone();
                let second = self.stack.top(2)?.clone();
                self.push_element(first)?;
                self.push_element(second)?;
            }
            TwoRot => {
                self.stack.require(6)?;
                let len = self.stack.len();
                let moved: Vec<Vec<u8>> = self.stack.items.drain(len - 6..len - 4).collect();
                self.stack.items.extend(moved);
            }
            TwoSwap => {
                self.stack.require(4)?;
                let len = self.stack.len();
                self.stack.items.swap(len - 4, len - 2);
                self.stack.items.swap(len - 3, len - 1);
            }
            IfDup => {
                let value = self.stack.top(0)?.clone();
                if cast_to_bool(&value) {
                    self.push_element(value)?;
                }
            }
            Depth => {
                let depth = self.stack.len() as i64;
                self.push_int(depth)?;
            }
            Drop => {
                self.stack.pop()?;
            }
            Dup => {
                let value = self.stack.top(0)?.clone();
                self.push_element(value)?;
            }
            Nip => {
                self.stack.require(2)?;
                let index = self.stack.len() - 2;
                self.stack.items.remove(index);
            }
            Over => {
                let value = self.stack.top(1)?.clone();
                self.push_element(value)?;
            }
            Pick | Roll => {
                let depth = self.pop_index()?;
                let index = depth
                    .filter(|depth| *depth < self.stack.len())
                    .map(|depth| self.stack.len() - 1 - depth)
                    .ok_or(if code == Pick {
                        ScriptError::OpPick
                    } else {
                        ScriptError::OpRoll
                    })?;
                let value = if code == Pick {
                    self.stack.items[index].clone()
                } else {
                    self.stack.items.remove(index)
                };
                self.push_element(value)?;
            }
            Rot => {
                self.stack.require(3)?;
                let len = self.stack.len();
                self.stack.items.swap(len - 3, len - 2);
                self.stack.items.swap(len - 2, len - 1);
            }
            Swap => {
                self.stack.require(2)?;
                let len = self.stack.len();
                self.stack.items.swap(len - 2, len - 1);
            }
            Tuck => {
                self.stack.require(2)?;
                let len = self.stack.len();
                let value = self.stack.items[len - 1].clone();
                self.stack.items.insert(len - 2, value);
            }

            Cat => {
                self.stack.require(2)?;
                let tail = self.stack.pop()?;
                let mut head = self.stack.pop()?;
                if head.len() + tail.len() > self.limits.max_element_size {
                    return Err(ScriptError::InvalidPushDataSize);
                }
                head.extend_from_slice(&tail);
                self.push_element(head)?;
            }
            Split => {
                self.stack.require(2)?;
                let position = self.pop_index()?;
                let mut data = self.stack.pop()?;
                let position = position
                    .filter(|position| *position <= data.len())
                    .ok_or(ScriptError::OpSplit)?;
                let tail = data.split_off(position);
                self.push_element(data)?;
                self.push_element(tail)?;
            }
            Num2Bin => self.op_num2bin()?,
            Bin2Num => {
                let data = number::minimally_encode(self.stack.pop()?);
                if data.len() > self.limits.max_number_size {
                    return Err(ScriptError::OpBin2NumInvalidNumberRange);
                }
                self.push_element(data)?;
            }
            Size => {
                let size = self.stack.top(0)?.len() as i64;
                self.push_int(size)?;
            }
            ReverseBytes => {
                if !self.active(RuleForks::BCH_FERMAT) {
                    return Err(ScriptError::OpReserved);
                }
                let mut data = self.stack.pop()?;
                data.reverse();
                self.push_element(data)?;
            }

            And | Or | Xor => {
                self.stack.require(2)?;
                let right = self.stack.pop()?;
                let left = self.stack.pop()?;
                if left.len() != right.len() {
                    return Err(match code {
                        And => ScriptError::OpAnd,
                        Or => ScriptError::OpOr,
                        _ => ScriptError::OpXor,
                    });
                }
                let result = left
                    .iter()
                    .zip(&right)
                    .map(|(a, b)| match code {
                        And => a & b,
                        Or => a | b,
                        _ => a ^ b,
                    })
                    .collect();
                self.push_element(result)?;
            }
            Equal | EqualVerify => {
                self.stack.require(2)?;
                let right = self.stack.pop()?;
                let left = self.stack.pop()?;
                let equal = left == right;
                if code == EqualVerify {
                    if !equal {
                        return Err(ScriptError::OpEqualVerifyFailed);
                    }
                } else {
                    self.push_bool(equal)?;
                }
            }

            Add1 | Sub1 | Negate | Abs | Not | NotEqual0 => {
                let value = self.pop_number()?;
                let result = match code {
                    Add1 => value.checked_add(ScriptNumber::ONE)?,
                    Sub1 => value.checked_sub(ScriptNumber::ONE)?,
                    Negate => value.negate(),
                    Abs => value.abs(),
                    Not => ScriptNumber::from_bool(value.is_zero()),
                    _ => ScriptNumber::from_bool(!value.is_zero()),
                };
                self.push_number(result)?;
            }
            Add | Sub | Mul | Div | Mod | BoolAnd | BoolOr | NumEqual | NumEqualVerify
            | NumNotEqual | LessThan | GreaterThan | LessThanOrEqual | GreaterThanOrEqual
            | Min | Max => {
                self.stack.require(2)?;
                let a = self.decode_number(self.stack.top(1)?)?;
                let b = self.decode_number(self.stack.top(0)?)?;
                self.stack.pop()?;
                self.stack.pop()?;
                let result = match code {
                    Add => a.checked_add(b)?,
                    Sub => a.checked_sub(b)?,
                    Mul => a.checked_mul(b)?,
                    Div => a.checked_div(b)?,
                    Mod => a.checked_rem(b)?,
                    BoolAnd => ScriptNumber::from_bool(!a.is_zero() && !b.is_zero()),
                    BoolOr => ScriptNumber::from_bool(!a.is_zero() || !b.is_zero()),
                    NumEqual | NumEqualVerify => ScriptNumber::from_bool(a == b),
                    NumNotEqual => ScriptNumber::from_bool(a != b),
                    LessThan => ScriptNumber::from_bool(a < b),
                    GreaterThan => ScriptNumber::from_bool(a > b),
                    LessThanOrEqual => ScriptNumber::from_bool(a <= b),
                    GreaterThanOrEqual => ScriptNumber::from_bool(a >= b),
                    Min => a.min(b),
                    _ => a.max(b),
                };
                if code == NumEqualVerify {
                    if result.is_zero() {
                        return Err(ScriptError::OpNumEqualVerifyFailed);
                    }
                } else {
                    self.push_number(result)?;
                }
            }
            Within => {
                self.stack.require(3)?;
                let value = self.decode_number(self.stack.top(2)?)?;
                let min = self.decode_number(self.stack.top(1)?)?;
                let max = self.decode_number(self.stack.top(0)?)?;
                for _ in 0..3 {
                    self.stack.pop()?;
                }
                self.push_bool(min <= value && value < max)?;
            }

            Ripemd160 | Sha1 | Sha256 | Hash160 | Hash256 => {
                let data = self.stack.pop()?;
                self.charge_hash(data.len(), matches!(code, Hash160 | Hash256))?;
                let digest = match code {
                    Ripemd160 => ripemd160::Hash::hash(&data).to_byte_array().to_vec(),
                    Sha1 => sha1::Hash::hash(&data).to_byte_array().to_vec(),
                    Sha256 => sha256::Hash::hash(&data).to_byte_array().to_vec(),
                    Hash160 => hash160::Hash::hash(&data).to_byte_array().to_vec(),
                    _ => sha256d::Hash::hash(&data).to_byte_array().to_vec(),
                };
                self.push_element(digest)?;
            }

            CheckSig | CheckSigVerify => {
                self.op_checksig(script, code_separator, code == CheckSigVerify)?
            }
            CheckMultisig | CheckMultisigVerify => {
                self.op_checkmultisig(script, code_separator, code == CheckMultisigVerify)?
            }
            CheckDataSig | CheckDataSigVerify => {
                if !self.active(RuleForks::BCH_EUCLID) {
                    return Err(ScriptError::OpReserved);
                }
                self.op_checkdatasig(code == CheckDataSigVerify)?
            }

            CheckLockTimeVerify => {
                if self.active(RuleForks::BIP65) {
                    let locktime = self.peek_locktime()?;
                    check_lock_time(self.context()?, locktime)?;
                }
            }
            CheckSequenceVerify => {
                if self.active(RuleForks::BIP112) {
                    let sequence = self.peek_locktime()?;
                    check_sequence(self.context()?, sequence)?;
                }
            }

            InputIndex | ActiveBytecode | TxVersion | TxInputCount | TxOutputCount
            | TxLocktime | UtxoValue | UtxoBytecode | OutpointTxHash | OutpointIndex
            | InputBytecode | InputSequenceNumber | OutputValue | OutputBytecode => {
                if !self.active(RuleForks::BCH_GAUSS) {
                    return Err(ScriptError::OpReserved);
                }
                self.op_introspection(code, script, code_separator)?
            }
            UtxoTokenCategory | UtxoTokenCommitment | UtxoTokenAmount | OutputTokenCategory
            | OutputTokenCommitment | OutputTokenAmount => {
                if !self.active(RuleForks::BCH_DESCARTES) {
                    return Err(ScriptError::OpReserved);
                }
                self.op_token_introspection(code)?
            }

            _ => return Err(ScriptError::OpReserved),
        }

        Ok(())
    }

    fn op_verify(&mut self, error: ScriptError) -> Result<(), ScriptError> {
        let value = self.stack.pop()?;
        if !cast_to_bool(&value) {
            return Err(error);
        }
        Ok(())
    }

    fn op_num2bin(&mut self) -> Result<(), ScriptError> {
        self.stack.require(2)?;
        let size = self.pop_number()?.value();
        let data = self.stack.pop()?;
        if size < 0 {
            return Err(ScriptError::OpNum2BinInvalidSize);
        }
        let size = size as u64;
        if size > self.limits.max_element_size as u64 {
            return Err(ScriptError::OpNum2BinSizeExceeded);
        }
        let size = size as usize;

        let mut raw = number::minimally_encode(data);
        if raw.len() > size {
            return Err(ScriptError::OpNum2BinImpossibleEncoding);
        }
        if raw.len() < size {
            let mut sign = 0u8;
            if let Some(last) = raw.last_mut() {
                sign = *last & 0x80;
                *last &= 0x7f;
            }
            raw.resize(size - 1, 0x00);
            raw.push(sign);
        }
        self.push_element(raw)
    }

    fn context(&self) -> Result<&'a ExecutionContext<'a>, ScriptError> {
        self.context.ok_or(ScriptError::ContextNotPresent)
    }

    /// Reads a locktime operand without popping it.
    fn peek_locktime(&self) -> Result<i64, ScriptError> {
        let bytes = self.stack.top(0)?;
        let size = self.limits.max_number_size.max(LOCKTIME_NUMBER_SIZE);
        let value = ScriptNumber::decode(bytes, size, self.require_minimal())?.value();
        if value < 0 {
            return Err(ScriptError::NegativeLocktime);
        }
        Ok(value)
    }

    fn op_introspection(
        &mut self,
        code: Opcode,
        script: &Script,
        code_separator: usize,
    ) -> Result<(), ScriptError> {
        use Opcode::*;

        let ctx = self.context()?;
        let tx = ctx.tx();
        match code {
            InputIndex => self.push_unsigned(ctx.input_index() as u64),
            ActiveBytecode => {
                let bytecode = script.subscript(code_separator).to_data(false);
                self.push_bytecode(bytecode)
            }
            TxVersion => self.push_int(i64::from(tx.version.0)),
            TxInputCount => self.push_unsigned(tx.input.len() as u64),
            TxOutputCount => self.push_unsigned(tx.output.len() as u64),
            TxLocktime => self.push_int(i64::from(tx.lock_time.to_consensus_u32())),
            UtxoValue => {
                let utxo = self.pop_utxo(ScriptError::OpUtxoValue)?;
                self.push_unsigned(utxo.value.to_sat())
            }
            UtxoBytecode => {
                let utxo = self.pop_utxo(ScriptError::OpUtxoBytecode)?;
                let bytecode =
                    WrappedScript::split_for(utxo.script_pubkey.as_bytes(), self.forks).bytecode;
                self.push_bytecode(bytecode.to_vec())
            }
            OutpointTxHash => {
                let input = self.pop_input(ScriptError::OpOutpointTxHash)?;
                self.push_element(input.previous_output.txid.to_byte_array().to_vec())
            }
            OutpointIndex => {
                let input = self.pop_input(ScriptError::OpOutpointIndex)?;
                self.push_int(i64::from(input.previous_output.vout))
            }
            InputBytecode => {
                let input = self.pop_input(ScriptError::OpInputBytecode)?;
                self.push_bytecode(input.script_sig.to_bytes())
            }
            InputSequenceNumber => {
                let input = self.pop_input(ScriptError::OpInputSequenceNumber)?;
                self.push_int(i64::from(input.sequence.0))
            }
            OutputValue => {
                let output = self.pop_output(ScriptError::OpOutputValue)?;
                self.push_unsigned(output.value.to_sat())
            }
            _ => {
                let output = self.pop_output(ScriptError::OpOutputBytecode)?;
                let bytecode =
                    WrappedScript::split_for(output.script_pubkey.as_bytes(), self.forks).bytecode;
                self.push_bytecode(bytecode.to_vec())
            }
        }
    }

    fn op_token_introspection(&mut self, code: Opcode) -> Result<(), ScriptError> {
        use Opcode::*;

        let output = match code {
            UtxoTokenCategory => self.pop_utxo(ScriptError::OpUtxoTokenCategory)?,
            UtxoTokenCommitment => self.pop_utxo(ScriptError::OpUtxoTokenCommitment)?,
            UtxoTokenAmount => self.pop_utxo(ScriptError::OpUtxoTokenAmount)?,
            OutputTokenCategory => self.pop_output(ScriptError::OpOutputTokenCategory)?,
            OutputTokenCommitment => self.pop_output(ScriptError::OpOutputTokenCommitment)?,
            _ => self.pop_output(ScriptError::OpOutputTokenAmount)?,
        };
        let token = WrappedScript::split_for(output.script_pubkey.as_bytes(), self.forks).token();

        match code {
            UtxoTokenCategory | OutputTokenCategory => self.push_element(
                token
                    .map(|token| token.category_with_capability())
                    .unwrap_or_default(),
            ),
            UtxoTokenCommitment | OutputTokenCommitment => {
                self.push_element(token.map(|token| token.commitment).unwrap_or_default())
            }
            _ => self.push_unsigned(token.map_or(0, |token| token.amount)),
        }
    }

    fn push_bytecode(&mut self, bytecode: Vec<u8>) -> Result<(), ScriptError> {
        if bytecode.len() > self.limits.max_element_size {
            return Err(ScriptError::InvalidPushDataSize);
        }
        self.push_element(bytecode)
    }

    fn pop_utxo(&mut self, error: ScriptError) -> Result<&'a bitcoin::TxOut, ScriptError> {
        let ctx = self.context()?;
        self.pop_index()?
            .and_then(|index| ctx.utxo(index))
            .ok_or(error)
    }

    fn pop_input(&mut self, error: ScriptError) -> Result<&'a bitcoin::TxIn, ScriptError> {
        let ctx = self.context()?;
        self.pop_index()?
            .and_then(|index| ctx.tx().input.get(index))
            .ok_or(error)
    }

    fn pop_output(&mut self, error: ScriptError) -> Result<&'a bitcoin::TxOut, ScriptError> {
        let ctx = self.context()?;
        self.pop_index()?
            .and_then(|index| ctx.tx().output.get(index))
            .ok_or(error)
    }

    fn check_pubkey_encoding(&self, pubkey: &[u8]) -> Result<(), ScriptError> {
        if self.active(RuleForks::BCH_UAHF) && !signature::is_valid_pubkey_encoding(pubkey) {
            return Err(ScriptError::PubkeyType);
        }
        Ok(())
    }

    /// Encoding rules for a signature without its hash type byte.
    fn check_raw_signature_encoding(&self, raw: &[u8], ecdsa_only: bool) -> Result<(), ScriptError> {
        if raw.len() == SCHNORR_SIGNATURE_SIZE && self.active(RuleForks::BCH_PISANO) {
            if ecdsa_only {
                return Err(ScriptError::SigBadlength);
            }
            return Ok(());
        }
        let strict = self.active(RuleForks::BIP66)
            || self.active(RuleForks::BCH_DAA_CW144)
            || self.active(RuleForks::BCH_UAHF);
        if strict && !signature::is_valid_der_encoding(raw) {
            return Err(ScriptError::InvalidSignatureEncoding);
        }
        if self.active(RuleForks::BCH_DAA_CW144) && !signature::is_low_s(raw) {
            return Err(ScriptError::SigHighS);
        }
        Ok(())
    }

    fn check_transaction_signature_encoding(
        &self,
        sig: &[u8],
        ecdsa_only: bool,
    ) -> Result<(), ScriptError> {
        let Some((&hash_type, raw)) = sig.split_last() else {
            return Ok(());
        };
        self.check_raw_signature_encoding(raw, ecdsa_only)?;
        check_sighash_encoding(SighashType::from_u32(u32::from(hash_type)), self.forks)
    }

    /// Script code signed by `sigs`: the operations after the last executed
    /// code separator, minus any push of a signature committed to by the
    /// original digest algorithm.
    fn script_code(&self, script: &Script, code_separator: usize, sigs: &[Vec<u8>]) -> Script {
        let mut code = script.subscript(code_separator);
        for sig in sigs {
            let hash_type = sig.last().copied().unwrap_or_default();
            let sighash = SighashType::from_u32(u32::from(hash_type));
            if !(sighash.has_forkid() && self.active(RuleForks::BCH_UAHF)) {
                code = code.find_and_delete(&Operation::push(sig.clone()).to_data());
            }
        }
        code
    }

    fn verify_transaction_signature(
        &self,
        sig: &[u8],
        pubkey: &[u8],
        script_code: &Script,
        schnorr: bool,
    ) -> Result<bool, ScriptError> {
        let Some((&hash_type, raw)) = sig.split_last() else {
            return Ok(false);
        };
        let ctx = self.context()?;
        let sighash = SighashType::from_u32(u32::from(hash_type));
        let input = ctx.signing_input(self.forks);
        let digest = sighash::signature_hash(&input, script_code, sighash, self.forks)?;
        Ok(if schnorr {
            signature::verify_schnorr(pubkey, &digest, raw)
        } else {
            signature::verify_ecdsa(pubkey, &digest, raw)
        })
    }

    fn is_schnorr(&self, raw_len: usize) -> bool {
        raw_len == SCHNORR_SIGNATURE_SIZE && self.active(RuleForks::BCH_PISANO)
    }

    fn op_checksig(
        &mut self,
        script: &Script,
        code_separator: usize,
        verify: bool,
    ) -> Result<(), ScriptError> {
        self.stack.require(2)?;
        let pubkey = self.stack.pop()?;
        let sig = self.stack.pop()?;

        self.check_transaction_signature_encoding(&sig, false)?;
        self.check_pubkey_encoding(&pubkey)?;

        let mut success = false;
        if !sig.is_empty() {
            let code = self.script_code(script, code_separator, std::slice::from_ref(&sig));
            let schnorr = self.is_schnorr(sig.len() - 1);
            success = self.verify_transaction_signature(&sig, &pubkey, &code, schnorr)?;
            self.count_sigchecks(1)?;
        }
        if !success && !sig.is_empty() && self.active(RuleForks::BCH_DAA_CW144) {
            return Err(ScriptError::SigNullfail);
        }

        if verify {
            if !success {
                return Err(ScriptError::OpCheckSigVerifyFailed);
            }
            Ok(())
        } else {
            self.push_bool(success)
        }
    }

    fn op_checkmultisig(
        &mut self,
        script: &Script,
        code_separator: usize,
        verify: bool,
    ) -> Result<(), ScriptError> {
        let key_count = self.pop_number()?.value();
        if key_count < 0 || key_count as u64 > self.limits.max_multisig_keys as u64 {
            return Err(ScriptError::MultisigInvalidKeyCount);
        }
        let key_count = key_count as usize;
        self.add_ops(key_count)?;

        self.stack.require(key_count)?;
        let mut keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            keys.push(self.stack.pop()?);
        }
        keys.reverse();

        let sig_count = self.pop_number()?.value();
        if sig_count < 0 || sig_count as u64 > key_count as u64 {
            return Err(ScriptError::MultisigInvalidSignatureCount);
        }
        let sig_count = sig_count as usize;

        self.stack.require(sig_count + 1)?;
        let mut sigs = Vec::with_capacity(sig_count);
        for _ in 0..sig_count {
            sigs.push(self.stack.pop()?);
        }
        sigs.reverse();
        let dummy = self.stack.pop()?;

        let code = self.script_code(script, code_separator, &sigs);
        let success = if self.active(RuleForks::BCH_MERSENNE) && !dummy.is_empty() {
            self.schnorr_multisig(&dummy, &keys, &sigs, &code)?;
            true
        } else {
            if self.active(RuleForks::BIP147) && !dummy.is_empty() {
                return Err(ScriptError::MultisigSatoshiBug);
            }
            self.legacy_multisig(&keys, &sigs, &code)?
        };

        if verify {
            if !success {
                return Err(ScriptError::OpCheckMultisig);
            }
            Ok(())
        } else {
            self.push_bool(success)
        }
    }

    /// Matches signatures to keys from the last pushed downwards; a key that
    /// fails is skipped, and the check fails once fewer keys than signatures
    /// remain.
    fn legacy_multisig(
        &mut self,
        keys: &[Vec<u8>],
        sigs: &[Vec<u8>],
        code: &Script,
    ) -> Result<bool, ScriptError> {
        let mut remaining_keys = keys.len();
        let mut remaining_sigs = sigs.len();
        let mut success = true;

        while success && remaining_sigs > 0 {
            let sig = &sigs[remaining_sigs - 1];
            let key = &keys[remaining_keys - 1];
            self.check_transaction_signature_encoding(sig, true)?;
            self.check_pubkey_encoding(key)?;
            if self.verify_transaction_signature(sig, key, code, false)? {
                remaining_sigs -= 1;
            }
            remaining_keys -= 1;
            if remaining_sigs > remaining_keys {
                success = false;
            }
        }

        let all_null = sigs.iter().all(Vec::is_empty);
        if !all_null {
            self.count_sigchecks(keys.len() as u64)?;
        }
        if !success && !all_null && self.active(RuleForks::BCH_DAA_CW144) {
            return Err(ScriptError::SigNullfail);
        }
        Ok(success)
    }

    /// The dummy element is a little-endian bitfield selecting which keys,
    /// in push order, the Schnorr signatures belong to.
    fn schnorr_multisig(
        &mut self,
        bitfield: &[u8],
        keys: &[Vec<u8>],
        sigs: &[Vec<u8>],
        code: &Script,
    ) -> Result<(), ScriptError> {
        if bitfield.len() != keys.len().div_ceil(8) {
            return Err(ScriptError::InvalidBitfield);
        }
        let bits = bitfield
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, byte)| acc | (u64::from(*byte) << (8 * i)));
        if bits >> keys.len() != 0 || bits.count_ones() as usize != sigs.len() {
            return Err(ScriptError::InvalidBitfield);
        }

        let selected = keys
            .iter()
            .enumerate()
            .filter(|(index, _)| bits & (1 << index) != 0)
            .map(|(_, key)| key);
        for (key, sig) in selected.zip(sigs) {
            if sig.len() != SCHNORR_SIGNATURE_SIZE + 1 {
                return Err(ScriptError::SigNonschnorr);
            }
            self.check_transaction_signature_encoding(sig, false)?;
            self.check_pubkey_encoding(key)?;
            if !self.verify_transaction_signature(sig, key, code, true)? {
                return Err(ScriptError::SigNullfail);
            }
            self.count_sigchecks(1)?;
        }
        Ok(())
    }

    fn op_checkdatasig(&mut self, verify: bool) -> Result<(), ScriptError> {
        self.stack.require(3)?;
        let pubkey = self.stack.pop()?;
        let message = self.stack.pop()?;
        let sig = self.stack.pop()?;

        if !sig.is_empty() {
            self.check_raw_signature_encoding(&sig, false)?;
        }
        self.check_pubkey_encoding(&pubkey)?;

        let mut success = false;
        if !sig.is_empty() {
            self.charge_hash(message.len(), false)?;
            let digest = sha256::Hash::hash(&message).to_byte_array();
            success = if self.is_schnorr(sig.len()) {
                signature::verify_schnorr(&pubkey, &digest, &sig)
            } else {
                signature::verify_ecdsa(&pubkey, &digest, &sig)
            };
            self.count_sigchecks(1)?;
        }
        if !success && !sig.is_empty() && self.active(RuleForks::BCH_DAA_CW144) {
            return Err(ScriptError::SigNullfail);
        }

        if verify {
            if !success {
                return Err(ScriptError::OpCheckDataSigVerify);
            }
            Ok(())
        } else {
            self.push_bool(success)
        }
    }
}

/// Truth value of a stack element: any non-zero byte, except a lone sign bit
/// in the last position (negative zero).
pub fn cast_to_bool(data: &[u8]) -> bool {
    for (i, &byte) in data.iter().enumerate() {
        if byte != 0 {
            if i == data.len() - 1 && byte == 0x80 {
                return false;
            }
            return true;
        }
    }
    false
}

fn check_lock_time(ctx: &ExecutionContext<'_>, locktime: i64) -> Result<(), ScriptError> {
    let tx_lock = i64::from(ctx.tx().lock_time.to_consensus_u32());
    if (tx_lock < LOCKTIME_THRESHOLD) != (locktime < LOCKTIME_THRESHOLD) {
        return Err(ScriptError::UnsatisfiedLocktime);
    }
    if locktime > tx_lock {
        return Err(ScriptError::UnsatisfiedLocktime);
    }
    if ctx.input().sequence.0 == SEQUENCE_FINAL {
        return Err(ScriptError::UnsatisfiedLocktime);
    }
    Ok(())
}

fn check_sequence(ctx: &ExecutionContext<'_>, sequence: i64) -> Result<(), ScriptError> {
    if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return Ok(());
    }
    if (ctx.tx().version.0 as u32) < 2 {
        return Err(ScriptError::UnsatisfiedLocktime);
    }

    let tx_sequence = i64::from(ctx.input().sequence.0);
    if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return Err(ScriptError::UnsatisfiedLocktime);
    }

    let mask = SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK;
    let tx_masked = tx_sequence & mask;
    let script_masked = sequence & mask;
    let same_type = (tx_masked < SEQUENCE_LOCKTIME_TYPE_FLAG)
        == (script_masked < SEQUENCE_LOCKTIME_TYPE_FLAG);
    if !same_type || script_masked > tx_masked {
        return Err(ScriptError::UnsatisfiedLocktime);
    }
    Ok(())
}
