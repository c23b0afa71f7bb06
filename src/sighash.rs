//! Signature hashing and endorsement creation.

use core::ops::BitOr;

use bitcoin::{
    consensus::{self, Encodable},
    hashes::{sha256, sha256d, Hash, HashEngine},
    sighash::SighashCache,
    Transaction,
};
use tracing::trace;

use crate::{
    error::ScriptError,
    forks::RuleForks,
    script::Script,
    signature,
    tx::{ensure_input_index, hash_output, PrecomputedTransactionData},
};

/// The hash type byte appended to every transaction signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SighashType(u32);

impl SighashType {
    pub const ALL: SighashType = SighashType(0x01);
    pub const NONE: SighashType = SighashType(0x02);
    pub const SINGLE: SighashType = SighashType(0x03);
    /// Commits to every spent output.
    pub const UTXOS: SighashType = SighashType(0x20);
    pub const FORKID: SighashType = SighashType(0x40);
    pub const ANYONECANPAY: SighashType = SighashType(0x80);

    const BASE_MASK: u32 = 0x1f;

    pub fn from_u32(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    /// The low byte, as appended to an endorsement.
    pub fn to_byte(self) -> u8 {
        self.0 as u8
    }

    pub fn base(self) -> u32 {
        self.0 & Self::BASE_MASK
    }

    pub fn has_forkid(self) -> bool {
        self.0 & Self::FORKID.0 != 0
    }

    pub fn has_utxos(self) -> bool {
        self.0 & Self::UTXOS.0 != 0
    }

    pub fn has_anyone_can_pay(self) -> bool {
        self.0 & Self::ANYONECANPAY.0 != 0
    }

    /// Whether the type names ALL, NONE or SINGLE once modifier bits known to
    /// `forks` are masked off.
    pub fn is_defined(self, forks: RuleForks) -> bool {
        let mut modifiers = Self::FORKID.0 | Self::ANYONECANPAY.0;
        if forks.contains(RuleForks::BCH_DESCARTES) {
            modifiers |= Self::UTXOS.0;
        }
        matches!(self.0 & !modifiers, 0x01..=0x03)
    }
}

impl BitOr for SighashType {
    type Output = SighashType;

    fn bitor(self, rhs: SighashType) -> SighashType {
        SighashType(self.0 | rhs.0)
    }
}

/// Hash type rules enforced once strict encoding is active.
pub fn check_sighash_encoding(sighash: SighashType, forks: RuleForks) -> Result<(), ScriptError> {
    if !forks.contains(RuleForks::BCH_UAHF) {
        return Ok(());
    }
    if !sighash.is_defined(forks) {
        return Err(ScriptError::SigHashtype);
    }
    if !sighash.has_forkid() {
        return Err(ScriptError::MustUseForkid);
    }
    if sighash.has_utxos() && sighash.has_anyone_can_pay() {
        return Err(ScriptError::SigHashtype);
    }
    Ok(())
}

/// Everything a digest commits to besides the script code and hash type.
#[derive(Debug, Clone, Copy)]
pub struct SigningInput<'a> {
    pub tx: &'a Transaction,
    pub input_index: usize,
    pub value: u64,
    /// Raw token prefix of the spent output, empty without a token.
    pub token_prefix: &'a [u8],
    pub precomputed: &'a PrecomputedTransactionData,
}

/// Computes the digest a signature over `script_code` must sign.
///
/// The fork-id algorithm is used when the hash type carries FORKID and the
/// fork-id rule is active; otherwise the original algorithm applies,
/// including its SINGLE-without-output quirk.
pub fn generate_signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    sighash_type: SighashType,
    forks: RuleForks,
    input_value: u64,
) -> Result<[u8; 32], ScriptError> {
    ensure_input_index(tx, input_index)?;
    let precomputed = PrecomputedTransactionData::new(tx, None);
    let input = SigningInput {
        tx,
        input_index,
        value: input_value,
        token_prefix: &[],
        precomputed: &precomputed,
    };
    signature_hash(&input, script_code, sighash_type, forks)
}

pub(crate) fn signature_hash(
    input: &SigningInput<'_>,
    script_code: &Script,
    sighash: SighashType,
    forks: RuleForks,
) -> Result<[u8; 32], ScriptError> {
    if sighash.has_forkid() && forks.contains(RuleForks::BCH_UAHF) {
        fork_id_digest(input, script_code, sighash, forks)
    } else {
        legacy_digest(input, script_code, sighash)
    }
}

fn legacy_digest(
    input: &SigningInput<'_>,
    script_code: &Script,
    sighash: SighashType,
) -> Result<[u8; 32], ScriptError> {
    let code = script_code.without_code_separators().to_data(false);
    let cache = SighashCache::new(input.tx);
    let hash = cache
        .legacy_signature_hash(
            input.input_index,
            bitcoin::Script::from_bytes(&code),
            sighash.raw(),
        )
        .map_err(|_| ScriptError::InputIndexOutOfRange)?;
    trace!(index = input.input_index, sighash = sighash.raw(), "legacy digest");
    Ok(hash.to_byte_array())
}

fn fork_id_digest(
    input: &SigningInput<'_>,
    script_code: &Script,
    sighash: SighashType,
    forks: RuleForks,
) -> Result<[u8; 32], ScriptError> {
    let tx = input.tx;
    let txin = tx
        .input
        .get(input.input_index)
        .ok_or(ScriptError::InputIndexOutOfRange)?;
    let base = sighash.base();
    let single = base == SighashType::SINGLE.0;
    let none = base == SighashType::NONE.0;
    let zero = sha256d::Hash::all_zeros();

    let hash_prevouts = if sighash.has_anyone_can_pay() {
        zero
    } else {
        input.precomputed.hash_prevouts
    };
    let hash_sequence = if sighash.has_anyone_can_pay() || single || none {
        zero
    } else {
        input.precomputed.hash_sequence
    };
    let hash_outputs = if !single && !none {
        input.precomputed.hash_outputs
    } else if single {
        tx.output
            .get(input.input_index)
            .map(hash_output)
            .unwrap_or(zero)
    } else {
        zero
    };

    let mut engine = sha256d::Hash::engine();
    encode(&tx.version.0, &mut engine);
    engine.input(hash_prevouts.as_byte_array());
    if sighash.has_utxos() && forks.contains(RuleForks::BCH_DESCARTES) {
        let hash_utxos = input
            .precomputed
            .hash_utxos
            .ok_or(ScriptError::MissingPreviousOutput)?;
        engine.input(hash_utxos.as_byte_array());
    }
    engine.input(hash_sequence.as_byte_array());
    encode(&txin.previous_output, &mut engine);
    engine.input(input.token_prefix);
    engine.input(&script_code.to_data(true));
    encode(&input.value, &mut engine);
    encode(&txin.sequence, &mut engine);
    engine.input(hash_outputs.as_byte_array());
    encode(&tx.lock_time, &mut engine);
    encode(&sighash.raw(), &mut engine);

    trace!(index = input.input_index, sighash = sighash.raw(), "fork-id digest");
    Ok(sha256d::Hash::from_engine(engine).to_byte_array())
}

fn encode<T: Encodable>(value: &T, engine: &mut sha256::HashEngine) {
    engine.input(&consensus::serialize(value));
}

/// Signs input `input_index` with ECDSA and appends the hash type byte.
pub fn create_endorsement(
    secret: &[u8; 32],
    prevout_script: &Script,
    tx: &Transaction,
    input_index: usize,
    sighash_type: SighashType,
    forks: RuleForks,
    input_value: u64,
) -> Result<Vec<u8>, ScriptError> {
    let digest =
        generate_signature_hash(tx, input_index, prevout_script, sighash_type, forks, input_value)?;
    let mut endorsement =
        signature::sign_ecdsa(secret, &digest).ok_or(ScriptError::InvalidSecretKey)?;
    endorsement.push(sighash_type.to_byte());
    Ok(endorsement)
}

/// Schnorr counterpart of [`create_endorsement`].
pub fn create_schnorr_endorsement(
    secret: &[u8; 32],
    prevout_script: &Script,
    tx: &Transaction,
    input_index: usize,
    sighash_type: SighashType,
    forks: RuleForks,
    input_value: u64,
) -> Result<Vec<u8>, ScriptError> {
    let digest =
        generate_signature_hash(tx, input_index, prevout_script, sighash_type, forks, input_value)?;
    let signature =
        signature::sign_schnorr(secret, &digest).ok_or(ScriptError::InvalidSecretKey)?;
    let mut endorsement = signature.to_vec();
    endorsement.push(sighash_type.to_byte());
    Ok(endorsement)
}
