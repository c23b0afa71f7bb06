//! Error codes reported by the script engine.
//!
//! Discriminants are part of the public contract: they never change once
//! assigned and new codes are only ever appended. Codes shared with the
//! historical engine keep their historical values; codes introduced here
//! start at 300.

use thiserror::Error;

/// Code reported for a successful verification.
pub const SUCCESS_CODE: u16 = 0;

/// Reduces a verification outcome to its numeric code.
pub fn error_code(result: &Result<(), ScriptError>) -> u16 {
    match result {
        Ok(()) => SUCCESS_CODE,
        Err(err) => err.code(),
    }
}

/// Every way a script evaluation can fail.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ScriptError {
    #[error("previous output missing for input")]
    MissingPreviousOutput = 19,
    #[error("malformed script")]
    InvalidScript = 39,
    #[error("script exceeds the maximum size")]
    InvalidScriptSize = 56,
    #[error("element exceeds the maximum size")]
    InvalidPushDataSize = 57,
    #[error("operation count exceeds the limit")]
    InvalidOperationCount = 58,
    #[error("stack depth limit exceeded")]
    InvalidStackSize = 59,
    #[error("not enough stack items for the operation")]
    InvalidStackScope = 60,
    #[error("redeem script is not a valid script")]
    InvalidScriptEmbed = 61,
    #[error("signature is not strictly DER encoded")]
    InvalidSignatureEncoding = 62,
    #[error("signature is not DER encoded")]
    InvalidSignatureLaxEncoding = 63,
    #[error("script evaluated to false")]
    StackFalse = 65,

    #[error("disabled opcode")]
    OpDisabled = 100,
    #[error("reserved or unassigned opcode")]
    OpReserved = 101,
    #[error("push exceeds the maximum element size")]
    OpPushSize = 102,
    #[error("unbalanced conditional")]
    UnbalancedConditional = 107,
    #[error("VERIFY failed")]
    OpVerifyFailed = 109,
    #[error("RETURN encountered")]
    OpReturn = 110,
    #[error("PICK index out of range")]
    OpPick = 124,
    #[error("ROLL index out of range")]
    OpRoll = 125,
    #[error("SPLIT position out of range")]
    OpSplit = 130,
    #[error("NUM2BIN size is negative")]
    OpNum2BinInvalidSize = 133,
    #[error("NUM2BIN size exceeds the maximum element size")]
    OpNum2BinSizeExceeded = 134,
    #[error("NUM2BIN cannot encode the number in the requested size")]
    OpNum2BinImpossibleEncoding = 135,
    #[error("BIN2NUM result out of number range")]
    OpBin2NumInvalidNumberRange = 137,
    #[error("AND operands differ in size")]
    OpAnd = 139,
    #[error("OR operands differ in size")]
    OpOr = 140,
    #[error("XOR operands differ in size")]
    OpXor = 141,
    #[error("EQUALVERIFY failed")]
    OpEqualVerifyFailed = 144,
    #[error("addition overflow")]
    OpAddOverflow = 152,
    #[error("subtraction underflow")]
    OpSubUnderflow = 154,
    #[error("multiplication overflow")]
    OpMulOverflow = 156,
    #[error("division by zero")]
    OpDivByZero = 158,
    #[error("modulo by zero")]
    OpModByZero = 160,
    #[error("NUMEQUALVERIFY failed")]
    OpNumEqualVerifyFailed = 165,
    #[error("CHECKSIGVERIFY failed")]
    OpCheckSigVerifyFailed = 181,
    #[error("CHECKDATASIGVERIFY failed")]
    OpCheckDataSigVerify = 183,
    #[error("multisig key count out of range")]
    MultisigInvalidKeyCount = 185,
    #[error("multisig signature count out of range")]
    MultisigInvalidSignatureCount = 188,
    #[error("CHECKMULTISIGVERIFY failed")]
    OpCheckMultisig = 191,
    #[error("negative locktime")]
    NegativeLocktime = 192,
    #[error("locktime requirement not satisfied")]
    UnsatisfiedLocktime = 193,
    #[error("operation requires a transaction context")]
    ContextNotPresent = 194,
    #[error("INPUTINDEX failed")]
    OpInputIndex = 195,
    #[error("ACTIVEBYTECODE failed")]
    OpActiveBytecode = 196,
    #[error("TXVERSION failed")]
    OpTxVersion = 197,
    #[error("TXINPUTCOUNT failed")]
    OpTxInputCount = 198,
    #[error("TXOUTPUTCOUNT failed")]
    OpTxOutputCount = 199,
    #[error("TXLOCKTIME failed")]
    OpTxLocktime = 200,
    #[error("UTXOVALUE index out of range")]
    OpUtxoValue = 201,
    #[error("UTXOBYTECODE index out of range")]
    OpUtxoBytecode = 202,
    #[error("OUTPOINTTXHASH index out of range")]
    OpOutpointTxHash = 203,
    #[error("OUTPOINTINDEX index out of range")]
    OpOutpointIndex = 204,
    #[error("INPUTBYTECODE index out of range")]
    OpInputBytecode = 205,
    #[error("INPUTSEQUENCENUMBER index out of range")]
    OpInputSequenceNumber = 206,
    #[error("OUTPUTVALUE index out of range")]
    OpOutputValue = 207,
    #[error("OUTPUTBYTECODE index out of range")]
    OpOutputBytecode = 208,
    #[error("UTXOTOKENCATEGORY index out of range")]
    OpUtxoTokenCategory = 209,
    #[error("UTXOTOKENCOMMITMENT index out of range")]
    OpUtxoTokenCommitment = 210,
    #[error("UTXOTOKENAMOUNT index out of range")]
    OpUtxoTokenAmount = 211,
    #[error("OUTPUTTOKENCATEGORY index out of range")]
    OpOutputTokenCategory = 212,
    #[error("OUTPUTTOKENCOMMITMENT index out of range")]
    OpOutputTokenCommitment = 213,
    #[error("OUTPUTTOKENAMOUNT index out of range")]
    OpOutputTokenAmount = 214,

    #[error("public key has an invalid encoding")]
    PubkeyType = 227,
    #[error("stack is not clean after evaluation")]
    Cleanstack = 228,
    #[error("signature hash type is undefined")]
    SigHashtype = 229,
    #[error("unlocking script is not push only")]
    SigPushonly = 230,
    #[error("signature S value is not low")]
    SigHighS = 231,
    #[error("failed signature check with a non-empty signature")]
    SigNullfail = 232,
    #[error("data push is not minimally encoded")]
    Minimaldata = 233,
    #[error("number is not minimally encoded")]
    MinimalNumber = 235,
    #[error("signature has an invalid length")]
    SigBadlength = 238,
    #[error("only Schnorr signatures are allowed here")]
    SigNonschnorr = 239,
    #[error("FORKID used before the fork-id rule is active")]
    IllegalForkid = 240,
    #[error("signature must use FORKID")]
    MustUseForkid = 241,
    #[error("multisig dummy element is not empty")]
    MultisigSatoshiBug = 243,
    #[error("input index out of range")]
    InputIndexOutOfRange = 246,
    #[error("number exceeds the active byte width")]
    OutOfRange = 254,
    #[error("hash iteration limit exceeded")]
    TooManyHashIters = 255,
    #[error("conditional stack depth exceeded")]
    ConditionalStackDepth = 256,
    #[error("multisig bitfield is invalid")]
    InvalidBitfield = 260,

    #[error("transaction could not be deserialized")]
    InvalidTransaction = 300,
    #[error("input signature check density exceeded")]
    InputSigchecks = 301,
    #[error("operation cost limit exceeded")]
    OpCost = 302,
    #[error("secret key is not a valid scalar")]
    InvalidSecretKey = 303,
}

impl ScriptError {
    /// Stable numeric code of this error.
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Failures while decoding the binary or text form of a script.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("push opcode {opcode:#04x} needs {needed} bytes, {available} available")]
    TruncatedPush {
        opcode: u8,
        needed: usize,
        available: usize,
    },
    #[error("length prefix of opcode {0:#04x} is truncated")]
    TruncatedLength(u8),
    #[error("unexpected end of input")]
    EndOfInput,
    #[error("invalid length prefix")]
    InvalidLengthPrefix,
    #[error("length prefix {declared} exceeds the {available} bytes available")]
    LengthPrefixMismatch { declared: u64, available: usize },
    #[error("unknown token `{0}`")]
    UnknownToken(String),
    #[error("invalid hex literal `{0}`")]
    InvalidHex(String),
    #[error("data of {0} bytes does not fit the requested push opcode")]
    PushTooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ScriptError::InvalidScript.code(), 39);
        assert_eq!(ScriptError::StackFalse.code(), 65);
        assert_eq!(ScriptError::OpDisabled.code(), 100);
        assert_eq!(ScriptError::ContextNotPresent.code(), 194);
        assert_eq!(ScriptError::Cleanstack.code(), 228);
        assert_eq!(ScriptError::MultisigSatoshiBug.code(), 243);
        assert_eq!(ScriptError::InvalidBitfield.code(), 260);
        assert_eq!(ScriptError::OpCost.code(), 302);
    }

    #[test]
    fn success_reduces_to_zero() {
        assert_eq!(error_code(&Ok(())), SUCCESS_CODE);
        assert_eq!(error_code(&Err(ScriptError::SigNullfail)), 232);
    }
}
