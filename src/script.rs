//! Scripts: ordered operations with binary and text encodings.

use core::fmt;

use bitcoin::{
    consensus::{self, encode::VarInt},
    hex::DisplayHex,
};

use crate::{
    error::ParseError,
    opcode::Opcode,
    operation::Operation,
};

/// Largest key count CHECKMULTISIG accepts, also the inaccurate sigop weight.
pub const MAX_PUBKEYS_PER_MULTISIG: u32 = 20;
/// Payload ceiling of a standard null-data output.
pub const MAX_NULL_DATA_SIZE: usize = 80;
/// Largest DER signature plus hash type byte.
pub const MAX_ENDORSEMENT_SIZE: usize = 73;

/// Standard script shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptPattern {
    /// `RETURN` followed by a single push of at most 80 bytes.
    NullData,
    /// `m <keys...> n CHECKMULTISIG` with `1 <= m <= n <= 16`.
    PayMultisig,
    /// `<key> CHECKSIG`.
    PayPublicKey,
    /// `DUP HASH160 <20 bytes> EQUALVERIFY CHECKSIG`.
    PayPublicKeyHash,
    /// `HASH160 <20 bytes> EQUAL`.
    PayScriptHash,
    /// `HASH256 <32 bytes> EQUAL`.
    PayScriptHash32,
    /// `0 <endorsements...>`.
    SignMultisig,
    /// `<endorsement>`.
    SignPublicKey,
    /// `<endorsement> <key>`.
    SignPublicKeyHash,
    /// `<pushes...> <standard redeem script>`.
    SignScriptHash,
    NonStandard,
}

/// An ordered sequence of operations.
///
/// A script decoded from bytes that end in a malformed push keeps the
/// offending bytes verbatim so the encoding still round-trips; such a script
/// reports `is_valid() == false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Script {
    operations: Vec<Operation>,
    malformed_tail: Vec<u8>,
}

impl Script {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self {
            operations,
            malformed_tail: Vec::new(),
        }
    }

    /// Decodes a script, optionally preceded by its compact-size length.
    pub fn from_data(reader: &mut &[u8], prefix_with_length: bool) -> Result<Self, ParseError> {
        if !prefix_with_length {
            let script = Self::from_bytes(reader);
            *reader = &reader[reader.len()..];
            return Ok(script);
        }

        let (VarInt(declared), consumed) = consensus::deserialize_partial::<VarInt>(reader)
            .map_err(|_| ParseError::InvalidLengthPrefix)?;
        let body = &reader[consumed..];
        let len = usize::try_from(declared)
            .ok()
            .filter(|len| *len <= body.len())
            .ok_or(ParseError::LengthPrefixMismatch {
                declared,
                available: body.len(),
            })?;
        let script = Self::from_bytes(&body[..len]);
        *reader = &body[len..];
        Ok(script)
    }

    /// Decodes raw script bytes. Never fails; malformed pushes mark the
    /// script invalid.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut reader = bytes;
        let mut operations = Vec::new();
        while !reader.is_empty() {
            match Operation::from_reader(&mut reader) {
                Ok(op) => operations.push(op),
                Err(_) => {
                    return Self {
                        operations,
                        malformed_tail: reader.to_vec(),
                    }
                }
            }
        }
        Self::new(operations)
    }

    /// Parses the whitespace-separated text form.
    pub fn from_string(text: &str) -> Result<Self, ParseError> {
        text.split_whitespace()
            .map(Operation::from_string)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn to_data(&self, prefix_with_length: bool) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.body_size());
        for op in &self.operations {
            op.write_to(&mut body);
        }
        body.extend_from_slice(&self.malformed_tail);
        if !prefix_with_length {
            return body;
        }
        let mut out = consensus::serialize(&VarInt(body.len() as u64));
        out.extend_from_slice(&body);
        out
    }

    pub fn serialized_size(&self, prefix_with_length: bool) -> usize {
        let body = self.body_size();
        if prefix_with_length {
            VarInt(body as u64).size() + body
        } else {
            body
        }
    }

    fn body_size(&self) -> usize {
        self.operations
            .iter()
            .map(Operation::serialized_size)
            .sum::<usize>()
            + self.malformed_tail.len()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_valid(&self) -> bool {
        self.malformed_tail.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.malformed_tail.is_empty()
    }

    /// Operations from `start` onwards, as used for script codes after a
    /// code separator.
    pub fn subscript(&self, start: usize) -> Script {
        Self {
            operations: self.operations.get(start..).unwrap_or_default().to_vec(),
            malformed_tail: self.malformed_tail.clone(),
        }
    }

    /// Copy without any operation whose encoding equals `pattern`.
    pub fn find_and_delete(&self, pattern: &[u8]) -> Script {
        if pattern.is_empty() {
            return self.clone();
        }
        Self {
            operations: self
                .operations
                .iter()
                .filter(|op| op.to_data() != pattern)
                .cloned()
                .collect(),
            malformed_tail: self.malformed_tail.clone(),
        }
    }

    /// Copy without `CODESEPARATOR` operations.
    pub fn without_code_separators(&self) -> Script {
        Self {
            operations: self
                .operations
                .iter()
                .filter(|op| op.code() != Opcode::CodeSeparator)
                .cloned()
                .collect(),
            malformed_tail: self.malformed_tail.clone(),
        }
    }

    pub fn is_push_only(&self) -> bool {
        self.is_valid() && self.operations.iter().all(Operation::is_push)
    }

    /// Counts signature operations. With `accurate`, a multisig preceded by a
    /// constant `1..=16` counts that many keys instead of the maximum.
    pub fn sigops(&self, accurate: bool) -> u32 {
        let mut total = 0u32;
        let mut previous: Option<Opcode> = None;
        for op in &self.operations {
            match op.code() {
                Opcode::CheckSig
                | Opcode::CheckSigVerify
                | Opcode::CheckDataSig
                | Opcode::CheckDataSigVerify => total = total.saturating_add(1),
                Opcode::CheckMultisig | Opcode::CheckMultisigVerify => {
                    let keys = previous
                        .filter(|_| accurate)
                        .and_then(Opcode::positive_number)
                        .map(u32::from)
                        .unwrap_or(MAX_PUBKEYS_PER_MULTISIG);
                    total = total.saturating_add(keys);
                }
                _ => {}
            }
            previous = Some(op.code());
        }
        total
    }

    /// Output patterns take precedence over input patterns.
    pub fn pattern(&self) -> ScriptPattern {
        match self.output_pattern() {
            ScriptPattern::NonStandard => self.input_pattern(),
            pattern => pattern,
        }
    }

    pub fn output_pattern(&self) -> ScriptPattern {
        let ops = self.operations.as_slice();
        if !self.is_valid() {
            ScriptPattern::NonStandard
        } else if is_null_data(ops) {
            ScriptPattern::NullData
        } else if is_pay_multisig(ops) {
            ScriptPattern::PayMultisig
        } else if is_pay_public_key(ops) {
            ScriptPattern::PayPublicKey
        } else if is_pay_public_key_hash(ops) {
            ScriptPattern::PayPublicKeyHash
        } else if is_pay_script_hash(ops) {
            ScriptPattern::PayScriptHash
        } else if is_pay_script_hash_32(ops) {
            ScriptPattern::PayScriptHash32
        } else {
            ScriptPattern::NonStandard
        }
    }

    pub fn input_pattern(&self) -> ScriptPattern {
        let ops = self.operations.as_slice();
        if !self.is_push_only() || ops.is_empty() {
            ScriptPattern::NonStandard
        } else if is_sign_public_key_hash(ops) {
            ScriptPattern::SignPublicKeyHash
        } else if is_sign_script_hash(ops) {
            ScriptPattern::SignScriptHash
        } else if is_sign_public_key(ops) {
            ScriptPattern::SignPublicKey
        } else if is_sign_multisig(ops) {
            ScriptPattern::SignMultisig
        } else {
            ScriptPattern::NonStandard
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for op in &self.operations {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{op}")?;
        }
        if !self.malformed_tail.is_empty() {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "<invalid:{}>", self.malformed_tail.as_hex())?;
        }
        Ok(())
    }
}

impl From<&bitcoin::Script> for Script {
    fn from(script: &bitcoin::Script) -> Self {
        Script::from_bytes(script.as_bytes())
    }
}

/// Raw-byte check for `HASH160 <20> EQUAL`.
pub fn is_p2sh_bytes(bytes: &[u8]) -> bool {
    bytes.len() == 23 && bytes[0] == 0xa9 && bytes[1] == 0x14 && bytes[22] == 0x87
}

/// Raw-byte check for `HASH256 <32> EQUAL`.
pub fn is_p2sh32_bytes(bytes: &[u8]) -> bool {
    bytes.len() == 35 && bytes[0] == 0xaa && bytes[1] == 0x20 && bytes[34] == 0x87
}

/// Version byte followed by a single 2..=40 byte direct push.
pub fn is_witness_program_bytes(bytes: &[u8]) -> bool {
    if !(4..=42).contains(&bytes.len()) {
        return false;
    }
    let version_ok = bytes[0] == 0x00 || (0x51..=0x60).contains(&bytes[0]);
    version_ok && usize::from(bytes[1]) + 2 == bytes.len()
}

pub fn is_public_key(data: &[u8]) -> bool {
    match data.first() {
        Some(0x02 | 0x03) => data.len() == 33,
        Some(0x04) => data.len() == 65,
        _ => false,
    }
}

fn is_endorsement(data: &[u8]) -> bool {
    !data.is_empty() && data.len() <= MAX_ENDORSEMENT_SIZE
}

fn is_null_data(ops: &[Operation]) -> bool {
    matches!(ops, [ret, data]
        if ret.code() == Opcode::Return
            && data.is_push()
            && data.data().len() <= MAX_NULL_DATA_SIZE)
}

fn is_pay_multisig(ops: &[Operation]) -> bool {
    let [first, keys @ .., count, last] = ops else {
        return false;
    };
    if last.code() != Opcode::CheckMultisig {
        return false;
    }
    let (Some(m), Some(n)) = (first.code().positive_number(), count.code().positive_number())
    else {
        return false;
    };
    m <= n
        && usize::from(n) == keys.len()
        && keys.iter().all(|key| is_public_key(key.data()))
}

fn is_pay_public_key(ops: &[Operation]) -> bool {
    matches!(ops, [key, check]
        if is_public_key(key.data()) && check.code() == Opcode::CheckSig)
}

fn is_pay_public_key_hash(ops: &[Operation]) -> bool {
    matches!(ops, [dup, hash, push, verify, check]
        if dup.code() == Opcode::Dup
            && hash.code() == Opcode::Hash160
            && push.code() == Opcode::PushBytes20
            && verify.code() == Opcode::EqualVerify
            && check.code() == Opcode::CheckSig)
}

fn is_pay_script_hash(ops: &[Operation]) -> bool {
    matches!(ops, [hash, push, equal]
        if hash.code() == Opcode::Hash160
            && push.code() == Opcode::PushBytes20
            && equal.code() == Opcode::Equal)
}

fn is_pay_script_hash_32(ops: &[Operation]) -> bool {
    matches!(ops, [hash, push, equal]
        if hash.code() == Opcode::Hash256
            && push.code() == Opcode::PushBytes32
            && equal.code() == Opcode::Equal)
}

fn is_sign_public_key(ops: &[Operation]) -> bool {
    matches!(ops, [sig] if is_endorsement(sig.data()))
}

fn is_sign_public_key_hash(ops: &[Operation]) -> bool {
    matches!(ops, [sig, key] if is_endorsement(sig.data()) && is_public_key(key.data()))
}

fn is_sign_multisig(ops: &[Operation]) -> bool {
    match ops {
        [dummy, sigs @ ..] if !sigs.is_empty() => {
            dummy.code() == Opcode::PushBytes0 && sigs.iter().all(|sig| is_endorsement(sig.data()))
        }
        _ => false,
    }
}

fn is_sign_script_hash(ops: &[Operation]) -> bool {
    let [_, .., last] = ops else {
        return false;
    };
    if last.data().is_empty() {
        return false;
    }
    let redeem = Script::from_bytes(last.data());
    !matches!(
        redeem.output_pattern(),
        ScriptPattern::NonStandard | ScriptPattern::NullData
    )
}
