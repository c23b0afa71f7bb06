//! Single script instructions.

use core::fmt;

use bitcoin::hex::{DisplayHex, FromHex};

use crate::{
    error::ParseError,
    number::ScriptNumber,
    opcode::{Opcode, PushLength},
};

/// One opcode together with the payload it pushes.
///
/// Non-push opcodes carry an empty payload; push opcodes carry exactly the
/// number of bytes their encoding announces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    code: Opcode,
    data: Vec<u8>,
}

impl Operation {
    /// Builds an operation, checking the payload against the opcode.
    pub fn new(code: Opcode, data: Vec<u8>) -> Result<Self, ParseError> {
        let fits = match code.push_length() {
            Some(PushLength::Direct(len)) => data.len() == len,
            Some(PushLength::Prefixed(width)) => width == 4 || data.len() < 1usize << (8 * width),
            None => data.is_empty(),
        };
        if !fits {
            return Err(ParseError::PushTooLarge(data.len()));
        }
        Ok(Self { code, data })
    }

    /// A payload-free operation; `None` when `code` requires a payload.
    pub fn from_opcode(code: Opcode) -> Option<Self> {
        Self::new(code, Vec::new()).ok()
    }

    /// Pushes `data` with the shortest opcode able to carry its length.
    pub fn push(data: Vec<u8>) -> Self {
        Self {
            code: opcode_for_size(data.len()),
            data,
        }
    }

    /// Pushes `data` the way minimal-data enforcement expects, preferring the
    /// constant opcodes for single bytes `1..=16` and `0x81`.
    pub fn push_minimal(data: Vec<u8>) -> Self {
        match data.as_slice() {
            [] => Self::push(data),
            [0x81] => Self {
                code: Opcode::PushNegative1,
                data: Vec::new(),
            },
            [value @ 1..=16] => Self {
                code: Opcode::from_u8(0x50 + value),
                data: Vec::new(),
            },
            _ => Self::push(data),
        }
    }

    /// Pushes a number, using a constant opcode when one exists.
    pub fn number(value: ScriptNumber) -> Self {
        match Opcode::from_small_number(value.value()) {
            Some(code) => Self {
                code,
                data: Vec::new(),
            },
            None => Self::push(value.encode()),
        }
    }

    /// Decodes one operation from the front of `reader`.
    ///
    /// On success the operation's bytes are consumed; on failure `reader` is
    /// left where it was.
    pub fn from_reader(reader: &mut &[u8]) -> Result<Self, ParseError> {
        let bytes = *reader;
        let (&byte, rest) = bytes.split_first().ok_or(ParseError::EndOfInput)?;
        let code = Opcode::from_u8(byte);

        let (len, payload) = match code.push_length() {
            None => {
                *reader = rest;
                return Ok(Self {
                    code,
                    data: Vec::new(),
                });
            }
            Some(PushLength::Direct(len)) => (len, rest),
            Some(PushLength::Prefixed(width)) => {
                if rest.len() < width {
                    return Err(ParseError::TruncatedLength(byte));
                }
                let (prefix, payload) = rest.split_at(width);
                let len = prefix
                    .iter()
                    .rev()
                    .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
                (len, payload)
            }
        };

        if payload.len() < len {
            return Err(ParseError::TruncatedPush {
                opcode: byte,
                needed: len,
                available: payload.len(),
            });
        }
        let (data, remainder) = payload.split_at(len);
        *reader = remainder;
        Ok(Self {
            code,
            data: data.to_vec(),
        })
    }

    /// Parses one token of the text form.
    pub fn from_string(token: &str) -> Result<Self, ParseError> {
        if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            return parse_bracketed(inner, token);
        }
        if let Some(text) = token.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
            return Ok(Self::push(text.as_bytes().to_vec()));
        }
        if is_decimal(token) {
            let value: i64 = token
                .parse()
                .map_err(|_| ParseError::UnknownToken(token.to_string()))?;
            let number =
                ScriptNumber::new(value).map_err(|_| ParseError::UnknownToken(token.to_string()))?;
            return Ok(Self::number(number));
        }
        Opcode::from_mnemonic(token)
            .and_then(Self::from_opcode)
            .ok_or_else(|| ParseError::UnknownToken(token.to_string()))
    }

    pub fn code(&self) -> Opcode {
        self.code
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn is_push(&self) -> bool {
        self.code.is_push()
    }

    /// Whether this operation uses the shortest possible push encoding.
    pub fn is_minimal_push(&self) -> bool {
        is_minimal_push(self.code, &self.data)
    }

    /// Encoded length in bytes.
    pub fn serialized_size(&self) -> usize {
        let prefix = match self.code.push_length() {
            Some(PushLength::Prefixed(width)) => width,
            _ => 0,
        };
        1 + prefix + self.data.len()
    }

    pub fn to_data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        self.write_to(&mut out);
        out
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.code.to_u8());
        if let Some(PushLength::Prefixed(width)) = self.code.push_length() {
            let len = self.data.len() as u32;
            out.extend_from_slice(&len.to_le_bytes()[..width]);
        }
        out.extend_from_slice(&self.data);
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(value) = self.code.small_number() {
            return write!(f, "{value}");
        }
        match self.code.push_length() {
            Some(PushLength::Prefixed(width)) if opcode_for_size(self.data.len()) != self.code => {
                write!(f, "[{}.{}]", width, self.data.as_hex())
            }
            Some(_) => write!(f, "[{}]", self.data.as_hex()),
            None => f.write_str(self.code.name()),
        }
    }
}

/// True iff `code` is the shortest encoding able to push `data`.
pub fn is_minimal_push(code: Opcode, data: &[u8]) -> bool {
    match data {
        [] => code == Opcode::PushBytes0,
        [0x81] => code == Opcode::PushNegative1,
        [value @ 1..=16] => code.to_u8() == 0x50 + value,
        _ => code == opcode_for_size(data.len()),
    }
}

/// Shortest push opcode for a payload of `size` bytes.
pub fn opcode_for_size(size: usize) -> Opcode {
    match size {
        0..=75 => Opcode::from_u8(size as u8),
        76..=0xff => Opcode::PushData1,
        0x100..=0xffff => Opcode::PushData2,
        _ => Opcode::PushData4,
    }
}

fn parse_bracketed(inner: &str, token: &str) -> Result<Operation, ParseError> {
    let (forced, hex) = match inner.split_once('.') {
        Some((width, hex)) => {
            let code = match width {
                "1" => Opcode::PushData1,
                "2" => Opcode::PushData2,
                "4" => Opcode::PushData4,
                _ => return Err(ParseError::InvalidHex(token.to_string())),
            };
            (Some(code), hex)
        }
        None => (None, inner),
    };
    let data = Vec::<u8>::from_hex(hex).map_err(|_| ParseError::InvalidHex(token.to_string()))?;
    match forced {
        Some(code) => Operation::new(code, data),
        None => Ok(Operation::push(data)),
    }
}

fn is_decimal(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_consumes_exactly_one_operation() {
        let bytes = [0x02, 0xaa, 0xbb, 0x76];
        let mut reader = &bytes[..];
        let op = Operation::from_reader(&mut reader).unwrap();
        assert_eq!(op.code(), Opcode::PushBytes2);
        assert_eq!(op.data(), &[0xaa, 0xbb]);
        assert_eq!(reader, &[0x76]);
        let op = Operation::from_reader(&mut reader).unwrap();
        assert_eq!(op.code(), Opcode::Dup);
        assert!(reader.is_empty());
        assert_eq!(Operation::from_reader(&mut reader), Err(ParseError::EndOfInput));
    }

    #[test]
    fn reader_is_untouched_on_truncation() {
        let bytes = [0x4d, 0x05, 0x00, 0x01, 0x02];
        let mut reader = &bytes[..];
        let err = Operation::from_reader(&mut reader).unwrap_err();
        assert_eq!(
            err,
            ParseError::TruncatedPush {
                opcode: 0x4d,
                needed: 5,
                available: 2
            }
        );
        assert_eq!(reader, &bytes[..]);

        let short_prefix = [0x4e, 0x01];
        let mut reader = &short_prefix[..];
        assert_eq!(
            Operation::from_reader(&mut reader),
            Err(ParseError::TruncatedLength(0x4e))
        );
        assert_eq!(reader.len(), 2);
    }

    #[test]
    fn non_minimal_push_round_trips() {
        let bytes = [0x4c, 0x01, 0x07];
        let mut reader = &bytes[..];
        let op = Operation::from_reader(&mut reader).unwrap();
        assert!(!op.is_minimal_push());
        assert_eq!(op.to_data(), bytes);
        assert_eq!(op.to_string(), "[1.07]");
        assert_eq!(Operation::from_string("[1.07]").unwrap(), op);
    }

    #[test]
    fn minimal_push_rules() {
        assert!(is_minimal_push(Opcode::PushBytes0, &[]));
        assert!(!is_minimal_push(Opcode::PushBytes1, &[0x05]));
        assert!(is_minimal_push(Opcode::PushNum5, &[0x05]));
        assert!(is_minimal_push(Opcode::PushNegative1, &[0x81]));
        assert!(is_minimal_push(Opcode::PushBytes1, &[0x11]));
        assert!(is_minimal_push(Opcode::PushData1, &[0u8; 76]));
        assert!(!is_minimal_push(Opcode::PushData2, &[0u8; 76]));
    }

    #[test]
    fn text_tokens() {
        assert_eq!(Operation::from_string("16").unwrap().code(), Opcode::PushNum16);
        assert_eq!(Operation::from_string("-1").unwrap().code(), Opcode::PushNegative1);
        assert_eq!(Operation::from_string("0").unwrap().code(), Opcode::PushBytes0);
        let large = Operation::from_string("1000").unwrap();
        assert_eq!(large.data(), &[0xe8, 0x03]);
        let bracket = Operation::from_string("[17]").unwrap();
        assert_eq!(bracket.code(), Opcode::PushBytes1);
        assert_eq!(bracket.data(), &[0x17]);
        assert_eq!(Operation::from_string("'abc'").unwrap().data(), b"abc");
        assert_eq!(Operation::from_string("CHECKSIG").unwrap().code(), Opcode::CheckSig);
        assert!(Operation::from_string("push_5").is_err());
        assert!(Operation::from_string("[zz]").is_err());
    }

    #[test]
    fn display_uses_numbers_and_brackets() {
        assert_eq!(Operation::number(ScriptNumber::new(3).unwrap()).to_string(), "3");
        assert_eq!(Operation::push(vec![0xde, 0xad]).to_string(), "[dead]");
        assert_eq!(Operation::from_opcode(Opcode::Hash160).unwrap().to_string(), "hash160");
    }
}
