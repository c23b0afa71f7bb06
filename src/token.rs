//! CashToken data carried in front of an output's locking bytecode.
//!
//! Encoding: `0xef`, 32-byte category, bitfield byte, then an optional
//! compact-size-prefixed commitment and an optional compact-size amount.

use bitcoin::consensus::{self, encode::VarInt};

use crate::forks::RuleForks;

/// First byte of a token prefix.
pub const PREFIX_TOKEN: u8 = 0xef;
/// Longest NFT commitment.
pub const MAX_COMMITMENT_SIZE: u64 = 40;

const HAS_COMMITMENT: u8 = 0x40;
const HAS_NFT: u8 = 0x20;
const HAS_AMOUNT: u8 = 0x10;
const RESERVED: u8 = 0x80;
const CAPABILITY_MASK: u8 = 0x0f;

/// Capability of a non-fungible token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NftCapability {
    Immutable = 0,
    Mutable = 1,
    Minting = 2,
}

/// Token data of one output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenData {
    /// Category id in serialized byte order.
    pub category: [u8; 32],
    /// Capability when the output carries an NFT.
    pub nft: Option<NftCapability>,
    pub commitment: Vec<u8>,
    /// Fungible amount, zero when absent.
    pub amount: u64,
}

impl TokenData {
    /// Category followed by the capability byte of a mutable or minting NFT.
    pub fn category_with_capability(&self) -> Vec<u8> {
        let mut out = self.category.to_vec();
        match self.nft {
            Some(capability @ (NftCapability::Mutable | NftCapability::Minting)) => {
                out.push(capability as u8)
            }
            _ => {}
        }
        out
    }

    /// Parses a full prefix (including the leading `0xef`) from the front of
    /// `bytes`, returning the token and the number of bytes consumed.
    pub fn parse_prefix(bytes: &[u8]) -> Option<(TokenData, usize)> {
        let (&marker, rest) = bytes.split_first()?;
        if marker != PREFIX_TOKEN || rest.len() < 33 {
            return None;
        }
        let category: [u8; 32] = rest[..32].try_into().ok()?;
        let bitfield = rest[32];
        let mut offset = 1 + 33;

        let has_commitment = bitfield & HAS_COMMITMENT != 0;
        let has_nft = bitfield & HAS_NFT != 0;
        let has_amount = bitfield & HAS_AMOUNT != 0;
        let capability = bitfield & CAPABILITY_MASK;
        if bitfield & RESERVED != 0
            || (!has_nft && !has_amount)
            || (!has_nft && (has_commitment || capability != 0))
        {
            return None;
        }
        let nft = if has_nft {
            Some(match capability {
                0 => NftCapability::Immutable,
                1 => NftCapability::Mutable,
                2 => NftCapability::Minting,
                _ => return None,
            })
        } else {
            None
        };

        let mut commitment = Vec::new();
        if has_commitment {
            let (VarInt(len), used) = consensus::deserialize_partial::<VarInt>(&bytes[offset..]).ok()?;
            if len == 0 || len > MAX_COMMITMENT_SIZE {
                return None;
            }
            offset += used;
            let end = offset.checked_add(len as usize)?;
            commitment = bytes.get(offset..end)?.to_vec();
            offset = end;
        }

        let mut amount = 0;
        if has_amount {
            let (VarInt(value), used) = consensus::deserialize_partial::<VarInt>(&bytes[offset..]).ok()?;
            if value == 0 || value > i64::MAX as u64 {
                return None;
            }
            amount = value;
            offset += used;
        }

        Some((
            TokenData {
                category,
                nft,
                commitment,
                amount,
            },
            offset,
        ))
    }
}

/// An output script split into its token prefix and its locking bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrappedScript<'a> {
    /// Raw prefix bytes, empty without a token.
    pub prefix: &'a [u8],
    pub bytecode: &'a [u8],
}

impl<'a> WrappedScript<'a> {
    /// Splits `script`. A malformed prefix is treated as plain bytecode.
    pub fn split(script: &'a [u8]) -> Self {
        match TokenData::parse_prefix(script) {
            Some((_, used)) => Self {
                prefix: &script[..used],
                bytecode: &script[used..],
            },
            None => Self::unwrapped(script),
        }
    }

    /// Splits `script` only once token prefixes are part of the output
    /// format; before that the leading `0xef` is an ordinary opcode.
    pub fn split_for(script: &'a [u8], forks: RuleForks) -> Self {
        if forks.contains(RuleForks::BCH_DESCARTES) {
            Self::split(script)
        } else {
            Self::unwrapped(script)
        }
    }

    fn unwrapped(script: &'a [u8]) -> Self {
        Self {
            prefix: &[],
            bytecode: script,
        }
    }

    pub fn token(&self) -> Option<TokenData> {
        TokenData::parse_prefix(self.prefix).map(|(token, _)| token)
    }
}
