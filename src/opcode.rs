//! Opcode table.

use core::fmt;

/// Broad grouping of opcodes by what they do to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeClass {
    /// Pushes the bytes that follow the opcode.
    PushData,
    /// Pushes a small number encoded in the opcode itself.
    PushConstant,
    FlowControl,
    Stack,
    Splice,
    Bitwise,
    Arithmetic,
    Crypto,
    Locktime,
    Signature,
    Introspection,
    Nop,
    /// Reserved, unassigned and permanently disabled codes.
    Reserved,
}

/// How a push opcode encodes the length of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushLength {
    /// The payload length is the opcode value.
    Direct(usize),
    /// The payload length follows as a little-endian integer of this width.
    Prefixed(usize),
}

macro_rules! opcodes {
    ($($byte:literal => $variant:ident, $name:literal;)*) => {
        /// Every one-byte instruction code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($variant = $byte,)*
        }

        impl Opcode {
            pub const fn from_u8(byte: u8) -> Opcode {
                match byte {
                    $($byte => Opcode::$variant,)*
                }
            }

            /// Mnemonic used by the text form of scripts.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)*
                }
            }
        }
    };
}

opcodes! {
    0x00 => PushBytes0, "zero";
    0x01 => PushBytes1, "push_1";
    0x02 => PushBytes2, "push_2";
    0x03 => PushBytes3, "push_3";
    0x04 => PushBytes4, "push_4";
    0x05 => PushBytes5, "push_5";
    0x06 => PushBytes6, "push_6";
    0x07 => PushBytes7, "push_7";
    0x08 => PushBytes8, "push_8";
    0x09 => PushBytes9, "push_9";
    0x0a => PushBytes10, "push_10";
    0x0b => PushBytes11, "push_11";
    0x0c => PushBytes12, "push_12";
    0x0d => PushBytes13, "push_13";
    0x0e => PushBytes14, "push_14";
    0x0f => PushBytes15, "push_15";
    0x10 => PushBytes16, "push_16";
    0x11 => PushBytes17, "push_17";
    0x12 => PushBytes18, "push_18";
    0x13 => PushBytes19, "push_19";
    0x14 => PushBytes20, "push_20";
    0x15 => PushBytes21, "push_21";
    0x16 => PushBytes22, "push_22";
    0x17 => PushBytes23, "push_23";
    0x18 => PushBytes24, "push_24";
    0x19 => PushBytes25, "push_25";
    0x1a => PushBytes26, "push_26";
    0x1b => PushBytes27, "push_27";
    0x1c => PushBytes28, "push_28";
    0x1d => PushBytes29, "push_29";
    0x1e => PushBytes30, "push_30";
    0x1f => PushBytes31, "push_31";
    0x20 => PushBytes32, "push_32";
    0x21 => PushBytes33, "push_33";
    0x22 => PushBytes34, "push_34";
    0x23 => PushBytes35, "push_35";
    0x24 => PushBytes36, "push_36";
    0x25 => PushBytes37, "push_37";
    0x26 => PushBytes38, "push_38";
    0x27 => PushBytes39, "push_39";
    0x28 => PushBytes40, "push_40";
    0x29 => PushBytes41, "push_41";
    0x2a => PushBytes42, "push_42";
    0x2b => PushBytes43, "push_43";
    0x2c => PushBytes44, "push_44";
    0x2d => PushBytes45, "push_45";
    0x2e => PushBytes46, "push_46";
    0x2f => PushBytes47, "push_47";
    0x30 => PushBytes48, "push_48";
    0x31 => PushBytes49, "push_49";
    0x32 => PushBytes50, "push_50";
    0x33 => PushBytes51, "push_51";
    0x34 => PushBytes52, "push_52";
    0x35 => PushBytes53, "push_53";
    0x36 => PushBytes54, "push_54";
    0x37 => PushBytes55, "push_55";
    0x38 => PushBytes56, "push_56";
    0x39 => PushBytes57, "push_57";
    0x3a => PushBytes58, "push_58";
    0x3b => PushBytes59, "push_59";
    0x3c => PushBytes60, "push_60";
    0x3d => PushBytes61, "push_61";
    0x3e => PushBytes62, "push_62";
    0x3f => PushBytes63, "push_63";
    0x40 => PushBytes64, "push_64";
    0x41 => PushBytes65, "push_65";
    0x42 => PushBytes66, "push_66";
    0x43 => PushBytes67, "push_67";
    0x44 => PushBytes68, "push_68";
    0x45 => PushBytes69, "push_69";
    0x46 => PushBytes70, "push_70";
    0x47 => PushBytes71, "push_71";
    0x48 => PushBytes72, "push_72";
    0x49 => PushBytes73, "push_73";
    0x4a => PushBytes74, "push_74";
    0x4b => PushBytes75, "push_75";
    0x4c => PushData1, "pushdata1";
    0x4d => PushData2, "pushdata2";
    0x4e => PushData4, "pushdata4";
    0x4f => PushNegative1, "-1";
    0x50 => Reserved, "reserved";
    0x51 => PushNum1, "1";
    0x52 => PushNum2, "2";
    0x53 => PushNum3, "3";
    0x54 => PushNum4, "4";
    0x55 => PushNum5, "5";
    0x56 => PushNum6, "6";
    0x57 => PushNum7, "7";
    0x58 => PushNum8, "8";
    0x59 => PushNum9, "9";
    0x5a => PushNum10, "10";
    0x5b => PushNum11, "11";
    0x5c => PushNum12, "12";
    0x5d => PushNum13, "13";
    0x5e => PushNum14, "14";
    0x5f => PushNum15, "15";
    0x60 => PushNum16, "16";
    0x61 => Nop, "nop";
    0x62 => Ver, "ver";
    0x63 => If, "if";
    0x64 => NotIf, "notif";
    0x65 => VerIf, "verif";
    0x66 => VerNotIf, "vernotif";
    0x67 => Else, "else";
    0x68 => EndIf, "endif";
    0x69 => Verify, "verify";
    0x6a => Return, "return";
    0x6b => ToAltStack, "toaltstack";
    0x6c => FromAltStack, "fromaltstack";
    0x6d => TwoDrop, "2drop";
    0x6e => TwoDup, "2dup";
    0x6f => ThreeDup, "3dup";
    0x70 => TwoOver, "2over";
    0x71 => TwoRot, "2rot";
    0x72 => TwoSwap, "2swap";
    0x73 => IfDup, "ifdup";
    0x74 => Depth, "depth";
    0x75 => Drop, "drop";
    0x76 => Dup, "dup";
    0x77 => Nip, "nip";
    0x78 => Over, "over";
    0x79 => Pick, "pick";
    0x7a => Roll, "roll";
    0x7b => Rot, "rot";
    0x7c => Swap, "swap";
    0x7d => Tuck, "tuck";
    0x7e => Cat, "cat";
    0x7f => Split, "split";
    0x80 => Num2Bin, "num2bin";
    0x81 => Bin2Num, "bin2num";
    0x82 => Size, "size";
    0x83 => Invert, "invert";
    0x84 => And, "and";
    0x85 => Or, "or";
    0x86 => Xor, "xor";
    0x87 => Equal, "equal";
    0x88 => EqualVerify, "equalverify";
    0x89 => Reserved1, "reserved1";
    0x8a => Reserved2, "reserved2";
    0x8b => Add1, "1add";
    0x8c => Sub1, "1sub";
    0x8d => Mul2, "2mul";
    0x8e => Div2, "2div";
    0x8f => Negate, "negate";
    0x90 => Abs, "abs";
    0x91 => Not, "not";
    0x92 => NotEqual0, "0notequal";
    0x93 => Add, "add";
    0x94 => Sub, "sub";
    0x95 => Mul, "mul";
    0x96 => Div, "div";
    0x97 => Mod, "mod";
    0x98 => LShift, "lshift";
    0x99 => RShift, "rshift";
    0x9a => BoolAnd, "booland";
    0x9b => BoolOr, "boolor";
    0x9c => NumEqual, "numequal";
    0x9d => NumEqualVerify, "numequalverify";
    0x9e => NumNotEqual, "numnotequal";
    0x9f => LessThan, "lessthan";
    0xa0 => GreaterThan, "greaterthan";
    0xa1 => LessThanOrEqual, "lessthanorequal";
    0xa2 => GreaterThanOrEqual, "greaterthanorequal";
    0xa3 => Min, "min";
    0xa4 => Max, "max";
    0xa5 => Within, "within";
    0xa6 => Ripemd160, "ripemd160";
    0xa7 => Sha1, "sha1";
    0xa8 => Sha256, "sha256";
    0xa9 => Hash160, "hash160";
    0xaa => Hash256, "hash256";
    0xab => CodeSeparator, "codeseparator";
    0xac => CheckSig, "checksig";
    0xad => CheckSigVerify, "checksigverify";
    0xae => CheckMultisig, "checkmultisig";
    0xaf => CheckMultisigVerify, "checkmultisigverify";
    0xb0 => Nop1, "nop1";
    0xb1 => CheckLockTimeVerify, "checklocktimeverify";
    0xb2 => CheckSequenceVerify, "checksequenceverify";
    0xb3 => Nop4, "nop4";
    0xb4 => Nop5, "nop5";
    0xb5 => Nop6, "nop6";
    0xb6 => Nop7, "nop7";
    0xb7 => Nop8, "nop8";
    0xb8 => Nop9, "nop9";
    0xb9 => Nop10, "nop10";
    0xba => CheckDataSig, "checkdatasig";
    0xbb => CheckDataSigVerify, "checkdatasigverify";
    0xbc => ReverseBytes, "reversebytes";
    0xbd => Unassigned189, "unassigned_189";
    0xbe => Unassigned190, "unassigned_190";
    0xbf => Unassigned191, "unassigned_191";
    0xc0 => InputIndex, "inputindex";
    0xc1 => ActiveBytecode, "activebytecode";
    0xc2 => TxVersion, "txversion";
    0xc3 => TxInputCount, "txinputcount";
    0xc4 => TxOutputCount, "txoutputcount";
    0xc5 => TxLocktime, "txlocktime";
    0xc6 => UtxoValue, "utxovalue";
    0xc7 => UtxoBytecode, "utxobytecode";
    0xc8 => OutpointTxHash, "outpointtxhash";
    0xc9 => OutpointIndex, "outpointindex";
    0xca => InputBytecode, "inputbytecode";
    0xcb => InputSequenceNumber, "inputsequencenumber";
    0xcc => OutputValue, "outputvalue";
    0xcd => OutputBytecode, "outputbytecode";
    0xce => UtxoTokenCategory, "utxotokencategory";
    0xcf => UtxoTokenCommitment, "utxotokencommitment";
    0xd0 => UtxoTokenAmount, "utxotokenamount";
    0xd1 => OutputTokenCategory, "outputtokencategory";
    0xd2 => OutputTokenCommitment, "outputtokencommitment";
    0xd3 => OutputTokenAmount, "outputtokenamount";
    0xd4 => Unassigned212, "unassigned_212";
    0xd5 => Unassigned213, "unassigned_213";
    0xd6 => Unassigned214, "unassigned_214";
    0xd7 => Unassigned215, "unassigned_215";
    0xd8 => Unassigned216, "unassigned_216";
    0xd9 => Unassigned217, "unassigned_217";
    0xda => Unassigned218, "unassigned_218";
    0xdb => Unassigned219, "unassigned_219";
    0xdc => Unassigned220, "unassigned_220";
    0xdd => Unassigned221, "unassigned_221";
    0xde => Unassigned222, "unassigned_222";
    0xdf => Unassigned223, "unassigned_223";
    0xe0 => Unassigned224, "unassigned_224";
    0xe1 => Unassigned225, "unassigned_225";
    0xe2 => Unassigned226, "unassigned_226";
    0xe3 => Unassigned227, "unassigned_227";
    0xe4 => Unassigned228, "unassigned_228";
    0xe5 => Unassigned229, "unassigned_229";
    0xe6 => Unassigned230, "unassigned_230";
    0xe7 => Unassigned231, "unassigned_231";
    0xe8 => Unassigned232, "unassigned_232";
    0xe9 => Unassigned233, "unassigned_233";
    0xea => Unassigned234, "unassigned_234";
    0xeb => Unassigned235, "unassigned_235";
    0xec => Unassigned236, "unassigned_236";
    0xed => Unassigned237, "unassigned_237";
    0xee => Unassigned238, "unassigned_238";
    0xef => Unassigned239, "unassigned_239";
    0xf0 => Unassigned240, "unassigned_240";
    0xf1 => Unassigned241, "unassigned_241";
    0xf2 => Unassigned242, "unassigned_242";
    0xf3 => Unassigned243, "unassigned_243";
    0xf4 => Unassigned244, "unassigned_244";
    0xf5 => Unassigned245, "unassigned_245";
    0xf6 => Unassigned246, "unassigned_246";
    0xf7 => Unassigned247, "unassigned_247";
    0xf8 => Unassigned248, "unassigned_248";
    0xf9 => Unassigned249, "unassigned_249";
    0xfa => Unassigned250, "unassigned_250";
    0xfb => Unassigned251, "unassigned_251";
    0xfc => Unassigned252, "unassigned_252";
    0xfd => Unassigned253, "unassigned_253";
    0xfe => Unassigned254, "unassigned_254";
    0xff => Unassigned255, "unassigned_255";
}

impl Opcode {
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn class(self) -> OpcodeClass {
        use Opcode::*;

        match self.to_u8() {
            0x00..=0x4e => OpcodeClass::PushData,
            0x4f | 0x51..=0x60 => OpcodeClass::PushConstant,
            _ => match self {
                If | NotIf | Else | EndIf | Verify | Return => OpcodeClass::FlowControl,
                ToAltStack | FromAltStack | TwoDrop | TwoDup | ThreeDup | TwoOver | TwoRot
                | TwoSwap | IfDup | Depth | Drop | Dup | Nip | Over | Pick | Roll | Rot | Swap
                | Tuck => OpcodeClass::Stack,
                Cat | Split | Num2Bin | Bin2Num | Size | ReverseBytes => OpcodeClass::Splice,
                And | Or | Xor | Equal | EqualVerify => OpcodeClass::Bitwise,
                Add1 | Sub1 | Negate | Abs | Not | NotEqual0 | Add | Sub | Mul | Div | Mod
                | BoolAnd | BoolOr | NumEqual | NumEqualVerify | NumNotEqual | LessThan
                | GreaterThan | LessThanOrEqual | GreaterThanOrEqual | Min | Max | Within => {
                    OpcodeClass::Arithmetic
                }
                Ripemd160 | Sha1 | Sha256 | Hash160 | Hash256 => OpcodeClass::Crypto,
                CheckLockTimeVerify | CheckSequenceVerify => OpcodeClass::Locktime,
                CodeSeparator | CheckSig | CheckSigVerify | CheckMultisig | CheckMultisigVerify
                | CheckDataSig | CheckDataSigVerify => OpcodeClass::Signature,
                InputIndex | ActiveBytecode | TxVersion | TxInputCount | TxOutputCount
                | TxLocktime | UtxoValue | UtxoBytecode | OutpointTxHash | OutpointIndex
                | InputBytecode | InputSequenceNumber | OutputValue | OutputBytecode
                | UtxoTokenCategory | UtxoTokenCommitment | UtxoTokenAmount
                | OutputTokenCategory | OutputTokenCommitment | OutputTokenAmount => {
                    OpcodeClass::Introspection
                }
                Nop | Nop1 | Nop4 | Nop5 | Nop6 | Nop7 | Nop8 | Nop9 | Nop10 => OpcodeClass::Nop,
                _ => OpcodeClass::Reserved,
            },
        }
    }

    /// Payload length encoding, `None` for opcodes without a payload.
    pub fn push_length(self) -> Option<PushLength> {
        match self.to_u8() {
            byte @ 0x00..=0x4b => Some(PushLength::Direct(usize::from(byte))),
            0x4c => Some(PushLength::Prefixed(1)),
            0x4d => Some(PushLength::Prefixed(2)),
            0x4e => Some(PushLength::Prefixed(4)),
            _ => None,
        }
    }

    /// Codes up to `16` are allowed in push-only scripts (this includes the
    /// reserved `0x50`).
    pub fn is_push(self) -> bool {
        self.to_u8() <= Opcode::PushNum16.to_u8()
    }

    /// Whether the opcode counts towards the per-script operation limit.
    pub fn is_counted(self) -> bool {
        self.to_u8() > Opcode::PushNum16.to_u8()
    }

    pub fn is_conditional(self) -> bool {
        matches!(self, Opcode::If | Opcode::NotIf | Opcode::Else | Opcode::EndIf)
    }

    /// Value pushed by a constant opcode.
    pub fn small_number(self) -> Option<i64> {
        match self.to_u8() {
            0x00 => Some(0),
            0x4f => Some(-1),
            byte @ 0x51..=0x60 => Some(i64::from(byte - 0x50)),
            _ => None,
        }
    }

    /// Opcode pushing `value` without payload, for `-1..=16`.
    pub fn from_small_number(value: i64) -> Option<Opcode> {
        match value {
            0 => Some(Opcode::PushBytes0),
            -1 => Some(Opcode::PushNegative1),
            1..=16 => Some(Opcode::from_u8(0x50 + value as u8)),
            _ => None,
        }
    }

    /// Opcodes `1..=16`.
    pub fn positive_number(self) -> Option<u8> {
        match self.to_u8() {
            byte @ 0x51..=0x60 => Some(byte - 0x50),
            _ => None,
        }
    }

    /// Case-insensitive mnemonic lookup, accepting an `op_` prefix and the
    /// historical aliases.
    pub fn from_mnemonic(token: &str) -> Option<Opcode> {
        let lower = token.to_ascii_lowercase();
        let bare = lower.strip_prefix("op_").unwrap_or(&lower);
        let alias = match bare {
            "0" | "false" => Some(Opcode::PushBytes0),
            "true" => Some(Opcode::PushNum1),
            "nop2" | "cltv" => Some(Opcode::CheckLockTimeVerify),
            "nop3" | "csv" => Some(Opcode::CheckSequenceVerify),
            "nonzero" => Some(Opcode::NotEqual0),
            "substr" => Some(Opcode::Split),
            "left" => Some(Opcode::Num2Bin),
            "right" => Some(Opcode::Bin2Num),
            "1negate" => Some(Opcode::PushNegative1),
            _ => None,
        };
        if alias.is_some() {
            return alias;
        }
        (0u8..=255)
            .map(Opcode::from_u8)
            .find(|opcode| opcode.name() == bare)
    }
}

impl From<u8> for Opcode {
    fn from(byte: u8) -> Self {
        Opcode::from_u8(byte)
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> Self {
        opcode.to_u8()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
