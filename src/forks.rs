//! Named consensus rules.

use core::{fmt, ops::BitOr};

/// A set of active consensus rules.
///
/// Each bit names one rule. Bits are appended in activation order and never
/// reassigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RuleForks(u64);

macro_rules! rule_forks {
    ($($(#[$doc:meta])* $name:ident = $bit:expr, $label:literal;)*) => {
        impl RuleForks {
            $(
                $(#[$doc])*
                pub const $name: RuleForks = RuleForks(1 << $bit);
            )*

            const NAMED: &'static [(RuleForks, &'static str)] = &[$((RuleForks::$name, $label)),*];

            /// Every rule this version knows about.
            pub const ALL: RuleForks = RuleForks(0 $(| (1 << $bit))*);
        }
    };
}

rule_forks! {
    /// Pay-to-script-hash redeem script evaluation.
    BIP16 = 0, "bip16";
    /// Strict DER signatures.
    BIP66 = 1, "bip66";
    /// CHECKLOCKTIMEVERIFY.
    BIP65 = 2, "bip65";
    /// CHECKSEQUENCEVERIFY.
    BIP112 = 3, "bip112";
    /// Multisig dummy element must be empty.
    BIP147 = 4, "bip147";
    /// Strict encodings and mandatory fork id.
    BCH_UAHF = 5, "bch_uahf";
    /// Low S and null-fail.
    BCH_DAA_CW144 = 6, "bch_daa_cw144";
    /// Re-enabled splice and bitwise opcodes.
    BCH_PYTHAGORAS = 7, "bch_pythagoras";
    /// Push-only unlocking scripts, clean stack, CHECKDATASIG.
    BCH_EUCLID = 8, "bch_euclid";
    /// Schnorr signatures and segwit recovery.
    BCH_PISANO = 9, "bch_pisano";
    /// Minimal data and Schnorr multisig.
    BCH_MERSENNE = 10, "bch_mersenne";
    /// Signature check density and REVERSEBYTES.
    BCH_FERMAT = 11, "bch_fermat";
    BCH_EULER = 12, "bch_euler";
    /// 64-bit arithmetic, MUL and native introspection.
    BCH_GAUSS = 13, "bch_gauss";
    /// P2SH-32, CashTokens and SIGHASH_UTXOS.
    BCH_DESCARTES = 14, "bch_descartes";
    BCH_LOBACHEVSKI = 15, "bch_lobachevski";
    /// Operation cost and hash iteration budgets.
    BCH_GALOIS = 16, "bch_galois";
}

impl RuleForks {
    pub const NONE: RuleForks = RuleForks(0);

    /// Wraps raw bits, rejecting any bit this version does not name.
    pub fn from_bits(bits: u64) -> Option<Self> {
        (bits & !Self::ALL.0 == 0).then_some(Self(bits))
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn contains(self, other: RuleForks) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: RuleForks) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: RuleForks) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `fork` together with every rule activated before it.
    pub fn through(fork: RuleForks) -> Self {
        let highest = 63 - u64::from(fork.0.max(1).leading_zeros());
        let mask = if highest >= 63 {
            u64::MAX
        } else {
            (1u64 << (highest + 1)) - 1
        };
        Self(mask & Self::ALL.0)
    }

    /// Names of the active rules, in bit order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMED
            .iter()
            .filter(move |(fork, _)| self.contains(*fork))
            .map(|(_, name)| *name)
    }

    /// Looks a rule up by its name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(_, label)| *label == name)
            .map(|(fork, _)| *fork)
    }
}

impl BitOr for RuleForks {
    type Output = RuleForks;

    fn bitor(self, rhs: RuleForks) -> RuleForks {
        RuleForks(self.0 | rhs.0)
    }
}

impl fmt::Display for RuleForks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names();
        match names.next() {
            None => f.write_str("none"),
            Some(first) => {
                f.write_str(first)?;
                names.try_for_each(|name| write!(f, "|{name}"))
            }
        }
    }
}
