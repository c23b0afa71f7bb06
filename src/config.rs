//! Activation heights and the limits they select.

use serde::{Deserialize, Serialize};

use crate::forks::RuleForks;

/// Block height at which each rule activates.
///
/// The default is the Bitcoin Cash mainnet schedule. Missing fields fall back
/// to it, so a test network only needs to list the heights it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationSchedule {
    pub bip16: u32,
    pub bip66: u32,
    pub bip65: u32,
    pub bip112: u32,
    pub bip147: u32,
    pub bch_uahf: u32,
    pub bch_daa_cw144: u32,
    pub bch_pythagoras: u32,
    pub bch_euclid: u32,
    pub bch_pisano: u32,
    pub bch_mersenne: u32,
    pub bch_fermat: u32,
    pub bch_euler: u32,
    pub bch_gauss: u32,
    pub bch_descartes: u32,
    pub bch_lobachevski: u32,
    pub bch_galois: u32,
}

impl Default for ActivationSchedule {
    fn default() -> Self {
        Self::MAINNET
    }
}

impl ActivationSchedule {
    pub const MAINNET: ActivationSchedule = ActivationSchedule {
        bip16: 173_805,
        bip66: 363_725,
        bip65: 388_381,
        bip112: 419_328,
        bip147: 609_136,
        bch_uahf: 478_559,
        bch_daa_cw144: 504_031,
        bch_pythagoras: 530_359,
        bch_euclid: 556_767,
        bch_pisano: 582_680,
        bch_mersenne: 609_136,
        bch_fermat: 635_259,
        bch_euler: 661_648,
        bch_gauss: 740_238,
        bch_descartes: 792_772,
        bch_lobachevski: 845_890,
        bch_galois: 895_678,
    };

    /// Every rule active from the first block.
    pub const ALWAYS: ActivationSchedule = ActivationSchedule {
        bip16: 0,
        bip66: 0,
        bip65: 0,
        bip112: 0,
        bip147: 0,
        bch_uahf: 0,
        bch_daa_cw144: 0,
        bch_pythagoras: 0,
        bch_euclid: 0,
        bch_pisano: 0,
        bch_mersenne: 0,
        bch_fermat: 0,
        bch_euler: 0,
        bch_gauss: 0,
        bch_descartes: 0,
        bch_lobachevski: 0,
        bch_galois: 0,
    };

    /// Rules active for a block at `height`.
    pub fn forks_at(&self, height: u32) -> RuleForks {
        let heights = [
            (self.bip16, RuleForks::BIP16),
            (self.bip66, RuleForks::BIP66),
            (self.bip65, RuleForks::BIP65),
            (self.bip112, RuleForks::BIP112),
            (self.bip147, RuleForks::BIP147),
            (self.bch_uahf, RuleForks::BCH_UAHF),
            (self.bch_daa_cw144, RuleForks::BCH_DAA_CW144),
            (self.bch_pythagoras, RuleForks::BCH_PYTHAGORAS),
            (self.bch_euclid, RuleForks::BCH_EUCLID),
            (self.bch_pisano, RuleForks::BCH_PISANO),
            (self.bch_mersenne, RuleForks::BCH_MERSENNE),
            (self.bch_fermat, RuleForks::BCH_FERMAT),
            (self.bch_euler, RuleForks::BCH_EULER),
            (self.bch_gauss, RuleForks::BCH_GAUSS),
            (self.bch_descartes, RuleForks::BCH_DESCARTES),
            (self.bch_lobachevski, RuleForks::BCH_LOBACHEVSKI),
            (self.bch_galois, RuleForks::BCH_GALOIS),
        ];

        let mut forks = RuleForks::NONE;
        for (activation, fork) in heights {
            if height >= activation {
                forks.insert(fork);
            }
        }
        forks
    }
}

/// Numeric ceilings in force for a given rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    pub max_element_size: usize,
    pub max_stack_size: usize,
    pub max_script_size: usize,
    /// `None` once operation cost replaces the operation count.
    pub max_operations: Option<usize>,
    pub max_multisig_keys: usize,
    /// `None` before conditional nesting was bounded.
    pub max_conditional_depth: Option<usize>,
    /// Byte width of arithmetic operands.
    pub max_number_size: usize,
}

impl ScriptLimits {
    pub const MAX_STACK_SIZE: usize = 1_000;
    pub const MAX_SCRIPT_SIZE: usize = 10_000;
    pub const MAX_OPERATIONS: usize = 201;
    pub const MAX_MULTISIG_KEYS: usize = 20;
    pub const LEGACY_ELEMENT_SIZE: usize = 520;
    pub const ELEMENT_SIZE: usize = 10_000;
    pub const CONDITIONAL_DEPTH: usize = 100;

    pub fn for_forks(forks: RuleForks) -> Self {
        let galois = forks.contains(RuleForks::BCH_GALOIS);
        Self {
            max_element_size: if galois {
                Self::ELEMENT_SIZE
            } else {
                Self::LEGACY_ELEMENT_SIZE
            },
            max_stack_size: Self::MAX_STACK_SIZE,
            max_script_size: Self::MAX_SCRIPT_SIZE,
            max_operations: (!galois).then_some(Self::MAX_OPERATIONS),
            max_multisig_keys: Self::MAX_MULTISIG_KEYS,
            max_conditional_depth: galois.then_some(Self::CONDITIONAL_DEPTH),
            max_number_size: if forks.contains(RuleForks::BCH_GAUSS) {
                crate::number::BIG_NUMBER_SIZE
            } else {
                crate::number::LEGACY_NUMBER_SIZE
            },
        }
    }
}

/// Per-input budgets that replace the operation count under `BCH_GALOIS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmBudget {
    pub op_cost: u64,
    pub hash_iterations: u64,
}

impl VmBudget {
    pub const FIXED_CREDIT: u64 = 41;
    pub const OP_COST_PER_BYTE: u64 = 800;
    pub const BASE_OP_COST: u64 = 100;
    pub const HASH_ITERATION_COST: u64 = 64;
    pub const SIGCHECK_COST: u64 = 26_000;

    /// Budgets granted to an input whose unlocking script has `unlocking_size` bytes.
    pub fn for_unlocking_size(unlocking_size: usize) -> Self {
        let credit = Self::FIXED_CREDIT + unlocking_size as u64;
        Self {
            op_cost: Self::OP_COST_PER_BYTE * credit,
            hash_iterations: credit * 7 / 2,
        }
    }

    /// Iterations charged for one digest of `message_len` bytes.
    pub fn hash_iterations(message_len: usize, two_rounds: bool) -> u64 {
        let base = 1 + (message_len as u64 + 8) / 64;
        base + u64::from(two_rounds)
    }
}
