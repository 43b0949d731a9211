//! Internal models for the reporter state module
//! Record types split out of mod.rs: reporters, selections, token origins,
//! reward periods, and distribution queue items.

use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================
// REPORTER
// ============================================================

/// A registered data reporter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OracleReporter {
    /// Commission rate in basis points (0..=10_000).
    pub commission_bps: u16,
    /// Minimum bonded loya a selector must hold to join this reporter.
    pub min_tokens_required: u128,
    /// Human-readable identity.
    pub moniker: String,
    /// Bonded loya backing this reporter as of the last stake aggregation.
    /// DERIVED cache only — the staking ledger stays authoritative; this is
    /// refreshed by `reporter_stake` and never adjusted anywhere else.
    pub total_tokens: u128,
    /// Whether the reporter is currently jailed.
    pub jailed: bool,
    /// Unix seconds after which an unjail is allowed. Only meaningful while
    /// `jailed` is true. `u64::MAX` means effectively permanent.
    pub jailed_until: u64,
    /// Unix seconds of the last `edit_reporter`, for the edit rate limit.
    pub last_updated: u64,
}

impl OracleReporter {
    pub fn new(
        commission_bps: u16,
        min_tokens_required: u128,
        moniker: String,
        now: u64,
    ) -> Self {
        Self {
            commission_bps,
            min_tokens_required,
            moniker,
            total_tokens: 0,
            jailed: false,
            jailed_until: 0,
            last_updated: now,
        }
    }
}

// ============================================================
// SELECTION
// ============================================================

/// A delegator's choice of exactly one reporter to back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Selection {
    /// The backed reporter.
    pub reporter: Address,
    /// How many validator delegations this selector had when last counted.
    /// Drives the iteration-strategy choice during stake aggregation.
    pub delegations_count: u32,
    /// Unix seconds until which this selection is excluded from stake
    /// aggregation (set when switching away from a reporter whose stake was
    /// part of a report). Zero means unlocked.
    pub locked_until: u64,
}

impl Selection {
    pub fn new(reporter: Address, delegations_count: u32) -> Self {
        Self { reporter, delegations_count, locked_until: 0 }
    }
}

// ============================================================
// TOKEN ORIGINS
// ============================================================

/// The finest-grained attribution unit: whose stake, at which validator, in
/// what amount.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenOriginInfo {
    pub selector: Address,
    pub validator: Address,
    /// Loya.
    pub amount: u128,
}

/// A list of token origins with its running total.
///
/// `total` must equal the sum of the constituent amounts at all times. The
/// only mutators are `push` and `extend_from`, which maintain it; consumers
/// can assert `invariant_holds` after any sequence of mutations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DelegationsAmounts {
    pub token_origins: Vec<TokenOriginInfo>,
    pub total: u128,
}

impl DelegationsAmounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, origin: TokenOriginInfo) {
        self.total += origin.amount;
        self.token_origins.push(origin);
    }

    pub fn extend_from(&mut self, other: &DelegationsAmounts) {
        for origin in &other.token_origins {
            self.push(*origin);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token_origins.is_empty()
    }

    /// Sum-equals-total check. Cheap; test suites call it after every
    /// tracker mutation.
    pub fn invariant_holds(&self) -> bool {
        self.token_origins.iter().map(|o| o.amount).sum::<u128>() == self.total
    }
}

// ============================================================
// REWARD PERIOD & DISTRIBUTION QUEUE
// ============================================================

/// Accumulator of undistributed net reward for one reporter, pinned to the
/// selector weights captured by the stake aggregation that opened it.
///
/// Existence of this record IS the reward-accrual window: `divvy_tips` can
/// only bank net reward into a period that aggregation created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardPeriod {
    /// Total weight (loya) across selectors when the period opened.
    pub total: u128,
    /// Per-selector weight (loya) when the period opened.
    pub selector_amounts: BTreeMap<Address, u128>,
    /// Accrued, not-yet-distributed net reward (micro-loya).
    pub reward_micro: u128,
}

impl RewardPeriod {
    pub fn new(total: u128, selector_amounts: BTreeMap<Address, u128>) -> Self {
        Self { total, selector_amounts, reward_micro: 0 }
    }
}

/// One deferred unit of distribution work: pay `reward_micro` out to
/// `selector_amounts` proportionally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistributionQueueItem {
    pub reporter: Address,
    /// Micro-loya to distribute.
    pub reward_micro: u128,
    /// Weight total the shares divide against.
    pub total: u128,
    pub selector_amounts: BTreeMap<Address, u128>,
}
