//! # Reporter State Management Module
//!
//! ENTRY POINT and FACADE for the reporter accounting state: which selectors
//! back which reporters, stake snapshots, reward periods, the distribution
//! queue, tips balances, and dispute escrow trackers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         mod.rs (FACADE)                         │
//! │  - ReporterState struct definition                              │
//! │  - Constructor new()                                            │
//! │  - Index-maintaining accessors                                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//!  ┌──────────────┐         ┌──────────────┐         ┌──────────────┐
//!  │  Selectors   │         │    Stake     │         │   Rewards    │
//!  │  Lifecycle   │         │  Aggregation │         │ Distribution │
//!  └──────────────┘         └──────────────┘         └──────────────┘
//!          │                         │                         │
//!          ▼                         ▼                         ▼
//!  ┌──────────────┐         ┌──────────────┐         ┌──────────────┐
//!  │   Dispute    │         │    Slash     │         │     Jail     │
//!  │  Fee Escrow  │         │Reversal/Refnd│         │  Controller  │
//!  └──────────────┘         └──────────────┘         └──────────────┘
//! ```
//!
//! ## Module Structure
//!
//! | Module | Function |
//! |--------|----------|
//! | `internal_model` | Record types: OracleReporter, Selection, TokenOriginInfo, periods, queue items |
//! | `internal_selectors` | Reporter/selector lifecycle: create, select, switch, remove, edit |
//! | `internal_stake` | Stake aggregation: reporter_stake, snapshots, period open/close |
//! | `internal_rewards` | Reward engine: divvy_tips, queue processing, settlement, tip withdrawal |
//! | `internal_escrow` | Dispute fee escrow: fee_from_reporter_stake, escrow_reporter_stake |
//! | `internal_refund` | Slash reversal: return_slashed_tokens, fee_refund |
//! | `internal_jail` | Jail controller: jail, unjail, failed-dispute release |
//!
//! ## Determinism
//!
//! Every keyed collection is a `BTreeMap`, so iteration order is stable and
//! identical across runs. State-changing operations either fully commit or
//! return an error having touched nothing observable. The staking ledger and
//! bank are never owned here — they are passed in per call as capabilities.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::params::Params;
use crate::types::{Address, HashId};

mod internal_model;

mod internal_selectors;

mod internal_stake;

mod internal_rewards;

mod internal_escrow;

mod internal_refund;

mod internal_jail;

pub use internal_model::{
    DelegationsAmounts, DistributionQueueItem, OracleReporter, RewardPeriod, Selection,
    TokenOriginInfo,
};
pub use internal_escrow::EscrowError;
pub use internal_jail::JailError;
pub use internal_refund::RefundError;
pub use internal_rewards::RewardError;
pub use internal_selectors::SelectionError;
pub use internal_stake::StakeError;

/// The reporter module's keyed state.
///
/// Owns every map the accounting core persists. Canonical share/token
/// balances live in the external staking ledger; everything here is either
/// module-native (selections, tips, queue) or a derived snapshot of the
/// ledger (stake snapshots, escrow trackers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterState {
    /// Module parameters.
    pub params: Params,

    // ════════════════════════════════════════════════════════════════════
    // IDENTITIES
    // ════════════════════════════════════════════════════════════════════

    /// reporter address -> reporter record
    pub reporters: BTreeMap<Address, OracleReporter>,

    /// selector address -> its selection (exactly one reporter each)
    pub selectors: BTreeMap<Address, Selection>,

    /// Reverse index: reporter -> the selectors backing it.
    /// Maintained exclusively by `set_selection` / `remove_selection`.
    pub selectors_by_reporter: BTreeMap<Address, BTreeSet<Address>>,

    // ════════════════════════════════════════════════════════════════════
    // STAKE SNAPSHOTS
    // ════════════════════════════════════════════════════════════════════

    /// (reporter, block height) -> token origins backing that reporter at
    /// that height. Written by stake aggregation, immutable once written,
    /// read later by dispute escrow.
    pub stake_snapshots: BTreeMap<(Address, u64), DelegationsAmounts>,

    // ════════════════════════════════════════════════════════════════════
    // REWARDS
    // ════════════════════════════════════════════════════════════════════

    /// reporter -> open reward-accrual period. Exists only after stake
    /// aggregation has run; absence makes reward accrual a no-op.
    pub reward_periods: BTreeMap<Address, RewardPeriod>,

    /// Deferred distribution work, keyed by queue position.
    pub distribution_queue: BTreeMap<u64, DistributionQueueItem>,

    /// First unprocessed queue position.
    pub queue_head: u64,

    /// Next queue position to assign.
    pub queue_tail: u64,

    /// selector -> accrued tips in micro-loya (fractional credit carried
    /// exactly; truncated to whole loya only on withdrawal).
    pub selector_tips: BTreeMap<Address, u128>,

    // ════════════════════════════════════════════════════════════════════
    // DISPUTE ESCROW TRACKERS
    // ════════════════════════════════════════════════════════════════════

    /// dispute hash id -> token origins pulled from stake to pay flat fees.
    /// Accumulates across repeated fee events for the same dispute.
    pub fee_paid_from_stake: BTreeMap<HashId, DelegationsAmounts>,

    /// dispute hash id -> token origins deducted for a slash escrow.
    /// Consumed (deleted) exactly once by `return_slashed_tokens`.
    pub disputed_delegation_amounts: BTreeMap<HashId, DelegationsAmounts>,
}

impl ReporterState {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            reporters: BTreeMap::new(),
            selectors: BTreeMap::new(),
            selectors_by_reporter: BTreeMap::new(),
            stake_snapshots: BTreeMap::new(),
            reward_periods: BTreeMap::new(),
            distribution_queue: BTreeMap::new(),
            queue_head: 0,
            queue_tail: 0,
            selector_tips: BTreeMap::new(),
            fee_paid_from_stake: BTreeMap::new(),
            disputed_delegation_amounts: BTreeMap::new(),
        }
    }

    // ════════════════════════════════════════════════════════════════════
    // BASIC ACCESSORS
    // ════════════════════════════════════════════════════════════════════

    pub fn reporter(&self, addr: &Address) -> Option<&OracleReporter> {
        self.reporters.get(addr)
    }

    pub fn selection(&self, addr: &Address) -> Option<&Selection> {
        self.selectors.get(addr)
    }

    /// Number of selectors a reporter currently has.
    pub fn num_of_selectors(&self, reporter: &Address) -> usize {
        self.selectors_by_reporter
            .get(reporter)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Selectors backing a reporter, in address order.
    pub fn selectors_of(&self, reporter: &Address) -> Vec<Address> {
        self.selectors_by_reporter
            .get(reporter)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Accrued tips of a selector in micro-loya. Missing balance reads zero.
    pub fn tips_of(&self, selector: &Address) -> u128 {
        self.selector_tips.get(selector).copied().unwrap_or(0)
    }

    /// Queue length still awaiting processing.
    pub fn distribution_queue_len(&self) -> u64 {
        self.queue_tail - self.queue_head
    }

    // ════════════════════════════════════════════════════════════════════
    // INDEX-MAINTAINING MUTATORS
    // ════════════════════════════════════════════════════════════════════

    /// Insert or replace a selection, keeping the reverse index in sync.
    pub(crate) fn set_selection(&mut self, selector: Address, selection: Selection) {
        if let Some(prev) = self.selectors.get(&selector) {
            if let Some(set) = self.selectors_by_reporter.get_mut(&prev.reporter) {
                set.remove(&selector);
                if set.is_empty() {
                    self.selectors_by_reporter.remove(&prev.reporter);
                }
            }
        }
        self.selectors_by_reporter
            .entry(selection.reporter)
            .or_default()
            .insert(selector);
        self.selectors.insert(selector, selection);
    }

    /// Remove a selection and its reverse-index entry.
    pub(crate) fn remove_selection(&mut self, selector: &Address) {
        if let Some(prev) = self.selectors.remove(selector) {
            if let Some(set) = self.selectors_by_reporter.get_mut(&prev.reporter) {
                set.remove(selector);
                if set.is_empty() {
                    self.selectors_by_reporter.remove(&prev.reporter);
                }
            }
        }
    }
}

impl Default for ReporterState {
    fn default() -> Self {
        Self::new(Params::default())
    }
}
