//! Stake aggregation
//! Computes a reporter's live bonded power by walking its selectors'
//! validator delegations, and records the evidentiary snapshot any later
//! dispute will slash against.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info};

use dpon_common::staking::{LedgerError, StakingLedger};

use crate::types::Address;

use super::{DelegationsAmounts, ReporterState, RewardPeriod, TokenOriginInfo};

// ════════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakeError {
    #[error("reporter {0} not found")]
    ReporterNotFound(Address),
    #[error("reporter {0} is in jail")]
    ReporterJailed(Address),
    /// The reverse index names a selector the selection store doesn't have.
    /// Always a bug; never skipped.
    #[error("selector {0} missing from the selection store")]
    SelectorRecordMissing(Address),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ReporterState {
    // ════════════════════════════════════════════════════════════════════════════
    // STAKE AGGREGATION
    // ════════════════════════════════════════════════════════════════════════════

    /// Total BONDED tokens backing `reporter_addr` right now.
    ///
    /// Side effects, in order:
    /// 1. the previous reward period (if it still holds undistributed
    ///    reward) is closed into the distribution queue;
    /// 2. a fresh reward period opens on this aggregation's selector
    ///    weights — the only way a reward-accrual window ever opens;
    /// 3. the full token-origin breakdown is written as the stake snapshot
    ///    for `(reporter, height)`.
    ///
    /// Fails for unknown or jailed reporters. Conversion truncates toward
    /// zero through the ledger's own math, so calling this twice against an
    /// unchanged ledger returns the same total.
    pub fn reporter_stake<L: StakingLedger>(
        &mut self,
        ledger: &L,
        reporter_addr: &Address,
        height: u64,
        now: u64,
    ) -> Result<u128, StakeError> {
        let reporter = self
            .reporters
            .get(reporter_addr)
            .ok_or(StakeError::ReporterNotFound(*reporter_addr))?;
        if reporter.jailed {
            return Err(StakeError::ReporterJailed(*reporter_addr));
        }

        let max_validators = ledger.max_validators();
        let mut delegates = DelegationsAmounts::new();

        for sel_addr in self.selectors_of(reporter_addr) {
            let selection = self
                .selectors
                .get(&sel_addr)
                .ok_or(StakeError::SelectorRecordMissing(sel_addr))?;

            // selectors locked out for switching reporters back no report
            if selection.locked_until > now {
                debug!(selector = %sel_addr, locked_until = selection.locked_until,
                       "selector locked, skipping");
                continue;
            }

            if selection.delegations_count > max_validators {
                // More delegations than the bonded set can hold: walking the
                // bonded set is the cheaper bound.
                for validator in ledger.validators_by_power() {
                    if !validator.is_bonded() {
                        continue;
                    }
                    match ledger.delegation(&sel_addr, &validator.operator) {
                        Ok(delegation) => {
                            let tokens =
                                validator.tokens_from_shares_truncated(delegation.shares);
                            delegates.push(TokenOriginInfo {
                                selector: sel_addr,
                                validator: validator.operator,
                                amount: tokens,
                            });
                        }
                        Err(LedgerError::DelegationNotFound { .. }) => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
            } else {
                // Few delegations: walk the selector's own list and keep the
                // bonded ones.
                for delegation in ledger.delegator_delegations(&sel_addr) {
                    let validator = ledger.validator(&delegation.validator)?;
                    if !validator.is_bonded() {
                        continue;
                    }
                    let tokens = validator.tokens_from_shares_truncated(delegation.shares);
                    delegates.push(TokenOriginInfo {
                        selector: sel_addr,
                        validator: validator.operator,
                        amount: tokens,
                    });
                }
            }
        }

        let total = delegates.total;

        // Close the old accrual window, open the new one on these weights.
        self.close_period_to_queue(reporter_addr);
        let mut selector_amounts: BTreeMap<Address, u128> = BTreeMap::new();
        for origin in &delegates.token_origins {
            *selector_amounts.entry(origin.selector).or_insert(0) += origin.amount;
        }
        self.reward_periods
            .insert(*reporter_addr, RewardPeriod::new(total, selector_amounts));

        // The evidentiary snapshot a dispute at this height slashes against.
        self.stake_snapshots.insert((*reporter_addr, height), delegates);

        if let Some(rep) = self.reporters.get_mut(reporter_addr) {
            rep.total_tokens = total;
        }

        info!(reporter = %reporter_addr, height, total, "reporter stake aggregated");
        Ok(total)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // SNAPSHOT QUERIES
    // ════════════════════════════════════════════════════════════════════════════

    /// The reporter's snapshot total at the most recent aggregation at or
    /// below `height`. Zero if it never aggregated by then.
    pub fn reporter_tokens_at(&self, reporter: &Address, height: u64) -> u128 {
        self.stake_snapshots
            .range((*reporter, 0u64)..=(*reporter, height))
            .next_back()
            .map(|(_, snapshot)| snapshot.total)
            .unwrap_or(0)
    }

    /// The full token-origin snapshot at exactly `(reporter, height)`.
    pub fn token_origins_at(
        &self,
        reporter: &Address,
        height: u64,
    ) -> Option<&DelegationsAmounts> {
        self.stake_snapshots.get(&(*reporter, height))
    }

    /// Total bonded tokens across the network, from the staking ledger.
    pub fn total_reporter_power<L: StakingLedger>(&self, ledger: &L) -> u128 {
        ledger.total_bonded_tokens()
    }
}
