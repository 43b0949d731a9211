//! Reward distribution engine
//! Commission split on accrual, bounded queue settlement, and tip
//! withdrawal. Rewards accrue in micro-loya against the selector weights the
//! last stake aggregation captured.

use thiserror::Error;
use tracing::{debug, info, warn};

use dpon_common::bank::{BankError, Pool, TokenTransfer};
use dpon_common::economic_constants::{micro_remainder, micro_whole};
use dpon_common::staking::{BondStatus, LedgerError, StakingLedger};

use crate::tokenomics::commission_split;
use crate::types::Address;

use super::{DistributionQueueItem, ReporterState};

use std::collections::BTreeMap;

// ════════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewardError {
    #[error("reporter {0} not found")]
    ReporterNotFound(Address),
    #[error("no tips to withdraw")]
    NoTipsToWithdraw,
    #[error("chosen validator {0} must be bonded")]
    ValidatorNotBonded(Address),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Bank(#[from] BankError),
}

impl ReporterState {
    // ════════════════════════════════════════════════════════════════════════════
    // ACCRUAL
    // ════════════════════════════════════════════════════════════════════════════

    /// Accrue `reward_micro` (micro-loya) to a reporter.
    ///
    /// Commission is credited immediately and unconditionally to the
    /// reporter's own tips balance. The net remainder is banked into the
    /// reporter's open reward period; if no period is open — stake
    /// aggregation has not run for this settlement cycle — the net portion
    /// is dropped. Aggregation before accrual is the required call order.
    pub fn divvy_tips(
        &mut self,
        reporter_addr: &Address,
        reward_micro: u128,
    ) -> Result<(), RewardError> {
        let reporter = self
            .reporters
            .get(reporter_addr)
            .ok_or(RewardError::ReporterNotFound(*reporter_addr))?;

        let split = commission_split(reward_micro, reporter.commission_bps);
        if split.commission > 0 {
            *self.selector_tips.entry(*reporter_addr).or_insert(0) += split.commission;
        }

        match self.reward_periods.get_mut(reporter_addr) {
            Some(period) => {
                period.reward_micro += split.net_reward;
                debug!(reporter = %reporter_addr, commission = split.commission,
                       net = split.net_reward, "tips divvied");
            }
            None => {
                if split.net_reward > 0 {
                    warn!(reporter = %reporter_addr, net = split.net_reward,
                          "no open reward period; net reward dropped");
                }
            }
        }
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // PERIOD CLOSE & SETTLEMENT
    // ════════════════════════════════════════════════════════════════════════════

    /// Move the reporter's open period into the distribution queue if it
    /// holds undistributed reward. Called by stake aggregation before it
    /// overwrites the period's weights.
    pub(crate) fn close_period_to_queue(&mut self, reporter_addr: &Address) {
        let Some(period) = self.reward_periods.get_mut(reporter_addr) else {
            return;
        };
        if period.reward_micro == 0 {
            return;
        }
        let item = DistributionQueueItem {
            reporter: *reporter_addr,
            reward_micro: period.reward_micro,
            total: period.total,
            selector_amounts: period.selector_amounts.clone(),
        };
        period.reward_micro = 0;
        let pos = self.queue_tail;
        self.distribution_queue.insert(pos, item);
        self.queue_tail += 1;
        debug!(reporter = %reporter_addr, pos, "period closed into distribution queue");
    }

    /// Immediately settle a reporter's open period, bypassing the queue.
    ///
    /// Used when a selector needs an up-to-date tips balance before
    /// withdrawal. No-op when nothing is pending. The period's weights are
    /// retained after its reward resets to zero.
    pub fn settle_reporter(&mut self, reporter_addr: &Address) -> Result<(), RewardError> {
        let Some(period) = self.reward_periods.get_mut(reporter_addr) else {
            return Ok(());
        };
        if period.reward_micro == 0 {
            return Ok(());
        }
        let reward = period.reward_micro;
        let total = period.total;
        let amounts = period.selector_amounts.clone();
        period.reward_micro = 0;
        self.credit_selector_shares(reporter_addr, reward, total, &amounts);
        Ok(())
    }

    /// Proportional credit of `reward_micro` across `amounts`.
    ///
    /// Zero-weight selectors are skipped. No remainder redistribution: the
    /// flooring dust (bounded by one micro-loya per selector) stays
    /// unaccounted. A zero weight total cannot be divided; the reward is
    /// dropped loudly.
    fn credit_selector_shares(
        &mut self,
        reporter_addr: &Address,
        reward_micro: u128,
        total: u128,
        amounts: &BTreeMap<Address, u128>,
    ) {
        if total == 0 {
            warn!(reporter = %reporter_addr, reward_micro,
                  "zero-weight period; reward dropped");
            return;
        }
        for (selector, amount) in amounts {
            let share = reward_micro * amount / total;
            if share == 0 {
                continue;
            }
            *self.selector_tips.entry(*selector).or_insert(0) += share;
        }
    }

    /// Distribute one queued item to its selectors.
    pub fn distribute_queue_item(&mut self, item: &DistributionQueueItem) {
        let reporter = item.reporter;
        self.credit_selector_shares(&reporter, item.reward_micro, item.total, &item.selector_amounts);
    }

    /// Drain up to `max_items` entries from the head of the distribution
    /// queue. Called once per block; the cap is the backpressure bound that
    /// spreads a burst of period closes across blocks.
    ///
    /// A missing entry (already consumed) is skipped without counting
    /// against `max_items`. Returns how many items were distributed.
    pub fn process_distribution_queue(&mut self, max_items: u32) -> Result<u32, RewardError> {
        let mut processed: u32 = 0;
        while self.queue_head < self.queue_tail && processed < max_items {
            let pos = self.queue_head;
            let Some(item) = self.distribution_queue.get(&pos).cloned() else {
                // already consumed; not an error
                self.queue_head += 1;
                continue;
            };
            // distribute first; only a fully-applied item advances the head
            self.distribute_queue_item(&item);
            self.distribution_queue.remove(&pos);
            self.queue_head += 1;
            processed += 1;
        }
        if processed > 0 {
            debug!(processed, remaining = self.distribution_queue_len(),
                   "distribution queue processed");
        }
        Ok(processed)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // WITHDRAWAL
    // ════════════════════════════════════════════════════════════════════════════

    /// Withdraw a selector's accrued tips by re-delegating them to a chosen
    /// BONDED validator.
    ///
    /// The micro balance truncates to whole loya for delegation; the
    /// sub-loya remainder stays on the books for a later withdrawal. The
    /// delegated amount moves `TipsEscrow -> Bonded`. Returns the whole-loya
    /// amount withdrawn.
    pub fn withdraw_tip<L: StakingLedger, B: TokenTransfer>(
        &mut self,
        ledger: &mut L,
        bank: &mut B,
        selector: &Address,
        validator_addr: &Address,
    ) -> Result<u128, RewardError> {
        let tips = self.tips_of(selector);
        let whole = micro_whole(tips);
        if whole == 0 {
            return Err(RewardError::NoTipsToWithdraw);
        }
        let validator = ledger.validator(validator_addr)?;
        if !validator.is_bonded() {
            return Err(RewardError::ValidatorNotBonded(*validator_addr));
        }

        // move the coins first; a failed delegate rolls the transfer back
        bank.send_coins_from_module_to_module(Pool::TipsEscrow, Pool::Bonded, whole)?;
        if let Err(e) =
            ledger.delegate(selector, whole, BondStatus::Bonded, validator_addr, false)
        {
            let _ = bank.send_coins_from_module_to_module(Pool::Bonded, Pool::TipsEscrow, whole);
            return Err(e.into());
        }

        let remainder = micro_remainder(tips);
        if remainder == 0 {
            self.selector_tips.remove(selector);
        } else {
            self.selector_tips.insert(*selector, remainder);
        }
        info!(selector = %selector, validator = %validator_addr, amount = whole,
              "tip withdrawn");
        Ok(whole)
    }
}
