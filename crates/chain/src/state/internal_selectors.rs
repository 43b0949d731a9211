//! Reporter & selector lifecycle
//! Registration, selection, switching, eviction, and reporter edits. These
//! are the selector-facing entry points; everything validates fully before
//! the first mutation.

use thiserror::Error;
use tracing::info;

use dpon_common::economic_constants::BASIS_POINTS;
use dpon_common::staking::{LedgerError, StakingLedger};

use crate::types::Address;

use super::{OracleReporter, ReporterState, Selection};

/// Minimum seconds between reporter edits.
const EDIT_COOLDOWN_SECS: u64 = 12 * 60 * 60;

/// Maximum commission movement per edit, in basis points (1%).
const MAX_COMMISSION_STEP_BPS: u16 = 100;

// ════════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════════

/// Failures of the reporter/selector lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("commission rate {bps} bps outside [{min_bps}, {max_bps}]")]
    InvalidCommission { bps: u16, min_bps: u16, max_bps: u16 },
    #[error("min tokens required must be positive and at least the module minimum {min_loya}")]
    MinTokensBelowParam { min_loya: u128 },
    #[error("moniker cannot be empty")]
    EmptyMoniker,
    #[error("address does not hold the minimum bonded stake: required {required}, bonded {actual}")]
    BelowMinimumStake { required: u128, actual: u128 },
    #[error("address {0} is already a reporter")]
    AlreadyReporter(Address),
    #[error("selector {0} already exists")]
    SelectorExists(Address),
    #[error("selector {0} not found")]
    SelectorNotFound(Address),
    #[error("reporter {0} not found")]
    ReporterNotFound(Address),
    #[error("reporter {reporter} has reached max selectors ({max})")]
    MaxSelectorsReached { reporter: Address, max: u32 },
    #[error("reporter's min requirement not met: required {required}, bonded {actual}")]
    MinRequirementNotMet { required: u128, actual: u128 },
    #[error("selector has {count} delegations, more than the allowed {max}")]
    TooManyDelegations { count: u32, max: u32 },
    #[error("selector cannot be removed if it is the reporter's own address")]
    OwnSelectionImmovable,
    #[error("selector can't be removed if reporter's min requirement is met")]
    MinRequirementStillMet,
    #[error("selector can only be removed if reporter has reached max selectors")]
    ReporterNotCapped,
    #[error("reporters can only be edited every {EDIT_COOLDOWN_SECS} seconds")]
    EditTooSoon,
    #[error("commission rate cannot change by more than {MAX_COMMISSION_STEP_BPS} bps per edit")]
    CommissionStepTooLarge,
    #[error("min tokens required cannot change by more than 10% per edit")]
    MinTokensStepTooLarge,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ReporterState {
    // ════════════════════════════════════════════════════════════════════════════
    // LEDGER WALKS
    // ════════════════════════════════════════════════════════════════════════════

    /// Sum of a delegator's BONDED tokens plus its total delegation count.
    ///
    /// Only delegations to currently-bonded validators contribute tokens;
    /// every delegation counts toward the count, bonded or not.
    pub fn check_selector_delegations<L: StakingLedger>(
        &self,
        ledger: &L,
        addr: &Address,
    ) -> Result<(u128, u32), SelectionError> {
        let mut tokens: u128 = 0;
        let mut count: u32 = 0;
        for delegation in ledger.delegator_delegations(addr) {
            let validator = ledger.validator(&delegation.validator)?;
            count += 1;
            if validator.is_bonded() {
                tokens += validator.tokens_from_shares_truncated(delegation.shares);
            }
        }
        Ok((tokens, count))
    }

    /// Whether `addr` holds at least `min_required` bonded tokens.
    /// Short-circuits once the minimum is reached.
    pub fn has_min<L: StakingLedger>(
        &self,
        ledger: &L,
        addr: &Address,
        min_required: u128,
    ) -> Result<bool, SelectionError> {
        let mut tokens: u128 = 0;
        for delegation in ledger.delegator_delegations(addr) {
            let validator = ledger.validator(&delegation.validator)?;
            if !validator.is_bonded() {
                continue;
            }
            tokens += validator.tokens_from_shares_truncated(delegation.shares);
            if tokens >= min_required {
                return Ok(true);
            }
        }
        Ok(tokens >= min_required)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // CREATE REPORTER
    // ════════════════════════════════════════════════════════════════════════════

    /// Register a new reporter.
    ///
    /// An existing selector may promote itself to a reporter; its selection
    /// moves to the new reporter record, carrying the switching lockout when
    /// its previous reporter's stake was part of a report at `height`.
    pub fn create_reporter<L: StakingLedger>(
        &mut self,
        ledger: &L,
        addr: Address,
        commission_bps: u16,
        min_tokens_required: u128,
        moniker: String,
        height: u64,
        now: u64,
    ) -> Result<(), SelectionError> {
        // 1. Static validation
        if moniker.is_empty() {
            return Err(SelectionError::EmptyMoniker);
        }
        if min_tokens_required == 0 || min_tokens_required < self.params.min_loya {
            return Err(SelectionError::MinTokensBelowParam { min_loya: self.params.min_loya });
        }
        if commission_bps < self.params.min_commission_bps
            || u128::from(commission_bps) > BASIS_POINTS
        {
            return Err(SelectionError::InvalidCommission {
                bps: commission_bps,
                min_bps: self.params.min_commission_bps,
                max_bps: BASIS_POINTS as u16,
            });
        }

        // 2. The registrant must hold the module minimum with a BONDED validator
        let (bonded_tokens, count) = self.check_selector_delegations(ledger, &addr)?;
        if bonded_tokens < self.params.min_loya {
            return Err(SelectionError::BelowMinimumStake {
                required: self.params.min_loya,
                actual: bonded_tokens,
            });
        }

        // 3. Existing selector: promote, never re-register
        if let Some(selection) = self.selectors.get(&addr).cloned() {
            if selection.reporter == addr {
                return Err(SelectionError::AlreadyReporter(addr));
            }
            let mut selection = selection;
            // lockout if the previous reporter's stake backed a report
            if self.reporter_tokens_at(&selection.reporter, height) > 0 {
                selection.locked_until = now + ledger.unbonding_time_secs();
            }
            selection.reporter = addr;
            self.set_selection(addr, selection);
            self.reporters.insert(
                addr,
                OracleReporter::new(commission_bps, min_tokens_required, moniker, now),
            );
            info!(reporter = %addr, commission_bps, "created reporter from selector");
            return Ok(());
        }

        // 4. Fresh registration: reporter record plus self-selection
        self.reporters.insert(
            addr,
            OracleReporter::new(commission_bps, min_tokens_required, moniker, now),
        );
        self.set_selection(addr, Selection::new(addr, count));
        info!(reporter = %addr, commission_bps, "created reporter");
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // SELECT / SWITCH / REMOVE
    // ════════════════════════════════════════════════════════════════════════════

    /// Join a reporter as a new selector.
    pub fn select_reporter<L: StakingLedger>(
        &mut self,
        ledger: &L,
        selector: Address,
        reporter: Address,
    ) -> Result<(), SelectionError> {
        // 1. New selectors only; switching is a separate, locked operation
        if self.selectors.contains_key(&selector) {
            return Err(SelectionError::SelectorExists(selector));
        }
        // 2. Reporter must exist
        let rep = self
            .reporters
            .get(&reporter)
            .ok_or(SelectionError::ReporterNotFound(reporter))?;
        // 3. Selector cap
        if self.num_of_selectors(&reporter) >= self.params.max_selectors as usize {
            return Err(SelectionError::MaxSelectorsReached {
                reporter,
                max: self.params.max_selectors,
            });
        }
        // 4. The selector must meet the reporter's own minimum
        let (bonded_tokens, count) = self.check_selector_delegations(ledger, &selector)?;
        if bonded_tokens < rep.min_tokens_required {
            return Err(SelectionError::MinRequirementNotMet {
                required: rep.min_tokens_required,
                actual: bonded_tokens,
            });
        }
        // 5. Bound the per-selector iteration cost
        if count > self.params.max_num_of_delegations {
            return Err(SelectionError::TooManyDelegations {
                count,
                max: self.params.max_num_of_delegations,
            });
        }
        self.set_selection(selector, Selection::new(reporter, count));
        info!(selector = %selector, reporter = %reporter, "reporter selected");
        Ok(())
    }

    /// Move an existing selection to another reporter.
    ///
    /// If the previous reporter's stake was part of a report at `height`,
    /// the selection is locked out of aggregation for the unbonding period
    /// so the same stake cannot back two reports.
    pub fn switch_reporter<L: StakingLedger>(
        &mut self,
        ledger: &L,
        selector: Address,
        new_reporter: Address,
        height: u64,
        now: u64,
    ) -> Result<(), SelectionError> {
        // 1. Must already be a selector
        let mut selection = self
            .selectors
            .get(&selector)
            .cloned()
            .ok_or(SelectionError::SelectorNotFound(selector))?;
        let prev_reporter = selection.reporter;
        // 2. Target must exist
        let rep = self
            .reporters
            .get(&new_reporter)
            .ok_or(SelectionError::ReporterNotFound(new_reporter))?;
        let min_required = rep.min_tokens_required;
        // 3. Selector cap on the target
        if self.num_of_selectors(&new_reporter) >= self.params.max_selectors as usize {
            return Err(SelectionError::MaxSelectorsReached {
                reporter: new_reporter,
                max: self.params.max_selectors,
            });
        }
        // 4. Must meet the target's minimum
        if !self.has_min(ledger, &selector, min_required)? {
            return Err(SelectionError::MinRequirementNotMet {
                required: min_required,
                actual: 0,
            });
        }
        // 5. All checks passed; a reporter stepping down drops its record
        if prev_reporter == selector {
            self.reporters.remove(&selector);
        }
        // 6. Lockout when the previous reporter's stake backed a report
        if self.reporter_tokens_at(&prev_reporter, height) > 0 {
            selection.locked_until = now + ledger.unbonding_time_secs();
        }
        selection.reporter = new_reporter;
        self.set_selection(selector, selection);
        info!(
            selector = %selector,
            previous = %prev_reporter,
            reporter = %new_reporter,
            "switched reporter"
        );
        Ok(())
    }

    /// Permissionless eviction of a selector that fell below its reporter's
    /// minimum, to free a slot on a capped reporter.
    pub fn remove_selector<L: StakingLedger>(
        &mut self,
        ledger: &L,
        selector: Address,
    ) -> Result<(), SelectionError> {
        // 1. Selection and its reporter must exist
        let selection = self
            .selectors
            .get(&selector)
            .cloned()
            .ok_or(SelectionError::SelectorNotFound(selector))?;
        let rep = self
            .reporters
            .get(&selection.reporter)
            .ok_or(SelectionError::ReporterNotFound(selection.reporter))?;
        // 2. Never the reporter's own self-selection
        if selection.reporter == selector {
            return Err(SelectionError::OwnSelectionImmovable);
        }
        // 3. Only selectors below the minimum are evictable
        if self.has_min(ledger, &selector, rep.min_tokens_required)? {
            return Err(SelectionError::MinRequirementStillMet);
        }
        // 4. Only when the reporter is actually full
        if self.num_of_selectors(&selection.reporter) < self.params.max_selectors as usize {
            return Err(SelectionError::ReporterNotCapped);
        }
        self.remove_selection(&selector);
        info!(selector = %selector, reporter = %selection.reporter, "selector removed");
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // EDIT & MAINTENANCE
    // ════════════════════════════════════════════════════════════════════════════

    /// Rate-limited, bounded-drift reconfiguration of a reporter.
    pub fn edit_reporter(
        &mut self,
        addr: Address,
        commission_bps: u16,
        min_tokens_required: u128,
        moniker: String,
        now: u64,
    ) -> Result<(), SelectionError> {
        if moniker.is_empty() {
            return Err(SelectionError::EmptyMoniker);
        }
        if min_tokens_required == 0 || min_tokens_required < self.params.min_loya {
            return Err(SelectionError::MinTokensBelowParam { min_loya: self.params.min_loya });
        }
        if commission_bps < self.params.min_commission_bps
            || u128::from(commission_bps) > BASIS_POINTS
        {
            return Err(SelectionError::InvalidCommission {
                bps: commission_bps,
                min_bps: self.params.min_commission_bps,
                max_bps: BASIS_POINTS as u16,
            });
        }
        let rep = self
            .reporters
            .get_mut(&addr)
            .ok_or(SelectionError::ReporterNotFound(addr))?;
        if now.saturating_sub(rep.last_updated) < EDIT_COOLDOWN_SECS {
            return Err(SelectionError::EditTooSoon);
        }
        let commission_step = rep.commission_bps.abs_diff(commission_bps);
        if commission_step > MAX_COMMISSION_STEP_BPS {
            return Err(SelectionError::CommissionStepTooLarge);
        }
        let min_tokens_step = rep.min_tokens_required.abs_diff(min_tokens_required);
        // at most a 10% move relative to the current requirement
        if min_tokens_step * 10 > rep.min_tokens_required {
            return Err(SelectionError::MinTokensStepTooLarge);
        }
        rep.commission_bps = commission_bps;
        rep.min_tokens_required = min_tokens_required;
        rep.moniker = moniker;
        rep.last_updated = now;
        Ok(())
    }

    /// Refresh the stored delegation count behind the aggregation strategy
    /// choice. Call after a selector's underlying delegations change.
    pub fn sync_delegation_count<L: StakingLedger>(
        &mut self,
        ledger: &L,
        selector: &Address,
    ) -> Result<u32, SelectionError> {
        let (_, count) = self.check_selector_delegations(ledger, selector)?;
        let selection = self
            .selectors
            .get_mut(selector)
            .ok_or(SelectionError::SelectorNotFound(*selector))?;
        selection.delegations_count = count;
        Ok(count)
    }
}
