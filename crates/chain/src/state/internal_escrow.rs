//! Dispute fee escrow
//! Carves dispute fees and slash amounts proportionally out of every backing
//! selector's stake and moves them into the dispute pool, recording exactly
//! which (selector, validator, amount) origins paid so resolution can
//! reverse it. Deductions never invent share math: every token↔share
//! conversion goes through the ledger's own validator view.

use thiserror::Error;
use tracing::{debug, info};

use dpon_common::bank::{BankError, Pool, TokenTransfer};
use dpon_common::economic_constants::POWER_REDUCTION;
use dpon_common::staking::{LedgerError, StakingLedger, Validator};

use crate::tokenomics::allocate_proportional;
use crate::types::{Address, HashId};

use super::{DelegationsAmounts, ReporterState, TokenOriginInfo};

// ════════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    #[error("reporter {0} not found")]
    ReporterNotFound(Address),
    #[error("insufficient stake: reporter has {available} bonded, fee requires {requested}")]
    InsufficientStake { available: u128, requested: u128 },
    #[error("no stake snapshot for reporter {reporter} at height {height}")]
    SnapshotNotFound { reporter: Address, height: u64 },
    #[error("cannot escrow {requested} loya, snapshot holds {snapshot_total}")]
    ExceedsSnapshotTotal { snapshot_total: u128, requested: u128 },
    #[error("report power {reported} does not match snapshot power {snapshot}")]
    PowerMismatch { reported: u64, snapshot: u64 },
    #[error("no redelegation destination for selector {selector} from validator {validator}")]
    RedelegationDestinationNotFound { selector: Address, validator: Address },
    /// Stake the snapshot attributes to this origin cannot be located in the
    /// live ledger, its unbonding queue, or a redelegation destination.
    /// Losing track of it silently is unacceptable.
    #[error("unaccounted stake for selector {selector} at validator {validator}: {missing} loya")]
    UnaccountedStake { selector: Address, validator: Address, missing: u128 },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Bank(#[from] BankError),
}

/// Source pool an unbonded amount leaves, by the validator it left.
fn source_pool(validator: &Validator) -> Pool {
    if validator.is_bonded() {
        Pool::Bonded
    } else {
        Pool::NotBonded
    }
}

impl ReporterState {
    // ════════════════════════════════════════════════════════════════════════════
    // FLAT FEE FROM LIVE STAKE
    // ════════════════════════════════════════════════════════════════════════════

    /// Pull a flat dispute fee of `amount` loya proportionally out of every
    /// selector backing `reporter_addr`, against their LIVE bonded stake.
    ///
    /// Each selector pays `amount * selector_bonded / reporter_bonded`
    /// (floor, last selector absorbs the flooring dust). A selector's share
    /// cascades across its bonded delegations in validator order until
    /// covered. Every unbonded amount — the literal token count the ledger
    /// returned, not the request — lands in the `hash_id` fee tracker and
    /// moves into the dispute pool.
    ///
    /// Repeated calls with one `hash_id` accumulate in the same tracker.
    pub fn fee_from_reporter_stake<L: StakingLedger, B: TokenTransfer>(
        &mut self,
        ledger: &mut L,
        bank: &mut B,
        reporter_addr: &Address,
        amount: u128,
        hash_id: HashId,
    ) -> Result<(), EscrowError> {
        if !self.reporters.contains_key(reporter_addr) {
            return Err(EscrowError::ReporterNotFound(*reporter_addr));
        }
        if amount == 0 {
            return Ok(());
        }

        // 1. Live bonded breakdown per selector
        let mut breakdown: Vec<(Address, Vec<(Address, u128)>, u128)> = Vec::new();
        for selector in self.selectors_of(reporter_addr) {
            let mut per_validator: Vec<(Address, u128)> = Vec::new();
            let mut selector_total: u128 = 0;
            for delegation in ledger.delegator_delegations(&selector) {
                let validator = ledger.validator(&delegation.validator)?;
                if !validator.is_bonded() {
                    continue;
                }
                let tokens = validator.tokens_from_shares_truncated(delegation.shares);
                if tokens == 0 {
                    continue;
                }
                per_validator.push((delegation.validator, tokens));
                selector_total += tokens;
            }
            if selector_total > 0 {
                breakdown.push((selector, per_validator, selector_total));
            }
        }

        // 2. The fee cannot exceed what actually backs the reporter
        let reporter_total: u128 = breakdown.iter().map(|(_, _, t)| *t).sum();
        if amount > reporter_total {
            return Err(EscrowError::InsufficientStake {
                available: reporter_total,
                requested: amount,
            });
        }

        // 3. Proportional fee share per selector, exact to the last unit
        let totals: Vec<u128> = breakdown.iter().map(|(_, _, t)| *t).collect();
        let fee_shares = allocate_proportional(amount, &totals);

        // 4. Unbond each share, cascading across that selector's delegations
        let mut taken = DelegationsAmounts::new();
        for ((selector, per_validator, _), fee_share) in breakdown.iter().zip(fee_shares) {
            let mut remaining = fee_share;
            for (val_addr, available) in per_validator {
                if remaining == 0 {
                    break;
                }
                let take = remaining.min(*available);
                let validator = ledger.validator(val_addr)?;
                let shares = validator.shares_from_tokens(take)?;
                let returned = ledger.unbond(selector, val_addr, shares)?;
                bank.send_coins_from_module_to_module(
                    source_pool(&validator),
                    Pool::Dispute,
                    returned,
                )?;
                taken.push(TokenOriginInfo {
                    selector: *selector,
                    validator: *val_addr,
                    amount: returned,
                });
                remaining -= take;
            }
            if remaining > 0 {
                return Err(EscrowError::InsufficientStake {
                    available: fee_share - remaining,
                    requested: fee_share,
                });
            }
        }

        // 5. Accumulate into the dispute's fee tracker
        self.fee_paid_from_stake
            .entry(hash_id)
            .or_default()
            .extend_from(&taken);

        info!(reporter = %reporter_addr, amount, hash_id = %hash_id,
              moved = taken.total, "dispute fee taken from reporter stake");
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // SLASH ESCROW AGAINST A HISTORICAL SNAPSHOT
    // ════════════════════════════════════════════════════════════════════════════

    /// Escrow `amount` loya against the stake snapshot recorded for
    /// `(reporter, height)` — the exact origins that backed the disputed
    /// report.
    ///
    /// Each origin owes its proportional cut of `amount` (floor at micro
    /// precision; the final weighted origin absorbs the remainder so the
    /// deductions sum exactly to `amount`). Per origin the deduction
    /// cascades:
    ///
    /// 1. the live delegation at the snapshot validator;
    /// 2. that pair's unbonding-queue entries, oldest first (partially
    ///    consuming or removing entries);
    /// 3. the destination of a redelegation away from that validator.
    ///
    /// Anything still unlocatable is a fatal accounting error. Every
    /// deduction is recorded in the dispute's `DisputedDelegationAmounts`
    /// tracker for later reversal.
    pub fn escrow_reporter_stake<L: StakingLedger, B: TokenTransfer>(
        &mut self,
        ledger: &mut L,
        bank: &mut B,
        reporter_addr: &Address,
        power: u64,
        height: u64,
        amount: u128,
        hash_id: HashId,
    ) -> Result<(), EscrowError> {
        let snapshot = self
            .stake_snapshots
            .get(&(*reporter_addr, height))
            .cloned()
            .ok_or(EscrowError::SnapshotNotFound { reporter: *reporter_addr, height })?;

        let snapshot_power = (snapshot.total / POWER_REDUCTION) as u64;
        if snapshot_power != power {
            return Err(EscrowError::PowerMismatch { reported: power, snapshot: snapshot_power });
        }
        if amount > snapshot.total {
            return Err(EscrowError::ExceedsSnapshotTotal {
                snapshot_total: snapshot.total,
                requested: amount,
            });
        }
        if amount == 0 {
            return Ok(());
        }

        let parts: Vec<u128> = snapshot.token_origins.iter().map(|o| o.amount).collect();
        let owed_per_origin = allocate_proportional(amount, &parts);

        let mut taken = DelegationsAmounts::new();
        for (origin, owed) in snapshot.token_origins.iter().zip(owed_per_origin) {
            let mut owed = owed;
            if owed == 0 {
                continue;
            }

            // 1. live delegation at the snapshot validator
            owed = self.deduct_from_delegation(
                ledger,
                bank,
                &mut taken,
                &origin.selector,
                &origin.validator,
                owed,
            )?;

            // 2. unbonding queue at the same pair, oldest entries first
            if owed > 0 {
                owed = self.deduct_from_unbonding(
                    ledger,
                    bank,
                    &mut taken,
                    &origin.selector,
                    &origin.validator,
                    owed,
                )?;
            }

            // 3. redelegation destination fallback
            if owed > 0 {
                let redelegations = ledger.redelegations_from_src_validator(&origin.validator);
                let mine: Vec<_> = redelegations
                    .into_iter()
                    .filter(|r| r.delegator == origin.selector)
                    .collect();
                if mine.is_empty() {
                    return Err(EscrowError::RedelegationDestinationNotFound {
                        selector: origin.selector,
                        validator: origin.validator,
                    });
                }
                for redelegation in mine {
                    if owed == 0 {
                        break;
                    }
                    owed = self.deduct_from_delegation(
                        ledger,
                        bank,
                        &mut taken,
                        &origin.selector,
                        &redelegation.dst_validator,
                        owed,
                    )?;
                }
            }

            if owed > 0 {
                return Err(EscrowError::UnaccountedStake {
                    selector: origin.selector,
                    validator: origin.validator,
                    missing: owed,
                });
            }
        }

        self.disputed_delegation_amounts
            .entry(hash_id)
            .or_default()
            .extend_from(&taken);

        info!(reporter = %reporter_addr, height, amount, hash_id = %hash_id,
              moved = taken.total, "reporter stake escrowed for dispute");
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // DEDUCTION PRIMITIVES
    // ════════════════════════════════════════════════════════════════════════════

    /// Take up to `owed` from the live delegation (selector, validator).
    /// Returns what is still owed.
    fn deduct_from_delegation<L: StakingLedger, B: TokenTransfer>(
        &mut self,
        ledger: &mut L,
        bank: &mut B,
        taken: &mut DelegationsAmounts,
        selector: &Address,
        val_addr: &Address,
        owed: u128,
    ) -> Result<u128, EscrowError> {
        let delegation = match ledger.delegation(selector, val_addr) {
            Ok(d) => d,
            Err(LedgerError::DelegationNotFound { .. })
            | Err(LedgerError::ValidatorNotFound(_)) => return Ok(owed),
            Err(e) => return Err(e.into()),
        };
        let validator = ledger.validator(val_addr)?;
        let available = validator.tokens_from_shares_truncated(delegation.shares);
        let take = owed.min(available);
        if take == 0 {
            return Ok(owed);
        }
        let shares = validator.shares_from_tokens(take)?;
        let returned = ledger.unbond(selector, val_addr, shares)?;
        bank.send_coins_from_module_to_module(source_pool(&validator), Pool::Dispute, returned)?;
        taken.push(TokenOriginInfo { selector: *selector, validator: *val_addr, amount: returned });
        debug!(selector = %selector, validator = %val_addr, returned,
               "escrow deducted from live delegation");
        Ok(owed - take)
    }

    /// Draw up to `owed` out of the unbonding entries between (selector,
    /// validator), oldest entry first. Entries drain partially or vanish.
    /// Returns what is still owed.
    fn deduct_from_unbonding<L: StakingLedger, B: TokenTransfer>(
        &mut self,
        ledger: &mut L,
        bank: &mut B,
        taken: &mut DelegationsAmounts,
        selector: &Address,
        val_addr: &Address,
        owed: u128,
    ) -> Result<u128, EscrowError> {
        let mut ubd = match ledger.unbonding_delegation(selector, val_addr) {
            Ok(u) => u,
            Err(LedgerError::UnbondingDelegationNotFound { .. }) => return Ok(owed),
            Err(e) => return Err(e.into()),
        };
        let mut owed = owed;
        let mut drawn_total: u128 = 0;
        for entry in ubd.entries.iter_mut() {
            if owed == 0 {
                break;
            }
            let draw = owed.min(entry.balance);
            if draw == 0 {
                continue;
            }
            entry.balance -= draw;
            owed -= draw;
            drawn_total += draw;
            taken.push(TokenOriginInfo {
                selector: *selector,
                validator: *val_addr,
                amount: draw,
            });
        }
        if drawn_total == 0 {
            return Ok(owed);
        }
        ubd.entries.retain(|e| e.balance > 0);
        if ubd.entries.is_empty() {
            ledger.remove_unbonding_delegation(selector, val_addr);
        } else {
            ledger.set_unbonding_delegation(ubd);
        }
        // unbonding tokens sit in the not-bonded pool
        bank.send_coins_from_module_to_module(Pool::NotBonded, Pool::Dispute, drawn_total)?;
        debug!(selector = %selector, validator = %val_addr, drawn_total,
               "escrow drew down unbonding entries");
        Ok(owed)
    }
}
