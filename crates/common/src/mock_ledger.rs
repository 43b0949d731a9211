//! Mock Staking Ledger & Bank for Testing
//!
//! Fully in-memory implementations of the [`StakingLedger`] and
//! [`TokenTransfer`] capabilities. No I/O, no clocks, deterministic iteration
//! (everything is `BTreeMap`-backed), so tests reproduce exactly.
//!
//! # Example
//!
//! ```ignore
//! use dpon_common::{MockStakingLedger, StakingLedger, BondStatus};
//!
//! let mut ledger = MockStakingLedger::new();
//! ledger.add_validator(val, BondStatus::Bonded);
//! ledger.delegate(&sel, 1_000_000, BondStatus::Unbonded, &val, false).unwrap();
//! ```

use std::collections::BTreeMap;

use tracing::debug;

use crate::bank::{BankError, Pool, TokenTransfer};
use crate::staking::{
    BondStatus, Delegation, LedgerError, Redelegation, StakingLedger, UnbondingDelegation,
    UnbondingDelegationEntry, Validator,
};
use crate::types::Address;

// ════════════════════════════════════════════════════════════════════════════
// MOCK STAKING LEDGER
// ════════════════════════════════════════════════════════════════════════════

/// In-memory staking ledger.
///
/// Share arithmetic matches the real thing: a fresh validator mints shares at
/// `SHARE_PRECISION` per token, and `unbond` releases the truncated token
/// value of the removed shares.
#[derive(Debug, Clone, Default)]
pub struct MockStakingLedger {
    validators: BTreeMap<Address, Validator>,
    /// (delegator, validator) -> shares
    delegations: BTreeMap<(Address, Address), u128>,
    /// (delegator, validator) -> unbonding queue
    unbonding: BTreeMap<(Address, Address), UnbondingDelegation>,
    /// (src validator, delegator) -> redelegation record
    redelegations: BTreeMap<(Address, Address), Redelegation>,
    max_validators: u32,
    unbonding_time_secs: u64,
}

impl MockStakingLedger {
    pub fn new() -> Self {
        Self {
            validators: BTreeMap::new(),
            delegations: BTreeMap::new(),
            unbonding: BTreeMap::new(),
            redelegations: BTreeMap::new(),
            max_validators: 100,
            unbonding_time_secs: 21 * 24 * 3600,
        }
    }

    pub fn with_max_validators(mut self, max: u32) -> Self {
        self.max_validators = max;
        self
    }

    pub fn with_unbonding_time(mut self, secs: u64) -> Self {
        self.unbonding_time_secs = secs;
        self
    }

    /// Register a validator with no tokens. Fund it through `delegate`.
    pub fn add_validator(&mut self, operator: Address, status: BondStatus) {
        self.validators.insert(
            operator,
            Validator { operator, tokens: 0, delegator_shares: 0, status, jailed: false },
        );
    }

    /// Flip a validator's bond status (e.g. to simulate it falling out of
    /// the active set between snapshot and refund).
    pub fn set_validator_status(&mut self, operator: &Address, status: BondStatus) {
        if let Some(v) = self.validators.get_mut(operator) {
            v.status = status;
        }
    }

    /// Drop a validator entirely, as after a completed unbonding + removal.
    /// Delegations pointing at it are dropped with it.
    pub fn remove_validator(&mut self, operator: &Address) {
        self.validators.remove(operator);
        self.delegations.retain(|(_, val), _| val != operator);
    }

    /// Queue an unbonding entry directly (test setup for escrow draw-down).
    pub fn push_unbonding_entry(
        &mut self,
        delegator: Address,
        validator: Address,
        balance: u128,
        creation_height: u64,
        completion_time: u64,
    ) {
        let ubd = self
            .unbonding
            .entry((delegator, validator))
            .or_insert_with(|| UnbondingDelegation { delegator, validator, entries: Vec::new() });
        ubd.entries.push(UnbondingDelegationEntry { creation_height, completion_time, balance });
        ubd.entries.sort_by_key(|e| e.creation_height);
    }

    /// Record an in-flight redelegation (test setup for escrow fallback).
    pub fn set_redelegation(&mut self, delegator: Address, src: Address, dst: Address) {
        self.redelegations.insert(
            (src, delegator),
            Redelegation { delegator, src_validator: src, dst_validator: dst },
        );
    }

    /// Shares a delegator currently holds at a validator (0 if none).
    pub fn delegation_shares(&self, delegator: &Address, validator: &Address) -> u128 {
        self.delegations.get(&(*delegator, *validator)).copied().unwrap_or(0)
    }
}

impl StakingLedger for MockStakingLedger {
    fn validator(&self, addr: &Address) -> Result<Validator, LedgerError> {
        self.validators
            .get(addr)
            .cloned()
            .ok_or(LedgerError::ValidatorNotFound(*addr))
    }

    fn delegation(
        &self,
        delegator: &Address,
        validator: &Address,
    ) -> Result<Delegation, LedgerError> {
        let shares = self
            .delegations
            .get(&(*delegator, *validator))
            .copied()
            .ok_or(LedgerError::DelegationNotFound {
                delegator: *delegator,
                validator: *validator,
            })?;
        Ok(Delegation { delegator: *delegator, validator: *validator, shares })
    }

    fn delegator_delegations(&self, delegator: &Address) -> Vec<Delegation> {
        self.delegations
            .iter()
            .filter(|((d, _), _)| d == delegator)
            .map(|((d, v), shares)| Delegation { delegator: *d, validator: *v, shares: *shares })
            .collect()
    }

    fn validators_by_power(&self) -> Vec<Validator> {
        let mut vals: Vec<Validator> = self.validators.values().cloned().collect();
        // descending power, address ascending as the tiebreak
        vals.sort_by(|a, b| b.tokens.cmp(&a.tokens).then(a.operator.cmp(&b.operator)));
        vals
    }

    fn max_validators(&self) -> u32 {
        self.max_validators
    }

    fn total_bonded_tokens(&self) -> u128 {
        self.validators
            .values()
            .filter(|v| v.is_bonded())
            .map(|v| v.tokens)
            .sum()
    }

    fn unbonding_time_secs(&self) -> u64 {
        self.unbonding_time_secs
    }

    fn delegate(
        &mut self,
        delegator: &Address,
        amount: u128,
        _token_src: BondStatus,
        validator: &Address,
        _subtract_account: bool,
    ) -> Result<u128, LedgerError> {
        // token_src / subtract_account are pool-accounting hints; the mock
        // leaves pool balances to MockBank.
        let val = self
            .validators
            .get_mut(validator)
            .ok_or(LedgerError::ValidatorNotFound(*validator))?;
        let new_shares = val.shares_for_new_delegation(amount);
        val.tokens += amount;
        val.delegator_shares += new_shares;
        *self.delegations.entry((*delegator, *validator)).or_insert(0) += new_shares;
        debug!(%delegator, %validator, amount, new_shares, "mock delegate");
        Ok(new_shares)
    }

    fn unbond(
        &mut self,
        delegator: &Address,
        validator: &Address,
        shares: u128,
    ) -> Result<u128, LedgerError> {
        let held = self
            .delegations
            .get(&(*delegator, *validator))
            .copied()
            .ok_or(LedgerError::DelegationNotFound {
                delegator: *delegator,
                validator: *validator,
            })?;
        if held < shares {
            return Err(LedgerError::InsufficientShares {
                validator: *validator,
                requested: shares,
                available: held,
            });
        }
        let val = self
            .validators
            .get_mut(validator)
            .ok_or(LedgerError::ValidatorNotFound(*validator))?;
        let tokens = if val.delegator_shares == 0 {
            0
        } else {
            shares * val.tokens / val.delegator_shares
        };
        val.delegator_shares -= shares;
        val.tokens -= tokens;
        let remaining = held - shares;
        if remaining == 0 {
            self.delegations.remove(&(*delegator, *validator));
        } else {
            self.delegations.insert((*delegator, *validator), remaining);
        }
        debug!(%delegator, %validator, shares, tokens, "mock unbond");
        Ok(tokens)
    }

    fn unbonding_delegation(
        &self,
        delegator: &Address,
        validator: &Address,
    ) -> Result<UnbondingDelegation, LedgerError> {
        self.unbonding
            .get(&(*delegator, *validator))
            .cloned()
            .ok_or(LedgerError::UnbondingDelegationNotFound {
                delegator: *delegator,
                validator: *validator,
            })
    }

    fn set_unbonding_delegation(&mut self, ubd: UnbondingDelegation) {
        self.unbonding.insert((ubd.delegator, ubd.validator), ubd);
    }

    fn remove_unbonding_delegation(&mut self, delegator: &Address, validator: &Address) {
        self.unbonding.remove(&(*delegator, *validator));
    }

    fn redelegations_from_src_validator(&self, validator: &Address) -> Vec<Redelegation> {
        self.redelegations
            .iter()
            .filter(|((src, _), _)| src == validator)
            .map(|(_, red)| red.clone())
            .collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MOCK BANK
// ════════════════════════════════════════════════════════════════════════════

/// In-memory pool balances.
#[derive(Debug, Clone, Default)]
pub struct MockBank {
    balances: BTreeMap<Pool, u128>,
}

impl MockBank {
    pub fn new() -> Self {
        Self { balances: BTreeMap::new() }
    }

    /// Seed a pool balance (test setup).
    pub fn fund(&mut self, pool: Pool, amount: u128) {
        *self.balances.entry(pool).or_insert(0) += amount;
    }

    pub fn balance(&self, pool: Pool) -> u128 {
        self.balances.get(&pool).copied().unwrap_or(0)
    }
}

impl TokenTransfer for MockBank {
    fn send_coins_from_module_to_module(
        &mut self,
        from: Pool,
        to: Pool,
        amount: u128,
    ) -> Result<(), BankError> {
        if amount == 0 {
            return Ok(());
        }
        let available = self.balance(from);
        if available < amount {
            return Err(BankError::InsufficientPoolBalance {
                pool: from,
                available,
                requested: amount,
            });
        }
        self.balances.insert(from, available - amount);
        *self.balances.entry(to).or_insert(0) += amount;
        debug!(%from, %to, amount, "mock pool transfer");
        Ok(())
    }
}
