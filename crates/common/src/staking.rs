//! # Staking Ledger Capability
//!
//! Abstract interface over the validator/delegation ledger. The accounting
//! core never owns bonded balances: it derives snapshots from this ledger and
//! instructs mutations through it. The ledger is the single source of truth
//! for shares↔tokens conversion; nothing outside [`Validator`] reimplements
//! that formula.
//!
//! ## Types
//!
//! | Type | Meaning |
//! |------|---------|
//! | `BondStatus` | Validator bond state: Unbonded / Unbonding / Bonded |
//! | `Validator` | Ledger view: tokens, shares, status, conversions |
//! | `Delegation` | (delegator, validator, shares) |
//! | `UnbondingDelegation` | Per-pair queue of maturing unbond entries |
//! | `Redelegation` | (delegator, src validator, dst validator) record |
//!
//! Shares are fixed-point `u128` scaled by [`SHARE_PRECISION`]; conversions
//! always truncate toward zero so repeated reads of unchanged ledger state
//! are idempotent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::economic_constants::SHARE_PRECISION;
use crate::types::Address;

// ════════════════════════════════════════════════════════════════════════════════
// BOND STATUS
// ════════════════════════════════════════════════════════════════════════════════

/// Bond state of a validator (and the token source hint for `delegate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondStatus {
    Unbonded,
    Unbonding,
    Bonded,
}

// ════════════════════════════════════════════════════════════════════════════════
// VALIDATOR VIEW
// ════════════════════════════════════════════════════════════════════════════════

/// Read view of a validator as the staking ledger tracks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Operator address, the key under which the ledger stores it.
    pub operator: Address,
    /// Total bonded tokens (loya) behind this validator.
    pub tokens: u128,
    /// Total outstanding delegator shares (SHARE_PRECISION fixed-point).
    pub delegator_shares: u128,
    pub status: BondStatus,
    pub jailed: bool,
}

impl Validator {
    pub fn is_bonded(&self) -> bool {
        self.status == BondStatus::Bonded
    }

    /// Token value of `shares`, truncated toward zero.
    ///
    /// This is THE conversion. Callers must not duplicate the formula:
    /// truncation here decides the rounding direction everywhere.
    pub fn tokens_from_shares_truncated(&self, shares: u128) -> u128 {
        if self.delegator_shares == 0 {
            return 0;
        }
        shares * self.tokens / self.delegator_shares
    }

    /// Share value of `tokens`, truncated toward zero.
    pub fn shares_from_tokens(&self, tokens: u128) -> Result<u128, LedgerError> {
        if self.tokens == 0 {
            return Err(LedgerError::InsufficientShares {
                validator: self.operator,
                requested: tokens,
                available: 0,
            });
        }
        Ok(tokens * self.delegator_shares / self.tokens)
    }

    /// Shares a fresh delegation of `tokens` mints against this validator.
    pub fn shares_for_new_delegation(&self, tokens: u128) -> u128 {
        if self.tokens == 0 || self.delegator_shares == 0 {
            tokens * SHARE_PRECISION
        } else {
            tokens * self.delegator_shares / self.tokens
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// DELEGATION RECORDS
// ════════════════════════════════════════════════════════════════════════════════

/// A delegator's share position at one validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: Address,
    pub validator: Address,
    /// SHARE_PRECISION fixed-point shares.
    pub shares: u128,
}

/// One maturing entry of an unbonding delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingDelegationEntry {
    /// Height at which the unbond was initiated. Entries are kept oldest
    /// first; dispute escrow consumes them in that order.
    pub creation_height: u64,
    /// Unix seconds at which the tokens release.
    pub completion_time: u64,
    /// Remaining token balance of this entry (loya).
    pub balance: u128,
}

/// The unbonding queue between one delegator and one validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingDelegation {
    pub delegator: Address,
    pub validator: Address,
    pub entries: Vec<UnbondingDelegationEntry>,
}

impl UnbondingDelegation {
    pub fn total_balance(&self) -> u128 {
        self.entries.iter().map(|e| e.balance).sum()
    }
}

/// An in-flight redelegation from one validator to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redelegation {
    pub delegator: Address,
    pub src_validator: Address,
    pub dst_validator: Address,
}

// ════════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════════

/// Failures surfaced by a staking ledger implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("validator {0} not found")]
    ValidatorNotFound(Address),
    #[error("no delegation between delegator {delegator} and validator {validator}")]
    DelegationNotFound { delegator: Address, validator: Address },
    #[error("no unbonding delegation between delegator {delegator} and validator {validator}")]
    UnbondingDelegationNotFound { delegator: Address, validator: Address },
    #[error("validator {validator}: requested {requested} exceeds available {available}")]
    InsufficientShares { validator: Address, requested: u128, available: u128 },
}

// ════════════════════════════════════════════════════════════════════════════════
// LEDGER TRAIT
// ════════════════════════════════════════════════════════════════════════════════

/// The staking ledger capability consumed by the accounting core.
///
/// Implementations must be deterministic: iteration methods return stable
/// orders (`delegator_delegations` sorted by validator address,
/// `bonded_validators_by_power` by descending power with address tiebreak).
pub trait StakingLedger {
    fn validator(&self, addr: &Address) -> Result<Validator, LedgerError>;

    fn delegation(&self, delegator: &Address, validator: &Address)
        -> Result<Delegation, LedgerError>;

    /// All delegations of one delegator, sorted by validator address.
    fn delegator_delegations(&self, delegator: &Address) -> Vec<Delegation>;

    /// Validators ordered by descending power. Not filtered by bond status;
    /// callers check `is_bonded` themselves.
    fn validators_by_power(&self) -> Vec<Validator>;

    /// Maximum size of the bonded validator set.
    fn max_validators(&self) -> u32;

    /// Total tokens bonded across the whole network.
    fn total_bonded_tokens(&self) -> u128;

    /// Duration of the unbonding period in seconds.
    fn unbonding_time_secs(&self) -> u64;

    /// Delegate `amount` loya to `validator` for `delegator`.
    ///
    /// `token_src` names the pool the tokens are currently counted in;
    /// `subtract_account` false means the tokens are already held by a module
    /// pool and no account balance is debited. Returns the shares minted.
    fn delegate(
        &mut self,
        delegator: &Address,
        amount: u128,
        token_src: BondStatus,
        validator: &Address,
        subtract_account: bool,
    ) -> Result<u128, LedgerError>;

    /// Remove `shares` from the delegation and the validator.
    ///
    /// Returns the token amount actually released, which may be less than
    /// the token value the caller computed if truncation intervened.
    fn unbond(
        &mut self,
        delegator: &Address,
        validator: &Address,
        shares: u128,
    ) -> Result<u128, LedgerError>;

    fn unbonding_delegation(&self, delegator: &Address, validator: &Address)
        -> Result<UnbondingDelegation, LedgerError>;

    fn set_unbonding_delegation(&mut self, ubd: UnbondingDelegation);

    fn remove_unbonding_delegation(&mut self, delegator: &Address, validator: &Address);

    /// All redelegations whose source is `validator`.
    fn redelegations_from_src_validator(&self, validator: &Address) -> Vec<Redelegation>;
}
