//! # Token Transfer Capability
//!
//! Module-pool transfers consumed by the accounting core. Pools are a closed
//! enum, not free-form strings, so a typo cannot silently mint a pool.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The module pools the core moves tokens between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pool {
    /// Tokens backing bonded validators.
    Bonded,
    /// Tokens of unbonding/unbonded validators and maturing unbonds.
    NotBonded,
    /// Dispute escrow: fees and slashed stake pending resolution.
    Dispute,
    /// Accrued reporting rewards awaiting withdrawal.
    TipsEscrow,
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pool::Bonded => "bonded",
            Pool::NotBonded => "not_bonded",
            Pool::Dispute => "dispute",
            Pool::TipsEscrow => "tips_escrow",
        };
        f.write_str(name)
    }
}

/// Failures surfaced by a token transfer implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("pool {pool} holds {available} loya, cannot move {requested}")]
    InsufficientPoolBalance { pool: Pool, available: u128, requested: u128 },
}

/// Moves fungible balances between module pools atomically.
pub trait TokenTransfer {
    fn send_coins_from_module_to_module(
        &mut self,
        from: Pool,
        to: Pool,
        amount: u128,
    ) -> Result<(), BankError>;
}
