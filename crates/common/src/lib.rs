//! # DPON Common Crate
//!
//! Shared primitives and the abstract capability layer consumed by the
//! accounting core.
//!
//! ## Modules
//! - `types`: `Address`, `HashId`
//! - `economic_constants`: denomination, power reduction, precision scales
//! - `staking`: `StakingLedger` trait + validator/delegation records
//! - `bank`: `TokenTransfer` trait + `Pool` enum
//! - `mock_ledger`: in-memory implementations for testing
//!
//! ## Capability Architecture
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐
//! │  StakingLedger   │   │  TokenTransfer   │   <- abstract traits
//! └────────┬─────────┘   └────────┬─────────┘
//!          │                      │
//! ┌────────▼─────────┐   ┌────────▼─────────┐
//! │ MockStakingLedger│   │     MockBank     │   <- in-memory, for tests
//! └──────────────────┘   └──────────────────┘
//! ```
//!
//! The real chain binds these traits to its staking and bank modules; this
//! crate ships only the contract and the deterministic mocks.

pub mod bank;
pub mod economic_constants;
pub mod mock_ledger;
pub mod staking;
pub mod types;

pub use bank::{BankError, Pool, TokenTransfer};
pub use mock_ledger::{MockBank, MockStakingLedger};
pub use staking::{
    BondStatus, Delegation, LedgerError, Redelegation, StakingLedger, UnbondingDelegation,
    UnbondingDelegationEntry, Validator,
};
pub use types::{Address, HashId};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
