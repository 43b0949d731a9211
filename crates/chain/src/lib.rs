//! # DPON Chain Core Library
//!
//! Economic accounting core of the DPON proof-of-stake oracle network:
//! tracks which selectors back which data reporters, aggregates each
//! reporter's live bonded weight across validators, divides reporting
//! rewards net of commission, and escrows/reverses dispute fees and slashes
//! to the exact token origins that backed a disputed report.
//!
//! ## Module Overview
//!
//! | Module | Function |
//! |--------|----------|
//! | `types` | Core types: Address, HashId (re-exported from dpon-common) |
//! | `params` | Module parameters: min stake, selector caps, commission floor |
//! | `tokenomics` | Pure split math: commission split, proportional allocation |
//! | `state` | ReporterState facade + internal modules (selectors, stake, rewards, escrow, refund, jail) |
//!
//! ## Capability Boundaries
//!
//! The core owns no bonded balances. It consumes two capabilities per call:
//!
//! ```text
//! ┌──────────────────┐    instructs    ┌──────────────────┐
//! │  ReporterState   │ ──────────────> │  StakingLedger   │  (delegations,
//! │  (this crate)    │                 └──────────────────┘   shares↔tokens)
//! │                  │ ──────────────> ┌──────────────────┐
//! └──────────────────┘                 │  TokenTransfer   │  (pool moves)
//!                                      └──────────────────┘
//! ```
//!
//! ## Consensus-Critical Components
//!
//! The following are consensus-critical; changing them is a hard fork:
//!
//! - Proportional allocation and its remainder rule in `tokenomics.rs`
//! - The deduction cascade order in `state/internal_escrow.rs`
//! - Truncation direction of every shares↔tokens conversion (always floor,
//!   owned by the staking ledger's `Validator` view)
//! - Distribution-queue head/tail advancement in `state/internal_rewards.rs`

pub mod params;
pub mod state;
pub mod tokenomics;
pub mod types;

pub use params::Params;
pub use state::{
    DelegationsAmounts, DistributionQueueItem, EscrowError, JailError, OracleReporter,
    RefundError, ReporterState, RewardError, RewardPeriod, SelectionError, Selection,
    StakeError, TokenOriginInfo,
};
