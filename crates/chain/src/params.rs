//! Reporter module parameters.
//!
//! Governance-adjustable knobs for reporter registration and selection.
//! Defaults mirror mainnet genesis.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use dpon_common::economic_constants::{BASIS_POINTS, POWER_REDUCTION};

/// Default minimum commission rate a reporter may set (basis points).
pub const DEFAULT_MIN_COMMISSION_BPS: u16 = 0;

/// Default minimum bonded loya to register as a reporter (1 power).
pub const DEFAULT_MIN_LOYA: u128 = POWER_REDUCTION;

/// Default cap on selectors per reporter.
pub const DEFAULT_MAX_SELECTORS: u32 = 100;

/// Default cap on underlying validator delegations counted per selector.
pub const DEFAULT_MAX_NUM_OF_DELEGATIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Floor for reporter commission rates, in basis points.
    pub min_commission_bps: u16,
    /// Minimum bonded loya required to register as a reporter, and the floor
    /// for a reporter's own `min_tokens_required`.
    pub min_loya: u128,
    /// Maximum number of selectors one reporter may have.
    pub max_selectors: u32,
    /// Maximum delegations counted toward one selector.
    pub max_num_of_delegations: u32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            min_commission_bps: DEFAULT_MIN_COMMISSION_BPS,
            min_loya: DEFAULT_MIN_LOYA,
            max_selectors: DEFAULT_MAX_SELECTORS,
            max_num_of_delegations: DEFAULT_MAX_NUM_OF_DELEGATIONS,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        if u128::from(self.min_commission_bps) > BASIS_POINTS {
            anyhow::bail!(
                "min commission rate {} bps exceeds {} bps",
                self.min_commission_bps,
                BASIS_POINTS
            );
        }
        if self.min_loya == 0 {
            anyhow::bail!("min loya must be positive");
        }
        if self.max_selectors == 0 {
            anyhow::bail!("max selectors must be positive");
        }
        if self.max_num_of_delegations == 0 {
            anyhow::bail!("max num of delegations must be positive");
        }
        Ok(())
    }
}
