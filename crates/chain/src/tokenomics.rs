//! DPON Tokenomics Math
//! Commission split and proportional allocation primitives used by reward
//! distribution and dispute escrow. All functions here are PURE — no
//! mutations, no side effects — and all division floors toward zero.

use dpon_common::economic_constants::BASIS_POINTS;

/// Split of one reward accrual between reporter commission and the selector
/// pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    /// Reporter's cut (micro-loya).
    pub commission: u128,
    /// Remainder distributed to selectors (micro-loya).
    pub net_reward: u128,
}

impl CommissionSplit {
    pub fn total(&self) -> u128 {
        self.commission + self.net_reward
    }
}

/// Split `reward` (micro-loya) at `commission_bps` basis points.
///
/// The commission floors toward zero, so the selector pool absorbs the
/// sub-basis-point remainder:
/// `commission + net_reward == reward` always.
pub fn commission_split(reward: u128, commission_bps: u16) -> CommissionSplit {
    let commission = reward * u128::from(commission_bps) / BASIS_POINTS;
    CommissionSplit { commission, net_reward: reward - commission }
}

/// `amount * part / total`, floored. `total` must be nonzero.
pub fn proportional_share(amount: u128, part: u128, total: u128) -> u128 {
    debug_assert!(total > 0, "proportional_share with zero total");
    amount * part / total
}

/// Divide `amount` across `parts` proportionally.
///
/// Every share floors; the LAST nonzero-part recipient absorbs whatever
/// remainder flooring left behind, so the returned shares always sum to
/// exactly `amount` — no unit is ever silently lost. Returns an empty vec
/// when `parts` is empty or sums to zero.
pub fn allocate_proportional(amount: u128, parts: &[u128]) -> Vec<u128> {
    let total: u128 = parts.iter().sum();
    if parts.is_empty() || total == 0 {
        return Vec::new();
    }
    let mut shares: Vec<u128> = parts.iter().map(|p| amount * p / total).collect();
    let assigned: u128 = shares.iter().sum();
    let remainder = amount - assigned;
    if remainder > 0 {
        // push the dust onto the last recipient that actually has weight
        if let Some(idx) = parts.iter().rposition(|p| *p > 0) {
            shares[idx] += remainder;
        }
    }
    shares
}
