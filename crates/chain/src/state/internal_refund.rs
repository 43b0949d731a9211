//! Slash reversal & fee refund
//! Re-delegates previously escrowed stake back to the original selectors
//! once a dispute resolves in their favor. Refunds always land on a bonded
//! destination: the original validator where possible, otherwise the top
//! bonded validator stands in.

use thiserror::Error;
use tracing::{info, warn};

use dpon_common::bank::Pool;
use dpon_common::staking::{BondStatus, LedgerError, StakingLedger, Validator};

use crate::tokenomics::allocate_proportional;
use crate::types::{Address, HashId};

use super::ReporterState;

// ════════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefundError {
    /// The snapshot/tracker was never written — or was already consumed.
    #[error("no escrow record for hash id {0}")]
    TrackerNotFound(HashId),
    /// No bonded validator exists to receive the refund. Dropping the
    /// tokens instead is unacceptable, so the operation fails loudly.
    #[error("no bonded validators found to return tokens to")]
    NoBondedValidator,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ReporterState {
    // ════════════════════════════════════════════════════════════════════════════
    // SLASH REVERSAL
    // ════════════════════════════════════════════════════════════════════════════

    /// Return previously escrowed slash stake to its original owners.
    ///
    /// `amount` may exceed the tracker total when the vindicated reporter is
    /// also awarded the disputer's forfeited fee — the winning purse — in
    /// which case every origin's refund scales by `amount / tracker_total`
    /// (last weighted origin absorbs the flooring dust). Without a winning
    /// purse each origin gets back exactly what it contributed.
    ///
    /// Each refund re-delegates to the origin validator if the ledger still
    /// knows it (bonded or not), else to a substitute bonded validator.
    /// Delegation never debits an account: the tokens are already held by
    /// the dispute pool, and the returned [`Pool`] tells the caller which
    /// pool to reconcile that balance against.
    ///
    /// Consumes the tracker: a second call with the same `hash_id` fails
    /// with `TrackerNotFound`.
    pub fn return_slashed_tokens<L: StakingLedger>(
        &mut self,
        ledger: &mut L,
        amount: u128,
        hash_id: HashId,
    ) -> Result<Pool, RefundError> {
        let snapshot = self
            .disputed_delegation_amounts
            .get(&hash_id)
            .cloned()
            .ok_or(RefundError::TrackerNotFound(hash_id))?;

        let parts: Vec<u128> = snapshot.token_origins.iter().map(|o| o.amount).collect();
        let refunds: Vec<u128> = if amount > snapshot.total {
            // winning purse: scale every origin up proportionally
            allocate_proportional(amount, &parts)
        } else {
            parts
        };

        let mut all_bonded = true;
        for (origin, refund) in snapshot.token_origins.iter().zip(refunds) {
            if refund == 0 {
                continue;
            }
            let destination = self.refund_destination(ledger, &origin.validator, false)?;
            all_bonded &= destination.is_bonded();
            ledger.delegate(
                &origin.selector,
                refund,
                BondStatus::Unbonded,
                &destination.operator,
                false,
            )?;
        }

        self.disputed_delegation_amounts.remove(&hash_id);
        let pool = if all_bonded { Pool::Bonded } else { Pool::NotBonded };
        info!(hash_id = %hash_id, amount, %pool, "slashed tokens returned");
        Ok(pool)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // FEE REFUND
    // ════════════════════════════════════════════════════════════════════════════

    /// Refund `amount` of a flat dispute fee to whoever paid it from stake,
    /// proportional to each origin's recorded contribution.
    ///
    /// Destinations must be bonded: the original validator when it still is,
    /// otherwise a substitute bonded validator — so callers always reconcile
    /// against the bonded pool. Consumes the tracker.
    pub fn fee_refund<L: StakingLedger>(
        &mut self,
        ledger: &mut L,
        hash_id: HashId,
        amount: u128,
    ) -> Result<Pool, RefundError> {
        let tracker = self
            .fee_paid_from_stake
            .get(&hash_id)
            .cloned()
            .ok_or(RefundError::TrackerNotFound(hash_id))?;

        let parts: Vec<u128> = tracker.token_origins.iter().map(|o| o.amount).collect();
        let refunds = allocate_proportional(amount, &parts);

        for (origin, refund) in tracker.token_origins.iter().zip(refunds) {
            if refund == 0 {
                continue;
            }
            let destination = self.refund_destination(ledger, &origin.validator, true)?;
            ledger.delegate(
                &origin.selector,
                refund,
                BondStatus::Bonded,
                &destination.operator,
                false,
            )?;
        }

        self.fee_paid_from_stake.remove(&hash_id);
        info!(hash_id = %hash_id, amount, "dispute fee refunded to stake");
        Ok(Pool::Bonded)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // DESTINATION LOOKUP
    // ════════════════════════════════════════════════════════════════════════════

    /// Bonded validators in descending power order, at most `max` of them.
    pub fn bonded_validators<L: StakingLedger>(&self, ledger: &L, max: usize) -> Vec<Validator> {
        ledger
            .validators_by_power()
            .into_iter()
            .filter(|v| v.is_bonded())
            .take(max)
            .collect()
    }

    /// Where a refund for `original` should land.
    ///
    /// `require_bonded` demands a bonded destination even when the original
    /// validator still exists (fee refunds); slash reversal reuses the
    /// original as-is whenever the ledger still has it.
    fn refund_destination<L: StakingLedger>(
        &self,
        ledger: &L,
        original: &Address,
        require_bonded: bool,
    ) -> Result<Validator, RefundError> {
        match ledger.validator(original) {
            Ok(v) if !require_bonded || v.is_bonded() => return Ok(v),
            Ok(_) => {}
            Err(LedgerError::ValidatorNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let substitute = self
            .bonded_validators(ledger, 1)
            .into_iter()
            .next()
            .ok_or(RefundError::NoBondedValidator)?;
        warn!(original = %original, substitute = %substitute.operator,
              "refund destination substituted with bonded validator");
        Ok(substitute)
    }
}
