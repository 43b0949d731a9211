//! Jail controller
//! Suspends a reporter's reporting eligibility after a dispute loss.
//! States cycle Active -> Jailed -> Active; jailed reporters fail stake
//! aggregation until explicitly unjailed.

use thiserror::Error;
use tracing::info;

use crate::types::Address;

use super::ReporterState;

// ════════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JailError {
    #[error("reporter {0} not found")]
    ReporterNotFound(Address),
    #[error("reporter {0} is already jailed")]
    AlreadyJailed(Address),
    #[error("reporter {0} is not jailed")]
    NotJailed(Address),
    #[error("reporter jailed until {until}, cannot unjail at {now}")]
    JailPeriodNotPassed { until: u64, now: u64 },
}

impl ReporterState {
    /// Jail a reporter for `duration_secs` starting at `now`.
    ///
    /// Fails if already jailed — never extends or resets a running jail
    /// clock as a side effect. `u64::MAX` as the duration is an effectively
    /// permanent jail: the lockout becomes the absolute maximum time instead
    /// of overflowing past `now`.
    pub fn jail_reporter(
        &mut self,
        reporter_addr: &Address,
        duration_secs: u64,
        now: u64,
    ) -> Result<(), JailError> {
        let reporter = self
            .reporters
            .get_mut(reporter_addr)
            .ok_or(JailError::ReporterNotFound(*reporter_addr))?;
        if reporter.jailed {
            return Err(JailError::AlreadyJailed(*reporter_addr));
        }
        reporter.jailed = true;
        reporter.jailed_until = if duration_secs == u64::MAX {
            u64::MAX
        } else {
            now + duration_secs
        };
        info!(reporter = %reporter_addr, until = reporter.jailed_until, "reporter jailed");
        Ok(())
    }

    /// Release a reporter whose jail period has fully elapsed.
    ///
    /// Fails — mutating nothing — if the reporter is not jailed or the
    /// lockout has not passed yet.
    pub fn unjail_reporter(
        &mut self,
        reporter_addr: &Address,
        now: u64,
    ) -> Result<(), JailError> {
        let reporter = self
            .reporters
            .get_mut(reporter_addr)
            .ok_or(JailError::ReporterNotFound(*reporter_addr))?;
        if !reporter.jailed {
            return Err(JailError::NotJailed(*reporter_addr));
        }
        if now < reporter.jailed_until {
            return Err(JailError::JailPeriodNotPassed { until: reporter.jailed_until, now });
        }
        reporter.jailed = false;
        reporter.jailed_until = 0;
        info!(reporter = %reporter_addr, "reporter unjailed");
        Ok(())
    }

    /// Make a jailed reporter immediately eligible for unjail, used when the
    /// dispute it was jailed over fails or is withdrawn. No-op when not
    /// jailed.
    pub fn update_jailed_until_on_failed_dispute(
        &mut self,
        reporter_addr: &Address,
        now: u64,
    ) -> Result<(), JailError> {
        let reporter = self
            .reporters
            .get_mut(reporter_addr)
            .ok_or(JailError::ReporterNotFound(*reporter_addr))?;
        if !reporter.jailed {
            return Ok(());
        }
        reporter.jailed_until = now.saturating_sub(1);
        info!(reporter = %reporter_addr, "jail lockout lifted after failed dispute");
        Ok(())
    }
}
