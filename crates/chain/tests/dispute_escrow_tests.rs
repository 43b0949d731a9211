//! # Dispute Escrow & Refund Integration Tests
//!
//! Tests for the dispute accounting path against the mock staking ledger:
//! - flat fee accumulation per hash id
//! - tracker sum == total invariant after every mutation
//! - escrow against historical snapshots, with unbonding-queue draw-down
//!   and redelegation-destination fallback
//! - slash reversal round trips, winning purses, substitute validators
//! - fee refunds

use dpon_chain::params::Params;
use dpon_chain::state::{EscrowError, RefundError, ReporterState};
use dpon_common::economic_constants::SHARE_PRECISION;
use dpon_common::types::{Address, HashId};
use dpon_common::{BondStatus, MockBank, MockStakingLedger, Pool, StakingLedger, TokenTransfer};

// ════════════════════════════════════════════════════════════════════════════
// HELPERS
// ════════════════════════════════════════════════════════════════════════════

const VAL: u8 = 0x01;

fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

fn hash(byte: u8) -> HashId {
    HashId::from_bytes([byte; 32])
}

/// Reporter (first entry) plus selectors staked with one bonded validator,
/// aggregated at height 1. The bonded pool is funded with the total stake.
fn setup(stakes: &[(u8, u128)]) -> (ReporterState, MockStakingLedger, MockBank) {
    let mut ledger = MockStakingLedger::new();
    let mut bank = MockBank::new();
    let val = addr(VAL);
    ledger.add_validator(val, BondStatus::Bonded);
    let mut total = 0u128;
    for (byte, amount) in stakes {
        ledger
            .delegate(&addr(*byte), *amount, BondStatus::Unbonded, &val, true)
            .unwrap();
        total += *amount;
    }
    bank.fund(Pool::Bonded, total);

    let mut state = ReporterState::new(Params::default());
    let reporter = addr(stakes[0].0);
    state
        .create_reporter(
            &ledger,
            reporter,
            0,
            Params::default().min_loya,
            "reporter-one".to_string(),
            0,
            0,
        )
        .unwrap();
    for (byte, _) in &stakes[1..] {
        state.select_reporter(&ledger, addr(*byte), reporter).unwrap();
    }
    state.reporter_stake(&ledger, &reporter, 1, 0).unwrap();
    (state, ledger, bank)
}

// ════════════════════════════════════════════════════════════════════════════
// 1. FLAT FEE FROM LIVE STAKE
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn fee_accumulates_across_calls_with_same_hash() {
    // three equal selectors, 100 power each
    let (mut state, mut ledger, mut bank) =
        setup(&[(0x10, 100_000_000), (0x11, 100_000_000), (0x12, 100_000_000)]);
    let reporter = addr(0x10);
    let id = hash(0xAA);

    state
        .fee_from_reporter_stake(&mut ledger, &mut bank, &reporter, 100_000_000, id)
        .unwrap();
    let tracker = state.fee_paid_from_stake.get(&id).unwrap();
    assert_eq!(tracker.total, 100_000_000);
    assert!(tracker.invariant_holds());

    state
        .fee_from_reporter_stake(&mut ledger, &mut bank, &reporter, 100_000_000, id)
        .unwrap();
    let tracker = state.fee_paid_from_stake.get(&id).unwrap();
    assert_eq!(tracker.total, 200_000_000);
    assert!(tracker.invariant_holds());
    assert_eq!(bank.balance(Pool::Dispute), 200_000_000);
}

#[test]
fn fee_split_is_proportional_with_last_selector_absorbing_dust() {
    let (mut state, mut ledger, mut bank) =
        setup(&[(0x10, 100_000_000), (0x11, 100_000_000), (0x12, 100_000_000)]);
    let reporter = addr(0x10);
    let id = hash(0xAB);

    state
        .fee_from_reporter_stake(&mut ledger, &mut bank, &reporter, 100_000_000, id)
        .unwrap();

    let tracker = state.fee_paid_from_stake.get(&id).unwrap();
    let amounts: Vec<u128> = tracker.token_origins.iter().map(|o| o.amount).collect();
    assert_eq!(amounts, vec![33_333_333, 33_333_333, 33_333_334]);
}

#[test]
fn fee_with_zero_bonded_backing_fails() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let reporter = addr(0x10);

    // validator drops out of the bonded set; live bonded backing is zero
    ledger.set_validator_status(&addr(VAL), BondStatus::Unbonding);

    let err = state
        .fee_from_reporter_stake(&mut ledger, &mut bank, &reporter, 1, hash(0xAC))
        .unwrap_err();
    assert!(matches!(err, EscrowError::InsufficientStake { available: 0, .. }));
}

#[test]
fn fee_exceeding_bonded_total_fails() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let err = state
        .fee_from_reporter_stake(&mut ledger, &mut bank, &addr(0x10), 100_000_001, hash(0xAD))
        .unwrap_err();
    assert!(matches!(err, EscrowError::InsufficientStake { .. }));
}

#[test]
fn fee_for_unknown_reporter_fails() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let err = state
        .fee_from_reporter_stake(&mut ledger, &mut bank, &addr(0x77), 1, hash(0xAE))
        .unwrap_err();
    assert!(matches!(err, EscrowError::ReporterNotFound(_)));
}

// ════════════════════════════════════════════════════════════════════════════
// 2. ESCROW AGAINST A HISTORICAL SNAPSHOT
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn escrow_then_return_round_trip_restores_originals() {
    let (mut state, mut ledger, mut bank) =
        setup(&[(0x10, 100_000_000), (0x11, 100_000_000), (0x12, 100_000_000)]);
    let (reporter, val) = (addr(0x10), addr(VAL));
    let id = hash(0xB0);

    state
        .escrow_reporter_stake(&mut ledger, &mut bank, &reporter, 300, 1, 90_000_000, id)
        .unwrap();

    let tracker = state.disputed_delegation_amounts.get(&id).unwrap();
    assert_eq!(tracker.total, 90_000_000);
    assert!(tracker.invariant_holds());
    assert_eq!(bank.balance(Pool::Dispute), 90_000_000);
    for byte in [0x10u8, 0x11, 0x12] {
        assert_eq!(ledger.delegation_shares(&addr(byte), &val), 70_000_000 * SHARE_PRECISION);
    }

    // reporter vindicated: same amount comes back, no winning purse
    let pool = state.return_slashed_tokens(&mut ledger, 90_000_000, id).unwrap();
    assert_eq!(pool, Pool::Bonded);
    for byte in [0x10u8, 0x11, 0x12] {
        assert_eq!(ledger.delegation_shares(&addr(byte), &val), 100_000_000 * SHARE_PRECISION);
    }

    // snapshot consumed exactly once
    let err = state.return_slashed_tokens(&mut ledger, 90_000_000, id).unwrap_err();
    assert!(matches!(err, RefundError::TrackerNotFound(_)));
}

#[test]
fn escrow_more_than_snapshot_total_rejected() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let err = state
        .escrow_reporter_stake(&mut ledger, &mut bank, &addr(0x10), 100, 1, 100_000_001, hash(0xB1))
        .unwrap_err();
    assert!(matches!(err, EscrowError::ExceedsSnapshotTotal { .. }));
}

#[test]
fn escrow_with_mismatched_power_rejected() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let err = state
        .escrow_reporter_stake(&mut ledger, &mut bank, &addr(0x10), 99, 1, 50_000_000, hash(0xB2))
        .unwrap_err();
    assert!(matches!(err, EscrowError::PowerMismatch { reported: 99, snapshot: 100 }));
}

#[test]
fn escrow_without_snapshot_rejected() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let err = state
        .escrow_reporter_stake(&mut ledger, &mut bank, &addr(0x10), 100, 9, 1_000, hash(0xB3))
        .unwrap_err();
    assert!(matches!(err, EscrowError::SnapshotNotFound { height: 9, .. }));
}

#[test]
fn escrow_draws_down_unbonding_entries_partially() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let (reporter, val) = (addr(0x10), addr(VAL));
    let id = hash(0xB4);

    // after the snapshot, 40M of the stake started unbonding in two entries
    ledger.unbond(&reporter, &val, 40_000_000 * SHARE_PRECISION).unwrap();
    bank.send_coins_from_module_to_module(Pool::Bonded, Pool::NotBonded, 40_000_000).unwrap();
    ledger.push_unbonding_entry(reporter, val, 30_000_000, 2, 1_000);
    ledger.push_unbonding_entry(reporter, val, 10_000_000, 3, 2_000);

    // owe 75M: 60M from the live delegation, 15M from the oldest entry
    state
        .escrow_reporter_stake(&mut ledger, &mut bank, &reporter, 100, 1, 75_000_000, id)
        .unwrap();

    let tracker = state.disputed_delegation_amounts.get(&id).unwrap();
    assert_eq!(tracker.total, 75_000_000);
    assert!(tracker.invariant_holds());
    assert_eq!(ledger.delegation_shares(&reporter, &val), 0);

    let ubd = ledger.unbonding_delegation(&reporter, &val).unwrap();
    assert_eq!(ubd.entries.len(), 2);
    assert_eq!(ubd.entries[0].balance, 15_000_000);
    assert_eq!(ubd.entries[1].balance, 10_000_000);

    assert_eq!(bank.balance(Pool::Dispute), 75_000_000);
    assert_eq!(bank.balance(Pool::NotBonded), 25_000_000);
}

#[test]
fn escrow_full_drawdown_removes_unbonding_queue() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let (reporter, val) = (addr(0x10), addr(VAL));

    ledger.unbond(&reporter, &val, 40_000_000 * SHARE_PRECISION).unwrap();
    bank.send_coins_from_module_to_module(Pool::Bonded, Pool::NotBonded, 40_000_000).unwrap();
    ledger.push_unbonding_entry(reporter, val, 30_000_000, 2, 1_000);
    ledger.push_unbonding_entry(reporter, val, 10_000_000, 3, 2_000);

    state
        .escrow_reporter_stake(&mut ledger, &mut bank, &reporter, 100, 1, 100_000_000, hash(0xB5))
        .unwrap();

    assert!(ledger.unbonding_delegation(&reporter, &val).is_err());
    assert_eq!(bank.balance(Pool::NotBonded), 0);
    assert_eq!(bank.balance(Pool::Dispute), 100_000_000);
}

#[test]
fn escrow_follows_redelegation_destination() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let (reporter, v1, v2) = (addr(0x10), addr(VAL), addr(0x02));
    let id = hash(0xB6);

    // after the snapshot the whole position redelegated V1 -> V2
    ledger.add_validator(v2, BondStatus::Bonded);
    ledger.unbond(&reporter, &v1, 100_000_000 * SHARE_PRECISION).unwrap();
    ledger.delegate(&reporter, 100_000_000, BondStatus::Bonded, &v2, false).unwrap();
    ledger.set_redelegation(reporter, v1, v2);

    state
        .escrow_reporter_stake(&mut ledger, &mut bank, &reporter, 100, 1, 100_000_000, id)
        .unwrap();

    let tracker = state.disputed_delegation_amounts.get(&id).unwrap();
    assert_eq!(tracker.total, 100_000_000);
    // the deduction is attributed to the destination validator
    assert!(tracker.token_origins.iter().all(|o| o.validator == v2));
    assert_eq!(ledger.delegation_shares(&reporter, &v2), 0);
}

#[test]
fn escrow_without_redelegation_destination_is_fatal() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let (reporter, v1) = (addr(0x10), addr(VAL));

    // stake left V1 but no redelegation record exists to chase
    ledger.unbond(&reporter, &v1, 100_000_000 * SHARE_PRECISION).unwrap();

    let err = state
        .escrow_reporter_stake(&mut ledger, &mut bank, &reporter, 100, 1, 100_000_000, hash(0xB7))
        .unwrap_err();
    assert!(matches!(err, EscrowError::RedelegationDestinationNotFound { .. }));
}

// ════════════════════════════════════════════════════════════════════════════
// 3. SLASH REVERSAL
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn return_with_winning_purse_scales_refunds() {
    let (mut state, mut ledger, mut bank) =
        setup(&[(0x10, 60_000_000), (0x11, 40_000_000)]);
    let (reporter, selector, val) = (addr(0x10), addr(0x11), addr(VAL));
    let id = hash(0xC0);

    state
        .escrow_reporter_stake(&mut ledger, &mut bank, &reporter, 100, 1, 100_000_000, id)
        .unwrap();
    assert_eq!(ledger.delegation_shares(&reporter, &val), 0);
    assert_eq!(ledger.delegation_shares(&selector, &val), 0);

    // vindicated plus the disputer's forfeited fee: 150M against 100M escrowed
    let pool = state.return_slashed_tokens(&mut ledger, 150_000_000, id).unwrap();
    assert_eq!(pool, Pool::Bonded);
    assert_eq!(ledger.delegation_shares(&reporter, &val), 90_000_000 * SHARE_PRECISION);
    assert_eq!(ledger.delegation_shares(&selector, &val), 60_000_000 * SHARE_PRECISION);
}

#[test]
fn return_substitutes_bonded_validator_when_original_gone() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let (reporter, v1, v2) = (addr(0x10), addr(VAL), addr(0x02));
    let id = hash(0xC1);

    state
        .escrow_reporter_stake(&mut ledger, &mut bank, &reporter, 100, 1, 100_000_000, id)
        .unwrap();

    // original validator disappears entirely; another bonded one exists
    ledger.remove_validator(&v1);
    ledger.add_validator(v2, BondStatus::Bonded);

    let pool = state.return_slashed_tokens(&mut ledger, 100_000_000, id).unwrap();
    assert_eq!(pool, Pool::Bonded);
    assert_eq!(ledger.delegation_shares(&reporter, &v2), 100_000_000 * SHARE_PRECISION);
}

#[test]
fn return_fails_loudly_with_no_bonded_validator() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let (reporter, v1) = (addr(0x10), addr(VAL));
    let id = hash(0xC2);

    state
        .escrow_reporter_stake(&mut ledger, &mut bank, &reporter, 100, 1, 100_000_000, id)
        .unwrap();
    ledger.remove_validator(&v1);

    let err = state.return_slashed_tokens(&mut ledger, 100_000_000, id).unwrap_err();
    assert!(matches!(err, RefundError::NoBondedValidator));
}

#[test]
fn return_reports_not_bonded_pool_for_unbonding_destination() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let (reporter, val) = (addr(0x10), addr(VAL));
    let id = hash(0xC3);

    state
        .escrow_reporter_stake(&mut ledger, &mut bank, &reporter, 100, 1, 100_000_000, id)
        .unwrap();

    // original validator still known, just no longer bonded: reused as-is
    ledger.set_validator_status(&val, BondStatus::Unbonding);

    let pool = state.return_slashed_tokens(&mut ledger, 100_000_000, id).unwrap();
    assert_eq!(pool, Pool::NotBonded);
    assert_eq!(ledger.delegation_shares(&reporter, &val), 100_000_000 * SHARE_PRECISION);
}

// ════════════════════════════════════════════════════════════════════════════
// 4. FEE REFUND
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn fee_refund_is_proportional_and_consumes_tracker() {
    let (mut state, mut ledger, mut bank) =
        setup(&[(0x10, 100_000_000), (0x11, 100_000_000), (0x12, 100_000_000)]);
    let (reporter, val) = (addr(0x10), addr(VAL));
    let id = hash(0xD0);

    state
        .fee_from_reporter_stake(&mut ledger, &mut bank, &reporter, 100_000_000, id)
        .unwrap();

    let pool = state.fee_refund(&mut ledger, id, 100_000_000).unwrap();
    assert_eq!(pool, Pool::Bonded);
    // everyone restored to their pre-fee position
    for byte in [0x10u8, 0x11, 0x12] {
        assert_eq!(ledger.delegation_shares(&addr(byte), &val), 100_000_000 * SHARE_PRECISION);
    }

    let err = state.fee_refund(&mut ledger, id, 100_000_000).unwrap_err();
    assert!(matches!(err, RefundError::TrackerNotFound(_)));
}

#[test]
fn fee_refund_lands_on_substitute_when_original_not_bonded() {
    let (mut state, mut ledger, mut bank) = setup(&[(0x10, 100_000_000)]);
    let (reporter, v1, v2) = (addr(0x10), addr(VAL), addr(0x02));
    let id = hash(0xD1);

    state
        .fee_from_reporter_stake(&mut ledger, &mut bank, &reporter, 50_000_000, id)
        .unwrap();

    // fee refunds demand a bonded destination, unlike slash reversal
    ledger.set_validator_status(&v1, BondStatus::Unbonding);
    ledger.add_validator(v2, BondStatus::Bonded);

    state.fee_refund(&mut ledger, id, 50_000_000).unwrap();
    assert_eq!(ledger.delegation_shares(&reporter, &v2), 50_000_000 * SHARE_PRECISION);
}

#[test]
fn refund_of_unknown_hash_fails() {
    let (mut state, mut ledger, _bank) = setup(&[(0x10, 100_000_000)]);
    let err = state.fee_refund(&mut ledger, hash(0xDD), 1).unwrap_err();
    assert!(matches!(err, RefundError::TrackerNotFound(_)));
}
