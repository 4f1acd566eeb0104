// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Facility lifecycle and waterfall integration tests.

use tranche_ledger::credit::{CreditLine, CreditTermsParams};
use tranche_ledger::facility::FacilityConfig;
use tranche_ledger::math::{CURRENCY_SCALE as USDC, ONE, SECONDS_PER_DAY as DAY};
use tranche_ledger::{
    AccessControl, ActorId, Capability, Facility, FacilityId, FacilityState, LedgerError, PositionBook, PositionId,
    PositionRegistry, Redeemable, TrancheKind,
};

const ADMIN: ActorId = ActorId(1);
const BORROWER: ActorId = ActorId(2);
const POOL: ActorId = ActorId(3);
const ALICE: ActorId = ActorId(4);
const BOB: ActorId = ActorId(5);
const WINDOW: u64 = 7 * DAY;

struct Setup {
    facility: Facility,
    access: AccessControl,
    book: PositionBook,
}

fn make_setup() -> Setup {
    let mut access = AccessControl::new();
    access.grant(ADMIN, Capability::Admin);
    access.grant(BORROWER, Capability::Borrower(FacilityId(0)));
    access.grant(POOL, Capability::SeniorPool);
    let credit = CreditLine::new(CreditTermsParams {
        interest_apr: ONE / 10,
        late_fee_apr: 0,
        payment_period_secs: 30 * DAY,
        term_secs: 365 * DAY,
        late_fee_grace_secs: 0,
    });
    let facility = Facility::new(
        FacilityId(0),
        FacilityConfig {
            borrower: BORROWER,
            max_limit: 1_000 * USDC,
            junior_fee_percent: 20,
            reserve_fee_percent: 10,
            drawdown_period_secs: WINDOW,
        },
        Box::new(credit),
        0,
    );
    Setup {
        facility,
        access,
        book: PositionBook::new(),
    }
}

impl Setup {
    fn deposit(&mut self, actor: ActorId, tranche: TrancheKind, amount: u128) -> PositionId {
        self.facility
            .deposit(actor, tranche, amount, &self.access, &mut self.book)
            .unwrap()
    }

    fn lock(&mut self, now: u64) {
        self.facility.lock_junior_capital(BORROWER, &self.access, now).unwrap();
    }

    fn lock_pool(&mut self, now: u64) {
        self.facility.lock_pool(BORROWER, &self.access, now).unwrap();
    }

    fn drawdown(&mut self, amount: u128, now: u64) {
        self.facility.drawdown(BORROWER, amount, &self.access, now).unwrap();
    }

    fn available(&self, id: PositionId, now: u64) -> Redeemable {
        self.facility.available_to_withdraw(id, &self.book, now).unwrap()
    }
}

/// Alice 20 junior, pool 80 senior, 100 drawn at t = 0.
fn make_drawn() -> (Setup, PositionId, PositionId) {
    let mut s = make_setup();
    let junior = s.deposit(ALICE, TrancheKind::Junior, 20 * USDC);
    s.lock(0);
    let senior = s.deposit(POOL, TrancheKind::Senior, 80 * USDC);
    s.lock_pool(0);
    s.drawdown(100 * USDC, 0);
    (s, junior, senior)
}

// === End to end ===

#[test]
fn full_term_repayment_matches_worked_example() {
    let (mut s, junior, senior) = make_drawn();
    let now = 365 * DAY;

    let receipt = s.facility.pay(110 * USDC, now).unwrap();
    assert_eq!(receipt.reserve, USDC);
    assert_eq!(receipt.senior_interest, 5_600_000);
    assert_eq!(receipt.senior_principal, 80 * USDC);
    assert_eq!(receipt.junior_interest, 3_400_000);
    assert_eq!(receipt.junior_principal, 20 * USDC);
    assert_eq!(receipt.remainder, 0);
    assert_eq!(receipt.total(), 110 * USDC);

    assert_eq!(
        s.facility.tranche(TrancheKind::Senior).interest_share_price(),
        7 * ONE / 100
    );
    assert_eq!(
        s.facility.tranche(TrancheKind::Junior).interest_share_price(),
        17 * ONE / 100
    );
    assert_eq!(
        s.available(senior, now),
        Redeemable { interest: 5_600_000, principal: 80 * USDC }
    );
    assert_eq!(
        s.available(junior, now),
        Redeemable { interest: 3_400_000, principal: 20 * USDC }
    );
    assert_eq!(s.facility.credit().balance(), 0);
    assert!(!s.facility.is_late(now));
}

#[test]
fn holder_withdraws_interest_before_principal_then_closes() {
    let (mut s, junior, _) = make_drawn();
    let now = 365 * DAY;
    s.facility.pay(110 * USDC, now).unwrap();

    let first = s.facility.withdraw(ALICE, junior, 4 * USDC, &mut s.book, now).unwrap();
    assert_eq!(first, Redeemable { interest: 3_400_000, principal: 600_000 });

    assert_eq!(
        s.facility.close_position(ALICE, junior, &mut s.book, now),
        Err(LedgerError::PositionNotRedeemed(junior))
    );

    let rest = s.facility.withdraw_max(ALICE, junior, &mut s.book, now).unwrap();
    assert_eq!(rest, Redeemable { interest: 0, principal: 19_400_000 });
    let again = s.facility.withdraw_max(ALICE, junior, &mut s.book, now).unwrap();
    assert!(again.is_zero());

    let closed = s.facility.close_position(ALICE, junior, &mut s.book, now).unwrap();
    assert_eq!(closed.interest_redeemed, 3_400_000);
    assert!(s.book.get(junior).is_none());
}

#[test]
fn withdrawing_more_than_redeemable_is_rejected() {
    let (mut s, junior, _) = make_drawn();
    let now = 365 * DAY;
    s.facility.pay(110 * USDC, now).unwrap();
    assert_eq!(
        s.facility.withdraw(ALICE, junior, 24 * USDC, &mut s.book, now),
        Err(LedgerError::InsufficientFunds {
            attempted: 24 * USDC,
            available: 23_400_000
        })
    );
    assert_eq!(s.book.get(junior).unwrap().interest_redeemed, 0);
}

// === Priority ===

#[test]
fn interest_shortfall_reaches_junior_last() {
    let (mut s, junior, senior) = make_drawn();
    let now = 365 * DAY;
    let receipt = s.facility.pay(6 * USDC, now).unwrap();
    assert_eq!(receipt.reserve, 600_000);
    assert_eq!(receipt.senior_interest, 5_400_000);
    assert_eq!(receipt.junior_interest, 0);
    assert_eq!(receipt.senior_principal + receipt.junior_principal, 0);
    assert_eq!(s.available(junior, now), Redeemable::default());
    assert_eq!(s.available(senior, now).interest, 5_400_000);

    // The rest of the interest tops senior up to its 5.6 before junior sees any.
    let second = s.facility.pay(4 * USDC, now).unwrap();
    assert_eq!(second.reserve, 400_000);
    assert_eq!(second.senior_interest, 200_000);
    assert_eq!(second.junior_interest, 3_400_000);
}

#[test]
fn principal_shortfall_reaches_junior_last() {
    let (mut s, junior, senior) = make_drawn();
    let now = 365 * DAY;
    let receipt = s.facility.pay(10 * USDC + 90 * USDC, now).unwrap();
    assert_eq!(receipt.senior_principal, 80 * USDC);
    assert_eq!(receipt.junior_principal, 10 * USDC);
    assert_eq!(s.available(senior, now).principal, 80 * USDC);
    assert_eq!(s.available(junior, now).principal, 10 * USDC);
}

#[test]
fn overpayment_is_junior_interest() {
    let (mut s, _, _) = make_drawn();
    let receipt = s.facility.pay(112 * USDC, 365 * DAY).unwrap();
    assert_eq!(receipt.remainder, 2 * USDC);
    assert_eq!(receipt.junior_interest, 5_400_000);
    assert_eq!(receipt.total(), 112 * USDC);
}

// === Lifecycle ===

#[test]
fn deposits_rejected_once_locked() {
    let (mut s, _, _) = make_drawn();
    assert_eq!(
        s.facility.deposit(ALICE, TrancheKind::Junior, USDC, &s.access, &mut s.book),
        Err(LedgerError::TrancheLocked(TrancheKind::Junior))
    );
}

#[test]
fn junior_withdraws_before_lock_only() {
    let mut s = make_setup();
    let id = s.deposit(ALICE, TrancheKind::Junior, 20 * USDC);
    s.lock(0);
    assert_eq!(
        s.facility.withdraw(ALICE, id, USDC, &mut s.book, 0),
        Err(LedgerError::TrancheLocked(TrancheKind::Junior))
    );
}

#[test]
fn rejected_operations_leave_state_unchanged() {
    let (mut s, _, _) = make_drawn();
    let before = s.facility.status(DAY);
    assert!(s.facility.drawdown(BORROWER, USDC, &s.access, DAY).is_err());
    assert!(s.facility.reopen(BORROWER, &s.access, DAY).is_err());
    assert!(s.facility.pay(0, DAY).is_err());
    assert_eq!(s.facility.status(DAY), before);
}

#[test]
fn paused_facility_keeps_reads() {
    let (mut s, junior, _) = make_drawn();
    s.facility.pause(ADMIN, &s.access).unwrap();
    assert_eq!(s.facility.pay(USDC, DAY), Err(LedgerError::Paused));
    assert_eq!(s.facility.state(DAY), FacilityState::PoolLocked);
    assert!(s.facility.available_to_withdraw(junior, &s.book, DAY).is_ok());
}

#[test]
fn paused_facility_keeps_fully_redeemed_positions() {
    let (mut s, junior, _) = make_drawn();
    let now = 365 * DAY;
    s.facility.pay(110 * USDC, now).unwrap();
    s.facility.withdraw_max(ALICE, junior, &mut s.book, now).unwrap();

    s.facility.pause(ADMIN, &s.access).unwrap();
    assert_eq!(
        s.facility.close_position(ALICE, junior, &mut s.book, now),
        Err(LedgerError::Paused)
    );
    assert!(s.book.get(junior).is_some());

    s.facility.unpause(ADMIN, &s.access).unwrap();
    s.facility.close_position(ALICE, junior, &mut s.book, now).unwrap();
    assert!(s.book.get(junior).is_none());
}

// === Multiple funding cycles ===

#[test]
fn second_cycle_is_independent_of_the_first() {
    let (mut s, alice, pool_first) = make_drawn();

    // First month's interest only.
    let interest = s.facility.pay(821_917, 30 * DAY).unwrap();
    assert_eq!(s.available(alice, 30 * DAY).interest, interest.junior_interest);
    assert_eq!(s.available(pool_first, 30 * DAY).interest, interest.senior_interest);
    let alice_before = s.available(alice, 30 * DAY);

    // Second cycle: Bob 10 junior, pool 40 senior, half of it drawn.
    s.facility.reopen(BORROWER, &s.access, 30 * DAY).unwrap();
    assert_eq!(s.facility.state(30 * DAY), FacilityState::Open);
    let bob = s.deposit(BOB, TrancheKind::Junior, 10 * USDC);
    s.lock(30 * DAY);
    let pool_second = s.deposit(POOL, TrancheKind::Senior, 40 * USDC);
    s.lock_pool(30 * DAY);
    assert_eq!(s.facility.credit().limit(), 150 * USDC);
    s.drawdown(25 * USDC, 30 * DAY);

    let now = 30 * DAY + WINDOW + 1;
    assert_eq!(s.available(alice, now), alice_before);
    assert_eq!(s.available(bob, now), Redeemable { interest: 0, principal: 5 * USDC });
    assert_eq!(s.available(pool_second, now).principal, 20 * USDC);

    // Interest of the second month is shared by every locked junior unit.
    let alice_mid = s.available(alice, 60 * DAY).interest;
    s.facility.pay(1_027_397, 60 * DAY).unwrap();
    let alice_delta = s.available(alice, 60 * DAY).interest - alice_mid;
    let bob_delta = s.available(bob, 60 * DAY).interest;
    assert!(alice_delta.abs_diff(2 * bob_delta) <= 1);

    // Principal returns pro rata to what each cycle deployed, senior first.
    let receipt = s.facility.pay(25 * USDC, 60 * DAY).unwrap();
    assert_eq!(receipt.senior_principal, 20 * USDC);
    assert_eq!(receipt.junior_principal, 5 * USDC);
    assert_eq!(s.available(alice, 60 * DAY).principal, 4 * USDC);
    assert_eq!(s.available(bob, 60 * DAY).principal, 6 * USDC);
    assert_eq!(s.available(pool_first, 60 * DAY).principal, 16 * USDC);
    assert_eq!(s.available(pool_second, 60 * DAY).principal, 24 * USDC);

    let first = &s.facility.cycles()[0];
    assert_eq!(first.slice(TrancheKind::Junior).principal_share_price(), 0);
    assert_eq!(first.slice(TrancheKind::Junior).principal_repaid_share_price(), ONE / 5);
}
