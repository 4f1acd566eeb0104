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

//! Tranche ledger.
//!
//! A [`Tranche`] carries the state shared by every holder of that tranche
//! across all funding cycles: deposited principal, the interest share price
//! and the lock timestamp. Principal share prices live in a [`TrancheSlice`],
//! one per tranche per funding cycle, so a drawdown in one cycle never
//! touches capital committed in another.
//!
//! ```text
//!  principal_share_price          1.0 ──drawdown──► 0.0          (never up)
//!  principal_repaid_share_price   0.0 ──repayment─► 1.0          (never down)
//!  interest_share_price           0.0 ──interest──► ...          (never down)
//! ```

use crate::base::{Amount, SharePrice, Timestamp, TrancheKind};
use crate::error::{ArithmeticError, LedgerError};
use crate::math::{self, ONE, Rounding};
use serde::Serialize;

/// Tranche-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tranche {
    kind: TrancheKind,
    /// Deposits across all cycles, net of withdrawals made before lock.
    principal_deposited: Amount,
    /// Deposits of cycles that have locked. Interest is spread over this.
    principal_locked: Amount,
    interest_share_price: SharePrice,
    /// Gross interest attributed to this tranche as it accrued.
    interest_accrued: Amount,
    /// Net interest actually distributed to holders.
    interest_paid: Amount,
    locked_until: Timestamp,
}

impl Tranche {
    pub fn new(kind: TrancheKind) -> Self {
        Self {
            kind,
            principal_deposited: 0,
            principal_locked: 0,
            interest_share_price: 0,
            interest_accrued: 0,
            interest_paid: 0,
            locked_until: 0,
        }
    }

    pub fn kind(&self) -> TrancheKind {
        self.kind
    }

    pub fn principal_deposited(&self) -> Amount {
        self.principal_deposited
    }

    pub fn principal_locked(&self) -> Amount {
        self.principal_locked
    }

    pub fn interest_share_price(&self) -> SharePrice {
        self.interest_share_price
    }

    pub fn interest_accrued(&self) -> Amount {
        self.interest_accrued
    }

    pub fn interest_paid(&self) -> Amount {
        self.interest_paid
    }

    pub fn locked_until(&self) -> Timestamp {
        self.locked_until
    }

    pub fn is_locked(&self) -> bool {
        self.locked_until != 0
    }

    /// Adds `amount` to this tranche and to the current cycle's slice.
    pub fn deposit(&mut self, slice: &mut TrancheSlice, amount: Amount) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if self.is_locked() {
            return Err(LedgerError::TrancheLocked(self.kind));
        }
        let deposited = checked_add(self.principal_deposited, amount)?;
        let slice_deposited = checked_add(slice.principal_deposited, amount)?;
        self.principal_deposited = deposited;
        slice.principal_deposited = slice_deposited;
        Ok(())
    }

    /// Returns un-invested capital while the tranche is still open.
    pub fn withdraw_unlocked(&mut self, slice: &mut TrancheSlice, amount: Amount) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if self.is_locked() {
            return Err(LedgerError::TrancheLocked(self.kind));
        }
        if slice.principal_deposited < amount {
            return Err(LedgerError::InsufficientFunds {
                attempted: amount,
                available: slice.principal_deposited,
            });
        }
        self.principal_deposited -= amount;
        slice.principal_deposited -= amount;
        Ok(())
    }

    /// Locks the tranche for `duration` seconds from `now`.
    pub fn lock(&mut self, now: Timestamp, duration: u64) -> Result<(), LedgerError> {
        if self.is_locked() {
            return Err(LedgerError::TrancheLocked(self.kind));
        }
        self.locked_until = lock_deadline(now, duration)?;
        Ok(())
    }

    /// Moves the lock deadline of an already locked tranche.
    pub(crate) fn relock(&mut self, now: Timestamp, duration: u64) -> Result<(), LedgerError> {
        self.locked_until = lock_deadline(now, duration)?;
        Ok(())
    }

    /// Opens the tranche for a new funding cycle. Share prices are kept.
    pub(crate) fn unlock(&mut self) {
        self.locked_until = 0;
    }

    /// Commits a cycle's deposits: they start earning interest from the
    /// current interest share price.
    pub(crate) fn commit_slice(&mut self, slice: &mut TrancheSlice) -> Result<(), LedgerError> {
        self.principal_locked = checked_add(self.principal_locked, slice.principal_deposited)?;
        slice.interest_checkpoint = self.interest_share_price;
        Ok(())
    }

    /// Records gross interest owed to this tranche.
    pub(crate) fn record_interest_accrued(&mut self, amount: Amount) -> Result<(), LedgerError> {
        self.interest_accrued = checked_add(self.interest_accrued, amount)?;
        Ok(())
    }

    /// Raises the interest share price by `amount / principal_locked`.
    ///
    /// Returns the share-price delta. A tranche without locked principal
    /// cannot receive interest and returns an error; callers skip it first.
    pub fn apply_interest_distribution(&mut self, amount: Amount) -> Result<SharePrice, LedgerError> {
        if amount == 0 {
            return Ok(0);
        }
        if self.principal_locked == 0 {
            return Err(ArithmeticError::DivisionByZero.into());
        }
        let delta = math::usdc_to_share_price(amount, self.principal_locked, Rounding::Down)?;
        let price = self
            .interest_share_price
            .checked_add(delta)
            .ok_or(ArithmeticError::Overflow)?;
        let paid = checked_add(self.interest_paid, amount)?;
        self.interest_share_price = price;
        self.interest_paid = paid;
        Ok(delta)
    }
}

/// One tranche's principal accounting for a single funding cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrancheSlice {
    principal_deposited: Amount,
    /// Fraction of the cycle's capital not yet drawn down.
    principal_share_price: SharePrice,
    /// Fraction of the cycle's capital returned by the borrower.
    principal_repaid_share_price: SharePrice,
    /// Tranche interest share price at the moment this cycle locked.
    interest_checkpoint: SharePrice,
}

impl Default for TrancheSlice {
    fn default() -> Self {
        Self::new()
    }
}

impl TrancheSlice {
    pub fn new() -> Self {
        Self {
            principal_deposited: 0,
            principal_share_price: ONE,
            principal_repaid_share_price: 0,
            interest_checkpoint: 0,
        }
    }

    pub fn principal_deposited(&self) -> Amount {
        self.principal_deposited
    }

    pub fn principal_share_price(&self) -> SharePrice {
        self.principal_share_price
    }

    pub fn principal_repaid_share_price(&self) -> SharePrice {
        self.principal_repaid_share_price
    }

    pub fn interest_checkpoint(&self) -> SharePrice {
        self.interest_checkpoint
    }

    /// Share price of principal a holder may redeem: undrawn plus repaid.
    pub fn redeemable_principal_share_price(&self) -> SharePrice {
        self.principal_share_price
            .saturating_add(self.principal_repaid_share_price)
    }

    /// Capital of this slice still undrawn.
    pub fn undrawn(&self) -> Result<Amount, LedgerError> {
        Ok(math::share_price_to_usdc(
            self.principal_share_price,
            self.principal_deposited,
            Rounding::Down,
        )?)
    }

    /// Lowers the principal share price by `amount / principal_deposited`.
    ///
    /// Rounds the delta up and never goes below zero.
    pub fn apply_principal_reduction(&mut self, amount: Amount) -> Result<SharePrice, LedgerError> {
        if amount == 0 || self.principal_deposited == 0 {
            return Ok(0);
        }
        let delta = math::usdc_to_share_price(amount, self.principal_deposited, Rounding::Up)?
            .min(self.principal_share_price);
        self.principal_share_price -= delta;
        Ok(delta)
    }

    /// Raises the repaid share price by `amount / principal_deposited`, rounded down.
    pub fn apply_principal_repayment(&mut self, amount: Amount) -> Result<SharePrice, LedgerError> {
        if amount == 0 || self.principal_deposited == 0 {
            return Ok(0);
        }
        let delta = math::usdc_to_share_price(amount, self.principal_deposited, Rounding::Down)?;
        self.principal_repaid_share_price = self
            .principal_repaid_share_price
            .checked_add(delta)
            .ok_or(ArithmeticError::Overflow)?;
        Ok(delta)
    }

    /// Currency needed to lift the repaid share price to `expected`.
    pub fn principal_shortfall(&self, expected: SharePrice) -> Result<Amount, LedgerError> {
        let gap = expected.saturating_sub(self.principal_repaid_share_price);
        Ok(math::share_price_to_usdc(gap, self.principal_deposited, Rounding::Down)?)
    }
}

fn checked_add(a: Amount, b: Amount) -> Result<Amount, LedgerError> {
    a.checked_add(b)
        .ok_or(LedgerError::Arithmetic(ArithmeticError::Overflow))
}

fn lock_deadline(now: Timestamp, duration: u64) -> Result<Timestamp, LedgerError> {
    now.checked_add(duration)
        .ok_or(LedgerError::Arithmetic(ArithmeticError::Overflow))
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC: Amount = math::CURRENCY_SCALE;

    #[test]
    fn deposit_into_open_tranche() {
        let mut tranche = Tranche::new(TrancheKind::Junior);
        let mut slice = TrancheSlice::new();
        tranche.deposit(&mut slice, 20 * USDC).unwrap();
        assert_eq!(tranche.principal_deposited(), 20 * USDC);
        assert_eq!(slice.principal_deposited(), 20 * USDC);
        assert_eq!(slice.principal_share_price(), ONE);
    }

    #[test]
    fn deposit_rejects_zero() {
        let mut tranche = Tranche::new(TrancheKind::Junior);
        let mut slice = TrancheSlice::new();
        assert_eq!(
            tranche.deposit(&mut slice, 0),
            Err(LedgerError::InvalidAmount)
        );
    }

    #[test]
    fn locked_tranche_rejects_deposit_and_second_lock() {
        let mut tranche = Tranche::new(TrancheKind::Senior);
        let mut slice = TrancheSlice::new();
        tranche.lock(100, 50).unwrap();
        assert_eq!(tranche.locked_until(), 150);
        assert_eq!(
            tranche.deposit(&mut slice, USDC),
            Err(LedgerError::TrancheLocked(TrancheKind::Senior))
        );
        assert_eq!(
            tranche.lock(200, 50),
            Err(LedgerError::TrancheLocked(TrancheKind::Senior))
        );
    }

    #[test]
    fn withdraw_unlocked_reduces_deposits() {
        let mut tranche = Tranche::new(TrancheKind::Junior);
        let mut slice = TrancheSlice::new();
        tranche.deposit(&mut slice, 10 * USDC).unwrap();
        tranche.withdraw_unlocked(&mut slice, 4 * USDC).unwrap();
        assert_eq!(tranche.principal_deposited(), 6 * USDC);
        assert_eq!(
            tranche.withdraw_unlocked(&mut slice, 7 * USDC),
            Err(LedgerError::InsufficientFunds {
                attempted: 7 * USDC,
                available: 6 * USDC
            })
        );
    }

    #[test]
    fn interest_distribution_spreads_over_locked_principal() {
        let mut tranche = Tranche::new(TrancheKind::Senior);
        let mut slice = TrancheSlice::new();
        tranche.deposit(&mut slice, 80 * USDC).unwrap();
        tranche.commit_slice(&mut slice).unwrap();
        let delta = tranche.apply_interest_distribution(5_600_000).unwrap();
        assert_eq!(delta, 7 * ONE / 100);
        assert_eq!(tranche.interest_share_price(), 7 * ONE / 100);
        assert_eq!(tranche.interest_paid(), 5_600_000);
    }

    #[test]
    fn interest_distribution_without_principal_is_rejected() {
        let mut tranche = Tranche::new(TrancheKind::Junior);
        assert_eq!(
            tranche.apply_interest_distribution(1),
            Err(LedgerError::Arithmetic(ArithmeticError::DivisionByZero))
        );
        assert_eq!(tranche.apply_interest_distribution(0), Ok(0));
    }

    #[test]
    fn commit_slice_checkpoints_interest_price() {
        let mut tranche = Tranche::new(TrancheKind::Junior);
        let mut first = TrancheSlice::new();
        tranche.deposit(&mut first, 10 * USDC).unwrap();
        tranche.commit_slice(&mut first).unwrap();
        tranche.apply_interest_distribution(USDC).unwrap();

        tranche.unlock();
        let mut second = TrancheSlice::new();
        tranche.deposit(&mut second, 10 * USDC).unwrap();
        tranche.commit_slice(&mut second).unwrap();

        assert_eq!(first.interest_checkpoint(), 0);
        assert_eq!(second.interest_checkpoint(), ONE / 10);
        assert_eq!(tranche.principal_locked(), 20 * USDC);
    }

    #[test]
    fn principal_reduction_rounds_against_holders() {
        let mut slice = TrancheSlice::new();
        slice.principal_deposited = 3;
        let delta = slice.apply_principal_reduction(1).unwrap();
        assert_eq!(delta, ONE / 3 + 1);
        assert_eq!(slice.undrawn().unwrap(), 1);
    }

    #[test]
    fn principal_reduction_floors_at_zero() {
        let mut slice = TrancheSlice::new();
        slice.principal_deposited = 10;
        slice.apply_principal_reduction(25).unwrap();
        assert_eq!(slice.principal_share_price(), 0);
    }

    #[test]
    fn repayment_and_shortfall() {
        let mut slice = TrancheSlice::new();
        slice.principal_deposited = 80 * USDC;
        slice.apply_principal_reduction(80 * USDC).unwrap();
        assert_eq!(slice.principal_shortfall(ONE).unwrap(), 80 * USDC);
        slice.apply_principal_repayment(30 * USDC).unwrap();
        assert_eq!(slice.principal_shortfall(ONE).unwrap(), 50 * USDC);
        assert_eq!(slice.redeemable_principal_share_price(), 3 * ONE / 8);
    }
}
