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

//! Credit terms.
//!
//! The ledger never computes what a borrower owes; it asks a
//! [`CreditTerms`] implementation. [`CreditLine`] is a simple one: linear
//! interest billed at every payment period, principal due in full at term
//! end, and a late-fee rate once an installment stays unpaid past a grace
//! period.

use crate::base::{Amount, SharePrice, Timestamp};
use crate::error::{ArithmeticError, LedgerError};
use crate::math::{self, ONE, Rounding, SECONDS_PER_DAY, SECONDS_PER_YEAR};
use serde::Serialize;
use std::fmt;

/// What the borrower owes right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub interest_owed: Amount,
    pub principal_owed: Amount,
    pub balance: Amount,
    /// Interest accrued over the lifetime of the credit line.
    pub total_interest_accrued: Amount,
}

/// How a payment is split against the borrower's obligations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaymentSplit {
    pub interest: Amount,
    pub principal: Amount,
    /// Principal paid ahead of schedule.
    pub additional_balance: Amount,
    /// Whatever exceeds every obligation including the balance.
    pub remainder: Amount,
}

impl PaymentSplit {
    /// Interest first, then principal owed, then the rest of the balance.
    pub fn new(amount: Amount, assessment: &Assessment) -> Self {
        let interest = amount.min(assessment.interest_owed);
        let mut remaining = amount - interest;
        let principal = remaining.min(assessment.principal_owed);
        remaining -= principal;
        let additional_balance = remaining.min(assessment.balance.saturating_sub(principal));
        remaining -= additional_balance;
        Self {
            interest,
            principal,
            additional_balance,
            remainder: remaining,
        }
    }

    pub fn principal_total(&self) -> Amount {
        self.principal + self.additional_balance
    }
}

/// Credit-terms collaborator consumed by a facility.
pub trait CreditTerms: fmt::Debug + Send {
    /// Brings owed amounts up to date with `now`.
    fn assess(&mut self, now: Timestamp) -> Result<Assessment, LedgerError>;

    fn drawdown(&mut self, amount: Amount, now: Timestamp) -> Result<(), LedgerError>;

    fn apply_payment(&mut self, split: &PaymentSplit, now: Timestamp) -> Result<(), LedgerError>;

    /// True when an installment is due and unpaid.
    fn is_late(&self, now: Timestamp) -> bool;

    /// Whole days since the oldest unpaid installment fell due.
    fn days_late(&self, now: Timestamp) -> u64;

    fn balance(&self) -> Amount;

    fn limit(&self) -> Amount;

    fn set_limit(&mut self, limit: Amount);

    fn interest_owed(&self) -> Amount;

    fn principal_owed(&self) -> Amount;

    fn total_interest_accrued(&self) -> Amount;

    fn term_end_time(&self) -> Timestamp;

    fn next_due_time(&self) -> Timestamp;
}

/// Parameters of a [`CreditLine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditTermsParams {
    /// Annual rate, fixed point.
    pub interest_apr: SharePrice,
    /// Extra annual rate charged while late, fixed point.
    pub late_fee_apr: SharePrice,
    pub payment_period_secs: u64,
    pub term_secs: u64,
    pub late_fee_grace_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditLine {
    #[serde(skip)]
    params: CreditTermsParams,
    limit: Amount,
    balance: Amount,
    term_end_time: Timestamp,
    next_due_time: Timestamp,
    interest_accrued_as_of: Timestamp,
    unbilled_interest: Amount,
    interest_owed: Amount,
    principal_owed: Amount,
    total_interest_accrued: Amount,
    past_due_since: Option<Timestamp>,
}

impl CreditLine {
    pub fn new(params: CreditTermsParams) -> Self {
        Self {
            params,
            limit: 0,
            balance: 0,
            term_end_time: 0,
            next_due_time: 0,
            interest_accrued_as_of: 0,
            unbilled_interest: 0,
            interest_owed: 0,
            principal_owed: 0,
            total_interest_accrued: 0,
            past_due_since: None,
        }
    }

    pub fn params(&self) -> &CreditTermsParams {
        &self.params
    }

    fn started(&self) -> bool {
        self.term_end_time != 0
    }

    fn owes(&self) -> bool {
        self.interest_owed > 0 || self.principal_owed > 0
    }

    /// Earliest due time that is unpaid as of `now`, if any.
    fn oldest_unpaid_due(&self, now: Timestamp) -> Option<Timestamp> {
        if let Some(since) = self.past_due_since {
            return Some(since);
        }
        if self.started() && self.balance > 0 && now >= self.next_due_time {
            return Some(self.next_due_time);
        }
        None
    }

    fn accrue(&mut self, to: Timestamp) -> Result<(), LedgerError> {
        if to <= self.interest_accrued_as_of {
            return Ok(());
        }
        let from = self.interest_accrued_as_of;
        let mut interest = interest_for(self.balance, self.params.interest_apr, to - from)?;
        if let Some(since) = self.past_due_since {
            let late_from = since.saturating_add(self.params.late_fee_grace_secs).max(from);
            if to > late_from {
                interest = interest
                    .checked_add(interest_for(self.balance, self.params.late_fee_apr, to - late_from)?)
                    .ok_or(ArithmeticError::Overflow)?;
            }
        }
        self.unbilled_interest = self
            .unbilled_interest
            .checked_add(interest)
            .ok_or(ArithmeticError::Overflow)?;
        self.total_interest_accrued = self
            .total_interest_accrued
            .checked_add(interest)
            .ok_or(ArithmeticError::Overflow)?;
        self.interest_accrued_as_of = to;
        Ok(())
    }

    fn snapshot(&self) -> Assessment {
        Assessment {
            interest_owed: self.interest_owed,
            principal_owed: self.principal_owed,
            balance: self.balance,
            total_interest_accrued: self.total_interest_accrued,
        }
    }
}

/// `balance * apr * seconds / year`, rounded down.
fn interest_for(balance: Amount, apr: SharePrice, seconds: u64) -> Result<Amount, LedgerError> {
    let per_year = math::mul_div(balance, apr, ONE, Rounding::Down)?;
    Ok(math::mul_div(
        per_year,
        seconds as u128,
        SECONDS_PER_YEAR as u128,
        Rounding::Down,
    )?)
}

impl CreditTerms for CreditLine {
    fn assess(&mut self, now: Timestamp) -> Result<Assessment, LedgerError> {
        if !self.started() {
            return Ok(self.snapshot());
        }
        let mut updated = self.clone();
        let mut first_billed = None;
        let mut last_billed = None;
        while updated.next_due_time <= now {
            first_billed.get_or_insert(updated.next_due_time);
            last_billed = Some(updated.next_due_time);
            let next = if updated.next_due_time >= updated.term_end_time {
                updated.next_due_time.checked_add(updated.params.payment_period_secs)
            } else {
                updated
                    .next_due_time
                    .checked_add(updated.params.payment_period_secs)
                    .map(|t| t.min(updated.term_end_time))
            };
            updated.next_due_time = next.ok_or(ArithmeticError::Overflow)?;
        }
        if let Some(billed_to) = last_billed {
            updated.accrue(billed_to)?;
            updated.interest_owed = updated
                .interest_owed
                .checked_add(updated.unbilled_interest)
                .ok_or(ArithmeticError::Overflow)?;
            updated.unbilled_interest = 0;
            if billed_to >= updated.term_end_time {
                updated.principal_owed = updated.balance;
            }
            if updated.owes() && updated.past_due_since.is_none() {
                updated.past_due_since = first_billed;
            }
        }
        *self = updated;
        Ok(self.snapshot())
    }

    fn drawdown(&mut self, amount: Amount, now: Timestamp) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or(ArithmeticError::Overflow)?;
        if balance > self.limit {
            return Err(LedgerError::InsufficientFunds {
                attempted: amount,
                available: self.limit.saturating_sub(self.balance),
            });
        }
        if self.started() && now >= self.term_end_time {
            return Err(LedgerError::PaymentsPastDue);
        }
        if !self.started() {
            let period = self.params.payment_period_secs;
            self.term_end_time = now
                .checked_add(self.params.term_secs)
                .ok_or(ArithmeticError::Overflow)?;
            self.next_due_time = now
                .checked_add(period)
                .ok_or(ArithmeticError::Overflow)?
                .min(self.term_end_time);
            self.interest_accrued_as_of = now;
        } else {
            self.accrue(now)?;
        }
        self.balance = balance;
        Ok(())
    }

    fn apply_payment(&mut self, split: &PaymentSplit, now: Timestamp) -> Result<(), LedgerError> {
        let principal = split.principal_total();
        if split.interest > self.interest_owed || principal > self.balance {
            return Err(LedgerError::Consistency("payment exceeds credit line obligations"));
        }
        if principal > 0 {
            // Interest up to now is owed on the old balance.
            self.accrue(now.max(self.interest_accrued_as_of))?;
        }
        self.interest_owed -= split.interest;
        self.principal_owed = self.principal_owed.saturating_sub(principal);
        self.balance -= principal;
        if !self.owes() {
            self.past_due_since = None;
        }
        Ok(())
    }

    fn is_late(&self, now: Timestamp) -> bool {
        self.oldest_unpaid_due(now).is_some_and(|due| now >= due)
    }

    fn days_late(&self, now: Timestamp) -> u64 {
        self.oldest_unpaid_due(now)
            .map(|due| now.saturating_sub(due) / SECONDS_PER_DAY)
            .unwrap_or(0)
    }

    fn balance(&self) -> Amount {
        self.balance
    }

    fn limit(&self) -> Amount {
        self.limit
    }

    fn set_limit(&mut self, limit: Amount) {
        self.limit = limit;
    }

    fn interest_owed(&self) -> Amount {
        self.interest_owed
    }

    fn principal_owed(&self) -> Amount {
        self.principal_owed
    }

    fn total_interest_accrued(&self) -> Amount {
        self.total_interest_accrued
    }

    fn term_end_time(&self) -> Timestamp {
        self.term_end_time
    }

    fn next_due_time(&self) -> Timestamp {
        self.next_due_time
    }
}
