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

//! Payment waterfall.
//!
//! [`plan`] decides, without touching any state, how one payment is split
//! between the protocol reserve and the two tranches. The facility then
//! applies the resulting [`AllocationPlan`] in one step.
//!
//! Priority, each step consuming what is left:
//!
//! | Step | Recipient | Cap |
//! |------|-----------|-----|
//! | 1 | Reserve | reserve fee % of interest paid |
//! | 2 | Senior interest | senior's accrued share net of junior and reserve fees, minus what it already got |
//! | 3 | Senior principal | per cycle, senior's pro-rata principal expected back |
//! | 4 | Junior interest | all interest left |
//! | 5 | Junior principal | per cycle, junior's pro-rata principal expected back |
//! | 6 | Junior interest | everything else (overpayment) |

use crate::base::{Amount, TrancheKind};
use crate::credit::PaymentSplit;
use crate::error::{ArithmeticError, LedgerError};
use crate::facility::LockCycle;
use crate::math::{self, ONE_HUNDRED, Rounding};
use crate::tranche::Tranche;
use serde::{Deserialize, Serialize};

/// How a single payment was allocated.
///
/// `reserve + senior_interest + senior_principal + junior_interest +
/// junior_principal` always equals the payment. `remainder` is the part of
/// `junior_interest` that came from paying more than was owed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationReceipt {
    pub reserve: Amount,
    pub senior_interest: Amount,
    pub senior_principal: Amount,
    pub junior_interest: Amount,
    pub junior_principal: Amount,
    pub remainder: Amount,
}

impl AllocationReceipt {
    /// Sum of every allocated amount.
    pub fn total(&self) -> Amount {
        self.reserve
            + self.senior_interest
            + self.senior_principal
            + self.junior_interest
            + self.junior_principal
    }

    pub fn interest(&self, tranche: TrancheKind) -> Amount {
        match tranche {
            TrancheKind::Senior => self.senior_interest,
            TrancheKind::Junior => self.junior_interest,
        }
    }

    pub fn principal(&self, tranche: TrancheKind) -> Amount {
        match tranche {
            TrancheKind::Senior => self.senior_principal,
            TrancheKind::Junior => self.junior_principal,
        }
    }
}

/// Principal credited to one tranche slice of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrincipalCredit {
    pub cycle: usize,
    pub tranche: TrancheKind,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    pub receipt: AllocationReceipt,
    pub principal_credits: Vec<PrincipalCredit>,
}

/// Fee schedule of a facility, in whole percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub reserve_fee_percent: u128,
    pub junior_fee_percent: u128,
}

impl FeeSchedule {
    /// Share of senior's gross interest senior keeps.
    fn senior_net_percent(&self) -> Result<u128, ArithmeticError> {
        ONE_HUNDRED
            .checked_sub(self.reserve_fee_percent)
            .and_then(|p| p.checked_sub(self.junior_fee_percent))
            .ok_or(ArithmeticError::Overflow)
    }
}

/// Ledger state the waterfall reads.
#[derive(Debug, Clone, Copy)]
pub struct WaterfallInput<'a> {
    pub split: PaymentSplit,
    pub senior: &'a Tranche,
    pub junior: &'a Tranche,
    /// Gross interest owed to senior so far, including this assessment.
    pub senior_interest_accrued: Amount,
    pub cycles: &'a [LockCycle],
    pub total_deployed: Amount,
    /// Principal the facility as a whole should have returned once this
    /// payment lands: repaid so far plus principal still due.
    pub principal_expected: Amount,
}

/// Splits newly accrued interest between the tranches by locked principal.
///
/// Returns the senior share; junior's share is implicit.
pub fn senior_accrual_share(accrued: Amount, senior: &Tranche, junior: &Tranche) -> Result<Amount, LedgerError> {
    let total = senior
        .principal_locked()
        .checked_add(junior.principal_locked())
        .ok_or(ArithmeticError::Overflow)?;
    Ok(math::scale_by_fraction(accrued, senior.principal_locked(), total)?)
}

/// Plans the allocation of one payment.
pub fn plan(input: &WaterfallInput<'_>, fees: FeeSchedule) -> Result<AllocationPlan, LedgerError> {
    let split = input.split;
    let mut receipt = AllocationReceipt::default();
    let mut principal_credits = Vec::new();

    // Interest phase.
    receipt.reserve = math::percent_of(split.interest, fees.reserve_fee_percent)?;
    let mut interest_remaining = split.interest - receipt.reserve;

    if input.senior.principal_locked() > 0 {
        let senior_target =
            math::percent_of(input.senior_interest_accrued, fees.senior_net_percent()?)?;
        let senior_desired = senior_target.saturating_sub(input.senior.interest_paid());
        receipt.senior_interest = interest_remaining.min(senior_desired);
        interest_remaining -= receipt.senior_interest;
    }

    // Principal phase: senior across all cycles, then junior.
    let mut principal_remaining = split.principal_total();
    for tranche in TrancheKind::ALL {
        for (index, cycle) in input.cycles.iter().enumerate() {
            if principal_remaining == 0 {
                break;
            }
            if !cycle.is_locked() || cycle.principal_deployed() == 0 {
                continue;
            }
            let expected = math::scale_by_fraction(
                input.principal_expected,
                cycle.principal_deployed(),
                input.total_deployed,
            )?;
            let expected_price =
                math::usdc_to_share_price(expected, cycle.total_deposited()?, Rounding::Down)?;
            let desired = cycle.slice(tranche).principal_shortfall(expected_price)?;
            let amount = desired.min(principal_remaining);
            if amount == 0 {
                continue;
            }
            principal_remaining -= amount;
            principal_credits.push(PrincipalCredit {
                cycle: index,
                tranche,
                amount,
            });
            match tranche {
                TrancheKind::Senior => receipt.senior_principal += amount,
                TrancheKind::Junior => receipt.junior_principal += amount,
            }
        }
    }

    // Junior takes the rest of the interest and any overpayment as interest.
    receipt.remainder = principal_remaining + split.remainder;
    let junior_interest = interest_remaining + receipt.remainder;
    if input.junior.principal_locked() > 0 {
        receipt.junior_interest = junior_interest;
    } else if junior_interest > 0 {
        log::warn!("no junior principal to receive {junior_interest}, routing to reserve");
        receipt.reserve += junior_interest;
    }

    debug_assert_eq!(
        receipt.total(),
        split.interest + split.principal_total() + split.remainder,
        "Invariant violated: waterfall created or destroyed funds"
    );

    Ok(AllocationPlan {
        receipt,
        principal_credits,
    })
}
