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

//! Senior pool investment strategies.

use crate::base::{Amount, SharePrice, Timestamp, TrancheKind};
use crate::error::LedgerError;
use crate::facility::{Facility, FacilityState};
use crate::math::{self, ONE, Rounding};
use std::fmt;

/// Decides how much senior capital the pool puts into a facility.
pub trait InvestmentStrategy: fmt::Debug + Send {
    /// Amount the pool should invest now, before idle-cash and capacity caps.
    fn estimate(&self, facility: &Facility, now: Timestamp) -> Result<Amount, LedgerError>;
}

/// Keeps senior capital at a fixed multiple of junior capital.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedLeverageRatio {
    ratio: SharePrice,
}

impl FixedLeverageRatio {
    /// `ratio` is fixed point: 4x leverage is `4 * ONE`.
    pub fn new(ratio: SharePrice) -> Self {
        Self { ratio }
    }

    pub fn ratio(&self) -> SharePrice {
        self.ratio
    }
}

impl Default for FixedLeverageRatio {
    fn default() -> Self {
        Self::new(4 * ONE)
    }
}

impl InvestmentStrategy for FixedLeverageRatio {
    fn estimate(&self, facility: &Facility, now: Timestamp) -> Result<Amount, LedgerError> {
        if facility.state(now) != FacilityState::JuniorLocked {
            return Ok(0);
        }
        let cycle = facility.current_cycle();
        let junior = cycle.slice(TrancheKind::Junior).principal_deposited();
        let senior = cycle.slice(TrancheKind::Senior).principal_deposited();
        let target = math::mul_div(junior, self.ratio, ONE, Rounding::Down)?;
        Ok(target.saturating_sub(senior))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessControl, Capability};
    use crate::base::{ActorId, FacilityId};
    use crate::credit::{CreditLine, CreditTermsParams};
    use crate::facility::FacilityConfig;
    use crate::math::CURRENCY_SCALE as USDC;
    use crate::position::PositionBook;

    fn make_facility() -> Facility {
        let credit = CreditLine::new(CreditTermsParams {
            interest_apr: ONE / 10,
            late_fee_apr: 0,
            payment_period_secs: 30,
            term_secs: 365,
            late_fee_grace_secs: 0,
        });
        Facility::new(
            FacilityId(0),
            FacilityConfig {
                borrower: ActorId(2),
                max_limit: 1_000 * USDC,
                junior_fee_percent: 20,
                reserve_fee_percent: 10,
                drawdown_period_secs: 100,
            },
            Box::new(credit),
            0,
        )
    }

    #[test]
    fn leverage_applies_only_once_junior_is_locked() {
        let mut access = AccessControl::new();
        access.grant(ActorId(2), Capability::Borrower(FacilityId(0)));
        let mut book = PositionBook::new();
        let mut facility = make_facility();
        let strategy = FixedLeverageRatio::default();

        facility
            .deposit(ActorId(5), TrancheKind::Junior, 20 * USDC, &access, &mut book)
            .unwrap();
        assert_eq!(strategy.estimate(&facility, 0).unwrap(), 0);

        facility.lock_junior_capital(ActorId(2), &access, 0).unwrap();
        assert_eq!(strategy.estimate(&facility, 0).unwrap(), 80 * USDC);
    }

    #[test]
    fn fractional_ratio() {
        let strategy = FixedLeverageRatio::new(ONE / 2 * 5);
        assert_eq!(strategy.ratio(), 2_500_000_000_000_000_000);
    }
}
