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

//! Fixed-point arithmetic and the rounding policy.
//!
//! Currency amounts are integers in atomic units ([`CURRENCY_SCALE`] per
//! whole unit). Ratios are integers with an 18-decimal mantissa ([`ONE`]).
//!
//! Every conversion names its rounding direction. The rule is that the
//! ledger never promises more than it holds: amounts credited to holders
//! round down, amounts taken away from holders round up.
//!
//! ```
//! use tranche_ledger::math::{self, Rounding, ONE};
//!
//! // 1/3 of a unit of share price, both ways.
//! assert_eq!(math::mul_div(ONE, 1, 3, Rounding::Down).unwrap(), 333_333_333_333_333_333);
//! assert_eq!(math::mul_div(ONE, 1, 3, Rounding::Up).unwrap(), 333_333_333_333_333_334);
//! ```

use crate::base::{Amount, SharePrice};
use crate::error::ArithmeticError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// 1.0 in share-price space.
pub const ONE: SharePrice = 1_000_000_000_000_000_000;

/// Atomic units per whole currency unit.
pub const CURRENCY_SCALE: Amount = 1_000_000;

/// Decimal places of [`CURRENCY_SCALE`].
pub const CURRENCY_DECIMALS: u32 = 6;

pub const ONE_HUNDRED: u128 = 100;

pub const SECONDS_PER_DAY: u64 = 86_400;

pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

/// Direction of an integer division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Toward zero. Used for anything credited to a holder.
    Down,
    /// Away from zero. Used for anything taken from a holder.
    Up,
}

/// Computes `a * b / denominator` with an explicit rounding direction.
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> Result<u128, ArithmeticError> {
    if denominator == 0 {
        return Err(ArithmeticError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(ArithmeticError::Overflow)?;
    let quotient = product / denominator;
    match rounding {
        Rounding::Down => Ok(quotient),
        Rounding::Up if product % denominator != 0 => {
            quotient.checked_add(1).ok_or(ArithmeticError::Overflow)
        }
        Rounding::Up => Ok(quotient),
    }
}

/// Share-price delta that spreads `amount` over `total_shares` units of principal.
///
/// Returns zero when there are no shares, so callers never divide by zero.
pub fn usdc_to_share_price(
    amount: Amount,
    total_shares: Amount,
    rounding: Rounding,
) -> Result<SharePrice, ArithmeticError> {
    if total_shares == 0 {
        return Ok(0);
    }
    mul_div(amount, ONE, total_shares, rounding)
}

/// Currency value of `share_price` applied to `total_shares` units.
pub fn share_price_to_usdc(
    share_price: SharePrice,
    total_shares: Amount,
    rounding: Rounding,
) -> Result<Amount, ArithmeticError> {
    mul_div(share_price, total_shares, ONE, rounding)
}

/// `amount * numerator / denominator`, rounded down; zero when the denominator is zero.
pub fn scale_by_fraction(amount: u128, numerator: u128, denominator: u128) -> Result<u128, ArithmeticError> {
    if denominator == 0 {
        return Ok(0);
    }
    mul_div(amount, numerator, denominator, Rounding::Down)
}

/// `amount * percent / 100`, rounded down.
pub fn percent_of(amount: Amount, percent: u128) -> Result<Amount, ArithmeticError> {
    mul_div(amount, percent, ONE_HUNDRED, Rounding::Down)
}

/// Converts a human-readable currency amount (e.g. `12.5`) to atomic units.
///
/// Fractions below one atomic unit are truncated.
pub fn amount_from_decimal(value: Decimal) -> Option<Amount> {
    if value.is_sign_negative() {
        return None;
    }
    (value * Decimal::from(CURRENCY_SCALE as u64)).trunc().to_u128()
}

/// Converts atomic units back to a human-readable amount.
pub fn amount_to_decimal(amount: Amount) -> Decimal {
    i128::try_from(amount)
        .ok()
        .and_then(|units| Decimal::try_from_i128_with_scale(units, CURRENCY_DECIMALS).ok())
        .unwrap_or(Decimal::MAX)
}

/// Converts a human-readable ratio (e.g. `0.10` for 10%) to fixed point.
pub fn ratio_from_decimal(value: Decimal) -> Option<SharePrice> {
    if value.is_sign_negative() {
        return None;
    }
    value
        .checked_mul(Decimal::from(ONE as u64))?
        .trunc()
        .to_u128()
}

/// Converts a fixed-point ratio to a human-readable decimal.
pub fn ratio_to_decimal(ratio: SharePrice) -> Decimal {
    i128::try_from(ratio)
        .ok()
        .and_then(|units| Decimal::try_from_i128_with_scale(units, 18).ok())
        .map(|d| d.normalize())
        .unwrap_or(Decimal::MAX)
}
