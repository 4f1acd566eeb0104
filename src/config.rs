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

//! Protocol configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file is a valid
//! configuration with no facilities. Human-facing amounts and rates are
//! decimal strings:
//!
//! ```toml
//! admin = 1
//! pool = 2
//! leverage_ratio = "4"
//!
//! [[facilities]]
//! borrower = 10
//! max_limit = "1000000"
//! junior_fee_percent = 20
//! interest_apr = "0.10"
//! ```

use crate::base::{ActorId, Amount, SharePrice};
use crate::credit::CreditTermsParams;
use crate::error::ConfigError;
use crate::facility::FacilityConfig;
use crate::math::{self, ONE_HUNDRED, SECONDS_PER_DAY};
use crate::pool::WritedownPolicy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Actor holding the admin capability.
    pub admin: ActorId,

    /// Actor the senior pool deposits as.
    pub pool: ActorId,

    /// Reserve takes `1 / reserve_denominator` of interest paid. Must
    /// divide 100, since the fee is applied as a whole percent.
    pub reserve_denominator: u64,

    /// Pool withdrawals pay `1 / withdraw_fee_denominator` to the reserve.
    pub withdraw_fee_denominator: u64,

    pub drawdown_period_secs: u64,

    /// Senior to junior capital ratio of the fixed leverage strategy.
    pub leverage_ratio: Decimal,

    pub writedown_grace_period_days: u64,

    pub max_days_late: u64,

    pub facilities: Vec<FacilityTerms>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            admin: ActorId(0),
            pool: ActorId(1),
            reserve_denominator: 10,
            withdraw_fee_denominator: 200,
            drawdown_period_secs: 7 * SECONDS_PER_DAY,
            leverage_ratio: dec!(4),
            writedown_grace_period_days: 30,
            max_days_late: 120,
            facilities: Vec::new(),
        }
    }
}

/// Terms of one facility created at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilityTerms {
    pub borrower: ActorId,
    /// In whole currency units.
    pub max_limit: Decimal,
    pub junior_fee_percent: u64,
    /// Annual rate, `0.10` for 10%.
    pub interest_apr: Decimal,
    pub late_fee_apr: Decimal,
    pub payment_period_days: u64,
    pub term_days: u64,
    pub late_fee_grace_days: u64,
}

impl Default for FacilityTerms {
    fn default() -> Self {
        Self {
            borrower: ActorId(0),
            max_limit: Decimal::ZERO,
            junior_fee_percent: 20,
            interest_apr: dec!(0.10),
            late_fee_apr: Decimal::ZERO,
            payment_period_days: 30,
            term_days: 365,
            late_fee_grace_days: 0,
        }
    }
}

impl ProtocolConfig {
    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ProtocolConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reserve_denominator == 0 {
            return Err(ConfigError::Invalid("reserve_denominator must be positive".into()));
        }
        if ONE_HUNDRED % u128::from(self.reserve_denominator) != 0 {
            return Err(ConfigError::Invalid(format!(
                "reserve_denominator {} does not divide 100",
                self.reserve_denominator
            )));
        }
        if self.withdraw_fee_denominator == 0 {
            return Err(ConfigError::Invalid("withdraw_fee_denominator must be positive".into()));
        }
        if self.ratio(self.leverage_ratio, "leverage_ratio")? == 0 {
            return Err(ConfigError::Invalid("leverage_ratio must be positive".into()));
        }
        if self.max_days_late <= self.writedown_grace_period_days {
            return Err(ConfigError::Invalid(
                "max_days_late must exceed writedown_grace_period_days".into(),
            ));
        }
        for (index, terms) in self.facilities.iter().enumerate() {
            let fees = u128::from(terms.junior_fee_percent) + self.reserve_fee_percent();
            if fees >= ONE_HUNDRED {
                return Err(ConfigError::Invalid(format!(
                    "facility {index}: junior and reserve fees add up to {fees}%"
                )));
            }
            if terms.payment_period_days == 0 || terms.term_days == 0 {
                return Err(ConfigError::Invalid(format!(
                    "facility {index}: payment period and term must be positive"
                )));
            }
            terms.max_limit_units()?;
            terms.credit_params()?;
        }
        Ok(())
    }

    fn ratio(&self, value: Decimal, field: &str) -> Result<SharePrice, ConfigError> {
        math::ratio_from_decimal(value).ok_or_else(|| ConfigError::Invalid(format!("{field} out of range")))
    }

    pub fn reserve_fee_percent(&self) -> u128 {
        ONE_HUNDRED / u128::from(self.reserve_denominator.max(1))
    }

    pub fn leverage_ratio_fixed(&self) -> Result<SharePrice, ConfigError> {
        self.ratio(self.leverage_ratio, "leverage_ratio")
    }

    pub fn writedown_policy(&self) -> WritedownPolicy {
        WritedownPolicy {
            grace_period_days: self.writedown_grace_period_days,
            max_days_late: self.max_days_late,
        }
    }

    pub fn facility_config(&self, terms: &FacilityTerms) -> Result<FacilityConfig, ConfigError> {
        Ok(FacilityConfig {
            borrower: terms.borrower,
            max_limit: terms.max_limit_units()?,
            junior_fee_percent: u128::from(terms.junior_fee_percent),
            reserve_fee_percent: self.reserve_fee_percent(),
            drawdown_period_secs: self.drawdown_period_secs,
        })
    }
}

impl FacilityTerms {
    pub fn max_limit_units(&self) -> Result<Amount, ConfigError> {
        math::amount_from_decimal(self.max_limit)
            .ok_or_else(|| ConfigError::Invalid(format!("max_limit {} out of range", self.max_limit)))
    }

    pub fn credit_params(&self) -> Result<CreditTermsParams, ConfigError> {
        let rate = |value: Decimal, field: &str| {
            math::ratio_from_decimal(value).ok_or_else(|| ConfigError::Invalid(format!("{field} out of range")))
        };
        Ok(CreditTermsParams {
            interest_apr: rate(self.interest_apr, "interest_apr")?,
            late_fee_apr: rate(self.late_fee_apr, "late_fee_apr")?,
            payment_period_secs: self.payment_period_days.saturating_mul(SECONDS_PER_DAY),
            term_secs: self.term_days.saturating_mul(SECONDS_PER_DAY),
            late_fee_grace_secs: self.late_fee_grace_days.saturating_mul(SECONDS_PER_DAY),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{CURRENCY_SCALE as USDC, ONE};

    #[test]
    fn empty_file_uses_defaults() {
        let config = ProtocolConfig::from_toml_str("").unwrap();
        assert_eq!(config, ProtocolConfig::default());
        assert_eq!(config.reserve_fee_percent(), 10);
        assert_eq!(config.leverage_ratio_fixed().unwrap(), 4 * ONE);
    }

    #[test]
    fn parses_facilities() {
        let config = ProtocolConfig::from_toml_str(
            r#"
            admin = 9
            drawdown_period_secs = 3600

            [[facilities]]
            borrower = 10
            max_limit = "1000.5"
            interest_apr = "0.12"
            "#,
        )
        .unwrap();
        assert_eq!(config.admin, ActorId(9));
        let terms = &config.facilities[0];
        assert_eq!(terms.max_limit_units().unwrap(), 1_000_500_000);
        assert_eq!(terms.credit_params().unwrap().interest_apr, ONE / 100 * 12);
        let facility = config.facility_config(terms).unwrap();
        assert_eq!(facility.drawdown_period_secs, 3600);
        assert_eq!(facility.max_limit, 1_000 * USDC + USDC / 2);
    }

    #[test]
    fn rejects_zero_denominators_and_excessive_fees() {
        assert!(matches!(
            ProtocolConfig::from_toml_str("reserve_denominator = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ProtocolConfig::from_toml_str(
                "reserve_denominator = 1\n[[facilities]]\nmax_limit = \"1\"\n"
            ),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn reserve_denominator_must_divide_100() {
        assert!(matches!(
            ProtocolConfig::from_toml_str("reserve_denominator = 3"),
            Err(ConfigError::Invalid(_))
        ));
        let config = ProtocolConfig::from_toml_str("reserve_denominator = 4").unwrap();
        assert_eq!(config.reserve_fee_percent(), 25);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            ProtocolConfig::from_toml_str("admin = ["),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = ProtocolConfig::default();
        config.facilities.push(FacilityTerms {
            borrower: ActorId(4),
            max_limit: dec!(500),
            ..FacilityTerms::default()
        });
        let text = config.to_toml_string().unwrap();
        assert_eq!(ProtocolConfig::from_toml_str(&text).unwrap(), config);
    }
}
