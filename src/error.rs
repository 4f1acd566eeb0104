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

//! Error types for ledger operations.

use crate::access::Capability;
use crate::base::{ActorId, Amount, EventId, FacilityId, PositionId, TrancheKind};
use crate::facility::FacilityState;
use thiserror::Error;

/// Broad category of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation is invalid in the current lifecycle state.
    State,
    /// Caller lacks the required capability.
    Authorization,
    /// Requested amount exceeds what is available.
    InsufficientFunds,
    /// Fixed-point overflow or a zero denominator.
    Arithmetic,
    /// Internal invariant violated. Never expected at runtime.
    Consistency,
}

/// Fixed-point arithmetic failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("fixed-point overflow")]
    Overflow,

    #[error("division by zero")]
    DivisionByZero,
}

/// Ledger operation errors.
///
/// Every rejection leaves ledger state unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Amount is zero or cannot be represented
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Facility or pool is paused
    #[error("operations are paused")]
    Paused,

    /// Tranche does not accept deposits anymore
    #[error("{0} tranche is locked")]
    TrancheLocked(TrancheKind),

    /// Lifecycle transition not allowed from the current state
    #[error("cannot {operation} while facility is {state}")]
    InvalidState {
        state: FacilityState,
        operation: &'static str,
    },

    /// Withdrawals wait for the drawdown window to close
    #[error("withdrawals are locked until {0}")]
    WithdrawalsLocked(u64),

    /// Borrower has an unpaid installment past its due time
    #[error("payments are past due")]
    PaymentsPastDue,

    /// Referenced facility does not exist
    #[error("facility {0} not found")]
    FacilityNotFound(FacilityId),

    /// Referenced position does not exist
    #[error("position {0} not found")]
    PositionNotFound(PositionId),

    /// Position does not belong to this facility or pool
    #[error("position {0} is not held here")]
    ForeignPosition(PositionId),

    /// Position still has redeemable value or outstanding principal
    #[error("position {0} is not fully redeemed")]
    PositionNotRedeemed(PositionId),

    /// Write-downs left outstanding pool shares worthless
    #[error("pool shares have no value left")]
    PoolInsolvent,

    /// Strategy found nothing to invest
    #[error("nothing to invest in facility {0}")]
    NothingToInvest(FacilityId),

    /// Duplicate event ID
    #[error("duplicate event ID {0}")]
    DuplicateEvent(EventId),

    /// Event timestamp is earlier than the engine clock
    #[error("event time {event} is before current time {now}")]
    ClockRegression { event: u64, now: u64 },

    /// Caller lacks a capability
    #[error("actor {actor} lacks capability {capability}")]
    Unauthorized {
        actor: ActorId,
        capability: Capability,
    },

    /// Caller does not own the position
    #[error("actor {actor} does not own position {position}")]
    NotOwner { actor: ActorId, position: PositionId },

    /// Requested amount exceeds what is available
    #[error("insufficient funds: attempted {attempted}, available {available}")]
    InsufficientFunds { attempted: Amount, available: Amount },

    /// Fixed-point arithmetic failed
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    /// Internal invariant violated
    #[error("consistency violation: {0}")]
    Consistency(&'static str),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidAmount
            | LedgerError::Paused
            | LedgerError::TrancheLocked(_)
            | LedgerError::InvalidState { .. }
            | LedgerError::WithdrawalsLocked(_)
            | LedgerError::PaymentsPastDue
            | LedgerError::FacilityNotFound(_)
            | LedgerError::PositionNotFound(_)
            | LedgerError::ForeignPosition(_)
            | LedgerError::PositionNotRedeemed(_)
            | LedgerError::NothingToInvest(_)
            | LedgerError::PoolInsolvent
            | LedgerError::DuplicateEvent(_)
            | LedgerError::ClockRegression { .. } => ErrorKind::State,
            LedgerError::Unauthorized { .. } | LedgerError::NotOwner { .. } => {
                ErrorKind::Authorization
            }
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::Arithmetic(_) => ErrorKind::Arithmetic,
            LedgerError::Consistency(_) => ErrorKind::Consistency,
        }
    }
}

/// Errors raised while loading a [`crate::ProtocolConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            LedgerError::InvalidAmount.to_string(),
            "invalid amount (must be positive)"
        );
        assert_eq!(LedgerError::Paused.to_string(), "operations are paused");
        assert_eq!(
            LedgerError::TrancheLocked(TrancheKind::Junior).to_string(),
            "junior tranche is locked"
        );
        assert_eq!(
            LedgerError::InvalidState {
                state: FacilityState::Open,
                operation: "lock pool",
            }
            .to_string(),
            "cannot lock pool while facility is open"
        );
        assert_eq!(
            LedgerError::InsufficientFunds {
                attempted: 10,
                available: 7
            }
            .to_string(),
            "insufficient funds: attempted 10, available 7"
        );
        assert_eq!(
            LedgerError::Unauthorized {
                actor: ActorId(3),
                capability: Capability::Admin,
            }
            .to_string(),
            "actor 3 lacks capability admin"
        );
        assert_eq!(
            LedgerError::from(ArithmeticError::DivisionByZero).to_string(),
            "arithmetic error: division by zero"
        );
    }

    #[test]
    fn errors_map_to_taxonomy() {
        assert_eq!(LedgerError::Paused.kind(), ErrorKind::State);
        assert_eq!(
            LedgerError::NotOwner {
                actor: ActorId(1),
                position: PositionId(2)
            }
            .kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            LedgerError::InsufficientFunds {
                attempted: 1,
                available: 0
            }
            .kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(
            LedgerError::Arithmetic(ArithmeticError::Overflow).kind(),
            ErrorKind::Arithmetic
        );
        assert_eq!(
            LedgerError::Consistency("assets negative").kind(),
            ErrorKind::Consistency
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = LedgerError::InsufficientFunds {
            attempted: 5,
            available: 1,
        };
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
