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

//! Events applied by the [`crate::Engine`] and what they produce.
//!
//! Every event carries a globally unique [`EventId`], the acting party and a
//! timestamp. Timestamps must never go backwards.

use crate::base::{ActorId, Amount, EventId, FacilityId, PositionId, Timestamp, TrancheKind};
use crate::pool::{Redemption, Withdrawal};
use crate::position::Redeemable;
use crate::waterfall::AllocationReceipt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub actor: ActorId,
    pub time: Timestamp,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Deposit {
        facility: FacilityId,
        tranche: TrancheKind,
        amount: Amount,
    },
    Withdraw {
        facility: FacilityId,
        position: PositionId,
        amount: Amount,
    },
    WithdrawMax {
        facility: FacilityId,
        position: PositionId,
    },
    ClosePosition {
        facility: FacilityId,
        position: PositionId,
    },
    LockJunior {
        facility: FacilityId,
    },
    LockPool {
        facility: FacilityId,
    },
    Drawdown {
        facility: FacilityId,
        amount: Amount,
    },
    Pay {
        facility: FacilityId,
        amount: Amount,
    },
    Reopen {
        facility: FacilityId,
    },
    PauseFacility {
        facility: FacilityId,
    },
    UnpauseFacility {
        facility: FacilityId,
    },
    PoolDeposit {
        amount: Amount,
    },
    PoolWithdraw {
        amount: Amount,
    },
    PoolWithdrawShares {
        shares: Amount,
    },
    Invest {
        facility: FacilityId,
    },
    Redeem {
        position: PositionId,
    },
    Writedown {
        position: PositionId,
    },
    PausePool,
    UnpausePool,
}

impl Event {
    pub fn new(id: u64, actor: u16, time: Timestamp, kind: EventKind) -> Self {
        Self {
            id: EventId(id),
            actor: ActorId(actor),
            time,
            kind,
        }
    }
}

impl EventKind {
    /// Facility the event targets directly, if any.
    pub fn facility(&self) -> Option<FacilityId> {
        match self {
            Self::Deposit { facility, .. }
            | Self::Withdraw { facility, .. }
            | Self::WithdrawMax { facility, .. }
            | Self::ClosePosition { facility, .. }
            | Self::LockJunior { facility }
            | Self::LockPool { facility }
            | Self::Drawdown { facility, .. }
            | Self::Pay { facility, .. }
            | Self::Reopen { facility }
            | Self::PauseFacility { facility }
            | Self::UnpauseFacility { facility }
            | Self::Invest { facility } => Some(*facility),
            _ => None,
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            Self::Deposit { amount, .. }
            | Self::Withdraw { amount, .. }
            | Self::Drawdown { amount, .. }
            | Self::Pay { amount, .. }
            | Self::PoolDeposit { amount }
            | Self::PoolWithdraw { amount } => *amount,
            Self::PoolWithdrawShares { shares } => *shares,
            _ => 0,
        }
    }

    /// True for events that price pool shares.
    pub fn prices_pool_shares(&self) -> bool {
        matches!(
            self,
            Self::PoolDeposit { .. } | Self::PoolWithdraw { .. } | Self::PoolWithdrawShares { .. }
        )
    }
}

/// What applying an event produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Lifecycle or pause change with nothing to report.
    Applied,
    PositionOpened { position: PositionId },
    Withdrawn(Redeemable),
    PositionClosed { position: PositionId },
    Allocated(AllocationReceipt),
    SharesMinted { shares: Amount },
    PoolWithdrawn(Withdrawal),
    Invested { position: PositionId, amount: Amount },
    Redeemed(Redemption),
    WrittenDown { written_down: Amount },
}
