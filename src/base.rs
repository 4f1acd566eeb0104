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

//! Core identifier and unit types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency amount in atomic units of the settlement currency (1e6 per unit).
pub type Amount = u128;

/// Fixed-point ratio with an 18-decimal mantissa (see [`crate::math::ONE`]).
pub type SharePrice = u128;

/// Seconds since the epoch of the execution environment.
pub type Timestamp = u64;

/// Identity of a caller: a lender, a borrower, the senior pool, an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ActorId(pub u16);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a facility inside the engine's facility arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FacilityId(pub u32);

impl fmt::Display for FacilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a position token minted by the position registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an externally submitted event.
///
/// Event IDs must be globally unique; the engine rejects replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two risk tranches of a facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrancheKind {
    /// Paid first, lowest risk.
    Senior,
    /// First loss, paid last, earns the junior fee.
    Junior,
}

impl TrancheKind {
    pub const ALL: [TrancheKind; 2] = [TrancheKind::Senior, TrancheKind::Junior];

    pub(crate) fn index(self) -> usize {
        match self {
            TrancheKind::Senior => 0,
            TrancheKind::Junior => 1,
        }
    }
}

impl fmt::Display for TrancheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrancheKind::Senior => write!(f, "senior"),
            TrancheKind::Junior => write!(f, "junior"),
        }
    }
}
