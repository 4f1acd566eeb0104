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

//! Capability table.
//!
//! Privileged operations call [`AccessControl::require`] with the caller and
//! the capability they need. `Admin` satisfies every check.

use crate::base::{ActorId, FacilityId};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Pause, unpause, grant and create facilities.
    Admin,
    /// Lock, draw down and reopen the given facility.
    Borrower(FacilityId),
    /// Deposit into senior tranches.
    SeniorPool,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Admin => write!(f, "admin"),
            Capability::Borrower(id) => write!(f, "borrower of facility {id}"),
            Capability::SeniorPool => write!(f, "senior pool"),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct AccessControl {
    grants: HashMap<ActorId, HashSet<Capability>>,
}

impl AccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, actor: ActorId, capability: Capability) {
        self.grants.entry(actor).or_default().insert(capability);
    }

    pub fn revoke(&mut self, actor: ActorId, capability: Capability) {
        if let Some(set) = self.grants.get_mut(&actor) {
            set.remove(&capability);
        }
    }

    pub fn has(&self, actor: ActorId, capability: Capability) -> bool {
        self.grants
            .get(&actor)
            .is_some_and(|set| set.contains(&Capability::Admin) || set.contains(&capability))
    }

    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`] when `actor` holds neither `capability` nor `Admin`.
    pub fn require(&self, actor: ActorId, capability: Capability) -> Result<(), LedgerError> {
        if self.has(actor, capability) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized { actor, capability })
        }
    }
}
