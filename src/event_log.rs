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

//! Thread-safe event journal with deduplication.
//!
//! Records every submitted event once, in submission order, and rejects
//! replays of an ID it has already seen.

use crate::base::EventId;
use crate::error::LedgerError;
use crate::event::Event;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Combines a [`DashMap`] for O(1) duplicate checks with a [`SegQueue`]
/// keeping submission order. Safe for concurrent use.
///
/// The map is never pruned: every ID ever submitted stays recorded, so
/// memory grows with the number of events. [`EventLog::drain`] empties the
/// order queue only, and replays stay rejected after a drain.
#[derive(Debug)]
pub struct EventLog {
    events: DashMap<EventId, Arc<Event>>,
    order: SegQueue<EventId>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
            order: SegQueue::new(),
        }
    }

    /// Records an event.
    ///
    /// # Errors
    ///
    /// [`LedgerError::DuplicateEvent`] if the ID was recorded before.
    pub fn push(&self, event: Arc<Event>) -> Result<(), LedgerError> {
        let id = event.id;
        // Entry API: check and insert under one shard lock.
        match self.events.entry(id) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateEvent(id)),
            Entry::Vacant(entry) => {
                entry.insert(event);
                self.order.push(id);
                Ok(())
            }
        }
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.events.contains_key(&id)
    }

    pub fn get(&self, id: EventId) -> Option<Arc<Event>> {
        self.events.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Takes the events recorded since the last drain, oldest first.
    ///
    /// Drained IDs stay known, so replays are still rejected.
    pub fn drain(&self) -> Vec<Arc<Event>> {
        let mut drained = Vec::with_capacity(self.order.len());
        while let Some(id) = self.order.pop() {
            if let Some(event) = self.get(id) {
                drained.push(event);
            }
        }
        drained
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
