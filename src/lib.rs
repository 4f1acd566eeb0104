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

//! # Tranche Ledger
//!
//! Accounting core for pooled lending: lenders fund a borrower's credit
//! facility through a junior and a senior tranche, a senior pool invests
//! on behalf of its shareholders, and every payment is split between the
//! protocol reserve and the tranches by a fixed waterfall.
//!
//! ## Core Components
//!
//! - [`Engine`]: Single authority applying [`Event`]s
//! - [`Facility`]: Lock / drawdown / repay lifecycle of one credit facility
//! - [`Tranche`] and [`TrancheSlice`]: Share-price ledgers
//! - [`waterfall`]: Payment allocation
//! - [`SeniorPool`]: Pooled capital, redemption and write-downs
//! - [`CreditTerms`]: What the borrower owes, with [`CreditLine`] as reference terms
//!
//! ## Example
//!
//! ```
//! use tranche_ledger::{Engine, Event, EventKind, FacilityId, Outcome, ProtocolConfig, TrancheKind};
//! use tranche_ledger::config::FacilityTerms;
//! use tranche_ledger::math::CURRENCY_SCALE as USDC;
//! use rust_decimal_macros::dec;
//!
//! let config = ProtocolConfig {
//!     facilities: vec![FacilityTerms { borrower: tranche_ledger::ActorId(10), max_limit: dec!(1000), ..Default::default() }],
//!     ..Default::default()
//! };
//! let engine = Engine::new(&config).unwrap();
//!
//! let deposit = EventKind::Deposit { facility: FacilityId(0), tranche: TrancheKind::Junior, amount: 20 * USDC };
//! let outcome = engine.process(Event::new(1, 42, 0, deposit)).unwrap();
//! assert!(matches!(outcome, Outcome::PositionOpened { .. }));
//! assert_eq!(engine.facility_status(FacilityId(0)).unwrap().junior.principal_deposited(), 20 * USDC);
//! ```
//!
//! ## Thread Safety
//!
//! The engine can be shared across threads. Events are journaled
//! concurrently and applied one at a time.

pub mod access;
mod base;
pub mod config;
pub mod credit;
mod engine;
pub mod error;
pub mod event;
mod event_log;
pub mod facility;
pub mod math;
pub mod pool;
pub mod position;
pub mod strategy;
pub mod tranche;
pub mod waterfall;

pub use access::{AccessControl, Capability};
pub use base::{ActorId, Amount, EventId, FacilityId, PositionId, SharePrice, Timestamp, TrancheKind};
pub use config::ProtocolConfig;
pub use credit::{CreditLine, CreditTerms};
pub use engine::{Engine, PositionStatus};
pub use error::{ConfigError, ErrorKind, LedgerError};
pub use event::{Event, EventKind, Outcome};
pub use event_log::EventLog;
pub use facility::{Facility, FacilityState, FacilityStatus};
pub use pool::{PoolStatus, SeniorPool};
pub use position::{Position, PositionBook, PositionRegistry, Redeemable};
pub use tranche::{Tranche, TrancheSlice};
pub use waterfall::AllocationReceipt;
