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

//! Event processing engine.
//!
//! The [`Engine`] is the single authority over every facility, the senior
//! pool and the position registry. Events are applied one at a time, each
//! to completion or not at all.
//!
//! # Event Processing
//!
//! | Event | Behavior |
//! |-------|----------|
//! | Deposit / Withdraw / WithdrawMax / ClosePosition | Tranche positions of a facility |
//! | LockJunior / LockPool / Drawdown / Reopen | Borrower lifecycle |
//! | Pay | Payment waterfall; reserve share goes to the protocol reserve |
//! | PoolDeposit / PoolWithdraw / PoolWithdrawShares | Priced after sweeping pending redemptions, all or nothing |
//! | Invest / Redeem / Writedown | Senior pool capital |
//! | Pause* / Unpause* | Admin guard on a facility or the pool |
//!
//! # Thread Safety
//!
//! The journal accepts events concurrently; the ledger state itself sits
//! behind one [`parking_lot::Mutex`], so application is strictly sequential.

use crate::access::{AccessControl, Capability};
use crate::base::{ActorId, Amount, FacilityId, PositionId, Timestamp};
use crate::config::ProtocolConfig;
use crate::credit::{CreditLine, CreditTerms};
use crate::error::{ArithmeticError, ConfigError, LedgerError};
use crate::event::{Event, EventKind, Outcome};
use crate::event_log::EventLog;
use crate::facility::{Facility, FacilityConfig, FacilityStatus};
use crate::pool::{PoolStatus, SeniorPool};
use crate::position::{Position, PositionBook, PositionRegistry, Redeemable};
use crate::strategy::{FixedLeverageRatio, InvestmentStrategy};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// A position together with what it could withdraw now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionStatus {
    #[serde(flatten)]
    pub position: Position,
    pub available: Redeemable,
}

/// Ledger state owned by the engine.
#[derive(Debug)]
struct Protocol {
    now: Timestamp,
    access: AccessControl,
    facilities: Vec<Facility>,
    positions: PositionBook,
    pool: SeniorPool,
    strategy: Box<dyn InvestmentStrategy>,
    /// Protocol reserve: waterfall fees, pool withdrawal fees and
    /// interest nobody could receive.
    reserve: Amount,
}

fn facility_at(facilities: &mut [Facility], id: FacilityId) -> Result<&mut Facility, LedgerError> {
    facilities
        .get_mut(id.0 as usize)
        .ok_or(LedgerError::FacilityNotFound(id))
}

fn facility_ref(facilities: &[Facility], id: FacilityId) -> Result<&Facility, LedgerError> {
    facilities
        .get(id.0 as usize)
        .ok_or(LedgerError::FacilityNotFound(id))
}

impl Protocol {
    fn facility(&self, id: FacilityId) -> Result<&Facility, LedgerError> {
        facility_ref(&self.facilities, id)
    }

    fn add_to_reserve(&mut self, amount: Amount) -> Result<(), LedgerError> {
        self.reserve = self
            .reserve
            .checked_add(amount)
            .ok_or(ArithmeticError::Overflow)?;
        Ok(())
    }

    /// Sweeps pending redemptions, then runs `operation` on the swept pool.
    ///
    /// Both run on copies of the pool and the registry, committed only when
    /// `operation` succeeds. The sweep redeems from locked cycles only, which
    /// moves registry counters and leaves the facilities themselves as they were.
    fn with_swept_pool<T>(
        &mut self,
        operation: impl FnOnce(&mut SeniorPool) -> Result<(T, Amount), LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut pool = self.pool.clone();
        let mut positions = self.positions.clone();
        let swept = pool.sweep(&mut self.facilities, &mut positions, self.now)?;
        let (value, fee) = operation(&mut pool)?;
        let reserve = self
            .reserve
            .checked_add(swept.to_reserve)
            .and_then(|reserve| reserve.checked_add(fee))
            .ok_or(ArithmeticError::Overflow)?;
        self.pool = pool;
        self.positions = positions;
        self.reserve = reserve;
        Ok(value)
    }

    fn pool_facility(&self, position: PositionId) -> Result<FacilityId, LedgerError> {
        self.pool
            .investment(position)
            .map(|investment| investment.facility)
            .ok_or(LedgerError::ForeignPosition(position))
    }

    fn apply(&mut self, event: &Event) -> Result<Outcome, LedgerError> {
        if event.time < self.now {
            return Err(LedgerError::ClockRegression {
                event: event.time,
                now: self.now,
            });
        }
        let previous = self.now;
        self.now = event.time;
        let result = self.apply_kind(event);
        if result.is_err() {
            self.now = previous;
        }
        result
    }

    fn apply_kind(&mut self, event: &Event) -> Result<Outcome, LedgerError> {
        let now = self.now;
        let actor = event.actor;

        let outcome = match event.kind {
            EventKind::Deposit {
                facility,
                tranche,
                amount,
            } => {
                let position = facility_at(&mut self.facilities, facility)?.deposit(
                    actor,
                    tranche,
                    amount,
                    &self.access,
                    &mut self.positions,
                )?;
                Outcome::PositionOpened { position }
            }
            EventKind::Withdraw {
                facility,
                position,
                amount,
            } => Outcome::Withdrawn(facility_at(&mut self.facilities, facility)?.withdraw(
                actor,
                position,
                amount,
                &mut self.positions,
                now,
            )?),
            EventKind::WithdrawMax { facility, position } => Outcome::Withdrawn(
                facility_at(&mut self.facilities, facility)?.withdraw_max(actor, position, &mut self.positions, now)?,
            ),
            EventKind::ClosePosition { facility, position } => {
                facility_at(&mut self.facilities, facility)?.close_position(actor, position, &mut self.positions, now)?;
                Outcome::PositionClosed { position }
            }
            EventKind::LockJunior { facility } => {
                facility_at(&mut self.facilities, facility)?.lock_junior_capital(actor, &self.access, now)?;
                Outcome::Applied
            }
            EventKind::LockPool { facility } => {
                facility_at(&mut self.facilities, facility)?.lock_pool(actor, &self.access, now)?;
                Outcome::Applied
            }
            EventKind::Drawdown { facility, amount } => {
                facility_at(&mut self.facilities, facility)?.drawdown(actor, amount, &self.access, now)?;
                Outcome::Applied
            }
            EventKind::Pay { facility, amount } => {
                let receipt = facility_at(&mut self.facilities, facility)?.pay(amount, now)?;
                self.add_to_reserve(receipt.reserve)?;
                Outcome::Allocated(receipt)
            }
            EventKind::Reopen { facility } => {
                facility_at(&mut self.facilities, facility)?.reopen(actor, &self.access, now)?;
                Outcome::Applied
            }
            EventKind::PauseFacility { facility } => {
                facility_at(&mut self.facilities, facility)?.pause(actor, &self.access)?;
                Outcome::Applied
            }
            EventKind::UnpauseFacility { facility } => {
                facility_at(&mut self.facilities, facility)?.unpause(actor, &self.access)?;
                Outcome::Applied
            }
            EventKind::PoolDeposit { amount } => {
                self.ensure_pool_open(amount)?;
                let shares = self.with_swept_pool(|pool| Ok((pool.deposit(actor, amount)?, 0)))?;
                Outcome::SharesMinted { shares }
            }
            EventKind::PoolWithdraw { amount } => {
                self.ensure_pool_open(amount)?;
                Outcome::PoolWithdrawn(self.with_swept_pool(|pool| {
                    let withdrawal = pool.withdraw(actor, amount)?;
                    Ok((withdrawal, withdrawal.fee))
                })?)
            }
            EventKind::PoolWithdrawShares { shares } => {
                self.ensure_pool_open(shares)?;
                Outcome::PoolWithdrawn(self.with_swept_pool(|pool| {
                    let withdrawal = pool.withdraw_shares(actor, shares)?;
                    Ok((withdrawal, withdrawal.fee))
                })?)
            }
            EventKind::Invest { facility } => {
                let (position, amount) = self.pool.invest(
                    facility_at(&mut self.facilities, facility)?,
                    self.strategy.as_ref(),
                    &self.access,
                    &mut self.positions,
                    now,
                )?;
                Outcome::Invested { position, amount }
            }
            EventKind::Redeem { position } => {
                let facility = self.pool_facility(position)?;
                let redemption = self.pool.redeem(
                    position,
                    facility_at(&mut self.facilities, facility)?,
                    &mut self.positions,
                    now,
                )?;
                self.add_to_reserve(redemption.to_reserve)?;
                Outcome::Redeemed(redemption)
            }
            EventKind::Writedown { position } => {
                let facility = self.pool_facility(position)?;
                let written_down = self
                    .pool
                    .writedown(position, facility_ref(&self.facilities, facility)?, &self.positions, now)?;
                Outcome::WrittenDown { written_down }
            }
            EventKind::PausePool => {
                self.pool.pause(actor, &self.access)?;
                Outcome::Applied
            }
            EventKind::UnpausePool => {
                self.pool.unpause(actor, &self.access)?;
                Outcome::Applied
            }
        };
        Ok(outcome)
    }

    /// Rejects pool share events before paying for a staged sweep.
    fn ensure_pool_open(&self, amount: Amount) -> Result<(), LedgerError> {
        if self.pool.is_paused() {
            return Err(LedgerError::Paused);
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(())
    }

    fn position_status(&self, position: &Position) -> Result<PositionStatus, LedgerError> {
        let available = self
            .facility(position.facility)?
            .available_to_withdraw(position.id, &self.positions, self.now)?;
        Ok(PositionStatus {
            position: position.clone(),
            available,
        })
    }
}

/// Single authority applying [`Event`]s to the ledger.
///
/// # Invariants
///
/// - Event IDs are globally unique; replays are rejected.
/// - Event time never goes backwards.
/// - A rejected event leaves the ledger unchanged.
#[derive(Debug)]
pub struct Engine {
    protocol: Mutex<Protocol>,
    /// Journal for deduplication.
    events: EventLog,
}

impl Engine {
    /// Creates an engine with the admin, the pool and the facilities of `config`.
    pub fn new(config: &ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut access = AccessControl::new();
        access.grant(config.admin, Capability::Admin);
        access.grant(config.pool, Capability::SeniorPool);

        let mut facilities = Vec::with_capacity(config.facilities.len());
        for (index, terms) in config.facilities.iter().enumerate() {
            let id = FacilityId(u32::try_from(index).map_err(|_| ConfigError::Invalid("too many facilities".into()))?);
            let credit = CreditLine::new(terms.credit_params()?);
            facilities.push(Facility::new(id, config.facility_config(terms)?, Box::new(credit), 0));
            access.grant(terms.borrower, Capability::Borrower(id));
        }

        let pool = SeniorPool::new(
            config.pool,
            u128::from(config.withdraw_fee_denominator),
            config.writedown_policy(),
        );
        let strategy = FixedLeverageRatio::new(config.leverage_ratio_fixed()?);
        log::info!(
            "engine started with {} facilities, admin {}, pool {}",
            facilities.len(),
            config.admin,
            config.pool
        );

        Ok(Self {
            protocol: Mutex::new(Protocol {
                now: 0,
                access,
                facilities,
                positions: PositionBook::new(),
                pool,
                strategy: Box::new(strategy),
                reserve: 0,
            }),
            events: EventLog::new(),
        })
    }

    /// Applies one event.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::DuplicateEvent`] - Event ID already seen.
    /// - [`LedgerError::ClockRegression`] - Event time before the engine clock.
    /// - Any rejection of the targeted facility or pool operation.
    pub fn process(&self, event: Event) -> Result<Outcome, LedgerError> {
        // Journal first so a replayed ID never reaches the ledger.
        let event = Arc::new(event);
        self.events.push(Arc::clone(&event))?;

        let mut protocol = self.protocol.lock();
        let result = protocol.apply(&event);
        match &result {
            Ok(outcome) => log::debug!("event {} applied: {outcome:?}", event.id),
            Err(error) => log::debug!("event {} rejected: {error}", event.id),
        }
        result
    }

    /// Adds a facility with custom credit terms. Admin only.
    pub fn add_facility(
        &self,
        actor: ActorId,
        config: FacilityConfig,
        credit: Box<dyn CreditTerms>,
    ) -> Result<FacilityId, LedgerError> {
        let mut protocol = self.protocol.lock();
        protocol.access.require(actor, Capability::Admin)?;
        let id = FacilityId(
            u32::try_from(protocol.facilities.len()).map_err(|_| ArithmeticError::Overflow)?,
        );
        let now = protocol.now;
        protocol.facilities.push(Facility::new(id, config, credit, now));
        protocol.access.grant(config.borrower, Capability::Borrower(id));
        log::info!("facility {id} added for borrower {}", config.borrower);
        Ok(id)
    }

    /// Replaces the pool's investment strategy. Admin only.
    pub fn set_strategy(&self, actor: ActorId, strategy: Box<dyn InvestmentStrategy>) -> Result<(), LedgerError> {
        let mut protocol = self.protocol.lock();
        protocol.access.require(actor, Capability::Admin)?;
        protocol.strategy = strategy;
        Ok(())
    }

    pub fn grant(&self, actor: ActorId, grantee: ActorId, capability: Capability) -> Result<(), LedgerError> {
        let mut protocol = self.protocol.lock();
        protocol.access.require(actor, Capability::Admin)?;
        protocol.access.grant(grantee, capability);
        Ok(())
    }

    pub fn now(&self) -> Timestamp {
        self.protocol.lock().now
    }

    /// Protocol reserve balance.
    pub fn reserve(&self) -> Amount {
        self.protocol.lock().reserve
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn facility_status(&self, id: FacilityId) -> Result<FacilityStatus, LedgerError> {
        let protocol = self.protocol.lock();
        Ok(protocol.facility(id)?.status(protocol.now))
    }

    pub fn facilities(&self) -> Vec<FacilityStatus> {
        let protocol = self.protocol.lock();
        protocol
            .facilities
            .iter()
            .map(|facility| facility.status(protocol.now))
            .collect()
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.protocol.lock().pool.status()
    }

    pub fn pool_shares(&self, actor: ActorId) -> Amount {
        self.protocol.lock().pool.shares_of(actor)
    }

    pub fn position(&self, id: PositionId) -> Option<Position> {
        self.protocol.lock().positions.get(id).cloned()
    }

    pub fn available_to_withdraw(&self, id: PositionId) -> Result<Redeemable, LedgerError> {
        let protocol = self.protocol.lock();
        let position = protocol
            .positions
            .get(id)
            .ok_or(LedgerError::PositionNotFound(id))?;
        protocol
            .facility(position.facility)?
            .available_to_withdraw(id, &protocol.positions, protocol.now)
    }

    pub fn positions(&self) -> Result<Vec<PositionStatus>, LedgerError> {
        let protocol = self.protocol.lock();
        protocol
            .positions
            .iter()
            .map(|position| protocol.position_status(position))
            .collect()
    }
}
