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

//! Credit facility state machine.
//!
//! ```text
//!  Open ──lock_junior_capital──► JuniorLocked ──lock_pool──► PoolLocked
//!   ▲                                                           │
//!   │                                             drawdown window closes
//!   │                                                           ▼
//!   └───────────────────────reopen──────────────────────── Repaying
//! ```
//!
//! Each pass through the cycle above is a [`LockCycle`] in the facility's
//! cycle arena. Deposits, drawdowns and principal repayments of one cycle
//! only move that cycle's [`TrancheSlice`]s; interest is tranche-wide.

use crate::access::{AccessControl, Capability};
use crate::base::{ActorId, Amount, FacilityId, PositionId, Timestamp, TrancheKind};
use crate::credit::{CreditTerms, PaymentSplit};
use crate::error::{ArithmeticError, LedgerError};
use crate::math::{self, Rounding};
use crate::position::{self, Position, PositionRegistry, Redeemable};
use crate::tranche::{Tranche, TrancheSlice};
use crate::waterfall::{self, AllocationReceipt, FeeSchedule, WaterfallInput};
use serde::Serialize;
use std::fmt;

/// Lifecycle state, derived from the current cycle and the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityState {
    Open,
    JuniorLocked,
    /// Inside the drawdown window.
    PoolLocked,
    Repaying,
}

impl fmt::Display for FacilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FacilityState::Open => "open",
            FacilityState::JuniorLocked => "junior locked",
            FacilityState::PoolLocked => "pool locked",
            FacilityState::Repaying => "repaying",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Open,
    JuniorLocked,
    Locked,
}

/// One funding round of a facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockCycle {
    index: usize,
    opened_at: Timestamp,
    junior_locked_at: Option<Timestamp>,
    pool_locked_at: Option<Timestamp>,
    phase: CyclePhase,
    senior: TrancheSlice,
    junior: TrancheSlice,
    principal_deployed: Amount,
    limit: Amount,
}

impl LockCycle {
    pub(crate) fn open(index: usize, now: Timestamp) -> Self {
        Self {
            index,
            opened_at: now,
            junior_locked_at: None,
            pool_locked_at: None,
            phase: CyclePhase::Open,
            senior: TrancheSlice::new(),
            junior: TrancheSlice::new(),
            principal_deployed: 0,
            limit: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn opened_at(&self) -> Timestamp {
        self.opened_at
    }

    pub fn junior_locked_at(&self) -> Option<Timestamp> {
        self.junior_locked_at
    }

    pub fn pool_locked_at(&self) -> Option<Timestamp> {
        self.pool_locked_at
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn is_locked(&self) -> bool {
        self.phase == CyclePhase::Locked
    }

    /// Credit limit in force once this cycle locked.
    pub fn limit(&self) -> Amount {
        self.limit
    }

    pub fn principal_deployed(&self) -> Amount {
        self.principal_deployed
    }

    pub fn slice(&self, tranche: TrancheKind) -> &TrancheSlice {
        match tranche {
            TrancheKind::Senior => &self.senior,
            TrancheKind::Junior => &self.junior,
        }
    }

    pub(crate) fn slice_mut(&mut self, tranche: TrancheKind) -> &mut TrancheSlice {
        match tranche {
            TrancheKind::Senior => &mut self.senior,
            TrancheKind::Junior => &mut self.junior,
        }
    }

    pub fn total_deposited(&self) -> Result<Amount, LedgerError> {
        self.senior
            .principal_deposited()
            .checked_add(self.junior.principal_deposited())
            .ok_or(LedgerError::Arithmetic(ArithmeticError::Overflow))
    }

    /// Capital of this cycle the borrower has not drawn yet.
    pub fn undrawn(&self) -> Result<Amount, LedgerError> {
        Ok(self.total_deposited()?.saturating_sub(self.principal_deployed))
    }

    pub(crate) fn mark_junior_locked(&mut self, now: Timestamp) {
        self.phase = CyclePhase::JuniorLocked;
        self.junior_locked_at = Some(now);
    }

    pub(crate) fn mark_locked(&mut self, now: Timestamp, limit: Amount) {
        self.phase = CyclePhase::Locked;
        self.pool_locked_at = Some(now);
        self.limit = limit;
    }

    /// Lowers both slices' principal share prices pro rata to their deposits.
    pub(crate) fn record_drawdown(&mut self, amount: Amount) -> Result<(), LedgerError> {
        let total = self.total_deposited()?;
        for tranche in TrancheKind::ALL {
            let slice = self.slice_mut(tranche);
            let portion = math::mul_div(amount, slice.principal_deposited(), total, Rounding::Up)?;
            slice.apply_principal_reduction(portion)?;
        }
        self.principal_deployed = self
            .principal_deployed
            .checked_add(amount)
            .ok_or(ArithmeticError::Overflow)?;
        Ok(())
    }
}

/// Static terms of a facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FacilityConfig {
    pub borrower: ActorId,
    pub max_limit: Amount,
    pub junior_fee_percent: u128,
    pub reserve_fee_percent: u128,
    pub drawdown_period_secs: u64,
}

/// Read-only projection of a facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacilityStatus {
    pub id: FacilityId,
    pub state: FacilityState,
    pub paused: bool,
    pub cycles: usize,
    pub limit: Amount,
    pub balance: Amount,
    pub interest_owed: Amount,
    pub principal_owed: Amount,
    pub days_late: u64,
    pub locked_until: Timestamp,
    pub total_deployed: Amount,
    pub reserve_collected: Amount,
    pub senior: Tranche,
    pub junior: Tranche,
}

/// A credit facility: two tranches, its cycles and a credit-terms engine.
#[derive(Debug)]
pub struct Facility {
    id: FacilityId,
    config: FacilityConfig,
    senior: Tranche,
    junior: Tranche,
    cycles: Vec<LockCycle>,
    credit: Box<dyn CreditTerms>,
    total_deployed: Amount,
    /// Credit-line interest already attributed to the tranches.
    interest_attributed: Amount,
    reserve_collected: Amount,
    paused: bool,
}

impl Facility {
    pub fn new(id: FacilityId, config: FacilityConfig, credit: Box<dyn CreditTerms>, now: Timestamp) -> Self {
        Self {
            id,
            config,
            senior: Tranche::new(TrancheKind::Senior),
            junior: Tranche::new(TrancheKind::Junior),
            cycles: vec![LockCycle::open(0, now)],
            credit,
            total_deployed: 0,
            interest_attributed: 0,
            reserve_collected: 0,
            paused: false,
        }
    }

    pub fn id(&self) -> FacilityId {
        self.id
    }

    pub fn config(&self) -> &FacilityConfig {
        &self.config
    }

    pub fn tranche(&self, kind: TrancheKind) -> &Tranche {
        match kind {
            TrancheKind::Senior => &self.senior,
            TrancheKind::Junior => &self.junior,
        }
    }

    pub fn cycles(&self) -> &[LockCycle] {
        &self.cycles
    }

    pub fn current_cycle(&self) -> &LockCycle {
        // The arena is created with one cycle and only ever grows.
        &self.cycles[self.cycles.len() - 1]
    }

    pub fn credit(&self) -> &dyn CreditTerms {
        self.credit.as_ref()
    }

    pub fn total_deployed(&self) -> Amount {
        self.total_deployed
    }

    pub fn reserve_collected(&self) -> Amount {
        self.reserve_collected
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_late(&self, now: Timestamp) -> bool {
        self.credit.is_late(now)
    }

    pub fn days_late(&self, now: Timestamp) -> u64 {
        self.credit.days_late(now)
    }

    pub fn state(&self, now: Timestamp) -> FacilityState {
        match self.current_cycle().phase() {
            CyclePhase::Open => FacilityState::Open,
            CyclePhase::JuniorLocked => FacilityState::JuniorLocked,
            CyclePhase::Locked if now <= self.senior.locked_until() => FacilityState::PoolLocked,
            CyclePhase::Locked => FacilityState::Repaying,
        }
    }

    /// Room left under `max_limit` for new senior capital this cycle.
    pub fn senior_capacity(&self) -> Result<Amount, LedgerError> {
        let committed = self
            .credit
            .balance()
            .checked_add(self.current_cycle().total_deposited()?)
            .ok_or(ArithmeticError::Overflow)?;
        Ok(self.config.max_limit.saturating_sub(committed))
    }

    pub fn status(&self, now: Timestamp) -> FacilityStatus {
        FacilityStatus {
            id: self.id,
            state: self.state(now),
            paused: self.paused,
            cycles: self.cycles.len(),
            limit: self.credit.limit(),
            balance: self.credit.balance(),
            interest_owed: self.credit.interest_owed(),
            principal_owed: self.credit.principal_owed(),
            days_late: self.credit.days_late(now),
            locked_until: self.senior.locked_until().max(self.junior.locked_until()),
            total_deployed: self.total_deployed,
            reserve_collected: self.reserve_collected,
            senior: self.senior.clone(),
            junior: self.junior.clone(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.senior.principal_locked() <= self.senior.principal_deposited()
                && self.junior.principal_locked() <= self.junior.principal_deposited(),
            "Invariant violated: locked principal exceeds deposits"
        );
        debug_assert_eq!(
            self.total_deployed,
            self.cycles.iter().map(LockCycle::principal_deployed).sum::<Amount>(),
            "Invariant violated: deployed principal out of sync with cycles"
        );
    }

    fn ensure_active(&self) -> Result<(), LedgerError> {
        if self.paused {
            return Err(LedgerError::Paused);
        }
        Ok(())
    }

    fn ensure_state(&self, now: Timestamp, expected: FacilityState, operation: &'static str) -> Result<(), LedgerError> {
        let state = self.state(now);
        if state != expected {
            return Err(LedgerError::InvalidState { state, operation });
        }
        Ok(())
    }

    fn borrower_capability(&self) -> Capability {
        Capability::Borrower(self.id)
    }

    /// Looks up a position of this facility that `actor` may act on.
    fn owned_position(
        &self,
        actor: ActorId,
        id: PositionId,
        registry: &dyn PositionRegistry,
    ) -> Result<Position, LedgerError> {
        let position = registry.get(id).ok_or(LedgerError::PositionNotFound(id))?;
        if position.facility != self.id {
            return Err(LedgerError::ForeignPosition(id));
        }
        if !registry.is_approved_or_owner(id, actor) {
            return Err(LedgerError::NotOwner { actor, position: id });
        }
        Ok(position.clone())
    }

    fn cycle_of(&self, position: &Position) -> Result<&LockCycle, LedgerError> {
        self.cycles
            .get(position.cycle)
            .ok_or(LedgerError::Consistency("position refers to unknown cycle"))
    }

    /// Attributes credit-line interest accrued since the last call to the
    /// tranches, split by their current locked principal.
    fn attribute_interest(&mut self, total_accrued: Amount) -> Result<(), LedgerError> {
        let delta = total_accrued.saturating_sub(self.interest_attributed);
        if delta == 0 {
            return Ok(());
        }
        let senior_share = waterfall::senior_accrual_share(delta, &self.senior, &self.junior)?;
        self.senior.record_interest_accrued(senior_share)?;
        self.junior.record_interest_accrued(delta - senior_share)?;
        self.interest_attributed = total_accrued;
        Ok(())
    }

    /// Deposits into a tranche of the current cycle and mints a position.
    ///
    /// Senior deposits require [`Capability::SeniorPool`].
    pub fn deposit(
        &mut self,
        actor: ActorId,
        tranche: TrancheKind,
        amount: Amount,
        access: &AccessControl,
        registry: &mut dyn PositionRegistry,
    ) -> Result<PositionId, LedgerError> {
        self.ensure_active()?;
        if tranche == TrancheKind::Senior {
            access.require(actor, Capability::SeniorPool)?;
        }
        let index = self.cycles.len() - 1;
        let (ledger, cycle) = match tranche {
            TrancheKind::Senior => (&mut self.senior, &mut self.cycles[index]),
            TrancheKind::Junior => (&mut self.junior, &mut self.cycles[index]),
        };
        ledger.deposit(cycle.slice_mut(tranche), amount)?;
        let id = registry.mint(actor, self.id, tranche, index, amount);
        log::debug!("facility {}: {actor} deposited {amount} into {tranche}, position {id}", self.id);
        self.assert_invariants();
        Ok(id)
    }

    /// Withdraws `amount` from a position.
    ///
    /// Before its cycle locks a position gets back un-invested principal and
    /// is burned once empty. After lock, withdrawals wait for the drawdown
    /// window to close and pay interest before principal.
    pub fn withdraw(
        &mut self,
        actor: ActorId,
        id: PositionId,
        amount: Amount,
        registry: &mut dyn PositionRegistry,
        now: Timestamp,
    ) -> Result<Redeemable, LedgerError> {
        self.ensure_active()?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let position = self.owned_position(actor, id, registry)?;
        if self.cycle_of(&position)?.is_locked() {
            let available = self.locked_redeemable(&position, now)?;
            if amount > available.total() {
                return Err(LedgerError::InsufficientFunds {
                    attempted: amount,
                    available: available.total(),
                });
            }
            let interest = amount.min(available.interest);
            let principal = amount - interest;
            registry.redeem(id, principal, interest)?;
            log::debug!("facility {}: position {id} withdrew {interest} interest, {principal} principal", self.id);
            return Ok(Redeemable { interest, principal });
        }

        let (ledger, cycle) = match position.tranche {
            TrancheKind::Senior => (&mut self.senior, &mut self.cycles[position.cycle]),
            TrancheKind::Junior => (&mut self.junior, &mut self.cycles[position.cycle]),
        };
        if amount > position.principal_amount {
            return Err(LedgerError::InsufficientFunds {
                attempted: amount,
                available: position.principal_amount,
            });
        }
        ledger.withdraw_unlocked(cycle.slice_mut(position.tranche), amount)?;
        registry.withdraw_principal(id, amount)?;
        if amount == position.principal_amount {
            registry.burn(id)?;
            log::debug!("facility {}: position {id} emptied and burned", self.id);
        }
        self.assert_invariants();
        Ok(Redeemable {
            interest: 0,
            principal: amount,
        })
    }

    /// Withdraws everything currently redeemable from a position.
    ///
    /// Returns zero amounts rather than an error when nothing is redeemable.
    pub fn withdraw_max(
        &mut self,
        actor: ActorId,
        id: PositionId,
        registry: &mut dyn PositionRegistry,
        now: Timestamp,
    ) -> Result<Redeemable, LedgerError> {
        self.ensure_active()?;
        let position = self.owned_position(actor, id, registry)?;
        let available = if self.cycle_of(&position)?.is_locked() {
            self.locked_redeemable(&position, now)?
        } else {
            Redeemable {
                interest: 0,
                principal: position.principal_amount,
            }
        };
        if available.is_zero() {
            return Ok(Redeemable::default());
        }
        self.withdraw(actor, id, available.total(), registry, now)
    }

    /// Burns a position that has redeemed all of its principal and interest.
    pub fn close_position(
        &mut self,
        actor: ActorId,
        id: PositionId,
        registry: &mut dyn PositionRegistry,
        now: Timestamp,
    ) -> Result<Position, LedgerError> {
        self.ensure_active()?;
        let position = self.owned_position(actor, id, registry)?;
        let available = self.available_to_withdraw(id, registry, now)?;
        if position.principal_redeemed < position.principal_amount || !available.is_zero() {
            return Err(LedgerError::PositionNotRedeemed(id));
        }
        log::debug!("facility {}: position {id} closed", self.id);
        registry.burn(id)
    }

    /// What a position could withdraw at `now`.
    pub fn available_to_withdraw(
        &self,
        id: PositionId,
        registry: &dyn PositionRegistry,
        now: Timestamp,
    ) -> Result<Redeemable, LedgerError> {
        let position = registry.get(id).ok_or(LedgerError::PositionNotFound(id))?;
        if position.facility != self.id {
            return Err(LedgerError::ForeignPosition(id));
        }
        if !self.cycle_of(position)?.is_locked() {
            return Ok(Redeemable {
                interest: 0,
                principal: position.principal_amount,
            });
        }
        match self.locked_redeemable(position, now) {
            Err(LedgerError::WithdrawalsLocked(_)) => Ok(Redeemable::default()),
            other => other,
        }
    }

    fn locked_redeemable(&self, position: &Position, now: Timestamp) -> Result<Redeemable, LedgerError> {
        let tranche = self.tranche(position.tranche);
        if now <= tranche.locked_until() {
            return Err(LedgerError::WithdrawalsLocked(tranche.locked_until()));
        }
        let cycle = self.cycle_of(position)?;
        position::redeemable(position, tranche, cycle.slice(position.tranche), true)
    }

    /// Locks the junior tranche of the current cycle.
    pub fn lock_junior_capital(&mut self, actor: ActorId, access: &AccessControl, now: Timestamp) -> Result<(), LedgerError> {
        access.require(actor, self.borrower_capability())?;
        self.ensure_active()?;
        self.ensure_state(now, FacilityState::Open, "lock junior capital")?;
        self.junior.lock(now, self.config.drawdown_period_secs)?;
        let index = self.cycles.len() - 1;
        self.cycles[index].mark_junior_locked(now);
        log::info!("facility {}: junior capital locked in cycle {index}", self.id);
        Ok(())
    }

    /// Locks the senior tranche, opens the drawdown window and sets the limit.
    pub fn lock_pool(&mut self, actor: ActorId, access: &AccessControl, now: Timestamp) -> Result<(), LedgerError> {
        access.require(actor, self.borrower_capability())?;
        self.ensure_active()?;
        self.ensure_state(now, FacilityState::JuniorLocked, "lock pool")?;

        // Interest accrued so far belongs to the ratio before this cycle joins.
        let assessment = self.credit.assess(now)?;
        self.attribute_interest(assessment.total_interest_accrued)?;

        let index = self.cycles.len() - 1;
        let cycle_total = self.cycles[index].total_deposited()?;
        let limit = self
            .credit
            .balance()
            .checked_add(cycle_total)
            .ok_or(ArithmeticError::Overflow)?
            .min(self.config.max_limit);

        let period = self.config.drawdown_period_secs;
        self.senior.lock(now, period)?;
        self.junior.relock(now, period)?;
        let cycle = &mut self.cycles[index];
        self.senior.commit_slice(cycle.slice_mut(TrancheKind::Senior))?;
        self.junior.commit_slice(cycle.slice_mut(TrancheKind::Junior))?;
        cycle.mark_locked(now, limit);
        self.credit.set_limit(limit);
        log::info!(
            "facility {}: pool locked in cycle {index}, limit {limit}, window until {}",
            self.id,
            self.senior.locked_until()
        );
        self.assert_invariants();
        Ok(())
    }

    /// Draws `amount` from the current cycle's capital.
    pub fn drawdown(&mut self, actor: ActorId, amount: Amount, access: &AccessControl, now: Timestamp) -> Result<(), LedgerError> {
        access.require(actor, self.borrower_capability())?;
        self.ensure_active()?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        self.ensure_state(now, FacilityState::PoolLocked, "drawdown")?;
        if self.credit.is_late(now) {
            return Err(LedgerError::PaymentsPastDue);
        }
        let index = self.cycles.len() - 1;
        let available = self
            .credit
            .limit()
            .saturating_sub(self.credit.balance())
            .min(self.cycles[index].undrawn()?);
        if amount > available {
            return Err(LedgerError::InsufficientFunds {
                attempted: amount,
                available,
            });
        }
        let total_deployed = self
            .total_deployed
            .checked_add(amount)
            .ok_or(ArithmeticError::Overflow)?;
        let mut cycle = self.cycles[index].clone();
        cycle.record_drawdown(amount)?;
        self.credit.drawdown(amount, now)?;
        self.cycles[index] = cycle;
        self.total_deployed = total_deployed;
        log::debug!("facility {}: drew down {amount} in cycle {index}", self.id);
        self.assert_invariants();
        Ok(())
    }

    /// Applies a borrower payment through the waterfall.
    ///
    /// Anyone may pay. The receipt's amounts sum to `amount`.
    pub fn pay(&mut self, amount: Amount, now: Timestamp) -> Result<AllocationReceipt, LedgerError> {
        self.ensure_active()?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if !self.cycles.iter().any(LockCycle::is_locked) {
            return Err(LedgerError::InvalidState {
                state: self.state(now),
                operation: "pay",
            });
        }

        let assessment = self.credit.assess(now)?;
        self.attribute_interest(assessment.total_interest_accrued)?;
        let split = PaymentSplit::new(amount, &assessment);

        let balance_after = assessment.balance - split.principal_total();
        let principal_owed_after = assessment.principal_owed.saturating_sub(split.principal);
        let principal_expected = self
            .total_deployed
            .saturating_sub(balance_after)
            .checked_add(principal_owed_after)
            .ok_or(ArithmeticError::Overflow)?;

        let fees = FeeSchedule {
            reserve_fee_percent: self.config.reserve_fee_percent,
            junior_fee_percent: self.config.junior_fee_percent,
        };
        let plan = waterfall::plan(
            &WaterfallInput {
                split,
                senior: &self.senior,
                junior: &self.junior,
                senior_interest_accrued: self.senior.interest_accrued(),
                cycles: &self.cycles,
                total_deployed: self.total_deployed,
                principal_expected,
            },
            fees,
        )?;

        // Stage on copies so a failure below leaves the facility untouched.
        let receipt = plan.receipt;
        let mut senior = self.senior.clone();
        let mut junior = self.junior.clone();
        let mut cycles = self.cycles.clone();
        senior.apply_interest_distribution(receipt.senior_interest)?;
        junior.apply_interest_distribution(receipt.junior_interest)?;
        for credit in &plan.principal_credits {
            let cycle = cycles
                .get_mut(credit.cycle)
                .ok_or(LedgerError::Consistency("principal credited to unknown cycle"))?;
            cycle.slice_mut(credit.tranche).apply_principal_repayment(credit.amount)?;
        }
        let reserve_collected = self
            .reserve_collected
            .checked_add(receipt.reserve)
            .ok_or(ArithmeticError::Overflow)?;
        self.credit.apply_payment(&split, now)?;

        self.senior = senior;
        self.junior = junior;
        self.cycles = cycles;
        self.reserve_collected = reserve_collected;
        log::debug!("facility {}: payment {amount} allocated as {receipt:?}", self.id);
        self.assert_invariants();
        Ok(receipt)
    }

    /// Starts a new funding cycle once the drawdown window has closed.
    pub fn reopen(&mut self, actor: ActorId, access: &AccessControl, now: Timestamp) -> Result<(), LedgerError> {
        access.require(actor, self.borrower_capability())?;
        self.ensure_active()?;
        self.ensure_state(now, FacilityState::Repaying, "reopen")?;
        if self.credit.is_late(now) {
            return Err(LedgerError::PaymentsPastDue);
        }
        self.senior.unlock();
        self.junior.unlock();
        let index = self.cycles.len();
        self.cycles.push(LockCycle::open(index, now));
        log::info!("facility {}: reopened for cycle {index}", self.id);
        Ok(())
    }

    pub fn pause(&mut self, actor: ActorId, access: &AccessControl) -> Result<(), LedgerError> {
        access.require(actor, Capability::Admin)?;
        self.paused = true;
        log::info!("facility {}: paused", self.id);
        Ok(())
    }

    pub fn unpause(&mut self, actor: ActorId, access: &AccessControl) -> Result<(), LedgerError> {
        access.require(actor, Capability::Admin)?;
        self.paused = false;
        log::info!("facility {}: unpaused", self.id);
        Ok(())
    }
}
