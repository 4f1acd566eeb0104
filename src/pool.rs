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

//! Senior pool.
//!
//! Lenders buy pool shares at [`SeniorPool::share_price`]. The pool invests
//! idle cash into senior tranches, redeems what those positions pay back
//! and marks late loans down.
//!
//! ```text
//!  assets = idle + total_loans_outstanding - total_written_down
//! ```
//!
//! Interest redeemed raises the share price. Principal redeemed only moves
//! value from loans back to idle. A write-down lowers the share price, and
//! recomputing it after repayment raises it back, never above where it was.

use crate::access::{AccessControl, Capability};
use crate::base::{ActorId, Amount, FacilityId, PositionId, SharePrice, Timestamp, TrancheKind};
use crate::error::{ArithmeticError, LedgerError};
use crate::facility::{Facility, FacilityState};
use crate::math::{self, ONE, Rounding};
use crate::position::PositionRegistry;
use crate::strategy::InvestmentStrategy;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::ops::AddAssign;

/// Lateness window over which a position is written down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WritedownPolicy {
    pub grace_period_days: u64,
    pub max_days_late: u64,
}

impl Default for WritedownPolicy {
    fn default() -> Self {
        Self {
            grace_period_days: 30,
            max_days_late: 120,
        }
    }
}

impl WritedownPolicy {
    /// Fraction of principal to write down, in fixed point.
    ///
    /// Zero up to the grace period, then linear up to 100% at `max_days_late`.
    pub fn fraction(&self, days_late: u64) -> Result<SharePrice, ArithmeticError> {
        if days_late <= self.grace_period_days {
            return Ok(0);
        }
        if days_late >= self.max_days_late || self.max_days_late <= self.grace_period_days {
            return Ok(ONE);
        }
        math::mul_div(
            ONE,
            (days_late - self.grace_period_days) as u128,
            (self.max_days_late - self.grace_period_days) as u128,
            Rounding::Down,
        )
    }
}

/// Result of a lender withdrawal from the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Withdrawal {
    pub gross: Amount,
    /// Goes to the protocol reserve.
    pub fee: Amount,
    pub net: Amount,
    pub shares_burned: Amount,
}

/// What a redemption pulled into the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Redemption {
    pub interest: Amount,
    pub principal: Amount,
    /// Interest with no shareholder to receive it, sent to the reserve.
    pub to_reserve: Amount,
}

impl AddAssign for Redemption {
    fn add_assign(&mut self, other: Self) {
        self.interest += other.interest;
        self.principal += other.principal;
        self.to_reserve += other.to_reserve;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Investment {
    pub facility: FacilityId,
    pub written_down: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub share_price: SharePrice,
    pub total_shares: Amount,
    pub assets: Amount,
    pub idle: Amount,
    pub total_loans_outstanding: Amount,
    pub total_written_down: Amount,
    pub investments: usize,
    pub paused: bool,
}

#[derive(Debug, Clone)]
pub struct SeniorPool {
    actor: ActorId,
    share_price: SharePrice,
    total_shares: Amount,
    idle: Amount,
    total_loans_outstanding: Amount,
    total_written_down: Amount,
    shares: HashMap<ActorId, Amount>,
    investments: BTreeMap<PositionId, Investment>,
    withdraw_fee_denominator: u128,
    writedown_policy: WritedownPolicy,
    paused: bool,
}

impl SeniorPool {
    /// Creates an empty pool acting as `actor` when it deposits into facilities.
    pub fn new(actor: ActorId, withdraw_fee_denominator: u128, writedown_policy: WritedownPolicy) -> Self {
        Self {
            actor,
            share_price: ONE,
            total_shares: 0,
            idle: 0,
            total_loans_outstanding: 0,
            total_written_down: 0,
            shares: HashMap::new(),
            investments: BTreeMap::new(),
            withdraw_fee_denominator,
            writedown_policy,
            paused: false,
        }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn share_price(&self) -> SharePrice {
        self.share_price
    }

    pub fn total_shares(&self) -> Amount {
        self.total_shares
    }

    pub fn idle(&self) -> Amount {
        self.idle
    }

    pub fn total_loans_outstanding(&self) -> Amount {
        self.total_loans_outstanding
    }

    pub fn total_written_down(&self) -> Amount {
        self.total_written_down
    }

    pub fn assets(&self) -> Amount {
        (self.idle + self.total_loans_outstanding).saturating_sub(self.total_written_down)
    }

    pub fn shares_of(&self, actor: ActorId) -> Amount {
        self.shares.get(&actor).copied().unwrap_or(0)
    }

    /// Currency value of `actor`'s shares at the current price.
    pub fn claim_of(&self, actor: ActorId) -> Result<Amount, LedgerError> {
        Ok(math::share_price_to_usdc(self.share_price, self.shares_of(actor), Rounding::Down)?)
    }

    pub fn investments(&self) -> impl Iterator<Item = (&PositionId, &Investment)> {
        self.investments.iter()
    }

    pub fn investment(&self, id: PositionId) -> Option<&Investment> {
        self.investments.get(&id)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            share_price: self.share_price,
            total_shares: self.total_shares,
            assets: self.assets(),
            idle: self.idle,
            total_loans_outstanding: self.total_loans_outstanding,
            total_written_down: self.total_written_down,
            investments: self.investments.len(),
            paused: self.paused,
        }
    }

    fn assert_invariants(&self) {
        debug_assert_eq!(
            self.total_shares,
            self.shares.values().sum::<Amount>(),
            "Invariant violated: total shares out of sync with holders"
        );
        debug_assert!(
            self.total_written_down <= self.total_loans_outstanding,
            "Invariant violated: written down {} exceeds loans outstanding {}",
            self.total_written_down,
            self.total_loans_outstanding
        );
        debug_assert_eq!(
            self.total_written_down,
            self.investments.values().map(|i| i.written_down).sum::<Amount>(),
            "Invariant violated: write-downs out of sync with investments"
        );
    }

    fn ensure_active(&self) -> Result<(), LedgerError> {
        if self.paused {
            return Err(LedgerError::Paused);
        }
        Ok(())
    }

    /// Share price for minting and burning. Zero only after outstanding
    /// shares lost all their value to write-downs.
    fn trading_price(&self) -> Result<SharePrice, LedgerError> {
        if self.share_price == 0 {
            return Err(LedgerError::PoolInsolvent);
        }
        Ok(self.share_price)
    }

    /// Buys shares for `amount` at the current share price.
    pub fn deposit(&mut self, actor: ActorId, amount: Amount) -> Result<Amount, LedgerError> {
        self.ensure_active()?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let minted = math::mul_div(amount, ONE, self.trading_price()?, Rounding::Down)?;
        if minted == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let idle = self.idle.checked_add(amount).ok_or(ArithmeticError::Overflow)?;
        let total_shares = self
            .total_shares
            .checked_add(minted)
            .ok_or(ArithmeticError::Overflow)?;
        self.idle = idle;
        self.total_shares = total_shares;
        *self.shares.entry(actor).or_default() += minted;
        log::debug!("pool: {actor} deposited {amount} for {minted} shares");
        self.assert_invariants();
        Ok(minted)
    }

    /// Withdraws `amount` of currency, burning the shares it takes.
    pub fn withdraw(&mut self, actor: ActorId, amount: Amount) -> Result<Withdrawal, LedgerError> {
        self.ensure_active()?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let shares = math::mul_div(amount, ONE, self.trading_price()?, Rounding::Up)?;
        if shares > self.shares_of(actor) {
            return Err(LedgerError::InsufficientFunds {
                attempted: amount,
                available: self.claim_of(actor)?,
            });
        }
        self.burn_for(actor, shares, amount)
    }

    /// Burns `shares` and withdraws their currency value.
    pub fn withdraw_shares(&mut self, actor: ActorId, shares: Amount) -> Result<Withdrawal, LedgerError> {
        self.ensure_active()?;
        if shares == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let held = self.shares_of(actor);
        if shares > held {
            return Err(LedgerError::InsufficientFunds {
                attempted: shares,
                available: held,
            });
        }
        let amount = math::share_price_to_usdc(self.trading_price()?, shares, Rounding::Down)?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        self.burn_for(actor, shares, amount)
    }

    fn burn_for(&mut self, actor: ActorId, shares: Amount, amount: Amount) -> Result<Withdrawal, LedgerError> {
        if amount > self.idle {
            return Err(LedgerError::InsufficientFunds {
                attempted: amount,
                available: self.idle,
            });
        }
        let fee = if self.withdraw_fee_denominator == 0 {
            0
        } else {
            amount / self.withdraw_fee_denominator
        };
        self.idle -= amount;
        self.total_shares -= shares;
        if let Some(held) = self.shares.get_mut(&actor) {
            *held -= shares;
            if *held == 0 {
                self.shares.remove(&actor);
            }
        }
        log::debug!("pool: {actor} withdrew {amount} (fee {fee}), burned {shares} shares");
        self.assert_invariants();
        Ok(Withdrawal {
            gross: amount,
            fee,
            net: amount - fee,
            shares_burned: shares,
        })
    }

    /// Invests idle cash into the senior tranche of `facility`.
    ///
    /// Returns the new position and the amount invested.
    pub fn invest(
        &mut self,
        facility: &mut Facility,
        strategy: &dyn InvestmentStrategy,
        access: &AccessControl,
        registry: &mut dyn PositionRegistry,
        now: Timestamp,
    ) -> Result<(PositionId, Amount), LedgerError> {
        self.ensure_active()?;
        let state = facility.state(now);
        if state != FacilityState::JuniorLocked {
            return Err(LedgerError::InvalidState {
                state,
                operation: "invest",
            });
        }
        let amount = strategy
            .estimate(facility, now)?
            .min(self.idle)
            .min(facility.senior_capacity()?);
        if amount == 0 {
            return Err(LedgerError::NothingToInvest(facility.id()));
        }
        let loans = self
            .total_loans_outstanding
            .checked_add(amount)
            .ok_or(ArithmeticError::Overflow)?;
        let position = facility.deposit(self.actor, TrancheKind::Senior, amount, access, registry)?;
        self.idle -= amount;
        self.total_loans_outstanding = loans;
        self.investments.insert(
            position,
            Investment {
                facility: facility.id(),
                written_down: 0,
            },
        );
        log::info!("pool: invested {amount} in facility {}, position {position}", facility.id());
        self.assert_invariants();
        Ok((position, amount))
    }

    /// Pulls whatever `position` can redeem now, then refreshes its write-down.
    ///
    /// Calling it again with nothing new to redeem changes nothing.
    pub fn redeem(
        &mut self,
        position: PositionId,
        facility: &mut Facility,
        registry: &mut dyn PositionRegistry,
        now: Timestamp,
    ) -> Result<Redemption, LedgerError> {
        self.ensure_active()?;
        self.ensure_invested(position, facility)?;
        let available = facility.available_to_withdraw(position, registry, now)?;
        let mut redemption = Redemption::default();
        if !available.is_zero() {
            let taken = facility.withdraw_max(self.actor, position, registry, now)?;
            redemption = self.collect(taken.interest, taken.principal)?;
            log::debug!(
                "pool: redeemed {} interest, {} principal from position {position}",
                taken.interest,
                taken.principal
            );
        }
        self.writedown(position, facility, registry, now)?;
        Ok(redemption)
    }

    fn collect(&mut self, interest: Amount, principal: Amount) -> Result<Redemption, LedgerError> {
        if principal > self.total_loans_outstanding {
            return Err(LedgerError::Consistency("principal redeemed exceeds loans outstanding"));
        }
        let mut redemption = Redemption {
            interest,
            principal,
            to_reserve: 0,
        };
        if self.total_shares == 0 {
            redemption.to_reserve = interest;
        } else {
            let delta = math::usdc_to_share_price(interest, self.total_shares, Rounding::Down)?;
            self.share_price = self
                .share_price
                .checked_add(delta)
                .ok_or(ArithmeticError::Overflow)?;
            self.idle = self.idle.checked_add(interest).ok_or(ArithmeticError::Overflow)?;
        }
        self.idle = self.idle.checked_add(principal).ok_or(ArithmeticError::Overflow)?;
        self.total_loans_outstanding -= principal;
        Ok(redemption)
    }

    /// Recomputes the write-down of `position` from how late its facility is.
    ///
    /// Returns the position's written-down amount after the update.
    pub fn writedown(
        &mut self,
        position: PositionId,
        facility: &Facility,
        registry: &dyn PositionRegistry,
        now: Timestamp,
    ) -> Result<Amount, LedgerError> {
        self.ensure_active()?;
        self.ensure_invested(position, facility)?;
        let held = registry
            .get(position)
            .ok_or(LedgerError::PositionNotFound(position))?;
        let outstanding = held.principal_amount.saturating_sub(held.principal_redeemed);
        let fraction = self.writedown_policy.fraction(facility.days_late(now))?;
        let target = math::share_price_to_usdc(fraction, outstanding, Rounding::Down)?;

        let previous = self
            .investments
            .get(&position)
            .map(|i| i.written_down)
            .unwrap_or(0);
        if target == previous {
            return Ok(target);
        }
        if target > previous {
            let delta = target - previous;
            let price_delta = math::usdc_to_share_price(delta, self.total_shares, Rounding::Up)?;
            self.share_price = self.share_price.saturating_sub(price_delta);
            self.total_written_down += delta;
            log::warn!("pool: position {position} written down by {delta} to {target}");
        } else {
            let delta = previous - target;
            let price_delta = math::usdc_to_share_price(delta, self.total_shares, Rounding::Down)?;
            self.share_price = self
                .share_price
                .checked_add(price_delta)
                .ok_or(ArithmeticError::Overflow)?;
            self.total_written_down -= delta;
            log::info!("pool: position {position} write-down reversed by {delta} to {target}");
        }
        if let Some(investment) = self.investments.get_mut(&position) {
            investment.written_down = target;
        }
        self.assert_invariants();
        Ok(target)
    }

    /// Redeems every investment held in a locked cycle of an unpaused facility.
    ///
    /// Locked-cycle redemptions only move registry counters, so the
    /// facilities come out of a sweep unchanged.
    pub fn sweep(
        &mut self,
        facilities: &mut [Facility],
        registry: &mut dyn PositionRegistry,
        now: Timestamp,
    ) -> Result<Redemption, LedgerError> {
        let positions: Vec<(PositionId, FacilityId)> = self
            .investments
            .iter()
            .map(|(id, investment)| (*id, investment.facility))
            .collect();
        let mut total = Redemption::default();
        for (position, facility_id) in positions {
            let facility = facilities
                .get_mut(facility_id.0 as usize)
                .ok_or(LedgerError::FacilityNotFound(facility_id))?;
            let locked = registry
                .get(position)
                .and_then(|held| facility.cycles().get(held.cycle))
                .is_some_and(|cycle| cycle.is_locked());
            if facility.is_paused() || !locked {
                continue;
            }
            total += self.redeem(position, facility, registry, now)?;
        }
        Ok(total)
    }

    fn ensure_invested(&self, position: PositionId, facility: &Facility) -> Result<(), LedgerError> {
        match self.investments.get(&position) {
            Some(investment) if investment.facility == facility.id() => Ok(()),
            _ => Err(LedgerError::ForeignPosition(position)),
        }
    }

    pub fn pause(&mut self, actor: ActorId, access: &AccessControl) -> Result<(), LedgerError> {
        access.require(actor, Capability::Admin)?;
        self.paused = true;
        log::info!("pool: paused");
        Ok(())
    }

    pub fn unpause(&mut self, actor: ActorId, access: &AccessControl) -> Result<(), LedgerError> {
        access.require(actor, Capability::Admin)?;
        self.paused = false;
        log::info!("pool: unpaused");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::CURRENCY_SCALE as USDC;

    fn make_pool() -> SeniorPool {
        SeniorPool::new(ActorId(3), 200, WritedownPolicy::default())
    }

    #[test]
    fn writedown_fraction_is_linear_between_grace_and_max() {
        let policy = WritedownPolicy {
            grace_period_days: 30,
            max_days_late: 110,
        };
        assert_eq!(policy.fraction(0).unwrap(), 0);
        assert_eq!(policy.fraction(30).unwrap(), 0);
        assert_eq!(policy.fraction(50).unwrap(), ONE / 4);
        assert_eq!(policy.fraction(110).unwrap(), ONE);
        assert_eq!(policy.fraction(500).unwrap(), ONE);
    }

    #[test]
    fn deposit_mints_shares_at_price() {
        let mut pool = make_pool();
        assert_eq!(pool.deposit(ActorId(7), 100 * USDC).unwrap(), 100 * USDC);
        assert_eq!(pool.assets(), 100 * USDC);
        assert_eq!(pool.claim_of(ActorId(7)).unwrap(), 100 * USDC);
        assert_eq!(pool.deposit(ActorId(7), 0), Err(LedgerError::InvalidAmount));
    }

    #[test]
    fn withdraw_charges_fee_and_burns_shares() {
        let mut pool = make_pool();
        pool.deposit(ActorId(7), 100 * USDC).unwrap();
        let w = pool.withdraw(ActorId(7), 40 * USDC).unwrap();
        assert_eq!(w.fee, 200_000);
        assert_eq!(w.net, 39_800_000);
        assert_eq!(pool.shares_of(ActorId(7)), 60 * USDC);
        assert_eq!(pool.idle(), 60 * USDC);

        assert_eq!(
            pool.withdraw(ActorId(7), 61 * USDC),
            Err(LedgerError::InsufficientFunds {
                attempted: 61 * USDC,
                available: 60 * USDC
            })
        );
        let all = pool.withdraw_shares(ActorId(7), 60 * USDC).unwrap();
        assert_eq!(all.gross, 60 * USDC);
        assert_eq!(pool.total_shares(), 0);
    }

    #[test]
    fn interest_raises_share_price() {
        let mut pool = make_pool();
        pool.deposit(ActorId(7), 100 * USDC).unwrap();
        pool.total_loans_outstanding = 50 * USDC;
        pool.idle -= 50 * USDC;
        let r = pool.collect(10 * USDC, 50 * USDC).unwrap();
        assert_eq!(r.to_reserve, 0);
        assert_eq!(pool.share_price(), ONE + ONE / 10);
        assert_eq!(pool.assets(), 110 * USDC);
        assert_eq!(pool.total_loans_outstanding(), 0);
    }

    #[test]
    fn interest_without_shareholders_goes_to_reserve() {
        let mut pool = make_pool();
        let r = pool.collect(5 * USDC, 0).unwrap();
        assert_eq!(r.to_reserve, 5 * USDC);
        assert_eq!(pool.share_price(), ONE);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn paused_pool_rejects_deposits() {
        let mut access = AccessControl::new();
        access.grant(ActorId(1), Capability::Admin);
        let mut pool = make_pool();
        pool.pause(ActorId(1), &access).unwrap();
        assert_eq!(pool.deposit(ActorId(7), USDC), Err(LedgerError::Paused));
        assert!(pool.unpause(ActorId(7), &access).is_err());
    }
}
