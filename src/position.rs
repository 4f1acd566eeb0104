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

//! Depositor positions.
//!
//! A position only stores what cannot be derived: its principal and the
//! amounts already redeemed. What it may redeem now is a projection of the
//! tranche share prices, see [`redeemable`].

use crate::base::{ActorId, Amount, FacilityId, PositionId, TrancheKind};
use crate::error::{ArithmeticError, LedgerError};
use crate::math::{self, Rounding};
use crate::tranche::{Tranche, TrancheSlice};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub owner: ActorId,
    pub facility: FacilityId,
    pub tranche: TrancheKind,
    /// Funding cycle the deposit belongs to.
    pub cycle: usize,
    pub principal_amount: Amount,
    pub principal_redeemed: Amount,
    pub interest_redeemed: Amount,
}

/// Interest and principal a holder may withdraw right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Redeemable {
    pub interest: Amount,
    pub principal: Amount,
}

impl Redeemable {
    pub fn total(&self) -> Amount {
        self.interest.saturating_add(self.principal)
    }

    pub fn is_zero(&self) -> bool {
        self.interest == 0 && self.principal == 0
    }
}

/// Derives what `position` may redeem from its tranche and cycle slice.
///
/// Before the cycle locks, the whole remaining principal is returnable and
/// no interest is owed. Afterwards interest is counted from the interest
/// share price at lock time, and principal from the slice's undrawn plus
/// repaid share prices.
pub fn redeemable(
    position: &Position,
    tranche: &Tranche,
    slice: &TrancheSlice,
    cycle_locked: bool,
) -> Result<Redeemable, LedgerError> {
    if !cycle_locked {
        return Ok(Redeemable {
            interest: 0,
            principal: position
                .principal_amount
                .saturating_sub(position.principal_redeemed),
        });
    }
    let interest_price = tranche
        .interest_share_price()
        .saturating_sub(slice.interest_checkpoint());
    let max_interest =
        math::share_price_to_usdc(interest_price, position.principal_amount, Rounding::Down)?;
    let max_principal = math::share_price_to_usdc(
        slice.redeemable_principal_share_price(),
        position.principal_amount,
        Rounding::Down,
    )?;
    Ok(Redeemable {
        interest: max_interest.saturating_sub(position.interest_redeemed),
        principal: max_principal.saturating_sub(position.principal_redeemed),
    })
}

/// Ownership registry for positions.
pub trait PositionRegistry {
    fn mint(
        &mut self,
        owner: ActorId,
        facility: FacilityId,
        tranche: TrancheKind,
        cycle: usize,
        principal_amount: Amount,
    ) -> PositionId;

    fn get(&self, id: PositionId) -> Option<&Position>;

    /// Records a redemption against an existing position.
    fn redeem(&mut self, id: PositionId, principal: Amount, interest: Amount) -> Result<(), LedgerError>;

    /// Lowers principal of a position whose tranche has not locked yet.
    fn withdraw_principal(&mut self, id: PositionId, amount: Amount) -> Result<(), LedgerError>;

    fn burn(&mut self, id: PositionId) -> Result<Position, LedgerError>;

    fn is_approved_or_owner(&self, id: PositionId, actor: ActorId) -> bool {
        self.get(id).is_some_and(|p| p.owner == actor)
    }
}

/// In-memory [`PositionRegistry`].
#[derive(Debug, Default, Clone)]
pub struct PositionBook {
    next_id: u64,
    positions: BTreeMap<PositionId, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn owned_by(&self, owner: ActorId) -> impl Iterator<Item = &Position> {
        self.positions.values().filter(move |p| p.owner == owner)
    }

    fn get_mut(&mut self, id: PositionId) -> Result<&mut Position, LedgerError> {
        self.positions
            .get_mut(&id)
            .ok_or(LedgerError::PositionNotFound(id))
    }
}

impl PositionRegistry for PositionBook {
    fn mint(
        &mut self,
        owner: ActorId,
        facility: FacilityId,
        tranche: TrancheKind,
        cycle: usize,
        principal_amount: Amount,
    ) -> PositionId {
        self.next_id += 1;
        let id = PositionId(self.next_id);
        self.positions.insert(
            id,
            Position {
                id,
                owner,
                facility,
                tranche,
                cycle,
                principal_amount,
                principal_redeemed: 0,
                interest_redeemed: 0,
            },
        );
        id
    }

    fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    fn redeem(&mut self, id: PositionId, principal: Amount, interest: Amount) -> Result<(), LedgerError> {
        let position = self.get_mut(id)?;
        let principal_redeemed = position
            .principal_redeemed
            .checked_add(principal)
            .ok_or(ArithmeticError::Overflow)?;
        let interest_redeemed = position
            .interest_redeemed
            .checked_add(interest)
            .ok_or(ArithmeticError::Overflow)?;
        if principal_redeemed > position.principal_amount {
            return Err(LedgerError::Consistency("principal redeemed exceeds principal"));
        }
        position.principal_redeemed = principal_redeemed;
        position.interest_redeemed = interest_redeemed;
        Ok(())
    }

    fn withdraw_principal(&mut self, id: PositionId, amount: Amount) -> Result<(), LedgerError> {
        let position = self.get_mut(id)?;
        if position.principal_amount < amount {
            return Err(LedgerError::InsufficientFunds {
                attempted: amount,
                available: position.principal_amount,
            });
        }
        position.principal_amount -= amount;
        Ok(())
    }

    fn burn(&mut self, id: PositionId) -> Result<Position, LedgerError> {
        self.positions
            .remove(&id)
            .ok_or(LedgerError::PositionNotFound(id))
    }
}
