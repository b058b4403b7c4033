//! Independent bets sharing one round outcome

use super::bet::Bet;
use crate::errors::ValidationError;
use crate::money::Money;

#[derive(Debug, Clone)]
pub struct BetSlots {
    slots: Vec<Option<Bet>>,
}

impl BetSlots {
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn entry(&self, slot: usize) -> Result<&Option<Bet>, ValidationError> {
        self.slots.get(slot).ok_or(ValidationError::UnknownSlot(slot))
    }

    pub fn get(&self, slot: usize) -> Result<Option<&Bet>, ValidationError> {
        Ok(self.entry(slot)?.as_ref())
    }

    pub fn ensure_free(&self, slot: usize) -> Result<(), ValidationError> {
        match self.entry(slot)? {
            Some(_) => Err(ValidationError::SlotOccupied(slot)),
            None => Ok(()),
        }
    }

    pub fn insert(&mut self, bet: Bet) -> Result<(), ValidationError> {
        self.ensure_free(bet.slot)?;
        let slot = bet.slot;
        self.slots[slot] = Some(bet);
        Ok(())
    }

    pub fn bet_mut(&mut self, slot: usize) -> Result<&mut Bet, ValidationError> {
        self.slots
            .get_mut(slot)
            .ok_or(ValidationError::UnknownSlot(slot))?
            .as_mut()
            .ok_or(ValidationError::NoBetInSlot(slot))
    }

    pub fn take(&mut self, slot: usize) -> Option<Bet> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    pub fn bets(&self) -> impl Iterator<Item = &Bet> {
        self.slots.iter().flatten()
    }

    pub fn bets_mut(&mut self) -> impl Iterator<Item = &mut Bet> {
        self.slots.iter_mut().flatten()
    }

    /// Stakes debited and not yet settled or refunded
    pub fn withheld(&self) -> Money {
        self.bets()
            .filter(|b| b.is_queued() || b.is_active())
            .map(|b| b.stake)
            .sum()
    }

    pub fn clear(&mut self) -> Vec<Bet> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}
