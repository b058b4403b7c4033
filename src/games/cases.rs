//! Case opening: weighted winners, cosmetic reels and the item inventory

use crate::errors::{RoundFault, ValidationError};
use crate::games::weighted::WeightedTable;
use crate::money::Money;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entries on a cosmetic reel
pub const REEL_LENGTH: usize = 100;

/// Reel position the pointer stops on
pub const REEL_WINNER_INDEX: usize = 90;

const ODDS_TOTAL: f64 = 100.0;
const ODDS_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rarity {
    Consumer,
    Industrial,
    #[serde(rename = "Mil-Spec")]
    MilSpec,
    Restricted,
    Classified,
    Covert,
    Contraband,
    Extraordinary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseItem {
    pub id: String,
    pub weapon: String,
    pub skin: String,
    pub rarity: Rarity,
    pub price: Money,
    /// Percentage chance of being drawn from its case
    pub odds: f64,
}

impl CaseItem {
    pub fn new(id: &str, weapon: &str, skin: &str, rarity: Rarity, price: Money, odds: f64) -> Self {
        Self {
            id: id.to_string(),
            weapon: weapon.to_string(),
            skin: skin.to_string(),
            rarity,
            price,
            odds,
        }
    }
}

/// A purchasable case with a validated odds table
#[derive(Debug, Clone)]
pub struct Case {
    id: String,
    name: String,
    price: Money,
    items: Vec<CaseItem>,
    odds: WeightedTable<usize>,
    reel_pool: WeightedTable<usize>,
}

impl Case {
    pub fn new(id: &str, name: &str, price: Money, items: Vec<CaseItem>) -> Result<Self, RoundFault> {
        let odds = WeightedTable::new(items.iter().enumerate().map(|(i, item)| (i, item.odds)).collect())?;
        if (odds.total() - ODDS_TOTAL).abs() > ODDS_TOLERANCE {
            return Err(RoundFault::InvalidWeights(format!(
                "case {} odds sum to {}",
                id,
                odds.total()
            )));
        }

        // whole tickets per item, as the reel pool is built
        let reel_pool = WeightedTable::new(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| (i, (item.odds * 100.0).round()))
                .collect(),
        )?;

        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            price,
            items,
            odds,
            reel_pool,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn items(&self) -> &[CaseItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&CaseItem> {
        self.items.get(index)
    }

    /// Winner index for `r ∈ [0, 100)`
    pub fn pick_winner_with(&self, r: f64) -> usize {
        self.odds.select_index(r)
    }

    pub fn pick_winner<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.pick_winner_with(rng.gen::<f64>() * ODDS_TOTAL)
    }

    /// One independent winner per unit opened
    pub fn open_batch<R: Rng + ?Sized>(&self, count: u32, rng: &mut R) -> Result<Vec<usize>, ValidationError> {
        if count == 0 {
            return Err(ValidationError::EmptyBatch);
        }
        Ok((0..count).map(|_| self.pick_winner(rng)).collect())
    }

    /// Animation strip with the drawn winner at [`REEL_WINNER_INDEX`]
    pub fn cosmetic_reel<R: Rng + ?Sized>(&self, winner: usize, rng: &mut R) -> Vec<usize> {
        (0..REEL_LENGTH)
            .map(|i| {
                if i == REEL_WINNER_INDEX {
                    winner
                } else {
                    *self.reel_pool.sample(rng)
                }
            })
            .collect()
    }

    /// Expected item value of one opening divided by the case price
    pub fn expected_return(&self) -> f64 {
        if !self.price.is_positive() {
            return 0.0;
        }
        let value: f64 = self
            .items
            .iter()
            .map(|item| item.price.as_decimal() * item.odds / ODDS_TOTAL)
            .sum();
        value / self.price.as_decimal()
    }
}

/// Ready-made case used by the simulator and the demo binary
pub fn starter_case() -> Result<Case, RoundFault> {
    let items = vec![
        CaseItem::new("p250-sand-dune", "P250", "Sand Dune", Rarity::MilSpec, Money::from_cents(8), 30.0),
        CaseItem::new("mp9-storm", "MP9", "Storm", Rarity::MilSpec, Money::from_cents(12), 25.0),
        CaseItem::new("ak47-elite-build", "AK-47", "Elite Build", Rarity::Restricted, Money::from_cents(180), 20.0),
        CaseItem::new("m4a4-evil-daimyo", "M4A4", "Evil Daimyo", Rarity::Restricted, Money::from_cents(240), 12.0),
        CaseItem::new("awp-atheris", "AWP", "Atheris", Rarity::Classified, Money::from_cents(650), 8.0),
        CaseItem::new("usp-s-kill-confirmed", "USP-S", "Kill Confirmed", Rarity::Covert, Money::from_cents(2_800), 4.0),
        CaseItem::new("karambit-doppler", "Karambit", "Doppler", Rarity::Extraordinary, Money::from_cents(15_900), 1.0),
    ];
    Case::new("starter", "Starter Case", Money::from_cents(500), items)
}

/// An owned copy of an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub instance_id: Uuid,
    pub item: CaseItem,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    items: Vec<InventoryItem>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: CaseItem) -> Uuid {
        let instance_id = Uuid::new_v4();
        self.items.push(InventoryItem {
            instance_id,
            item,
            acquired_at: Utc::now(),
        });
        instance_id
    }

    pub fn get(&self, instance_id: Uuid) -> Option<&InventoryItem> {
        self.items.iter().find(|i| i.instance_id == instance_id)
    }

    pub fn contains(&self, instance_id: Uuid) -> bool {
        self.get(instance_id).is_some()
    }

    pub fn remove(&mut self, instance_id: Uuid) -> Result<InventoryItem, ValidationError> {
        let position = self
            .items
            .iter()
            .position(|i| i.instance_id == instance_id)
            .ok_or(ValidationError::ItemNotInInventory(instance_id))?;
        Ok(self.items.remove(position))
    }

    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_value(&self) -> Money {
        self.items.iter().map(|i| i.item.price).sum()
    }
}
