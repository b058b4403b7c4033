//! Item upgrader: trade staked inventory items for a chance at a pricier one

use crate::errors::ValidationError;
use crate::games::cases::{CaseItem, Inventory, InventoryItem};
use crate::money::Money;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Ceiling on the win chance, in percent
pub const MAX_CHANCE: f64 = 95.0;

/// Target presets offered next to the free target picker
pub const TARGET_MULTIPLIERS: [f64; 5] = [1.5, 2.0, 5.0, 10.0, 20.0];

/// Win chance in percent for trading `staked` value into `target`
pub fn upgrade_chance(staked: Money, target: Money) -> f64 {
    if !staked.is_positive() {
        return 0.0;
    }
    if target <= staked {
        return MAX_CHANCE;
    }
    (staked.as_decimal() / target.as_decimal() * MAX_CHANCE).min(MAX_CHANCE)
}

/// Items a player may aim for, cheapest first
///
/// Without a preset the target must be worth more than 1.05x the stake. With a
/// preset `m` from [`TARGET_MULTIPLIERS`] the price must fall strictly inside
/// `(0.9, 1.2) * m * staked`.
pub fn eligible_targets<'a>(
    catalog: &'a [CaseItem],
    staked: Money,
    preset: Option<f64>,
) -> Result<Vec<&'a CaseItem>, ValidationError> {
    if let Some(multiplier) = preset {
        if !TARGET_MULTIPLIERS.contains(&multiplier) {
            return Err(ValidationError::UnknownTargetMultiplier(multiplier));
        }
    }

    let value = staked.as_decimal();
    let mut targets: Vec<&CaseItem> = catalog
        .iter()
        .filter(|item| {
            let price = item.price.as_decimal();
            match preset {
                Some(multiplier) => {
                    let aim = value * multiplier;
                    price > aim * 0.9 && price < aim * 1.2
                }
                None => price > value * 1.05,
            }
        })
        .collect();
    targets.sort_by_key(|item| item.price);
    Ok(targets)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeOutcome {
    pub chance: f64,
    pub roll: f64,
    pub won: bool,
    pub consumed: Vec<InventoryItem>,
    /// Instance id of the target when won
    pub awarded: Option<Uuid>,
}

/// Resolve an upgrade with a fixed roll `r ∈ [0, 100)`
///
/// The staked items leave the inventory before the roll. Nothing is touched
/// when any staked id is missing or repeated.
pub fn upgrade_with(
    inventory: &mut Inventory,
    staked: &[Uuid],
    target: &CaseItem,
    roll: f64,
) -> Result<UpgradeOutcome, ValidationError> {
    if staked.is_empty() {
        return Err(ValidationError::NoItemsStaked);
    }

    let mut seen = HashSet::new();
    for id in staked {
        if !seen.insert(*id) || !inventory.contains(*id) {
            return Err(ValidationError::ItemNotInInventory(*id));
        }
    }

    let consumed = staked
        .iter()
        .map(|id| inventory.remove(*id))
        .collect::<Result<Vec<_>, _>>()?;
    let value: Money = consumed.iter().map(|i| i.item.price).sum();

    let chance = upgrade_chance(value, target.price);
    let won = roll < chance;
    let awarded = won.then(|| inventory.add(target.clone()));

    tracing::debug!(
        staked_value = %value,
        target = %target.id,
        chance,
        roll,
        won,
        "Upgrade resolved"
    );

    Ok(UpgradeOutcome {
        chance,
        roll,
        won,
        consumed,
        awarded,
    })
}

pub fn upgrade<R: Rng + ?Sized>(
    inventory: &mut Inventory,
    staked: &[Uuid],
    target: &CaseItem,
    rng: &mut R,
) -> Result<UpgradeOutcome, ValidationError> {
    upgrade_with(inventory, staked, target, rng.gen::<f64>() * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::cases::starter_case;

    #[test]
    fn test_chance_curve() {
        let ten = Money::from_cents(1_000);
        assert_eq!(upgrade_chance(ten, Money::from_cents(500)), 95.0);
        assert_eq!(upgrade_chance(ten, ten), 95.0);
        assert!((upgrade_chance(ten, Money::from_cents(2_000)) - 47.5).abs() < 1e-9);
        assert_eq!(upgrade_chance(Money::ZERO, ten), 0.0);
    }

    #[test]
    fn test_target_filters() {
        let case = starter_case().unwrap();
        let staked = Money::from_cents(200);

        let free: Vec<&str> = eligible_targets(case.items(), staked, None)
            .unwrap()
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(free, vec!["m4a4-evil-daimyo", "awp-atheris", "usp-s-kill-confirmed", "karambit-doppler"]);

        // 2x of 2.00 aims at 4.00, window (3.60, 4.80)
        assert!(eligible_targets(case.items(), staked, Some(2.0)).unwrap().is_empty());
        // 5x of 1.30 aims at 6.50
        let preset = eligible_targets(case.items(), Money::from_cents(130), Some(5.0)).unwrap();
        assert_eq!(preset.len(), 1);
        assert_eq!(preset[0].id, "awp-atheris");
    }

    #[test]
    fn test_preset_must_be_offered() {
        let case = starter_case().unwrap();
        assert_eq!(
            eligible_targets(case.items(), Money::from_cents(200), Some(3.25)).unwrap_err(),
            ValidationError::UnknownTargetMultiplier(3.25)
        );
        for multiplier in TARGET_MULTIPLIERS {
            assert!(eligible_targets(case.items(), Money::from_cents(200), Some(multiplier)).is_ok());
        }
    }

    #[test]
    fn test_win_adds_target_after_removing_stake() {
        let case = starter_case().unwrap();
        let mut inventory = Inventory::new();
        let a = inventory.add(case.items()[2].clone());
        let b = inventory.add(case.items()[3].clone());

        let target = &case.items()[4];
        let outcome = upgrade_with(&mut inventory, &[a, b], target, 10.0).unwrap();
        // 4.20 staked into 6.50
        assert!((outcome.chance - 4.20 / 6.50 * 95.0).abs() < 1e-9);
        assert!(outcome.won);
        assert_eq!(outcome.consumed.len(), 2);
        assert_eq!(inventory.len(), 1);
        assert!(inventory.contains(outcome.awarded.unwrap()));
    }

    #[test]
    fn test_loss_consumes_stake() {
        let case = starter_case().unwrap();
        let mut inventory = Inventory::new();
        let a = inventory.add(case.items()[0].clone());

        let outcome = upgrade_with(&mut inventory, &[a], &case.items()[6], 50.0).unwrap();
        assert!(!outcome.won);
        assert!(outcome.awarded.is_none());
        assert!(inventory.is_empty());
    }

    #[test]
    fn test_invalid_stake_leaves_inventory_untouched() {
        let case = starter_case().unwrap();
        let mut inventory = Inventory::new();
        let a = inventory.add(case.items()[0].clone());

        assert_eq!(
            upgrade_with(&mut inventory, &[], &case.items()[6], 0.0).unwrap_err(),
            ValidationError::NoItemsStaked
        );
        let missing = Uuid::new_v4();
        assert!(upgrade_with(&mut inventory, &[a, missing], &case.items()[6], 0.0).is_err());
        assert!(upgrade_with(&mut inventory, &[a, a], &case.items()[6], 0.0).is_err());
        assert_eq!(inventory.len(), 1);
    }
}
