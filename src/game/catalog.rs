//! Card Catalog
//!
//! Every card the game knows about. Stats are derived from cost with a small
//! set of formulas so balance changes touch one place.

use std::sync::OnceLock;
use serde::{Serialize, Deserialize};

/// How a unit delivers damage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    /// Direct damage on contact
    Melee,
    /// Fires a projectile
    Ranged,
}

/// Stats for a card that spawns a combat unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitBlueprint {
    pub attack: AttackKind,
    pub hp: f32,
    pub speed: f32,
    pub damage: f32,
    pub attacks_per_second: f32,
    pub attack_range: f32,
}

/// Stats for a card that spawns an energy pump.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PumpBlueprint {
    pub hp: f32,
    pub energy_per_second: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CardKind {
    Unit(UnitBlueprint),
    Pump(PumpBlueprint),
}

/// Immutable card definition owned by the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardDefinition {
    pub id: String,
    pub name: String,
    /// Energy cost, 1..=10
    pub cost: u8,
    /// Shop price; basic cards are free
    pub price_gold: u32,
    /// Player level at which the card can be bought
    pub unlock_level: u32,
    pub kind: CardKind,
}

impl CardDefinition {
    #[inline]
    pub fn is_pump(&self) -> bool {
        matches!(self.kind, CardKind::Pump(_))
    }

    #[inline]
    pub fn is_basic(&self) -> bool {
        self.unlock_level <= 1
    }

    /// Unit stats, if this card spawns a unit.
    pub fn unit(&self) -> Option<&UnitBlueprint> {
        match &self.kind {
            CardKind::Unit(unit) => Some(unit),
            CardKind::Pump(_) => None,
        }
    }

    /// Pump stats, if this card spawns a pump.
    pub fn pump(&self) -> Option<&PumpBlueprint> {
        match &self.kind {
            CardKind::Pump(pump) => Some(pump),
            CardKind::Unit(_) => None,
        }
    }

    /// Hit points of whatever the card spawns.
    pub fn hp(&self) -> f32 {
        match &self.kind {
            CardKind::Unit(unit) => unit.hp,
            CardKind::Pump(pump) => pump.hp,
        }
    }
}

// =============================================================================
// FORMULAS
// =============================================================================

fn melee(cost: u8) -> UnitBlueprint {
    let c = cost as f32;
    UnitBlueprint {
        attack: AttackKind::Melee,
        hp: 60.0 + 55.0 * c,
        speed: 1.6 - 0.08 * c,
        damage: 8.0 + 4.0 * c,
        attacks_per_second: 1.0,
        attack_range: 0.8,
    }
}

fn ranged(cost: u8) -> UnitBlueprint {
    let c = cost as f32;
    UnitBlueprint {
        attack: AttackKind::Ranged,
        hp: 35.0 + 30.0 * c,
        speed: 1.4 - 0.06 * c,
        damage: 6.0 + 3.5 * c,
        attacks_per_second: 0.8,
        attack_range: 3.2,
    }
}

fn pump(cost: u8) -> PumpBlueprint {
    let c = cost as f32;
    PumpBlueprint {
        hp: 120.0 + 40.0 * c,
        energy_per_second: 0.25 * c,
    }
}

/// Shop price for a card of the given tier and cost.
pub fn price_for(tier: u32, cost: u8) -> u32 {
    if tier <= 1 {
        0
    } else {
        40 * tier + 10 * cost as u32
    }
}

fn card(id: &str, name: &str, cost: u8, tier: u32, kind: CardKind) -> CardDefinition {
    CardDefinition {
        id: id.to_string(),
        name: name.to_string(),
        cost: cost.clamp(1, 10),
        price_gold: price_for(tier, cost),
        unlock_level: tier.max(1),
        kind,
    }
}

/// Ids of the starter cards every player owns.
pub const BASIC_CARD_IDS: [&str; 4] = ["b_m1", "b_r1", "b_p1", "b_s1"];

/// Build the full catalog: basic cards first, then unlockables by tier.
pub fn build_catalog() -> Vec<CardDefinition> {
    vec![
        card("b_m1", "Miner", 3, 1, CardKind::Unit(melee(3))),
        card("b_r1", "Slinger", 3, 1, CardKind::Unit(ranged(3))),
        card("b_p1", "Gold Pump", 2, 1, CardKind::Pump(pump(2))),
        card("b_s1", "Scout", 1, 1, CardKind::Unit(melee(1))),
        card("u_m2", "Brute", 5, 2, CardKind::Unit(melee(5))),
        card("u_r2", "Crossbow", 4, 3, CardKind::Unit(ranged(4))),
        card("u_p2", "Deep Pump", 4, 4, CardKind::Pump(pump(4))),
        card("u_m3", "Champion", 7, 5, CardKind::Unit(melee(7))),
        card("u_r3", "Cannoneer", 6, 6, CardKind::Unit(ranged(6))),
        card("u_m4", "Golem", 9, 8, CardKind::Unit(melee(9))),
    ]
}

fn catalog() -> &'static [CardDefinition] {
    static CATALOG: OnceLock<Vec<CardDefinition>> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

/// All cards, in catalog order.
pub fn all_cards() -> &'static [CardDefinition] {
    catalog()
}

/// Look up a card by id.
pub fn find_card(id: &str) -> Option<&'static CardDefinition> {
    catalog().iter().find(|d| d.id == id)
}

/// The starter set, in catalog order.
pub fn basic_cards() -> Vec<&'static CardDefinition> {
    catalog().iter().filter(|d| d.is_basic()).collect()
}

/// Cards a player of the given level may buy or field.
pub fn cards_available_at_level(level: u32) -> Vec<&'static CardDefinition> {
    catalog().iter().filter(|d| d.unlock_level <= level).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let miner = find_card("b_m1").unwrap();
        assert_eq!(miner.cost, 3);
        assert!(!miner.is_pump());
        assert!(find_card("nope").is_none());
    }

    #[test]
    fn test_basic_set() {
        let ids: Vec<&str> = basic_cards().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, BASIC_CARD_IDS.to_vec());
        assert!(basic_cards().iter().all(|c| c.price_gold == 0));
    }

    #[test]
    fn test_formulas() {
        let miner = find_card("b_m1").unwrap().unit().unwrap();
        assert_eq!(miner.hp, 225.0);
        assert_eq!(miner.damage, 20.0);
        assert_eq!(miner.attack, AttackKind::Melee);

        let slinger = find_card("b_r1").unwrap().unit().unwrap();
        assert_eq!(slinger.hp, 125.0);
        assert_eq!(slinger.damage, 16.5);
        assert_eq!(slinger.attack_range, 3.2);

        let pump = find_card("b_p1").unwrap().pump().unwrap();
        assert_eq!(pump.hp, 200.0);
        assert_eq!(pump.energy_per_second, 0.5);
    }

    #[test]
    fn test_prices_and_unlocks() {
        let brute = find_card("u_m2").unwrap();
        assert_eq!(brute.unlock_level, 2);
        assert_eq!(brute.price_gold, 40 * 2 + 10 * 5);

        assert_eq!(cards_available_at_level(1).len(), 4);
        assert_eq!(cards_available_at_level(4).len(), 7);
        assert_eq!(cards_available_at_level(99).len(), all_cards().len());
    }

    #[test]
    fn test_costs_in_range() {
        for card in all_cards() {
            assert!((1..=10).contains(&card.cost), "{} out of range", card.id);
            if let Some(unit) = card.unit() {
                assert!(unit.speed > 0.0);
            }
        }
    }
}
