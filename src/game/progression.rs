//! Player Progression
//!
//! The controller only needs a level, an owned-card list and a way to grant
//! match rewards. Persistence lives behind the `Progression` trait; the crate
//! ships an in-memory profile used by the binary and the tests.

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::catalog::{find_card, BASIC_CARD_IDS};

/// Highest reachable level.
pub const MAX_LEVEL: u32 = 99;

/// XP needed to go from `level` to `level + 1`.
pub fn xp_for_next_level(level: u32) -> u32 {
    (120.0 * (level as f32).powf(1.22)).floor() as u32
}

/// Level reached with the given total XP.
pub fn level_from_xp(xp: u32) -> u32 {
    let mut level = 1;
    let mut remaining = xp;
    while level < MAX_LEVEL && remaining >= xp_for_next_level(level) {
        remaining -= xp_for_next_level(level);
        level += 1;
    }
    level
}

/// Rewards for finishing a match at the given level: `(xp, gold)`.
pub fn match_rewards(level: u32, won: bool) -> (u32, u32) {
    if won {
        (45 + 6 * level, 60 + 10 * level)
    } else {
        (18 + 3 * level, 0)
    }
}

/// Source of player level, collection and rewards.
pub trait Progression {
    fn current_level(&self) -> u32;

    fn gold(&self) -> u32;

    /// Ids of every card the player owns.
    fn owned_cards(&self) -> Vec<String>;

    /// Grant rewards for a finished match and return `(xp, gold)` gained.
    fn award_match(&mut self, won: bool) -> (u32, u32);
}

/// Shop failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShopError {
    #[error("unknown card: {0}")]
    UnknownCard(String),

    #[error("card {0} is already owned")]
    AlreadyOwned(String),

    #[error("card {card} unlocks at level {required}")]
    Locked { card: String, required: u32 },

    #[error("need {price} gold, have {available}")]
    InsufficientGold { price: u32, available: u32 },
}

/// Profile kept in memory for the lifetime of the process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InMemoryProfile {
    pub xp: u32,
    pub gold: u32,
    pub owned: BTreeSet<String>,
}

impl Default for InMemoryProfile {
    fn default() -> Self {
        Self {
            xp: 0,
            gold: 0,
            owned: BASIC_CARD_IDS.iter().map(|id| id.to_string()).collect(),
        }
    }
}

impl InMemoryProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile starting with the given XP, for tests and demos.
    pub fn with_xp(xp: u32) -> Self {
        Self { xp, ..Self::default() }
    }

    pub fn owns(&self, card_id: &str) -> bool {
        self.owned.contains(card_id)
    }

    /// Buy a card from the shop.
    pub fn buy_card(&mut self, card_id: &str) -> Result<(), ShopError> {
        let card = find_card(card_id).ok_or_else(|| ShopError::UnknownCard(card_id.to_string()))?;

        if self.owns(card_id) {
            return Err(ShopError::AlreadyOwned(card_id.to_string()));
        }
        let level = self.current_level();
        if card.unlock_level > level {
            return Err(ShopError::Locked {
                card: card_id.to_string(),
                required: card.unlock_level,
            });
        }
        if card.price_gold > self.gold {
            return Err(ShopError::InsufficientGold {
                price: card.price_gold,
                available: self.gold,
            });
        }

        self.gold -= card.price_gold;
        self.owned.insert(card_id.to_string());
        Ok(())
    }
}

impl Progression for InMemoryProfile {
    fn current_level(&self) -> u32 {
        level_from_xp(self.xp)
    }

    fn gold(&self) -> u32 {
        self.gold
    }

    fn owned_cards(&self) -> Vec<String> {
        self.owned.iter().cloned().collect()
    }

    fn award_match(&mut self, won: bool) -> (u32, u32) {
        let (xp, gold) = match_rewards(self.current_level(), won);
        self.xp = self.xp.saturating_add(xp);
        self.gold = self.gold.saturating_add(gold);
        (xp, gold)
    }
}
