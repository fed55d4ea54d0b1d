//! Match Events
//!
//! Events generated during simulation. The controller accumulates them and
//! the caller drains them once per frame; the presentation layer and the
//! network bridge are the two consumers.

use serde::{Serialize, Deserialize};
use crate::core::vec2::Vec2;
use crate::game::state::{EntityId, MatchOutcome, Side, StrongholdSlot};

/// What a card spawned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnKind {
    Unit,
    Pump,
}

impl SpawnKind {
    /// Wire name used in `spawn_entity`.
    pub fn as_str(self) -> &'static str {
        match self {
            SpawnKind::Unit => "unit",
            SpawnKind::Pump => "pump",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unit" => Some(SpawnKind::Unit),
            "pump" => Some(SpawnKind::Pump),
            _ => None,
        }
    }
}

/// Match event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MatchEventData {
    /// Strongholds placed and hands dealt
    MatchStarted,

    /// A card play put a unit or pump on the field
    EntitySpawned {
        entity_id: EntityId,
        side: Side,
        kind: SpawnKind,
        lane: i32,
        card_id: String,
        position: Vec2,
    },

    /// An entity's hit points reached zero
    EntityDied {
        entity_id: EntityId,
        side: Side,
    },

    /// A tower or king took damage
    StrongholdDamaged {
        side: Side,
        slot: StrongholdSlot,
        amount: f32,
        hp_after: f32,
    },

    /// Game over, rewards already granted
    MatchEnded {
        outcome: MatchOutcome,
        xp_gain: u32,
        gold_gain: u32,
    },

    /// Client asked the host to play a card
    PlayCardRequested {
        card_id: String,
        lane: i32,
        hand_index: usize,
    },

    /// Client changed its selected hand slot
    CardSelected {
        hand_index: usize,
    },
}

/// A match event stamped with match time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    /// Seconds since match start
    pub time: f32,

    /// Event data
    pub data: MatchEventData,
}

impl MatchEvent {
    /// Create a new event.
    pub fn new(time: f32, data: MatchEventData) -> Self {
        Self { time, data }
    }

    pub fn match_started(time: f32) -> Self {
        Self::new(time, MatchEventData::MatchStarted)
    }

    /// Create entity spawned event.
    pub fn entity_spawned(
        time: f32,
        entity_id: EntityId,
        side: Side,
        kind: SpawnKind,
        lane: i32,
        card_id: &str,
        position: Vec2,
    ) -> Self {
        Self::new(
            time,
            MatchEventData::EntitySpawned {
                entity_id,
                side,
                kind,
                lane,
                card_id: card_id.to_string(),
                position,
            },
        )
    }

    pub fn entity_died(time: f32, entity_id: EntityId, side: Side) -> Self {
        Self::new(time, MatchEventData::EntityDied { entity_id, side })
    }

    /// Create stronghold damaged event.
    pub fn stronghold_damaged(
        time: f32,
        side: Side,
        slot: StrongholdSlot,
        amount: f32,
        hp_after: f32,
    ) -> Self {
        Self::new(
            time,
            MatchEventData::StrongholdDamaged {
                side,
                slot,
                amount,
                hp_after,
            },
        )
    }

    /// Create match ended event.
    pub fn match_ended(time: f32, outcome: MatchOutcome, xp_gain: u32, gold_gain: u32) -> Self {
        Self::new(
            time,
            MatchEventData::MatchEnded {
                outcome,
                xp_gain,
                gold_gain,
            },
        )
    }

    pub fn play_card_requested(time: f32, card_id: &str, lane: i32, hand_index: usize) -> Self {
        Self::new(
            time,
            MatchEventData::PlayCardRequested {
                card_id: card_id.to_string(),
                lane,
                hand_index,
            },
        )
    }

    pub fn card_selected(time: f32, hand_index: usize) -> Self {
        Self::new(time, MatchEventData::CardSelected { hand_index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_kind_names() {
        assert_eq!(SpawnKind::Unit.as_str(), "unit");
        assert_eq!(SpawnKind::from_str("pump"), Some(SpawnKind::Pump));
        assert_eq!(SpawnKind::from_str("tower"), None);
    }

    #[test]
    fn test_constructors() {
        let event = MatchEvent::play_card_requested(1.5, "b_m1", 0, 2);
        assert_eq!(event.time, 1.5);
        assert_eq!(
            event.data,
            MatchEventData::PlayCardRequested {
                card_id: "b_m1".to_string(),
                lane: 0,
                hand_index: 2,
            }
        );

        let ended = MatchEvent::match_ended(30.0, MatchOutcome::Draw, 21, 0);
        assert!(matches!(
            ended.data,
            MatchEventData::MatchEnded { outcome: MatchOutcome::Draw, .. }
        ));
    }
}
