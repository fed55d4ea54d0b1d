//! Protocol Messages
//!
//! Wire format between host and client. Every message is a JSON object with
//! a `type` discriminator and camelCase fields; TCP frames carry one message
//! each and discovery datagrams carry a bare `discovery` message.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::state::{Side, StrongholdSlot};

/// Wire codec failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("payload is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Every message that crosses the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetMessage {
    /// Client played a card (client -> host).
    PlayCard(PlayCard),

    /// Client changed its selected hand slot (client -> host).
    SelectCard(SelectCard),

    /// Periodic absolute snapshot (host -> client).
    StateSync(StateSync),

    /// A unit or pump entered the field (host -> client).
    SpawnEntity(SpawnEntity),

    /// A stronghold took damage (host -> client).
    Damage(Damage),

    /// Match is starting; carries the client's opening hand (host -> client).
    MatchStart(MatchStart),

    /// Match result from the recipient's point of view (host -> client).
    MatchEnd(MatchEnd),

    /// Client is in the lobby and ready (client -> host).
    LobbyReady(LobbyReady),

    /// Latency probe.
    Ping(Ping),

    /// Echo of a ping's timestamp.
    Pong(Pong),

    /// UDP host advertisement.
    Discovery(Discovery),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayCard {
    pub card_id: String,
    /// 0 = left, 1 = right
    pub lane: i32,
    /// Slot the client believes the card is in
    pub hand_index: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectCard {
    pub hand_index: i32,
}

/// Snapshot in the recipient's perspective: `player` fields describe the
/// recipient, `enemy` fields the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSync {
    pub player_energy: f32,
    pub enemy_energy: f32,
    pub p_left_hp: f32,
    pub p_right_hp: f32,
    pub p_king_hp: f32,
    pub e_left_hp: f32,
    pub e_right_hp: f32,
    pub e_king_hp: f32,
    pub hand_card_ids: Vec<String>,
    pub selected_index: i32,
    pub deck_count: i32,
    pub player_unit_count: i32,
    pub enemy_unit_count: i32,
    pub is_game_over: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnEntity {
    /// "unit" or "pump"
    pub entity_type: String,
    /// "player" or "enemy", recipient perspective
    pub side: String,
    pub lane: i32,
    pub card_id: String,
    pub pos_x: f32,
    pub pos_y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Damage {
    /// `player_left` .. `enemy_king`, recipient perspective
    pub target_id: String,
    pub amount: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStart {
    pub hand_card_ids: Vec<String>,
    pub deck_count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEnd {
    pub did_win: bool,
    pub xp_gain: i32,
    pub gold_gain: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyReady {
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    /// Sender clock, milliseconds
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discovery {
    pub game_id: String,
    pub host_name: String,
    /// TCP game port
    pub port: u16,
}

// =============================================================================
// STRONGHOLD TARGET IDS
// =============================================================================

/// Wire id for a stronghold, e.g. `enemy_king`.
pub fn stronghold_target_id(side: Side, slot: StrongholdSlot) -> String {
    format!("{}_{}", side.as_str(), slot.as_str())
}

/// Parse a wire stronghold id.
pub fn parse_stronghold_target(id: &str) -> Option<(Side, StrongholdSlot)> {
    let (side, slot) = id.split_once('_')?;
    let side = Side::from_str(side)?;
    let slot = StrongholdSlot::ALL.into_iter().find(|s| s.as_str() == slot)?;
    Some((side, slot))
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl NetMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Serialize to UTF-8 bytes for a frame or datagram.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from UTF-8 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(bytes)?;
        Self::from_json(text)
    }

    /// Wire discriminator, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            NetMessage::PlayCard(_) => "play_card",
            NetMessage::SelectCard(_) => "select_card",
            NetMessage::StateSync(_) => "state_sync",
            NetMessage::SpawnEntity(_) => "spawn_entity",
            NetMessage::Damage(_) => "damage",
            NetMessage::MatchStart(_) => "match_start",
            NetMessage::MatchEnd(_) => "match_end",
            NetMessage::LobbyReady(_) => "lobby_ready",
            NetMessage::Ping(_) => "ping",
            NetMessage::Pong(_) => "pong",
            NetMessage::Discovery(_) => "discovery",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn every_message() -> Vec<NetMessage> {
        vec![
            NetMessage::PlayCard(PlayCard { card_id: "b_m1".into(), lane: 1, hand_index: 2 }),
            NetMessage::SelectCard(SelectCard { hand_index: 3 }),
            NetMessage::StateSync(StateSync {
                player_energy: 4.5,
                enemy_energy: 9.25,
                p_left_hp: 450.0,
                p_right_hp: 0.0,
                p_king_hp: 650.0,
                e_left_hp: 12.5,
                e_right_hp: 300.0,
                e_king_hp: 649.0,
                hand_card_ids: vec!["b_m1".into(), "b_r1".into(), "b_p1".into(), "b_s1".into()],
                selected_index: 1,
                deck_count: 4,
                player_unit_count: 2,
                enemy_unit_count: 0,
                is_game_over: false,
            }),
            NetMessage::SpawnEntity(SpawnEntity {
                entity_type: "pump".into(),
                side: "enemy".into(),
                lane: 0,
                card_id: "b_p1".into(),
                pos_x: -2.25,
                pos_y: 4.75,
            }),
            NetMessage::Damage(Damage { target_id: "player_king".into(), amount: 18.0 }),
            NetMessage::MatchStart(MatchStart {
                hand_card_ids: vec!["b_s1".into(), "u_m2".into()],
                deck_count: 6,
            }),
            NetMessage::MatchEnd(MatchEnd { did_win: true, xp_gain: 51, gold_gain: 70 }),
            NetMessage::LobbyReady(LobbyReady { player_name: "Ana".into() }),
            NetMessage::Ping(Ping { timestamp: 1_700_000_000_123 }),
            NetMessage::Pong(Pong { timestamp: 42 }),
            NetMessage::Discovery(Discovery {
                game_id: "GoldMine".into(),
                host_name: "den-pc".into(),
                port: 47778,
            }),
        ]
    }

    #[test]
    fn test_every_message_roundtrips() {
        for msg in every_message() {
            let bytes = msg.to_bytes().unwrap();
            let parsed = NetMessage::from_bytes(&bytes).unwrap();
            assert_eq!(parsed, msg, "{}", msg.type_name());
        }
    }

    #[test]
    fn test_type_tag_matches_type_name() {
        for msg in every_message() {
            let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
            assert_eq!(value["type"], msg.type_name());
        }
    }

    #[test]
    fn test_camel_case_fields() {
        let json = NetMessage::PlayCard(PlayCard { card_id: "b_m1".into(), lane: 0, hand_index: 0 })
            .to_json()
            .unwrap();
        assert!(json.contains("\"cardId\":\"b_m1\""));
        assert!(json.contains("\"handIndex\":0"));

        let sync = every_message().remove(2).to_json().unwrap();
        for key in ["pLeftHp", "eKingHp", "handCardIds", "isGameOver", "playerUnitCount"] {
            assert!(sync.contains(key), "missing {}", key);
        }
    }

    #[test]
    fn test_parse_external_payload() {
        let msg = NetMessage::from_json(r#"{"type":"play_card","cardId":"b_r1","lane":1,"handIndex":3}"#).unwrap();
        assert_eq!(
            msg,
            NetMessage::PlayCard(PlayCard { card_id: "b_r1".into(), lane: 1, hand_index: 3 })
        );
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        assert!(matches!(NetMessage::from_json("{\"type\":\"teleport\"}"), Err(ProtocolError::Json(_))));
        assert!(matches!(NetMessage::from_json("not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(NetMessage::from_bytes(&[0xff, 0xfe]), Err(ProtocolError::Utf8(_))));
    }

    #[test]
    fn test_stronghold_target_ids() {
        assert_eq!(stronghold_target_id(Side::Enemy, StrongholdSlot::King), "enemy_king");
        assert_eq!(
            parse_stronghold_target("player_left"),
            Some((Side::Player, StrongholdSlot::Left))
        );
        assert_eq!(parse_stronghold_target("player_queen"), None);
        assert_eq!(parse_stronghold_target("neutral_left"), None);
        for side in Side::BOTH {
            for slot in StrongholdSlot::ALL {
                assert_eq!(parse_stronghold_target(&stronghold_target_id(side, slot)), Some((side, slot)));
            }
        }
    }
}
