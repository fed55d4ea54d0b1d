//! Match and LAN Configuration
//!
//! Plain structs with defaults tuned for a 10x20 arena, overridable from the
//! environment.

use std::time::Duration;

/// Tuning knobs for one match.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchConfig {
    /// Energy each side starts with
    pub start_energy: f32,
    /// Energy cap per side
    pub max_energy: f32,
    /// Base regeneration per second (pumps add on top)
    pub energy_regen: f32,
    /// Cards held in hand once dealt
    pub hand_size: usize,
    /// Decks are padded with the basic set until they hold this many cards
    pub min_deck_size: usize,
    /// Shortest delay between AI plays (seconds)
    pub ai_interval_min: f32,
    /// Longest delay between AI plays (seconds)
    pub ai_interval_max: f32,
    /// Chance the AI switches to a pump when it has none alive
    pub ai_pump_bias: f32,
    /// Chance the AI pushes the weaker enemy tower's lane
    pub ai_lane_bias: f32,
    /// Seconds before dead units and pumps are removed
    pub despawn_delay: f32,
    /// Base RNG seed, mixed with the match id
    pub seed: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            start_energy: 5.0,
            max_energy: 10.0,
            energy_regen: 1.0,
            hand_size: 4,
            min_deck_size: 8,
            ai_interval_min: 1.35,
            ai_interval_max: 2.10,
            ai_pump_bias: 0.75,
            ai_lane_bias: 0.62,
            despawn_delay: 0.2,
            seed: 0,
        }
    }
}

impl MatchConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            seed: env_parse("GOLDMINE_SEED").unwrap_or(defaults.seed),
            start_energy: env_parse::<f32>("GOLDMINE_START_ENERGY")
                .map(|e| e.clamp(0.0, defaults.max_energy))
                .unwrap_or(defaults.start_energy),
            ai_pump_bias: env_parse::<f32>("GOLDMINE_AI_PUMP_BIAS")
                .map(|p| p.clamp(0.0, 1.0))
                .unwrap_or(defaults.ai_pump_bias),
            ..defaults
        }
    }
}

/// LAN transport settings.
#[derive(Clone, Debug, PartialEq)]
pub struct LanConfig {
    /// UDP port for host discovery broadcasts
    pub discovery_port: u16,
    /// TCP port the host listens on
    pub game_port: u16,
    /// Address the host binds its listener to
    pub bind_addr: String,
    /// Address discovery datagrams are sent to
    pub broadcast_addr: String,
    /// Game id carried in discovery packets; others are ignored
    pub game_id: String,
    /// Name advertised in discovery and sent in lobby_ready
    pub host_name: String,
    /// Delay between discovery broadcasts while in lobby
    pub broadcast_interval: Duration,
    /// Host state_sync cadence (seconds of simulated time)
    pub sync_interval: f32,
    /// Largest accepted frame payload in bytes
    pub max_frame_len: usize,
    /// Client connect timeout
    pub connect_timeout: Duration,
    /// Outbound channel capacity
    pub outbound_capacity: usize,
}

impl Default for LanConfig {
    fn default() -> Self {
        Self {
            discovery_port: 47777,
            game_port: 47778,
            bind_addr: "0.0.0.0".to_string(),
            broadcast_addr: "255.255.255.255".to_string(),
            game_id: "GoldMine".to_string(),
            host_name: "Host".to_string(),
            broadcast_interval: Duration::from_secs(1),
            sync_interval: 0.1,
            max_frame_len: 65536,
            connect_timeout: Duration::from_secs(5),
            outbound_capacity: 256,
        }
    }
}

impl LanConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            game_port: env_parse("GOLDMINE_GAME_PORT").unwrap_or(defaults.game_port),
            discovery_port: env_parse("GOLDMINE_DISCOVERY_PORT")
                .unwrap_or(defaults.discovery_port),
            host_name: std::env::var("GOLDMINE_HOST_NAME")
                .ok()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.host_name.clone()),
            ..defaults
        }
    }

    /// Loopback config on ephemeral ports, for tests and local demos.
    pub fn loopback() -> Self {
        Self {
            discovery_port: 0,
            game_port: 0,
            bind_addr: "127.0.0.1".to_string(),
            broadcast_addr: "127.0.0.1".to_string(),
            ..Self::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_defaults() {
        let config = MatchConfig::default();
        assert_eq!(config.start_energy, 5.0);
        assert_eq!(config.max_energy, 10.0);
        assert_eq!(config.hand_size, 4);
        assert_eq!(config.min_deck_size, 8);
        assert!(config.ai_interval_min < config.ai_interval_max);
    }

    #[test]
    fn test_lan_defaults() {
        let config = LanConfig::default();
        assert_eq!(config.discovery_port, 47777);
        assert_eq!(config.game_port, 47778);
        assert_eq!(config.game_id, "GoldMine");
        assert_eq!(config.max_frame_len, 65536);
        assert_eq!(config.broadcast_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_loopback_uses_ephemeral_ports() {
        let config = LanConfig::loopback();
        assert_eq!(config.game_port, 0);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.game_id, "GoldMine");
    }
}
