//! Match-Network Bridge
//!
//! Glue between the match controller and the wire. Inbound messages become
//! controller calls; controller events become outbound messages. Everything
//! the host sends is flipped into the client's perspective: the host's enemy
//! party is the client's player party and y coordinates are mirrored.
//!
//! The handlers are plain functions over a controller and return the
//! messages to send, so both halves can be driven without sockets.
//! [`MatchBridge::step`] wires them to a [`LanManager`].

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::config::LanConfig;
use crate::core::vec2::Vec2;
use crate::game::controller::{MatchController, MatchMode, SyncUpdate};
use crate::game::events::{MatchEvent, MatchEventData, SpawnKind};
use crate::game::progression::match_rewards;
use crate::game::state::{Side, StrongholdSlot};
use crate::network::lan::{LanEvent, LanManager};
use crate::network::protocol::{
    parse_stronghold_target, stronghold_target_id, Damage, LobbyReady, MatchEnd, MatchStart,
    NetMessage, Ping, PlayCard, Pong, SelectCard, SpawnEntity, StateSync,
};

/// Milliseconds since the Unix epoch, for ping timestamps.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Which end of the link this bridge serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeRole {
    Host,
    Client,
}

/// Per-session bridge state.
#[derive(Debug)]
pub struct MatchBridge {
    role: BridgeRole,
    sync_interval: f32,
    sync_timer: f32,
    remote_player_name: Option<String>,
    last_rtt_ms: Option<u64>,
    lost_peer: Option<String>,
}

impl MatchBridge {
    pub fn host(config: &LanConfig) -> Self {
        Self::new(BridgeRole::Host, config.sync_interval)
    }

    pub fn client(config: &LanConfig) -> Self {
        Self::new(BridgeRole::Client, config.sync_interval)
    }

    fn new(role: BridgeRole, sync_interval: f32) -> Self {
        Self {
            role,
            sync_interval,
            sync_timer: 0.0,
            remote_player_name: None,
            last_rtt_ms: None,
            lost_peer: None,
        }
    }

    pub fn role(&self) -> BridgeRole {
        self.role
    }

    /// Name from the client's `lobby_ready`.
    pub fn remote_player_name(&self) -> Option<&str> {
        self.remote_player_name.as_deref()
    }

    /// Last measured round trip.
    pub fn last_rtt_ms(&self) -> Option<u64> {
        self.last_rtt_ms
    }

    /// Reason for the most recent lost or failed connection, once.
    pub fn take_disconnect(&mut self) -> Option<String> {
        self.lost_peer.take()
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Apply one inbound message. Returns any direct replies.
    pub fn handle_message(&mut self, mc: &mut MatchController, msg: NetMessage, now_ms: u64) -> Vec<NetMessage> {
        match (self.role, msg) {
            (_, NetMessage::Ping(ping)) => {
                vec![NetMessage::Pong(Pong { timestamp: ping.timestamp })]
            }
            (_, NetMessage::Pong(pong)) => {
                let rtt = now_ms.saturating_sub(pong.timestamp);
                self.last_rtt_ms = Some(rtt);
                debug!(rtt_ms = rtt, "Ping");
                Vec::new()
            }
            (BridgeRole::Host, msg) => {
                self.handle_host_message(mc, msg);
                Vec::new()
            }
            (BridgeRole::Client, msg) => {
                self.handle_client_message(mc, msg);
                Vec::new()
            }
        }
    }

    /// Host: the remote peer drives the enemy party.
    fn handle_host_message(&mut self, mc: &mut MatchController, msg: NetMessage) {
        match msg {
            NetMessage::PlayCard(play) => {
                // Negative indices can never resolve
                let hand_index = usize::try_from(play.hand_index).unwrap_or(usize::MAX);
                mc.play_remote_card(&play.card_id, play.lane, hand_index);
            }
            NetMessage::SelectCard(select) => {
                mc.select_remote_card(usize::try_from(select.hand_index).unwrap_or(0));
            }
            NetMessage::LobbyReady(ready) => {
                info!(player = %ready.player_name, "Remote player ready");
                self.remote_player_name = Some(ready.player_name);
            }
            other => debug!(kind = other.type_name(), "Host ignoring message"),
        }
    }

    /// Client: the host is authoritative.
    fn handle_client_message(&mut self, mc: &mut MatchController, msg: NetMessage) {
        match msg {
            NetMessage::MatchStart(start) => {
                mc.apply_match_start(&start.hand_card_ids, count(start.deck_count));
                self.sync_timer = 0.0;
            }
            NetMessage::StateSync(sync) => {
                mc.apply_state_sync(&sync_update(&sync));
            }
            NetMessage::SpawnEntity(spawn) => {
                let (Some(kind), Some(side)) = (
                    SpawnKind::from_str(&spawn.entity_type),
                    Side::from_str(&spawn.side),
                ) else {
                    debug!(kind = %spawn.entity_type, side = %spawn.side, "Dropping malformed spawn");
                    return;
                };
                let position = Vec2::new(spawn.pos_x, spawn.pos_y);
                mc.apply_remote_spawn(kind, side, spawn.lane, &spawn.card_id, position);
            }
            NetMessage::Damage(damage) => match parse_stronghold_target(&damage.target_id) {
                Some((side, slot)) => {
                    mc.apply_remote_damage(side, slot, damage.amount);
                }
                None => debug!(target = %damage.target_id, "Dropping damage for unknown target"),
            },
            NetMessage::MatchEnd(end) => {
                if let Some((xp, gold)) = mc.finish_remote_match(end.did_win) {
                    if (xp, gold) != (count(end.xp_gain) as u32, count(end.gold_gain) as u32) {
                        debug!(
                            local_xp = xp,
                            local_gold = gold,
                            host_xp = end.xp_gain,
                            host_gold = end.gold_gain,
                            "Host reward estimate differs"
                        );
                    }
                }
            }
            other => debug!(kind = other.type_name(), "Client ignoring message"),
        }
    }

    /// Connection-level events. A lost peer ends the match.
    pub fn handle_event(&mut self, mc: &mut MatchController, event: &LanEvent) {
        match event {
            LanEvent::PeerConnected { addr } => info!(%addr, "Peer joined"),
            LanEvent::Disconnected { reason } => {
                warn!(%reason, "Peer lost, aborting match");
                mc.abort_match();
                self.sync_timer = 0.0;
                self.remote_player_name = None;
                self.lost_peer = Some(reason.clone());
            }
            LanEvent::HostFound(_) => {}
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Host: start the match and build the client's `match_start`.
    pub fn start_host_match(&mut self, mc: &mut MatchController) -> Option<NetMessage> {
        if self.role != BridgeRole::Host {
            return None;
        }
        mc.start_lan_host_match();
        self.sync_timer = 0.0;

        let party = mc.state()?.party(Side::Enemy);
        Some(NetMessage::MatchStart(MatchStart {
            hand_card_ids: party.hand_card_ids(),
            deck_count: party.deck_count() as i32,
        }))
    }

    /// Translate drained events and run the sync cadence.
    pub fn outbound(&mut self, mc: &MatchController, events: &[MatchEvent], dt: f32) -> Vec<NetMessage> {
        let mut out: Vec<NetMessage> = events
            .iter()
            .filter_map(|event| match self.role {
                BridgeRole::Host => host_message_for(mc, event),
                BridgeRole::Client => client_message_for(event),
            })
            .collect();

        if self.role == BridgeRole::Host && mc.mode() == MatchMode::LanHost {
            let ended = out.iter().any(|m| matches!(m, NetMessage::MatchEnd(_)));
            self.sync_timer += dt;
            if ended || self.sync_timer >= self.sync_interval {
                self.sync_timer = 0.0;
                if let Some(sync) = state_sync(mc) {
                    // Final values land before the result
                    let at = out
                        .iter()
                        .position(|m| matches!(m, NetMessage::MatchEnd(_)))
                        .unwrap_or(out.len());
                    out.insert(at, NetMessage::StateSync(sync));
                }
            }
        }

        out
    }

    /// One frame: apply inbound traffic, advance the match, send what
    /// changed. Returns the match events for the presentation layer.
    pub fn step(&mut self, lan: &mut LanManager, mc: &mut MatchController, dt: f32) -> Vec<MatchEvent> {
        let inbound = lan.poll();
        for event in &inbound.events {
            self.handle_event(mc, event);
            if matches!(event, LanEvent::Disconnected { .. }) {
                lan.clear_remote_player_name();
            }
        }

        let now = unix_millis();
        let mut replies = Vec::new();
        for msg in inbound.messages {
            if self.role == BridgeRole::Host {
                if let NetMessage::LobbyReady(ready) = &msg {
                    lan.set_remote_player_name(ready.player_name.clone());
                }
            }
            replies.extend(self.handle_message(mc, msg, now));
        }

        mc.update(dt);
        let events = mc.take_events();
        replies.extend(self.outbound(mc, &events, dt));

        for msg in &replies {
            if let Err(e) = lan.send(msg) {
                debug!(kind = msg.type_name(), error = %e, "Send failed");
            }
        }
        events
    }
}

/// Client hello.
pub fn lobby_ready(player_name: &str) -> NetMessage {
    NetMessage::LobbyReady(LobbyReady { player_name: player_name.to_string() })
}

/// Latency probe stamped now.
pub fn ping() -> NetMessage {
    NetMessage::Ping(Ping { timestamp: unix_millis() })
}

fn count(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Host event in the client's perspective.
fn host_message_for(mc: &MatchController, event: &MatchEvent) -> Option<NetMessage> {
    match &event.data {
        MatchEventData::EntitySpawned { side, kind, lane, card_id, position, .. } => {
            let position = position.mirrored_y();
            Some(NetMessage::SpawnEntity(SpawnEntity {
                entity_type: kind.as_str().to_string(),
                side: side.opponent().as_str().to_string(),
                lane: *lane,
                card_id: card_id.clone(),
                pos_x: position.x,
                pos_y: position.y,
            }))
        }
        MatchEventData::StrongholdDamaged { side, slot, amount, .. } => {
            Some(NetMessage::Damage(Damage {
                target_id: stronghold_target_id(side.opponent(), *slot),
                amount: *amount,
            }))
        }
        MatchEventData::MatchEnded { outcome, .. } => {
            let did_win = outcome.won_by(Side::Enemy);
            let (xp, gold) = match_rewards(mc.progression().current_level(), did_win);
            Some(NetMessage::MatchEnd(MatchEnd {
                did_win,
                xp_gain: xp as i32,
                gold_gain: gold as i32,
            }))
        }
        _ => None,
    }
}

/// Client requests bound for the host.
fn client_message_for(event: &MatchEvent) -> Option<NetMessage> {
    match &event.data {
        MatchEventData::PlayCardRequested { card_id, lane, hand_index } => {
            Some(NetMessage::PlayCard(PlayCard {
                card_id: card_id.clone(),
                lane: *lane,
                hand_index: *hand_index as i32,
            }))
        }
        MatchEventData::CardSelected { hand_index } => {
            Some(NetMessage::SelectCard(SelectCard { hand_index: *hand_index as i32 }))
        }
        _ => None,
    }
}

/// Host snapshot in the client's perspective.
pub fn state_sync(mc: &MatchController) -> Option<StateSync> {
    let state = mc.state()?;
    let client = Side::Enemy;
    let host = Side::Player;
    let party = state.party(client);
    let hp = |side, slot| state.stronghold_hp(side, slot);

    Some(StateSync {
        player_energy: party.energy,
        enemy_energy: state.party(host).energy,
        p_left_hp: hp(client, StrongholdSlot::Left),
        p_right_hp: hp(client, StrongholdSlot::Right),
        p_king_hp: hp(client, StrongholdSlot::King),
        e_left_hp: hp(host, StrongholdSlot::Left),
        e_right_hp: hp(host, StrongholdSlot::Right),
        e_king_hp: hp(host, StrongholdSlot::King),
        hand_card_ids: party.hand_card_ids(),
        selected_index: party.selected_index as i32,
        deck_count: party.deck_count() as i32,
        player_unit_count: state.unit_count(client) as i32,
        enemy_unit_count: state.unit_count(host) as i32,
        is_game_over: state.game_over,
    })
}

fn sync_update(sync: &StateSync) -> SyncUpdate {
    SyncUpdate {
        player_energy: sync.player_energy,
        enemy_energy: sync.enemy_energy,
        player_hp: [sync.p_left_hp, sync.p_right_hp, sync.p_king_hp],
        enemy_hp: [sync.e_left_hp, sync.e_right_hp, sync.e_king_hp],
        hand_card_ids: sync.hand_card_ids.clone(),
        selected_index: count(sync.selected_index),
        deck_count: count(sync.deck_count),
        player_unit_count: count(sync.player_unit_count),
        enemy_unit_count: count(sync.enemy_unit_count),
        game_over: sync.is_game_over,
    }
}

// =============================================================================
// TESTS
// =============================================================================
