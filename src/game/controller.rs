//! Match Controller
//!
//! Owns the running match and drives it one frame at a time:
//! energy, AI, entities, king locks, cleanup, game over.
//!
//! The same controller runs in three modes. Solo and host simulate
//! everything. A LAN client simulates movement and combat for display but
//! takes energy, hands, stronghold health and the result from the host.

use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};
#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::config::MatchConfig;
use crate::core::rng::derive_match_seed;
use crate::core::vec2::Vec2;
use crate::game::ai::tick_ai;
use crate::game::catalog::{find_card, BASIC_CARD_IDS};
use crate::game::deck::{build_deck, deal_hand, rotate_hand};
use crate::game::entity::{tick_all_entities, tick_despawns, tick_projectiles, Entity};
use crate::game::events::{MatchEvent, SpawnKind};
use crate::game::layout;
use crate::game::progression::Progression;
use crate::game::state::{EntityId, MatchOutcome, MatchState, PartyState, Side, StrongholdSlot};
use crate::game::targeting::king_unlocked;

/// Who is driving the enemy side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Local AI opponent
    SoloAi,
    /// Authoritative host; the remote peer plays the enemy side
    LanHost,
    /// Display-only client; the host is authoritative
    LanClient,
}

impl MatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchMode::SoloAi => "solo_ai",
            MatchMode::LanHost => "lan_host",
            MatchMode::LanClient => "lan_client",
        }
    }

    /// Whether this side decides the result and rewards.
    pub fn is_authoritative(self) -> bool {
        !matches!(self, MatchMode::LanClient)
    }
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Render view of one side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SideSnapshot {
    pub energy: f32,
    pub left_hp: f32,
    pub right_hp: f32,
    pub king_hp: f32,
    pub king_locked: bool,
    pub unit_count: usize,
}

/// Everything a presentation layer needs for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub mode: MatchMode,
    pub elapsed: f32,
    pub player: SideSnapshot,
    pub enemy: SideSnapshot,
    /// The local player's hand
    pub hand_card_ids: Vec<String>,
    pub selected_index: usize,
    pub deck_count: usize,
    pub game_over: bool,
    pub outcome: Option<MatchOutcome>,
}

/// Absolute values pushed by the host, already in the local perspective.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncUpdate {
    pub player_energy: f32,
    pub enemy_energy: f32,
    /// Left, right, king
    pub player_hp: [f32; 3],
    /// Left, right, king
    pub enemy_hp: [f32; 3],
    pub hand_card_ids: Vec<String>,
    pub selected_index: usize,
    pub deck_count: usize,
    pub player_unit_count: usize,
    pub enemy_unit_count: usize,
    pub game_over: bool,
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Drives one match at a time.
pub struct MatchController {
    config: MatchConfig,
    mode: MatchMode,
    state: Option<MatchState>,
    progression: Box<dyn Progression + Send>,
}

impl MatchController {
    pub fn new(config: MatchConfig, progression: Box<dyn Progression + Send>) -> Self {
        Self {
            config,
            mode: MatchMode::SoloAi,
            state: None,
            progression,
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// The running match, if any.
    pub fn state(&self) -> Option<&MatchState> {
        self.state.as_ref()
    }

    /// Mutable access for tools and tests that stage a position.
    pub fn state_mut(&mut self) -> Option<&mut MatchState> {
        self.state.as_mut()
    }

    pub fn progression(&self) -> &dyn Progression {
        self.progression.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.state.as_ref().is_some_and(|s| !s.game_over)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start a solo match against the AI.
    pub fn start_match(&mut self) {
        self.start_with_id(MatchMode::SoloAi, *uuid::Uuid::new_v4().as_bytes());
    }

    /// Start an authoritative match; the remote peer plays the enemy side.
    pub fn start_lan_host_match(&mut self) {
        self.start_with_id(MatchMode::LanHost, *uuid::Uuid::new_v4().as_bytes());
    }

    /// Start a display match driven by a remote host.
    pub fn start_lan_client_match(&mut self) {
        self.start_with_id(MatchMode::LanClient, *uuid::Uuid::new_v4().as_bytes());
    }

    /// Start a match with a known id. The id and the configured seed fix
    /// every shuffle and AI roll.
    pub fn start_with_id(&mut self, mode: MatchMode, match_id: [u8; 16]) {
        let seed = derive_match_seed(&match_id, self.config.seed);
        let mut state = MatchState::new(&self.config, match_id, seed);

        let level = self.progression.current_level();
        let owned = self.progression.owned_cards();
        let basics: Vec<String> = BASIC_CARD_IDS.iter().map(|id| id.to_string()).collect();

        let player_deck = build_deck(&owned, level, self.config.min_deck_size, &mut state.rng);
        let enemy_deck = build_deck(&basics, level, self.config.min_deck_size, &mut state.rng);
        deal_hand(state.party_mut(Side::Player), player_deck, self.config.hand_size);
        deal_hand(state.party_mut(Side::Enemy), enemy_deck, self.config.hand_size);

        state.spawn_strongholds();
        state.remote_strongholds = mode == MatchMode::LanClient;
        state.push_event(MatchEvent::match_started(0.0));

        info!(
            mode = mode.as_str(),
            match_id = %uuid::Uuid::from_bytes(match_id),
            level,
            "Match started"
        );

        self.mode = mode;
        self.state = Some(state);
    }

    /// Drop the running match without awarding anything.
    pub fn abort_match(&mut self) {
        if self.state.take().is_some() {
            info!(mode = self.mode.as_str(), "Match aborted");
        }
    }

    /// Take all pending events. Events queue on the match state until this
    /// is called, so the frame loop must drain it every frame.
    pub fn take_events(&mut self) -> Vec<MatchEvent> {
        self.state.as_mut().map(MatchState::take_events).unwrap_or_default()
    }

    // =========================================================================
    // Frame update
    // =========================================================================

    /// Advance the match by `dt` seconds.
    ///
    /// Emitted events are kept until [`MatchController::take_events`]; a loop
    /// that never drains them grows the queue for the whole match.
    pub fn update(&mut self, dt: f32) {
        let mode = self.mode;
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if state.game_over || dt <= 0.0 {
            return;
        }

        state.elapsed += dt;

        // 1. Energy (the host pushes it to clients)
        if mode != MatchMode::LanClient {
            for side in Side::BOTH {
                let gain = (state.party(side).regen_rate + state.pump_yield(side)) * dt;
                state.party_mut(side).add_energy(gain);
            }
        }

        // 2. AI
        if mode == MatchMode::SoloAi {
            if let Some(play) = tick_ai(state, &self.config, Side::Enemy, dt) {
                state.party_mut(Side::Enemy).select(play.hand_index);
                play_selected_card(state, Side::Enemy, play.lane);
            }
        }

        // 3. Entities
        tick_all_entities(state, dt);
        tick_projectiles(state, dt);
        tick_despawns(state, dt);

        // 4. King locks
        update_king_locks(state);

        // 5. Cleanup
        state.prune_tracking();

        #[cfg(feature = "debug-tracing")]
        trace!(
            elapsed = state.elapsed,
            entities = state.entities.len(),
            projectiles = state.projectiles.len(),
            "Tick"
        );

        // 6. Game over
        if mode.is_authoritative() {
            let outcome = MatchOutcome::from_kings(
                state.king_dead(Side::Player),
                state.king_dead(Side::Enemy),
            );
            if let Some(outcome) = outcome {
                self.finish(outcome);
            }
        }
    }

    fn finish(&mut self, outcome: MatchOutcome) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if state.outcome.is_some() {
            return;
        }

        state.game_over = true;
        state.outcome = Some(outcome);
        let (xp, gold) = self.progression.award_match(outcome.won_by(Side::Player));
        state.push_event(MatchEvent::match_ended(state.elapsed, outcome, xp, gold));

        info!(?outcome, xp, gold, elapsed = state.elapsed, "Match ended");
    }

    // =========================================================================
    // Local input
    // =========================================================================

    /// Play the selected card into a lane.
    ///
    /// On a client this only checks affordability and asks the host; the
    /// unit shows up once the host confirms it.
    pub fn player_play_card(&mut self, lane: i32) -> bool {
        let mode = self.mode;
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        if state.game_over {
            return false;
        }
        let lane = layout::clamp_lane(lane);

        if mode == MatchMode::LanClient {
            let party = state.party(Side::Player);
            let Some(card) = party.selected_card() else {
                return false;
            };
            if !party.can_afford(card) {
                return false;
            }
            let hand_index = party.selected_index;
            let time = state.elapsed;
            state.push_event(MatchEvent::play_card_requested(time, &card.id, lane, hand_index));
            return true;
        }

        play_selected_card(state, Side::Player, lane).is_some()
    }

    /// Select a hand slot (clamped).
    pub fn select_card(&mut self, index: usize) {
        let mode = self.mode;
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.party_mut(Side::Player).select(index);

        if mode == MatchMode::LanClient {
            let selected = state.party(Side::Player).selected_index;
            let time = state.elapsed;
            state.push_event(MatchEvent::card_selected(time, selected));
        }
    }

    // =========================================================================
    // Host: remote peer input
    // =========================================================================

    /// Play a card for the remote peer (the enemy side).
    ///
    /// The card is located by id first; the claimed hand index is only a
    /// fallback. Anything that does not resolve is dropped.
    pub fn play_remote_card(&mut self, card_id: &str, lane: i32, hand_index: usize) -> Option<EntityId> {
        let state = self.state.as_mut()?;
        if state.game_over {
            return None;
        }

        let party = state.party(Side::Enemy);
        let index = party
            .hand
            .iter()
            .position(|c| c.id == card_id)
            .unwrap_or(hand_index);
        if index >= party.hand.len() {
            debug!(card_id, hand_index, "Dropping remote play: card not in hand");
            return None;
        }

        state.party_mut(Side::Enemy).select(index);
        let spawned = play_selected_card(state, Side::Enemy, layout::clamp_lane(lane));
        if spawned.is_none() {
            debug!(card_id, "Remote play rejected: not enough energy");
        }
        spawned
    }

    /// Remote peer changed its selection.
    pub fn select_remote_card(&mut self, index: usize) {
        if let Some(state) = self.state.as_mut() {
            state.party_mut(Side::Enemy).select(index);
        }
    }

    // =========================================================================
    // Client: host overwrites
    // =========================================================================

    /// Host says the match began: start locally and take the dealt hand.
    pub fn apply_match_start(&mut self, hand_card_ids: &[String], deck_count: usize) {
        self.start_lan_client_match();
        if let Some(state) = self.state.as_mut() {
            let party = state.party_mut(Side::Player);
            set_hand(party, hand_card_ids);
            party.selected_index = 0;
            party.deck_queue.clear();
            party.reported_deck_count = Some(deck_count);
        }
    }

    /// Overwrite local values with a host snapshot.
    pub fn apply_state_sync(&mut self, update: &SyncUpdate) {
        if self.mode != MatchMode::LanClient {
            debug!(mode = self.mode.as_str(), "Ignoring state sync outside client mode");
            return;
        }
        let Some(state) = self.state.as_mut() else {
            return;
        };

        state.party_mut(Side::Player).set_energy(update.player_energy);
        state.party_mut(Side::Enemy).set_energy(update.enemy_energy);

        for (i, slot) in StrongholdSlot::ALL.into_iter().enumerate() {
            state.set_stronghold_hp(Side::Player, slot, update.player_hp[i]);
            state.set_stronghold_hp(Side::Enemy, slot, update.enemy_hp[i]);
        }

        let party = state.party_mut(Side::Player);
        set_hand(party, &update.hand_card_ids);
        party.select(update.selected_index);
        party.reported_deck_count = Some(update.deck_count);

        let local = (state.unit_count(Side::Player), state.unit_count(Side::Enemy));
        if local != (update.player_unit_count, update.enemy_unit_count) {
            debug!(
                local_player = local.0,
                local_enemy = local.1,
                host_player = update.player_unit_count,
                host_enemy = update.enemy_unit_count,
                "Unit counts diverge from host"
            );
        }

        if update.game_over {
            state.game_over = true;
        }
    }

    /// Spawn a unit or pump the host reported.
    pub fn apply_remote_spawn(
        &mut self,
        kind: SpawnKind,
        side: Side,
        lane: i32,
        card_id: &str,
        position: Vec2,
    ) -> Option<EntityId> {
        if self.mode != MatchMode::LanClient {
            return None;
        }
        let state = self.state.as_mut()?;

        let Some(card) = find_card(card_id) else {
            warn!(card_id, "Host spawned an unknown card");
            return None;
        };
        if card.is_pump() != (kind == SpawnKind::Pump) {
            warn!(card_id, kind = kind.as_str(), "Spawn kind does not match card");
            return None;
        }

        let lane = layout::clamp_lane(lane);
        let mut entity = Entity::from_card(side, lane, card);
        entity.position = layout::clamp_unit_position(position);
        let position = entity.position;
        let id = state.insert_entity(entity);

        let time = state.elapsed;
        state.push_event(MatchEvent::entity_spawned(time, id, side, kind, lane, card_id, position));
        Some(id)
    }

    /// Apply stronghold damage the host reported.
    pub fn apply_remote_damage(&mut self, side: Side, slot: StrongholdSlot, amount: f32) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        match state.strongholds(side).get(slot) {
            Some(id) => state.apply_remote_damage(id, amount),
            None => false,
        }
    }

    /// Host declared the result. Rewards are granted locally, once.
    pub fn finish_remote_match(&mut self, did_win: bool) -> Option<(u32, u32)> {
        let state = self.state.as_mut()?;
        if state.outcome.is_some() {
            return None;
        }

        let outcome = if did_win {
            MatchOutcome::PlayerWon
        } else {
            MatchOutcome::EnemyWon
        };
        state.game_over = true;
        state.outcome = Some(outcome);

        let (xp, gold) = self.progression.award_match(did_win);
        state.push_event(MatchEvent::match_ended(state.elapsed, outcome, xp, gold));
        info!(did_win, xp, gold, "Remote match ended");
        Some((xp, gold))
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    /// Render snapshot of the running match.
    pub fn snapshot(&self) -> Option<MatchSnapshot> {
        let state = self.state.as_ref()?;
        let player = state.party(Side::Player);

        Some(MatchSnapshot {
            mode: self.mode,
            elapsed: state.elapsed,
            player: side_snapshot(state, Side::Player),
            enemy: side_snapshot(state, Side::Enemy),
            hand_card_ids: player.hand_card_ids(),
            selected_index: player.selected_index,
            deck_count: player.deck_count(),
            game_over: state.game_over,
            outcome: state.outcome,
        })
    }
}

fn side_snapshot(state: &MatchState, side: Side) -> SideSnapshot {
    SideSnapshot {
        energy: state.party(side).energy,
        left_hp: state.stronghold_hp(side, StrongholdSlot::Left),
        right_hp: state.stronghold_hp(side, StrongholdSlot::Right),
        king_hp: state.stronghold_hp(side, StrongholdSlot::King),
        king_locked: state
            .stronghold(side, StrongholdSlot::King)
            .is_some_and(Entity::is_locked),
        unit_count: state.unit_count(side),
    }
}

fn set_hand(party: &mut PartyState, ids: &[String]) {
    party.hand = ids.iter().filter_map(|id| find_card(id)).collect();
    party.select(party.selected_index);
}

fn update_king_locks(state: &mut MatchState) {
    for side in Side::BOTH {
        let locked = !king_unlocked(state, side);
        if let Some(king) = state.strongholds(side).king {
            if let Some(entity) = state.entity_mut(king) {
                entity.set_locked(locked);
            }
        }
    }
}

/// Spend for the selected card, spawn it and rotate the hand.
///
/// Returns None and leaves the hand untouched when the side cannot pay.
pub fn play_selected_card(state: &mut MatchState, side: Side, lane: i32) -> Option<EntityId> {
    let card = state.party(side).selected_card()?;
    if !state.party_mut(side).try_spend(card.cost as f32) {
        return None;
    }

    let entity = Entity::from_card(side, lane, card);
    let kind = if card.is_pump() { SpawnKind::Pump } else { SpawnKind::Unit };
    let position = entity.position;
    let id = state.insert_entity(entity);

    let time = state.elapsed;
    state.push_event(MatchEvent::entity_spawned(time, id, side, kind, lane, &card.id, position));
    rotate_hand(state.party_mut(side));

    debug!(side = side.as_str(), card = %card.id, lane, "Card played");
    Some(id)
}

// =============================================================================
// TESTS
// =============================================================================
