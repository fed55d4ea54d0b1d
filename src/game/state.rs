//! Match State Definitions
//!
//! All state types for one match.
//! Entities live in a BTreeMap keyed by spawn id so iteration order is
//! stable and matches spawn order.

use std::collections::{BTreeMap, VecDeque};
use serde::{Serialize, Deserialize};

use crate::config::MatchConfig;
use crate::core::rng::MatchRng;
use crate::game::catalog::CardDefinition;
use crate::game::entity::{Entity, Projectile};
use crate::game::events::MatchEvent;

/// Entity identifier, assigned in spawn order starting at 1.
pub type EntityId = u32;

// =============================================================================
// SIDE
// =============================================================================

/// One of the two parties. On a host the remote peer is `Enemy`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Player,
    Enemy,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Player, Side::Enemy];

    /// The other side.
    #[inline]
    pub fn opponent(self) -> Side {
        match self {
            Side::Player => Side::Enemy,
            Side::Enemy => Side::Player,
        }
    }

    /// Array index for per-side storage.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Side::Player => 0,
            Side::Enemy => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Player => "player",
            Side::Enemy => "enemy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "player" => Some(Side::Player),
            "enemy" => Some(Side::Enemy),
            _ => None,
        }
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// How a match ended, from the local player's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    PlayerWon,
    EnemyWon,
    /// Both kings fell on the same tick; nobody is credited with a win
    Draw,
}

impl MatchOutcome {
    /// Resolve from king states. Returns None while both kings stand.
    pub fn from_kings(player_king_dead: bool, enemy_king_dead: bool) -> Option<Self> {
        match (player_king_dead, enemy_king_dead) {
            (false, false) => None,
            (false, true) => Some(MatchOutcome::PlayerWon),
            (true, false) => Some(MatchOutcome::EnemyWon),
            (true, true) => Some(MatchOutcome::Draw),
        }
    }

    /// Whether the given side won outright.
    pub fn won_by(self, side: Side) -> bool {
        matches!(
            (self, side),
            (MatchOutcome::PlayerWon, Side::Player) | (MatchOutcome::EnemyWon, Side::Enemy)
        )
    }
}

// =============================================================================
// STRONGHOLDS
// =============================================================================

/// The three fixed defensive structures per side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrongholdSlot {
    Left,
    Right,
    King,
}

impl StrongholdSlot {
    pub const ALL: [StrongholdSlot; 3] = [StrongholdSlot::Left, StrongholdSlot::Right, StrongholdSlot::King];

    pub fn as_str(self) -> &'static str {
        match self {
            StrongholdSlot::Left => "left",
            StrongholdSlot::Right => "right",
            StrongholdSlot::King => "king",
        }
    }
}

/// Entity references for one side's strongholds.
///
/// A reference that no longer resolves counts as a dead stronghold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strongholds {
    pub left: Option<EntityId>,
    pub right: Option<EntityId>,
    pub king: Option<EntityId>,
}

impl Strongholds {
    pub fn get(&self, slot: StrongholdSlot) -> Option<EntityId> {
        match slot {
            StrongholdSlot::Left => self.left,
            StrongholdSlot::Right => self.right,
            StrongholdSlot::King => self.king,
        }
    }
}

// =============================================================================
// PARTY STATE
// =============================================================================

/// Energy, hand and deck for one side.
#[derive(Clone, Debug)]
pub struct PartyState {
    /// Current energy, always within [0, max_energy]
    pub energy: f32,
    pub max_energy: f32,
    /// Base regeneration per second
    pub regen_rate: f32,
    /// Playable cards
    pub hand: Vec<&'static CardDefinition>,
    /// Draw pile; played cards go to the back
    pub deck_queue: VecDeque<&'static CardDefinition>,
    pub selected_index: usize,
    /// Deck size pushed by the host (client only)
    pub reported_deck_count: Option<usize>,
}

impl PartyState {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            energy: config.start_energy.clamp(0.0, config.max_energy),
            max_energy: config.max_energy,
            regen_rate: config.energy_regen,
            hand: Vec::new(),
            deck_queue: VecDeque::new(),
            selected_index: 0,
            reported_deck_count: None,
        }
    }

    /// Spend energy. The balance must stay strictly above the cost, so a
    /// side can never be drained to exactly zero by a play.
    pub fn try_spend(&mut self, cost: f32) -> bool {
        if cost < 0.0 || self.energy <= cost {
            return false;
        }
        self.energy = (self.energy - cost).max(0.0);
        true
    }

    /// Add energy, capped at max.
    pub fn add_energy(&mut self, amount: f32) {
        if amount <= 0.0 {
            return;
        }
        self.energy = (self.energy + amount).min(self.max_energy);
    }

    /// Overwrite energy with an absolute value (clamped).
    pub fn set_energy(&mut self, value: f32) {
        self.energy = value.clamp(0.0, self.max_energy);
    }

    pub fn can_afford(&self, card: &CardDefinition) -> bool {
        self.energy >= card.cost as f32
    }

    /// Card in the selected slot.
    pub fn selected_card(&self) -> Option<&'static CardDefinition> {
        self.hand.get(self.selected_index).copied()
    }

    /// Select a hand slot, clamped into the hand.
    pub fn select(&mut self, index: usize) {
        self.selected_index = index.min(self.hand.len().saturating_sub(1));
    }

    pub fn hand_card_ids(&self) -> Vec<String> {
        self.hand.iter().map(|c| c.id.clone()).collect()
    }

    /// Cards left in the draw pile.
    pub fn deck_count(&self) -> usize {
        self.reported_deck_count.unwrap_or(self.deck_queue.len())
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of one match.
#[derive(Clone, Debug)]
pub struct MatchState {
    /// Match identifier
    pub match_id: [u8; 16],

    /// Seconds of simulated time
    pub elapsed: f32,

    pub game_over: bool,

    /// Set once when the match ends
    pub outcome: Option<MatchOutcome>,

    /// Per-side economy, indexed by `Side::index`
    pub parties: [PartyState; 2],

    /// Per-side stronghold references, indexed by `Side::index`
    pub strongholds: [Strongholds; 2],

    /// All damageable entities (BTreeMap for spawn-ordered iteration)
    pub entities: BTreeMap<EntityId, Entity>,

    /// Shots in flight
    pub projectiles: Vec<Projectile>,

    /// Live unit ids, pruned every tick
    pub units: Vec<EntityId>,

    /// Live pump ids, pruned every tick
    pub pumps: Vec<EntityId>,

    /// AI accumulator
    pub ai_timer: f32,

    /// Current delay between AI plays
    pub ai_interval: f32,

    /// Match RNG (deck shuffles, AI)
    pub rng: MatchRng,

    /// When set, local combat cannot damage strongholds; their hit points
    /// only change through host messages
    pub remote_strongholds: bool,

    despawn_delay: f32,

    next_entity_id: EntityId,

    pending_events: Vec<MatchEvent>,
}

impl MatchState {
    /// Create a new, empty match.
    pub fn new(config: &MatchConfig, match_id: [u8; 16], rng_seed: u64) -> Self {
        let mut rng = MatchRng::new(rng_seed);
        let ai_interval = rng.next_f32_range(config.ai_interval_min, config.ai_interval_max);

        Self {
            match_id,
            elapsed: 0.0,
            game_over: false,
            outcome: None,
            parties: [PartyState::new(config), PartyState::new(config)],
            strongholds: [Strongholds::default(); 2],
            entities: BTreeMap::new(),
            projectiles: Vec::new(),
            units: Vec::new(),
            pumps: Vec::new(),
            ai_timer: 0.0,
            ai_interval,
            rng,
            remote_strongholds: false,
            despawn_delay: config.despawn_delay,
            next_entity_id: 1,
            pending_events: Vec::new(),
        }
    }

    #[inline]
    pub fn party(&self, side: Side) -> &PartyState {
        &self.parties[side.index()]
    }

    #[inline]
    pub fn party_mut(&mut self, side: Side) -> &mut PartyState {
        &mut self.parties[side.index()]
    }

    #[inline]
    pub fn strongholds(&self, side: Side) -> &Strongholds {
        &self.strongholds[side.index()]
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Whether an id resolves to a living entity. Missing ids are dead.
    pub fn is_alive(&self, id: Option<EntityId>) -> bool {
        id.and_then(|id| self.entity(id)).is_some_and(Entity::alive)
    }

    /// Insert an entity, assigning the next spawn id.
    pub fn insert_entity(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        entity.id = id;
        if entity.is_unit() {
            self.units.push(id);
        } else if entity.is_pump() {
            self.pumps.push(id);
        }
        self.entities.insert(id, entity);
        id
    }

    /// Place both sides' towers and kings. Kings start locked.
    pub fn spawn_strongholds(&mut self) {
        for side in Side::BOTH {
            let left = self.insert_entity(Entity::lane_tower(side, 0));
            let right = self.insert_entity(Entity::lane_tower(side, 1));
            let king = self.insert_entity(Entity::king(side));
            self.strongholds[side.index()] = Strongholds {
                left: Some(left),
                right: Some(right),
                king: Some(king),
            };
        }
    }

    /// Stronghold entity for a side and slot, if it still exists.
    pub fn stronghold(&self, side: Side, slot: StrongholdSlot) -> Option<&Entity> {
        self.strongholds(side).get(slot).and_then(|id| self.entity(id))
    }

    /// Stronghold hit points; 0 when the reference is gone.
    pub fn stronghold_hp(&self, side: Side, slot: StrongholdSlot) -> f32 {
        self.stronghold(side, slot).map_or(0.0, |e| e.hp)
    }

    pub fn king_dead(&self, side: Side) -> bool {
        !self.is_alive(self.strongholds(side).king)
    }

    /// Sum of living pump yields for a side.
    pub fn pump_yield(&self, side: Side) -> f32 {
        self.pumps
            .iter()
            .filter_map(|id| self.entity(*id))
            .filter(|e| e.side == side)
            .map(Entity::energy_yield)
            .sum()
    }

    pub fn has_living_pump(&self, side: Side) -> bool {
        self.pumps
            .iter()
            .filter_map(|id| self.entity(*id))
            .any(|e| e.side == side && e.alive())
    }

    /// Living units on a side.
    pub fn unit_count(&self, side: Side) -> usize {
        self.units
            .iter()
            .filter_map(|id| self.entity(*id))
            .filter(|e| e.side == side && e.alive())
            .count()
    }

    /// Drop dead or despawned ids from the unit and pump lists.
    pub fn prune_tracking(&mut self) {
        let entities = &self.entities;
        let alive = |id: &EntityId| entities.get(id).is_some_and(Entity::alive);
        self.units.retain(alive);
        self.pumps.retain(alive);
    }

    /// Damage from local combat.
    ///
    /// Returns true if the damage landed. Dead or missing targets ignore it.
    pub fn apply_damage(&mut self, id: EntityId, amount: f32) -> bool {
        self.damage_entity(id, amount, false)
    }

    /// Damage reported by the host. Lands on strongholds even when local
    /// stronghold damage is suppressed.
    pub fn apply_remote_damage(&mut self, id: EntityId, amount: f32) -> bool {
        self.damage_entity(id, amount, true)
    }

    fn damage_entity(&mut self, id: EntityId, amount: f32, from_host: bool) -> bool {
        let time = self.elapsed;
        let despawn_delay = self.despawn_delay;
        let suppress_towers = self.remote_strongholds && !from_host;

        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if !entity.alive() || amount <= 0.0 || (suppress_towers && entity.is_tower()) {
            return false;
        }

        entity.hp -= amount;
        let died = entity.hp <= 0.0;
        if died {
            entity.hp = 0.0;
            if !entity.is_tower() {
                entity.despawn_in = Some(despawn_delay);
            }
        }

        let (side, hp_after, slot) = (entity.side, entity.hp, entity.stronghold_slot());

        if let Some(slot) = slot {
            self.push_event(MatchEvent::stronghold_damaged(time, side, slot, amount, hp_after));
        }
        if died {
            self.push_event(MatchEvent::entity_died(time, id, side));
        }
        true
    }

    /// Overwrite a stronghold's hit points with an absolute value.
    pub fn set_stronghold_hp(&mut self, side: Side, slot: StrongholdSlot, hp: f32) {
        if let Some(id) = self.strongholds(side).get(slot) {
            if let Some(entity) = self.entity_mut(id) {
                entity.hp = hp.clamp(0.0, entity.max_hp);
            }
        }
    }

    /// Take all pending events.
    pub fn take_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a match event.
    pub fn push_event(&mut self, event: MatchEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::find_card;
    use crate::game::events::MatchEventData;
    use proptest::prelude::*;

    fn new_state() -> MatchState {
        MatchState::new(&MatchConfig::default(), [0u8; 16], 7)
    }

    #[test]
    fn test_side_helpers() {
        assert_eq!(Side::Player.opponent(), Side::Enemy);
        assert_eq!(Side::Enemy.index(), 1);
        assert_eq!(Side::from_str("enemy"), Some(Side::Enemy));
        assert_eq!(Side::from_str("neutral"), None);
    }

    #[test]
    fn test_outcome_from_kings() {
        assert_eq!(MatchOutcome::from_kings(false, false), None);
        assert_eq!(MatchOutcome::from_kings(false, true), Some(MatchOutcome::PlayerWon));
        assert_eq!(MatchOutcome::from_kings(true, false), Some(MatchOutcome::EnemyWon));
        assert_eq!(MatchOutcome::from_kings(true, true), Some(MatchOutcome::Draw));
        assert!(!MatchOutcome::Draw.won_by(Side::Player));
        assert!(!MatchOutcome::Draw.won_by(Side::Enemy));
    }

    #[test]
    fn test_spend_and_regen() {
        let mut party = PartyState::new(&MatchConfig::default());
        assert_eq!(party.energy, 5.0);

        assert!(!party.try_spend(6.0));
        assert!(!party.try_spend(5.0));
        assert_eq!(party.energy, 5.0);
        assert!(party.try_spend(4.5));
        assert_eq!(party.energy, 0.5);

        party.add_energy(100.0);
        assert_eq!(party.energy, 10.0);

        party.set_energy(-3.0);
        assert_eq!(party.energy, 0.0);
    }

    #[test]
    fn test_select_clamps() {
        let mut party = PartyState::new(&MatchConfig::default());
        party.select(3);
        assert_eq!(party.selected_index, 0);

        party.hand = vec![find_card("b_m1").unwrap(), find_card("b_r1").unwrap()];
        party.select(9);
        assert_eq!(party.selected_index, 1);
        assert_eq!(party.selected_card().unwrap().id, "b_r1");
    }

    #[test]
    fn test_strongholds_spawned() {
        let mut state = new_state();
        state.spawn_strongholds();
        assert_eq!(state.entities.len(), 6);
        for side in Side::BOTH {
            assert_eq!(state.stronghold_hp(side, StrongholdSlot::Left), 450.0);
            assert_eq!(state.stronghold_hp(side, StrongholdSlot::King), 650.0);
            assert!(state.stronghold(side, StrongholdSlot::King).unwrap().is_locked());
        }
    }

    #[test]
    fn test_missing_reference_is_dead() {
        let mut state = new_state();
        state.spawn_strongholds();
        let king = state.strongholds(Side::Enemy).king.unwrap();
        state.entities.remove(&king);

        assert!(state.king_dead(Side::Enemy));
        assert_eq!(state.stronghold_hp(Side::Enemy, StrongholdSlot::King), 0.0);
        assert!(!state.apply_damage(king, 10.0));
    }

    #[test]
    fn test_damage_events() {
        let mut state = new_state();
        state.spawn_strongholds();
        let tower = state.strongholds(Side::Player).left.unwrap();

        assert!(state.apply_damage(tower, 50.0));
        assert!(state.apply_damage(tower, 1000.0));
        assert!(!state.apply_damage(tower, 1.0));

        let events = state.take_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[1].data,
            MatchEventData::StrongholdDamaged { side: Side::Player, slot: StrongholdSlot::Left, hp_after, .. }
                if hp_after == 0.0
        ));
        assert!(matches!(events[2].data, MatchEventData::EntityDied { side: Side::Player, .. }));

        // Towers stay on the field when destroyed
        assert_eq!(state.entity(tower).unwrap().despawn_in, None);
    }

    #[test]
    fn test_remote_strongholds_ignore_local_damage() {
        let mut state = new_state();
        state.spawn_strongholds();
        state.remote_strongholds = true;
        let king = state.strongholds(Side::Enemy).king.unwrap();

        assert!(!state.apply_damage(king, 40.0));
        assert_eq!(state.stronghold_hp(Side::Enemy, StrongholdSlot::King), 650.0);

        assert!(state.apply_remote_damage(king, 40.0));
        assert_eq!(state.stronghold_hp(Side::Enemy, StrongholdSlot::King), 610.0);
    }

    #[test]
    fn test_pump_tracking() {
        let mut state = new_state();
        let pump = state.insert_entity(Entity::from_card(Side::Enemy, 0, find_card("b_p1").unwrap()));
        state.insert_entity(Entity::from_card(Side::Enemy, 1, find_card("b_m1").unwrap()));

        assert!(state.has_living_pump(Side::Enemy));
        assert!(!state.has_living_pump(Side::Player));
        assert_eq!(state.pump_yield(Side::Enemy), 0.5);
        assert_eq!(state.unit_count(Side::Enemy), 1);

        state.apply_damage(pump, 10_000.0);
        state.prune_tracking();
        assert!(state.pumps.is_empty());
        assert_eq!(state.units.len(), 1);
        assert_eq!(state.pump_yield(Side::Enemy), 0.0);
    }

    proptest! {
        #[test]
        fn prop_energy_stays_in_bounds(ops in prop::collection::vec((any::<bool>(), 0.0f32..12.0), 0..64)) {
            let mut party = PartyState::new(&MatchConfig::default());
            for (spend, amount) in ops {
                if spend {
                    party.try_spend(amount);
                } else {
                    party.add_energy(amount);
                }
                prop_assert!(party.energy >= 0.0);
                prop_assert!(party.energy <= party.max_energy);
            }
        }
    }
}
