//! Combat Entities
//!
//! Towers, kings, units, pumps and projectiles, plus the per-kind tick
//! behaviour. Each entity first decides what to do from a read-only view of
//! the match, then the decision is applied.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::catalog::{AttackKind, CardDefinition, CardKind};
use crate::game::layout;
use crate::game::state::{EntityId, MatchState, Side, StrongholdSlot};
use crate::game::targeting::{all_targets_for, find_nearest, king_unlocked};

// =============================================================================
// CONSTANTS
// =============================================================================

pub const LANE_TOWER_HP: f32 = 450.0;
pub const LANE_TOWER_DAMAGE: f32 = 12.0;
pub const LANE_TOWER_APS: f32 = 0.9;
pub const LANE_TOWER_RANGE: f32 = 4.5;

pub const KING_HP: f32 = 650.0;
pub const KING_DAMAGE: f32 = 18.0;
pub const KING_APS: f32 = 0.85;
pub const KING_RANGE: f32 = 5.2;

/// Projectile travel speed (world units per second).
pub const PROJECTILE_SPEED: f32 = 10.0;

/// Projectile collision radius.
pub const PROJECTILE_RADIUS: f32 = 0.08;

/// Approximate body radius of every damageable entity.
pub const ENTITY_RADIUS: f32 = 0.3;

/// Units closer than this to their goal stop moving.
const ARRIVE_EPSILON: f32 = 0.01;

// =============================================================================
// ENTITY
// =============================================================================

/// Tower flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TowerRole {
    Lane,
    King,
}

/// Kind-specific entity data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Tower {
        role: TowerRole,
        damage: f32,
        attacks_per_second: f32,
        range: f32,
        cooldown: f32,
        /// King is not targetable yet (visual only; kings still shoot)
        locked: bool,
    },
    Unit {
        card_id: String,
        attack: AttackKind,
        damage: f32,
        attacks_per_second: f32,
        range: f32,
        speed: f32,
        cooldown: f32,
    },
    Pump {
        card_id: String,
        energy_per_second: f32,
    },
}

/// Anything on the field with hit points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Assigned on insertion, increasing in spawn order
    pub id: EntityId,
    pub side: Side,
    /// 0 or 1, `KING_LANE` for kings
    pub lane: i32,
    pub position: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    /// Seconds until removal once dead (units and pumps only)
    pub despawn_in: Option<f32>,
    pub kind: EntityKind,
}

impl Entity {
    fn with_kind(side: Side, lane: i32, position: Vec2, hp: f32, kind: EntityKind) -> Self {
        Self {
            id: 0,
            side,
            lane,
            position,
            hp,
            max_hp: hp,
            despawn_in: None,
            kind,
        }
    }

    /// Create a lane tower for the given side and lane.
    pub fn lane_tower(side: Side, lane: i32) -> Self {
        Self::with_kind(
            side,
            lane,
            layout::tower_position(side, lane),
            LANE_TOWER_HP,
            EntityKind::Tower {
                role: TowerRole::Lane,
                damage: LANE_TOWER_DAMAGE,
                attacks_per_second: LANE_TOWER_APS,
                range: LANE_TOWER_RANGE,
                cooldown: 0.0,
                locked: false,
            },
        )
    }

    /// Create a king. Kings start locked.
    pub fn king(side: Side) -> Self {
        Self::with_kind(
            side,
            layout::KING_LANE,
            layout::king_position(side),
            KING_HP,
            EntityKind::Tower {
                role: TowerRole::King,
                damage: KING_DAMAGE,
                attacks_per_second: KING_APS,
                range: KING_RANGE,
                cooldown: 0.0,
                locked: true,
            },
        )
    }

    /// Create whatever the card spawns at its entry point for the lane.
    pub fn from_card(side: Side, lane: i32, card: &CardDefinition) -> Self {
        match &card.kind {
            CardKind::Unit(unit) => Self::with_kind(
                side,
                lane,
                layout::unit_spawn_position(side, lane),
                unit.hp,
                EntityKind::Unit {
                    card_id: card.id.clone(),
                    attack: unit.attack,
                    damage: unit.damage,
                    attacks_per_second: unit.attacks_per_second,
                    range: unit.attack_range,
                    speed: unit.speed,
                    cooldown: 0.0,
                },
            ),
            CardKind::Pump(pump) => Self::with_kind(
                side,
                lane,
                layout::pump_spawn_position(side, lane),
                pump.hp,
                EntityKind::Pump {
                    card_id: card.id.clone(),
                    energy_per_second: pump.energy_per_second,
                },
            ),
        }
    }

    #[inline]
    pub fn alive(&self) -> bool {
        self.hp > 0.0
    }

    /// Remaining health as a fraction of max.
    pub fn hp_ratio(&self) -> f32 {
        if self.max_hp <= 0.0 {
            return 0.0;
        }
        (self.hp / self.max_hp).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn is_tower(&self) -> bool {
        matches!(self.kind, EntityKind::Tower { .. })
    }

    #[inline]
    pub fn is_unit(&self) -> bool {
        matches!(self.kind, EntityKind::Unit { .. })
    }

    #[inline]
    pub fn is_pump(&self) -> bool {
        matches!(self.kind, EntityKind::Pump { .. })
    }

    /// Which stronghold this is, if it is one.
    pub fn stronghold_slot(&self) -> Option<StrongholdSlot> {
        match self.kind {
            EntityKind::Tower { role: TowerRole::King, .. } => Some(StrongholdSlot::King),
            EntityKind::Tower { .. } if self.lane == 0 => Some(StrongholdSlot::Left),
            EntityKind::Tower { .. } => Some(StrongholdSlot::Right),
            _ => None,
        }
    }

    /// Card that spawned this entity.
    pub fn card_id(&self) -> Option<&str> {
        match &self.kind {
            EntityKind::Unit { card_id, .. } | EntityKind::Pump { card_id, .. } => Some(card_id),
            EntityKind::Tower { .. } => None,
        }
    }

    /// Energy this entity adds to its side per second.
    pub fn energy_yield(&self) -> f32 {
        match self.kind {
            EntityKind::Pump { energy_per_second, .. } if self.alive() => energy_per_second,
            _ => 0.0,
        }
    }

    /// Set the king lock flag. No-op for anything but a king.
    pub fn set_locked(&mut self, value: bool) {
        if let EntityKind::Tower { role: TowerRole::King, locked, .. } = &mut self.kind {
            *locked = value;
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.kind, EntityKind::Tower { locked: true, .. })
    }

    fn set_cooldown(&mut self, value: f32) {
        match &mut self.kind {
            EntityKind::Tower { cooldown, .. } | EntityKind::Unit { cooldown, .. } => {
                *cooldown = value;
            }
            EntityKind::Pump { .. } => {}
        }
    }
}

// =============================================================================
// PROJECTILE
// =============================================================================

/// A shot in flight. Velocity is fixed at spawn time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub side: Side,
    pub position: Vec2,
    pub velocity: Vec2,
    pub damage: f32,
    /// What it was aimed at; any enemy in its path can be hit
    pub target: EntityId,
}

impl Projectile {
    /// Aim from `from` at `to`.
    pub fn aimed(side: Side, from: Vec2, to: Vec2, damage: f32, target: EntityId) -> Self {
        let dir = to - from;
        let len = dir.length().max(ARRIVE_EPSILON);
        Self {
            side,
            position: from,
            velocity: dir * (PROJECTILE_SPEED / len),
            damage,
            target,
        }
    }
}

// =============================================================================
// TICK
// =============================================================================

#[derive(Debug, PartialEq)]
enum Action {
    Idle,
    Fire { target: EntityId, damage: f32 },
    Strike { target: EntityId, damage: f32 },
    Move(Vec2),
}

#[derive(Debug)]
struct Decision {
    cooldown: f32,
    action: Action,
}

fn decide_tower(state: &MatchState, entity: &Entity, dt: f32) -> Option<Decision> {
    let EntityKind::Tower { damage, attacks_per_second, range, cooldown, .. } = entity.kind else {
        return None;
    };

    let cooldown = (cooldown - dt).max(0.0);
    if cooldown > 0.0 {
        return Some(Decision { cooldown, action: Action::Idle });
    }

    match find_nearest(state, entity.position, entity.side, range) {
        Some(target) => Some(Decision {
            cooldown: 1.0 / attacks_per_second,
            action: Action::Fire { target, damage },
        }),
        None => Some(Decision { cooldown, action: Action::Idle }),
    }
}

fn decide_unit(state: &MatchState, entity: &Entity, dt: f32) -> Option<Decision> {
    let EntityKind::Unit { attack, damage, attacks_per_second, range, speed, cooldown, .. } =
        entity.kind
    else {
        return None;
    };

    let cooldown = (cooldown - dt).max(0.0);

    // Attacking always wins over moving
    if let Some(target) = find_nearest(state, entity.position, entity.side, range) {
        if cooldown > 0.0 {
            return Some(Decision { cooldown, action: Action::Idle });
        }
        let action = match attack {
            AttackKind::Ranged => Action::Fire { target, damage },
            AttackKind::Melee => Action::Strike { target, damage },
        };
        return Some(Decision { cooldown: 1.0 / attacks_per_second, action });
    }

    let defender = entity.side.opponent();
    let goal_x = if king_unlocked(state, defender) {
        layout::king_position(defender).x
    } else {
        layout::lane_x(entity.lane)
    };
    let goal = Vec2::new(goal_x, layout::king_y(defender));

    let to_goal = goal - entity.position;
    let dist = to_goal.length();
    if dist <= ARRIVE_EPSILON {
        return Some(Decision { cooldown, action: Action::Idle });
    }

    let step = to_goal * (speed * dt / dist);
    let next = layout::clamp_unit_position(entity.position + step);
    Some(Decision { cooldown, action: Action::Move(next) })
}

fn apply_decision(state: &mut MatchState, id: EntityId, decision: Decision) {
    let (side, from) = {
        let Some(entity) = state.entity_mut(id) else {
            return;
        };
        entity.set_cooldown(decision.cooldown);
        if let Action::Move(to) = decision.action {
            entity.position = to;
        }
        (entity.side, entity.position)
    };

    match decision.action {
        Action::Idle | Action::Move(_) => {}
        Action::Strike { target, damage } => {
            state.apply_damage(target, damage);
        }
        Action::Fire { target, damage } => {
            if let Some(to) = state.entity(target).map(|t| t.position) {
                state.projectiles.push(Projectile::aimed(side, from, to, damage, target));
            }
        }
    }
}

/// Advance one tower or unit. Dead entities and pumps do nothing.
pub fn tick_entity(state: &mut MatchState, id: EntityId, dt: f32) {
    let decision = match state.entity(id) {
        Some(entity) if entity.alive() => match entity.kind {
            EntityKind::Tower { .. } => decide_tower(state, entity, dt),
            EntityKind::Unit { .. } => decide_unit(state, entity, dt),
            EntityKind::Pump { .. } => None,
        },
        _ => None,
    };

    if let Some(decision) = decision {
        apply_decision(state, id, decision);
    }
}

/// Advance every tower and unit in spawn order.
pub fn tick_all_entities(state: &mut MatchState, dt: f32) {
    let ids: Vec<EntityId> = state.entities.keys().copied().collect();
    for id in ids {
        tick_entity(state, id, dt);
    }
}

/// Move projectiles and resolve hits against the current target set.
pub fn tick_projectiles(state: &mut MatchState, dt: f32) {
    let in_flight = std::mem::take(&mut state.projectiles);
    let hit_distance_sq = (PROJECTILE_RADIUS + ENTITY_RADIUS).powi(2);
    let mut kept = Vec::with_capacity(in_flight.len());

    for mut projectile in in_flight {
        projectile.position += projectile.velocity * dt;

        if !layout::projectile_in_bounds(projectile.position) {
            continue;
        }

        let hit = all_targets_for(state, projectile.side).into_iter().find(|&target| {
            state
                .entity(target)
                .is_some_and(|t| t.position.distance_squared(projectile.position) <= hit_distance_sq)
        });

        match hit {
            Some(target) => {
                state.apply_damage(target, projectile.damage);
            }
            None => kept.push(projectile),
        }
    }

    kept.append(&mut state.projectiles);
    state.projectiles = kept;
}

/// Count down death timers and drop expired entities.
pub fn tick_despawns(state: &mut MatchState, dt: f32) {
    let mut expired = Vec::new();
    for (id, entity) in state.entities.iter_mut() {
        if let Some(remaining) = entity.despawn_in.as_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                expired.push(*id);
            }
        }
    }
    for id in expired {
        state.entities.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::game::catalog::find_card;

    fn empty_state() -> MatchState {
        MatchState::new(&MatchConfig::default(), [0u8; 16], 1)
    }

    #[test]
    fn test_card_spawns() {
        let miner = Entity::from_card(Side::Player, 0, find_card("b_m1").unwrap());
        assert!(miner.is_unit());
        assert_eq!(miner.position, layout::unit_spawn_position(Side::Player, 0));
        assert_eq!(miner.card_id(), Some("b_m1"));

        let pump = Entity::from_card(Side::Enemy, 1, find_card("b_p1").unwrap());
        assert!(pump.is_pump());
        assert_eq!(pump.position, layout::pump_spawn_position(Side::Enemy, 1));
        assert_eq!(pump.energy_yield(), 0.5);
    }

    #[test]
    fn test_stronghold_slots() {
        assert_eq!(Entity::lane_tower(Side::Player, 0).stronghold_slot(), Some(StrongholdSlot::Left));
        assert_eq!(Entity::lane_tower(Side::Player, 1).stronghold_slot(), Some(StrongholdSlot::Right));
        assert_eq!(Entity::king(Side::Enemy).stronghold_slot(), Some(StrongholdSlot::King));
        assert!(Entity::king(Side::Enemy).is_locked());
    }

    #[test]
    fn test_unit_walks_toward_own_lane_when_king_locked() {
        let mut state = empty_state();
        state.spawn_strongholds();
        let id = state.insert_entity(Entity::from_card(Side::Player, 0, find_card("b_s1").unwrap()));

        let before = state.entity(id).unwrap().position;
        tick_entity(&mut state, id, 0.5);
        let after = state.entity(id).unwrap().position;

        assert!(after.y > before.y);
        assert!((after.x - layout::lane_x(0)).abs() < 1e-5);
    }

    #[test]
    fn test_melee_unit_strikes_instead_of_moving() {
        let mut state = empty_state();
        let attacker = state.insert_entity(Entity::from_card(Side::Player, 0, find_card("b_m1").unwrap()));
        let mut victim = Entity::from_card(Side::Enemy, 0, find_card("b_s1").unwrap());
        victim.position = state.entity(attacker).unwrap().position + Vec2::new(0.0, 0.5);
        let victim = state.insert_entity(victim);

        let before = state.entity(attacker).unwrap().position;
        tick_entity(&mut state, attacker, 0.1);

        assert_eq!(state.entity(attacker).unwrap().position, before);
        let victim = state.entity(victim).unwrap();
        assert_eq!(victim.hp, victim.max_hp - 20.0);
    }

    #[test]
    fn test_tower_fires_projectile() {
        let mut state = empty_state();
        state.spawn_strongholds();
        let mut intruder = Entity::from_card(Side::Enemy, 0, find_card("b_m1").unwrap());
        intruder.position = layout::tower_position(Side::Player, 0) + Vec2::new(0.0, 2.0);
        state.insert_entity(intruder);

        let tower = state.strongholds(Side::Player).left.unwrap();
        tick_entity(&mut state, tower, 0.016);

        assert_eq!(state.projectiles.len(), 1);
        assert_eq!(state.projectiles[0].side, Side::Player);
        assert!((state.projectiles[0].velocity.length() - PROJECTILE_SPEED).abs() < 1e-3);
    }

    #[test]
    fn test_projectile_hits_whatever_is_in_path() {
        let mut state = empty_state();
        let mut first = Entity::from_card(Side::Enemy, 0, find_card("b_s1").unwrap());
        first.position = Vec2::new(0.0, 1.0);
        let first = state.insert_entity(first);

        // Aimed at an id that no longer exists
        state.projectiles.push(Projectile::aimed(
            Side::Player,
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 5.0),
            10.0,
            999,
        ));

        for _ in 0..20 {
            tick_projectiles(&mut state, 0.01);
        }

        assert!(state.projectiles.is_empty());
        let first = state.entity(first).unwrap();
        assert_eq!(first.hp, first.max_hp - 10.0);
    }

    #[test]
    fn test_projectile_leaves_arena() {
        let mut state = empty_state();
        state.projectiles.push(Projectile::aimed(
            Side::Player,
            Vec2::new(0.0, 9.0),
            Vec2::new(0.0, 20.0),
            10.0,
            1,
        ));
        tick_projectiles(&mut state, 0.5);
        assert!(state.projectiles.is_empty());
    }

    #[test]
    fn test_dead_units_despawn_after_delay() {
        let mut state = empty_state();
        let id = state.insert_entity(Entity::from_card(Side::Enemy, 0, find_card("b_s1").unwrap()));
        assert!(state.apply_damage(id, 10_000.0));
        assert_eq!(state.entity(id).unwrap().hp, 0.0);

        tick_despawns(&mut state, 0.1);
        assert!(state.entity(id).is_some());
        tick_despawns(&mut state, 0.15);
        assert!(state.entity(id).is_none());
    }
}
