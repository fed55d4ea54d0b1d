//! Targeting Resolver
//!
//! Which enemy entities an attacker may hit, and which one is nearest.
//! Result order is fixed: left tower, right tower, king, then units and pumps
//! in spawn order. Nearest-target ties go to the earlier entry.

use crate::core::vec2::Vec2;
use crate::game::entity::Entity;
use crate::game::state::{EntityId, MatchState, Side, StrongholdSlot};

/// A side's king can be targeted once both of its lane towers are down.
///
/// Towers that no longer exist count as down.
pub fn king_unlocked(state: &MatchState, side: Side) -> bool {
    let strongholds = state.strongholds(side);
    !state.is_alive(strongholds.left) && !state.is_alive(strongholds.right)
}

/// Every living entity the attacking side may hit.
pub fn all_targets_for(state: &MatchState, attacker: Side) -> Vec<EntityId> {
    let defender = attacker.opponent();
    let strongholds = state.strongholds(defender);
    let mut targets = Vec::new();

    for slot in StrongholdSlot::ALL {
        if slot == StrongholdSlot::King && !king_unlocked(state, defender) {
            continue;
        }
        if let Some(id) = strongholds.get(slot) {
            if state.is_alive(Some(id)) {
                targets.push(id);
            }
        }
    }

    let living = |e: &&Entity| e.side == defender && e.alive();
    targets.extend(state.entities.values().filter(|e| e.is_unit()).filter(living).map(|e| e.id));
    targets.extend(state.entities.values().filter(|e| e.is_pump()).filter(living).map(|e| e.id));

    targets
}

/// Nearest target within `range` of `position`, or None.
pub fn find_nearest(state: &MatchState, position: Vec2, attacker: Side, range: f32) -> Option<EntityId> {
    let range_sq = range * range;
    let mut best: Option<(EntityId, f32)> = None;

    for id in all_targets_for(state, attacker) {
        let Some(entity) = state.entity(id) else {
            continue;
        };
        let dist_sq = entity.position.distance_squared(position);
        if dist_sq > range_sq {
            continue;
        }
        if best.map_or(true, |(_, best_sq)| dist_sq < best_sq) {
            best = Some((id, dist_sq));
        }
    }

    best.map(|(id, _)| id)
}
