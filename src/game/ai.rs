//! AI Decision Maker
//!
//! Drives the non-human side in solo matches. Every 1.35-2.1 s it picks an
//! affordable card, leans toward a pump when it has none, and leans toward
//! the lane whose defending tower is weaker.

use crate::config::MatchConfig;
use crate::game::state::{MatchState, Side, StrongholdSlot};

/// A card the AI wants to play.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AiPlay {
    pub hand_index: usize,
    pub lane: i32,
}

/// Advance the AI timer. Returns a play when the interval elapses and
/// something is affordable.
pub fn tick_ai(state: &mut MatchState, config: &MatchConfig, side: Side, dt: f32) -> Option<AiPlay> {
    if state.game_over {
        return None;
    }

    state.ai_timer += dt;
    if state.ai_timer < state.ai_interval {
        return None;
    }

    state.ai_timer = 0.0;
    state.ai_interval = state
        .rng
        .next_f32_range(config.ai_interval_min, config.ai_interval_max);

    choose_play(state, config, side)
}

/// Pick a hand slot and a lane for `side`.
pub fn choose_play(state: &mut MatchState, config: &MatchConfig, side: Side) -> Option<AiPlay> {
    let party = state.party(side);
    let affordable: Vec<usize> = party
        .hand
        .iter()
        .enumerate()
        .filter(|(_, card)| party.can_afford(card))
        .map(|(i, _)| i)
        .collect();
    let first_pump = affordable
        .iter()
        .copied()
        .find(|&i| party.hand[i].is_pump());

    if affordable.is_empty() {
        return None;
    }

    let mut hand_index = affordable[state.rng.next_index(affordable.len())];

    if !state.has_living_pump(side) {
        if let Some(pump_index) = first_pump {
            if state.rng.chance(config.ai_pump_bias) {
                hand_index = pump_index;
            }
        }
    }

    let lane = choose_lane(state, config, side);
    Some(AiPlay { hand_index, lane })
}

/// Lean toward the lane whose opposing tower has less health left.
fn choose_lane(state: &mut MatchState, config: &MatchConfig, side: Side) -> i32 {
    let defender = side.opponent();
    let ratio = |slot| {
        state
            .stronghold(defender, slot)
            .filter(|e| e.alive())
            .map_or(0.0, |e| e.hp_ratio())
    };
    let left = ratio(StrongholdSlot::Left);
    let right = ratio(StrongholdSlot::Right);

    let bias_left = if left < right {
        config.ai_lane_bias
    } else {
        1.0 - config.ai_lane_bias
    };

    if state.rng.chance(bias_left) {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::find_card;
    use crate::game::entity::Entity;

    fn state_with_hand(ids: &[&str], energy: f32) -> MatchState {
        let config = MatchConfig::default();
        let mut state = MatchState::new(&config, [0u8; 16], 11);
        state.spawn_strongholds();
        let party = state.party_mut(Side::Enemy);
        party.hand = ids.iter().map(|id| find_card(id).unwrap()).collect();
        party.energy = energy;
        state
    }

    #[test]
    fn test_waits_for_interval() {
        let config = MatchConfig::default();
        let mut state = state_with_hand(&["b_s1"], 10.0);

        assert_eq!(tick_ai(&mut state, &config, Side::Enemy, 0.5), None);
        assert_eq!(tick_ai(&mut state, &config, Side::Enemy, 0.5), None);
        let play = tick_ai(&mut state, &config, Side::Enemy, 1.2);
        assert_eq!(play.map(|p| p.hand_index), Some(0));

        assert_eq!(state.ai_timer, 0.0);
        assert!((config.ai_interval_min..config.ai_interval_max).contains(&state.ai_interval));
    }

    #[test]
    fn test_nothing_affordable() {
        let config = MatchConfig::default();
        let mut state = state_with_hand(&["b_m1", "u_m2"], 2.0);
        assert_eq!(choose_play(&mut state, &config, Side::Enemy), None);
    }

    #[test]
    fn test_only_affordable_slots_chosen() {
        let config = MatchConfig::default();
        let mut state = state_with_hand(&["u_m4", "b_s1", "u_m3", "u_r3"], 1.0);
        for _ in 0..50 {
            let play = choose_play(&mut state, &config, Side::Enemy).unwrap();
            assert_eq!(play.hand_index, 1);
            assert!(play.lane == 0 || play.lane == 1);
        }
    }

    #[test]
    fn test_pump_bias_when_no_pump() {
        let config = MatchConfig { ai_pump_bias: 1.0, ..MatchConfig::default() };
        let mut state = state_with_hand(&["b_m1", "b_r1", "b_s1", "b_p1"], 10.0);
        for _ in 0..20 {
            assert_eq!(choose_play(&mut state, &config, Side::Enemy).unwrap().hand_index, 3);
        }

        // Once a pump stands the bias no longer applies
        state.insert_entity(Entity::from_card(Side::Enemy, 0, find_card("b_p1").unwrap()));
        let picks: Vec<usize> = (0..50)
            .map(|_| choose_play(&mut state, &config, Side::Enemy).unwrap().hand_index)
            .collect();
        assert!(picks.iter().any(|&i| i != 3));
    }

    #[test]
    fn test_lane_bias_toward_weaker_tower() {
        let config = MatchConfig { ai_lane_bias: 1.0, ..MatchConfig::default() };
        let mut state = state_with_hand(&["b_s1"], 10.0);
        let left = state.strongholds(Side::Player).left.unwrap();
        state.apply_damage(left, 100.0);

        for _ in 0..20 {
            assert_eq!(choose_play(&mut state, &config, Side::Enemy).unwrap().lane, 0);
        }

        // Equal towers fall to the other branch
        let mut even = state_with_hand(&["b_s1"], 10.0);
        for _ in 0..20 {
            assert_eq!(choose_play(&mut even, &config, Side::Enemy).unwrap().lane, 1);
        }
    }
}
