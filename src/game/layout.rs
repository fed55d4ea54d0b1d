//! Arena Layout
//!
//! World coordinates are centred on the origin. The player's side is the
//! bottom half (negative y), the enemy's side is the top half.

use crate::core::vec2::Vec2;
use crate::game::state::Side;

// =============================================================================
// ARENA
// =============================================================================

/// Arena width in world units.
pub const ARENA_WIDTH: f32 = 10.0;

/// Arena height in world units.
pub const ARENA_HEIGHT: f32 = 20.0;

/// Half extents, used for clamping and bounds checks.
pub const ARENA_HALF_WIDTH: f32 = ARENA_WIDTH / 2.0;
pub const ARENA_HALF_HEIGHT: f32 = ARENA_HEIGHT / 2.0;

/// Units stay this far inside the arena edge.
pub const UNIT_EDGE_MARGIN: f32 = 0.3;

/// Projectiles survive this far outside the arena before being dropped.
pub const PROJECTILE_BOUNDS_MARGIN: f32 = 2.0;

/// Number of lanes.
pub const LANE_COUNT: i32 = 2;

/// Lane value used for kings, which sit between the lanes.
pub const KING_LANE: i32 = -1;

// =============================================================================
// ROWS
// =============================================================================

const SPAWN_Y: f32 = 7.2;
const TOWER_Y: f32 = 5.6;
const KING_Y: f32 = 8.0;
const PUMP_Y: f32 = 4.8;

/// Sign applied to a row distance for the given side.
#[inline]
fn row_sign(side: Side) -> f32 {
    match side {
        Side::Player => -1.0,
        Side::Enemy => 1.0,
    }
}

/// X coordinate of a lane centre. Lane 0 is left, anything else is right.
#[inline]
pub fn lane_x(lane: i32) -> f32 {
    let fraction = if lane == 0 { 0.28 } else { 0.72 };
    ARENA_WIDTH * fraction - ARENA_HALF_WIDTH
}

/// Clamp a lane index into the valid range.
#[inline]
pub fn clamp_lane(lane: i32) -> i32 {
    lane.clamp(0, LANE_COUNT - 1)
}

/// Row where a side's units enter the arena.
#[inline]
pub fn spawn_y(side: Side) -> f32 {
    row_sign(side) * SPAWN_Y
}

/// Row of a side's lane towers.
#[inline]
pub fn tower_y(side: Side) -> f32 {
    row_sign(side) * TOWER_Y
}

/// Row of a side's king.
#[inline]
pub fn king_y(side: Side) -> f32 {
    row_sign(side) * KING_Y
}

/// Row where a side's pumps are placed.
#[inline]
pub fn pump_y(side: Side) -> f32 {
    row_sign(side) * PUMP_Y
}

/// Position of a lane tower.
pub fn tower_position(side: Side, lane: i32) -> Vec2 {
    Vec2::new(lane_x(lane), tower_y(side))
}

/// Position of a king. Kings sit on the centre line.
pub fn king_position(side: Side) -> Vec2 {
    Vec2::new(0.0, king_y(side))
}

/// Where a freshly played unit appears.
pub fn unit_spawn_position(side: Side, lane: i32) -> Vec2 {
    Vec2::new(lane_x(lane), spawn_y(side))
}

/// Where a freshly played pump appears.
pub fn pump_spawn_position(side: Side, lane: i32) -> Vec2 {
    Vec2::new(lane_x(lane), pump_y(side))
}

/// Clamp a unit position to the playable area.
#[inline]
pub fn clamp_unit_position(pos: Vec2) -> Vec2 {
    pos.clamp_to_rect(
        ARENA_HALF_WIDTH - UNIT_EDGE_MARGIN,
        ARENA_HALF_HEIGHT - UNIT_EDGE_MARGIN,
    )
}

/// Whether a projectile is still within the extended arena.
#[inline]
pub fn projectile_in_bounds(pos: Vec2) -> bool {
    pos.is_inside_rect(
        ARENA_HALF_WIDTH + PROJECTILE_BOUNDS_MARGIN,
        ARENA_HALF_HEIGHT + PROJECTILE_BOUNDS_MARGIN,
    )
}
