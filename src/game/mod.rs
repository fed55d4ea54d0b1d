//! Game Logic Module
//!
//! The match simulation. Runs on the caller's thread and never touches the
//! network; the bridge in `network/` feeds it remote input.
//!
//! ## Module Structure
//!
//! - `layout`: Arena geometry, lanes, spawn rows
//! - `catalog`: Card definitions
//! - `state`: Match state, parties, strongholds, entity storage
//! - `entity`: Towers, units, pumps, projectiles and their ticks
//! - `targeting`: Target sets and nearest-target search
//! - `deck`: Deck building, dealing, hand rotation
//! - `ai`: Card and lane choice for the AI side
//! - `progression`: Levels, rewards, the in-memory profile
//! - `controller`: Match lifecycle and the per-frame update
//! - `events`: Match events drained by the bridge and presentation

pub mod layout;
pub mod catalog;
pub mod state;
pub mod entity;
pub mod targeting;
pub mod deck;
pub mod ai;
pub mod progression;
pub mod controller;
pub mod events;

// Re-export key types
pub use catalog::{CardDefinition, find_card};
pub use state::{MatchState, MatchOutcome, Side, StrongholdSlot};
pub use controller::{MatchController, MatchMode, MatchSnapshot};
pub use events::{MatchEvent, MatchEventData};
pub use progression::{InMemoryProfile, Progression};
