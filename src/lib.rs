//! # Gold Mine
//!
//! Two-lane tower-defense card battler: the match simulation and the LAN
//! host/client sync engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         GOLD MINE                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Primitives                              │
//! │  ├── vec2.rs       - 2D vector                               │
//! │  └── rng.rs        - Seeded Xorshift128+ and seed derivation │
//! │                                                              │
//! │  config.rs         - Match and LAN settings (env overrides)  │
//! │                                                              │
//! │  game/             - Simulation (single-threaded)            │
//! │  ├── catalog.rs    - Card definitions                        │
//! │  ├── state.rs      - Parties, strongholds, entities          │
//! │  ├── entity.rs     - Towers, units, pumps, projectiles       │
//! │  ├── targeting.rs  - Target resolution                       │
//! │  ├── deck.rs       - Deck and hand rotation                  │
//! │  ├── ai.rs         - AI opponent                             │
//! │  └── controller.rs - Match lifecycle and frame update        │
//! │                                                              │
//! │  network/          - LAN play (tokio)                        │
//! │  ├── protocol.rs   - JSON wire messages                      │
//! │  ├── frame.rs      - Length-prefixed frames                  │
//! │  ├── lan.rs        - Discovery, single-peer TCP, queues      │
//! │  └── bridge.rs     - Messages <-> controller                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority
//!
//! Solo and host matches simulate everything. A LAN client simulates
//! movement and combat for display only; energy, hands, stronghold health
//! and the result come from the host.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod config;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::vec2::Vec2;
pub use core::rng::MatchRng;
pub use config::{LanConfig, MatchConfig};
pub use game::controller::{MatchController, MatchMode, MatchSnapshot};
pub use game::progression::{InMemoryProfile, Progression};
pub use game::state::{MatchOutcome, Side};
pub use network::{LanManager, MatchBridge, NetMessage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Frame step used by the headless binary (seconds)
pub const FRAME_DT: f32 = 1.0 / 60.0;
