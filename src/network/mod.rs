//! Network Layer
//!
//! LAN play between one host and one client. Transport tasks run on tokio
//! and only fill queues; match state is touched on the game loop through
//! the bridge.

pub mod protocol;
pub mod frame;
pub mod lan;
pub mod bridge;

pub use protocol::{NetMessage, ProtocolError};
pub use frame::FrameError;
pub use lan::{HostInfo, LanError, LanEvent, LanManager, LanRole};
pub use bridge::MatchBridge;
