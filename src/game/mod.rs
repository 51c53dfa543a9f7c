//! Game simulation modules

pub mod combat;
pub mod r#match;
pub mod physics;
pub mod player;
pub mod server;
pub mod stats;
pub mod tick;
pub mod validation;
pub mod vector;

pub use r#match::{MatchLifecycleManager, MatchPhase};
pub use player::PlayerRegistry;
pub use server::{GameError, GameServer};
pub use tick::PhysicsTickLoop;
