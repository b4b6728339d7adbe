//! Game simulation modules

pub mod collision;
pub mod combat;
pub mod events;
pub mod manager;
pub mod physics;
pub mod powerup;
pub mod projectile;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod tank;
pub mod terrain;
pub mod vector;

pub use events::{GameEvent, GameEventKind};
pub use manager::GameStateManager;
pub use session::{GameSession, SessionCommand, SessionHandle, SessionMsg, SessionSettings};
pub use snapshot::GameSnapshot;
pub use state::{GameMode, GameSettings, GameStatus};
pub use tank::{ControlState, ControlUpdate};
pub use terrain::{GameMap, MapConfig, TerrainGenerator};
pub use vector::Vector2D;

/// Seeded generator used for every stochastic simulation call
pub type GameRng = rand_chacha::ChaCha8Rng;
