//! Tank Battle Server - authoritative tank battle simulation
//!
//! The simulation core lives in [`game`]: procedural terrain, physics,
//! tanks, projectiles, power-ups and the game state manager that advances
//! them tick by tick. [`game::GameSession`] runs a manager inside a tokio task.

pub mod config;
pub mod game;
pub mod util;
