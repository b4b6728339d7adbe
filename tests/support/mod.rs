// Shared builders and message helpers for the integration tests.
#![allow(dead_code)]

use std::time::Duration;

use tank_battle_server::game::{
    GameSession, GameSettings, GameStateManager, MapConfig, SessionHandle, SessionMsg,
    SessionSettings,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

// Upper bound for waiting on any session message.
pub const WAIT: Duration = Duration::from_secs(5);

// Wall-free arena without power-ups so tank and projectile paths are predictable.
pub fn open_map(seed: u64) -> MapConfig {
    MapConfig {
        width: 30,
        height: 20,
        wall_density: 0.0,
        water_bodies: 0,
        mud_patches: 0,
        powerup_spots: 0,
        seed: Some(seed),
        ..MapConfig::default()
    }
}

// Initialized and started manager with the given players.
pub fn started_game(seed: u64, players: &[&str]) -> GameStateManager {
    let settings = GameSettings {
        seed,
        ..GameSettings::default()
    };
    let mut game = GameStateManager::new(format!("game-{seed}"), settings);
    game.initialize_game(&open_map(seed));
    for id in players {
        assert!(game.add_player(id, id));
    }
    game.start_game();
    game
}

pub fn session_settings(seed: u64) -> SessionSettings {
    SessionSettings {
        game: GameSettings {
            seed,
            ..GameSettings::default()
        },
        map: open_map(seed),
        ..SessionSettings::default()
    }
}

// Spawn a session task and subscribe before it starts ticking.
pub fn spawn_session(
    settings: SessionSettings,
) -> (SessionHandle, broadcast::Receiver<SessionMsg>, JoinHandle<()>) {
    let (session, handle) = GameSession::new(format!("session-{}", uuid::Uuid::new_v4()), settings);
    let rx = handle.subscribe();
    let task = tokio::spawn(session.run());
    (handle, rx, task)
}

// Receive until `pick` returns a value, skipping lagged messages.
pub async fn recv_until<T>(
    rx: &mut broadcast::Receiver<SessionMsg>,
    mut pick: impl FnMut(SessionMsg) -> Option<T>,
) -> T {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if let Some(found) = pick(msg) {
                        return found;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("session channel closed"),
            }
        }
    };
    tokio::time::timeout(WAIT, wait)
        .await
        .expect("timed out waiting for session message")
}
