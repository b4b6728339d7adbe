//! Tank Battle Server - runs one authoritative game session
//!
//! Loads configuration from the environment, generates the arena and
//! ticks the simulation until the game ends or the process is signalled.

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tank_battle_server::config::Config;
use tank_battle_server::game::{GameSession, SessionCommand, SessionMsg};
use tank_battle_server::util::time::{init_server_time, uptime_secs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    let game_id = Uuid::new_v4().to_string();
    let seed: u64 = config.map_seed.unwrap_or_else(rand::random);
    info!(
        game_id = %game_id,
        mode = %config.game_mode,
        map_width = config.map_width,
        map_height = config.map_height,
        seed,
        "Starting Tank Battle Server"
    );

    let (session, handle) = GameSession::new(game_id.clone(), config.session_settings(seed));
    let mut messages = handle.subscribe();
    let session_task = tokio::spawn(session.run());

    handle.send(SessionCommand::Start).await?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            msg = messages.recv() => match msg {
                Ok(SessionMsg::GameEnded { reason, winner, .. }) => {
                    info!(game_id = %game_id, reason = %reason, winner = ?winner, "Game over");
                    break;
                }
                Ok(SessionMsg::Event { event }) => {
                    debug!(game_id = %game_id, event = ?event.kind, "Game event");
                }
                Ok(SessionMsg::Snapshot { .. }) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Message subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                // session may already be gone
                let _ = handle.send(SessionCommand::Shutdown).await;
                break;
            }
        }
    }

    session_task.await?;
    info!(uptime_secs = uptime_secs(), "Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
