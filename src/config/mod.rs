//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;

use crate::game::{GameMode, GameSettings, MapConfig, SessionSettings};
use crate::util::time::{DEFAULT_SNAPSHOT_RATE, DEFAULT_TICK_RATE};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Snapshots broadcast per second
    pub snapshot_rate: u32,
    pub game_mode: GameMode,

    /// Map width in tiles
    pub map_width: u32,
    /// Map height in tiles
    pub map_height: u32,
    /// Fixed map seed; a random one is drawn when unset
    pub map_seed: Option<u64>,
    pub wall_density: f32,
    pub destructible_ratio: f32,

    /// Seconds; None disables the time limit
    pub time_limit_secs: Option<u64>,
    /// None disables the score limit
    pub score_limit: Option<i32>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            tick_rate: parse_or(&lookup, "TICK_RATE", DEFAULT_TICK_RATE)?,
            snapshot_rate: parse_or(&lookup, "SNAPSHOT_RATE", DEFAULT_SNAPSHOT_RATE)?,
            game_mode: parse_or(&lookup, "GAME_MODE", GameMode::Deathmatch)?,

            map_width: parse_or(&lookup, "MAP_WIDTH", 40)?,
            map_height: parse_or(&lookup, "MAP_HEIGHT", 30)?,
            map_seed: parse_optional(&lookup, "MAP_SEED")?,
            wall_density: parse_or(&lookup, "WALL_DENSITY", 0.15)?,
            destructible_ratio: parse_or(&lookup, "DESTRUCTIBLE_RATIO", 0.4)?,

            time_limit_secs: disabled_at_zero(parse_or(&lookup, "TIME_LIMIT_SECS", 600)?),
            score_limit: disabled_at_zero(parse_or(&lookup, "SCORE_LIMIT", 20)?),
        };

        if config.tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }
        if config.snapshot_rate == 0 || config.snapshot_rate > config.tick_rate {
            return Err(ConfigError::Invalid("SNAPSHOT_RATE"));
        }
        if !(0.0..=1.0).contains(&config.wall_density) {
            return Err(ConfigError::Invalid("WALL_DENSITY"));
        }
        if !(0.0..=1.0).contains(&config.destructible_ratio) {
            return Err(ConfigError::Invalid("DESTRUCTIBLE_RATIO"));
        }
        Ok(config)
    }

    pub fn map_config(&self) -> MapConfig {
        MapConfig {
            width: self.map_width,
            height: self.map_height,
            wall_density: self.wall_density,
            destructible_ratio: self.destructible_ratio,
            seed: self.map_seed,
            ..MapConfig::default()
        }
    }

    /// Session settings; `seed` drives spawn selection and power-up rolls
    pub fn session_settings(&self, seed: u64) -> SessionSettings {
        SessionSettings {
            tick_rate: self.tick_rate,
            snapshot_rate: self.snapshot_rate,
            game: GameSettings {
                mode: self.game_mode,
                time_limit: self.time_limit_secs.map(|secs| secs as f64 * 1000.0),
                score_limit: self.score_limit,
                seed,
                ..GameSettings::default()
            },
            map: self.map_config(),
        }
    }
}

fn parse_or<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_optional(lookup, name)?.unwrap_or(default))
}

fn parse_optional<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        _ => Ok(None),
    }
}

fn disabled_at_zero<T: Default + PartialEq>(value: T) -> Option<T> {
    if value == T::default() {
        None
    } else {
        Some(value)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.snapshot_rate, 20);
        assert_eq!(config.game_mode, GameMode::Deathmatch);
        assert_eq!((config.map_width, config.map_height), (40, 30));
        assert_eq!(config.map_seed, None);
        assert_eq!(config.time_limit_secs, Some(600));
        assert_eq!(config.score_limit, Some(20));
    }

    #[test]
    fn zero_disables_limits() {
        let config = load(&[("TIME_LIMIT_SECS", "0"), ("SCORE_LIMIT", "0")]).unwrap();
        assert_eq!(config.time_limit_secs, None);
        assert_eq!(config.score_limit, None);
        let settings = config.session_settings(1);
        assert_eq!(settings.game.time_limit, None);
    }

    #[test]
    fn invalid_values_are_named() {
        let err = load(&[("MAP_WIDTH", "wide")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("MAP_WIDTH")));
        assert!(matches!(
            load(&[("GAME_MODE", "battle_royale")]),
            Err(ConfigError::Invalid("GAME_MODE"))
        ));
        assert!(matches!(
            load(&[("WALL_DENSITY", "1.5")]),
            Err(ConfigError::Invalid("WALL_DENSITY"))
        ));
    }

    #[test]
    fn map_config_carries_seed() {
        let config = load(&[("MAP_SEED", "1234"), ("GAME_MODE", "ctf")]).unwrap();
        assert_eq!(config.map_config().seed, Some(1234));
        assert_eq!(config.game_mode, GameMode::CaptureTheFlag);
    }
}
