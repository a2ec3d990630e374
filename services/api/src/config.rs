//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;

use journal_core::weeks::JAKARTA;
use journal_core::{LevelingConfig, RewardConfig};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    pub openai_api_key: Option<String>,
    /// OpenAI-compatible endpoint, e.g. an OpenRouter base URL.
    pub ai_api_base: Option<String>,
    pub summary_model: String,
    pub summary_fallback_model: Option<String>,
    pub summary_timezone: String,
    pub rewards: RewardConfig,
    pub leveling: LevelingConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Load AI Settings (key is optional; summaries need it) ---
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty());
        let ai_api_base = lookup("AI_API_BASE").filter(|b| !b.is_empty());
        let summary_model = lookup("SUMMARY_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let summary_fallback_model = lookup("SUMMARY_FALLBACK_MODEL").filter(|m| !m.is_empty());
        let summary_timezone = lookup("SUMMARY_TIMEZONE").unwrap_or_else(|| JAKARTA.to_string());

        // --- Load Engine Tunables ---
        let reward_defaults = RewardConfig::default();
        let rewards = RewardConfig {
            words_per_golden_ink: parse_or(
                &lookup,
                "WORDS_PER_GOLDEN_INK",
                reward_defaults.words_per_golden_ink,
            )?,
            marble_base_reward: parse_or(
                &lookup,
                "MARBLE_BASE_REWARD",
                reward_defaults.marble_base_reward,
            )?,
            marble_streak_divisor: parse_or(
                &lookup,
                "MARBLE_STREAK_DIVISOR",
                reward_defaults.marble_streak_divisor,
            )?,
        };

        let leveling_defaults = LevelingConfig::default();
        let leveling = LevelingConfig {
            xp_per_word: parse_or(&lookup, "XP_PER_WORD", leveling_defaults.xp_per_word)?,
            base_xp_per_level: parse_or(
                &lookup,
                "BASE_XP_PER_LEVEL",
                leveling_defaults.base_xp_per_level,
            )?,
        };
        if leveling.base_xp_per_level <= 0 {
            return Err(ConfigError::InvalidValue(
                "BASE_XP_PER_LEVEL".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            openai_api_key,
            ai_api_base,
            summary_model,
            summary_fallback_model,
            summary_timezone,
            rewards,
            leveling,
        })
    }
}

/// Parses an optional variable, using `default` when it is unset.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_only_database_url() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/journal")]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.summary_timezone, "Asia/Jakarta");
        assert_eq!(config.rewards, RewardConfig::default());
        assert_eq!(config.leveling, LevelingConfig::default());
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn test_missing_database_url() {
        assert!(matches!(config_from(&[]), Err(ConfigError::MissingVar(v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_tunables_are_parsed_and_checked() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/journal"),
            ("WORDS_PER_GOLDEN_INK", "5"),
            ("BASE_XP_PER_LEVEL", "250"),
        ])
        .unwrap();
        assert_eq!(config.rewards.words_per_golden_ink, 5);
        assert_eq!(config.leveling.base_xp_per_level, 250);

        let bad = config_from(&[
            ("DATABASE_URL", "postgres://localhost/journal"),
            ("MARBLE_BASE_REWARD", "lots"),
        ]);
        assert!(matches!(bad, Err(ConfigError::InvalidValue(k, _)) if k == "MARBLE_BASE_REWARD"));

        let flat = config_from(&[
            ("DATABASE_URL", "postgres://localhost/journal"),
            ("BASE_XP_PER_LEVEL", "0"),
        ]);
        assert!(flat.is_err());
    }
}
