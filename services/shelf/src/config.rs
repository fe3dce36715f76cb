//! services/shelf/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use shelf_core::{DatasetKind, SeedDataset};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

const DEFAULT_PAGE_SIZE: usize = 5;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_level: Level,
    pub page_size: usize,
    pub seed: Option<SeedDataset>,
    pub fetch_timeout: Option<Duration>,
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
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = lookup("SHELF_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.shelf"));

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let page_size = match lookup("SHELF_PAGE_SIZE") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "SHELF_PAGE_SIZE".to_string(),
                        format!("'{}' is not a positive integer", raw),
                    ))
                }
            },
            None => DEFAULT_PAGE_SIZE,
        };

        // --- First-run seed dataset (optional) ---
        let seed_kind = match lookup("SHELF_SEED_KIND").as_deref() {
            None | Some("words") => DatasetKind::Words,
            Some("books") => DatasetKind::Books,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "SHELF_SEED_KIND".to_string(),
                    format!("'{}' is neither 'books' nor 'words'", other),
                ))
            }
        };
        let seed = lookup("SHELF_SEED_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|url| SeedDataset {
                url,
                kind: seed_kind,
            });

        let fetch_timeout = match lookup("FETCH_TIMEOUT_SECS") {
            Some(raw) => Some(raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                ConfigError::InvalidValue("FETCH_TIMEOUT_SECS".to_string(), raw.clone())
            })?),
            None => None,
        };

        Ok(Self {
            data_dir,
            log_level,
            page_size,
            seed,
            fetch_timeout,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("shelf.db")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.page_size, 5);
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.seed.is_none());
        assert!(config.fetch_timeout.is_none());
        assert_eq!(config.database_path(), PathBuf::from("./.shelf/shelf.db"));
    }

    #[test]
    fn seed_and_timeout_are_parsed() {
        let config = config_from(&[
            ("SHELF_SEED_URL", "https://example.com/books.json"),
            ("SHELF_SEED_KIND", "books"),
            ("FETCH_TIMEOUT_SECS", "30"),
            ("SHELF_PAGE_SIZE", "10"),
        ])
        .unwrap();
        let seed = config.seed.unwrap();
        assert_eq!(seed.kind, DatasetKind::Books);
        assert_eq!(seed.url, "https://example.com/books.json");
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config_from(&[("SHELF_PAGE_SIZE", "0")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "SHELF_PAGE_SIZE"
        ));
        assert!(matches!(
            config_from(&[("RUST_LOG", "loud")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "RUST_LOG"
        ));
        assert!(matches!(
            config_from(&[("SHELF_SEED_KIND", "movies")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "SHELF_SEED_KIND"
        ));
    }
}
