//! Configuration file support
//!
//! Loads config from ~/.mentor/config.toml. Resolution order for every
//! value: CLI flag > environment variable (handled by clap) > config file >
//! built-in default.

use serde::Deserialize;
use std::path::PathBuf;

/// Production backend, used when nothing more specific is configured
pub const DEFAULT_API_BASE: &str = "https://mentor360-back.onrender.com";

/// Environment label attached to feedback submissions by default
pub const DEFAULT_AMBIENTE: &str = "beta";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Backend base URL
    pub api_base: Option<String>,

    /// Feedback environment label ("beta" or "prod")
    pub ambiente: Option<String>,
}

impl Config {
    /// Load config from ~/.mentor/config.toml
    pub fn load() -> Self {
        Self::load_from(config_path())
    }

    fn load_from(path: PathBuf) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".mentor")
        .join("config.toml")
}

/// Final backend base URL: explicit value (flag or env) > config file >
/// production default. Trailing slashes and stray whitespace are stripped.
pub fn resolve_api_base(explicit: Option<String>, config: &Config) -> String {
    explicit
        .filter(|s| !s.trim().is_empty())
        .or_else(|| config.api_base.clone())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
        .trim()
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.api_base.is_none());
        assert!(config.ambiente.is_none());
    }

    #[test]
    fn test_config_path() {
        let path = config_path();
        assert!(path.to_string_lossy().contains(".mentor"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_resolve_api_base_priority() {
        let config = Config {
            api_base: Some("https://from-config.example.com".into()),
            ambiente: None,
        };
        assert_eq!(
            resolve_api_base(Some("http://localhost:3001/".into()), &config),
            "http://localhost:3001"
        );
        assert_eq!(
            resolve_api_base(None, &config),
            "https://from-config.example.com"
        );
        assert_eq!(
            resolve_api_base(Some("  ".into()), &Config::default()),
            DEFAULT_API_BASE
        );
    }

    #[test]
    fn test_load_from_missing_and_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let config = Config::load_from(missing);
        assert!(config.api_base.is_none());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_base = \"http://localhost:3001\"\nambiente = \"prod\"\n")
            .unwrap();
        let config = Config::load_from(path);
        assert_eq!(config.api_base.as_deref(), Some("http://localhost:3001"));
        assert_eq!(config.ambiente.as_deref(), Some("prod"));
    }
}
