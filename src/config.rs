//! TOML configuration for the PromptCraft client.
//!
//! Layered the usual way: an explicit file, then an environment-selected
//! file, then `./promptcraft.toml`, then compiled-in defaults. The service URL
//! can additionally be overridden with `PROMPTCRAFT_API_URL`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::history::HISTORY_CAPACITY;

/// Env var naming a config file to load.
pub const CONFIG_ENV: &str = "PROMPTCRAFT_CONFIG";
/// Env var overriding `service.base_url`.
pub const API_URL_ENV: &str = "PROMPTCRAFT_API_URL";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptCraftConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PromptCraftConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Try, in order:
    /// 1. The path in `PROMPTCRAFT_CONFIG`.
    /// 2. `./promptcraft.toml`.
    /// 3. Compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "PROMPTCRAFT_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new("promptcraft.toml");
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    /// Apply `PROMPTCRAFT_API_URL` on top of whatever was loaded.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.apply_api_url(&url);
        }
    }

    fn apply_api_url(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            debug!(%url, "service URL overridden from environment");
            self.service.base_url = url.to_string();
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Where the generation backend lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL; `/generate`, `/analyze` and `/` are appended to it.
    pub base_url: String,
    /// Request timeout. `None` keeps the HTTP client's default.
    pub timeout_secs: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: None,
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// SQLite file holding the persisted history.
    pub db_path: PathBuf,
    /// Key the serialized history is stored under.
    pub key: String,
    /// Maximum number of entries kept.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/promptcraft.db"),
            key: "promptcraft.history".to_string(),
            capacity: HISTORY_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = PromptCraftConfig::default();

        assert_eq!(cfg.service.base_url, "http://localhost:8000");
        assert!(cfg.service.timeout_secs.is_none());

        assert_eq!(cfg.history.db_path, PathBuf::from("data/promptcraft.db"));
        assert_eq!(cfg.history.key, "promptcraft.history");
        assert_eq!(cfg.history.capacity, 20);

        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[service]
base_url = "https://promptcraft.example.com"
timeout_secs = 30

[history]
db_path = "/var/lib/promptcraft/history.db"
key = "history.v2"
capacity = 50

[logging]
level = "debug"
json = true
"#;

        let cfg: PromptCraftConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.service.base_url, "https://promptcraft.example.com");
        assert_eq!(cfg.service.timeout_secs, Some(30));
        assert_eq!(
            cfg.history.db_path,
            PathBuf::from("/var/lib/promptcraft/history.db")
        );
        assert_eq!(cfg.history.key, "history.v2");
        assert_eq!(cfg.history.capacity, 50);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[service]
timeout_secs = 10
"#;

        let cfg: PromptCraftConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.service.timeout_secs, Some(10));
        assert_eq!(cfg.service.base_url, "http://localhost:8000");
        assert_eq!(cfg.history.capacity, 20);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("promptcraft.toml");
        std::fs::write(
            &path,
            r#"
[service]
base_url = "http://10.0.0.5:9000"
"#,
        )
        .unwrap();

        let cfg = PromptCraftConfig::load(&path).unwrap();
        assert_eq!(cfg.service.base_url, "http://10.0.0.5:9000");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = PromptCraftConfig::load(Path::new("/nonexistent/promptcraft.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_api_url_override() {
        let mut cfg = PromptCraftConfig::default();
        cfg.apply_api_url("  http://backend:8000 ");
        assert_eq!(cfg.service.base_url, "http://backend:8000");

        cfg.apply_api_url("   ");
        assert_eq!(cfg.service.base_url, "http://backend:8000");
    }
}
