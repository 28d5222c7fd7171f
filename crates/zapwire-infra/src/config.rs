//! Configuration loader for Zapwire.
//!
//! Reads `config.toml` from the data directory (`~/.zapwire/` in production)
//! and deserializes it into [`ZapwireConfig`]. Falls back to sensible
//! defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use zapwire_types::config::ZapwireConfig;

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`ZapwireConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the
///   default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(data_dir: &Path) -> ZapwireConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No config.toml found at {}, using defaults",
                config_path.display()
            );
            return ZapwireConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return ZapwireConfig::default();
        }
    };

    match toml::from_str::<ZapwireConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ZapwireConfig::default()
        }
    }
}

/// Resolve the data directory from `ZAPWIRE_DATA_DIR`, falling back to
/// `~/.zapwire`.
pub fn default_data_dir() -> PathBuf {
    match std::env::var("ZAPWIRE_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".zapwire")
        }
    }
}

/// Resolve the database URL.
///
/// Priority:
/// 1. `database_url` from `config.toml`
/// 2. `sqlite://{data_dir}/zapwire.db?mode=rwc`
pub fn resolve_database_url(config: &ZapwireConfig, data_dir: &Path) -> String {
    match &config.database_url {
        Some(url) => url.clone(),
        None => format!("sqlite://{}/zapwire.db?mode=rwc", data_dir.display()),
    }
}
