//! Lifecycle configuration loader for InnerWorld.
//!
//! Reads `config.toml` from the data directory (`~/.innerworld/` in production)
//! and deserializes it into [`LifecycleConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use innerworld_types::config::{LifecycleConfig, ProviderConfig};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "INNERWORLD_DATA_DIR";

/// Resolve the data directory: `INNERWORLD_DATA_DIR`, else `~/.innerworld`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV)
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".innerworld")
}

/// Load lifecycle configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`LifecycleConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config with
///   out-of-range TTLs reset to their defaults (each logged as a warning).
pub async fn load_config(data_dir: &Path) -> LifecycleConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return LifecycleConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return LifecycleConfig::default();
        }
    };

    match toml::from_str::<LifecycleConfig>(&content) {
        Ok(mut config) => {
            for reset in config.sanitize() {
                tracing::warn!("{}: {reset}, using default", config_path.display());
            }
            config
        }
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            LifecycleConfig::default()
        }
    }
}

/// Read the provider API key from the environment variable named in config.
///
/// `None` (unset or blank) selects the offline generation service.
pub fn resolve_api_key(provider: &ProviderConfig) -> Option<SecretString> {
    api_key_from(provider, |name| std::env::var(name).ok())
}

fn api_key_from(
    provider: &ProviderConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<SecretString> {
    if provider.api_key_env.is_empty() {
        return None;
    }
    lookup(&provider.api_key_env)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}
