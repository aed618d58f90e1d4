//! Engine configuration loader.
//!
//! Reads `flowgate.toml` and deserializes it into [`EngineConfig`]. The
//! lenient loader falls back to defaults when the file is missing or
//! malformed; the strict reader is for paths the user named explicitly.

use std::path::{Path, PathBuf};

use flowgate_types::config::EngineConfig;

/// File name looked up inside the config directory.
pub const CONFIG_FILE_NAME: &str = "flowgate.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Resolve the config directory.
///
/// Priority:
/// 1. `FLOWGATE_CONFIG_DIR` environment variable
/// 2. `~/.flowgate`
/// 3. `./.flowgate`
pub fn resolve_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FLOWGATE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".flowgate");
    }
    PathBuf::from(".flowgate")
}

/// `{config_dir}/flowgate.toml`.
pub fn default_config_path() -> PathBuf {
    resolve_config_dir().join(CONFIG_FILE_NAME)
}

/// Read and parse `path`, failing on any error.
pub async fn read_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load configuration from `path`.
///
/// - Missing file: [`EngineConfig::default()`].
/// - Unreadable or unparseable file: warning, then the default.
pub async fn load_engine_config(path: &Path) -> EngineConfig {
    match read_engine_config(path).await {
        Ok(config) => config,
        Err(ConfigError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {} found at {}, using defaults", CONFIG_FILE_NAME, path.display());
            EngineConfig::default()
        }
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            EngineConfig::default()
        }
    }
}
