//! Application-level configuration loading: history paging and the superseded-poll policy.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVE_POLL_BACK_CONFIG_PATH";
/// Environment variable selecting the history backend.
const HISTORY_BACKEND_ENV: &str = "HISTORY_BACKEND";

const DEFAULT_HISTORY_PAGE_SIZE: u64 = 20;
const DEFAULT_MAX_HISTORY_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Whether a poll replaced by a newer one is written to the history collection.
    pub archive_superseded_polls: bool,
    /// Page size used when none is requested, and for `historyChanged` broadcasts.
    pub history_page_size: u64,
    /// Largest page size a client may request.
    pub max_history_page_size: u64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration stored at `path`, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        archive_superseded_polls = app_config.archive_superseded_polls,
                        history_page_size = app_config.history_page_size,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    archive_superseded_polls: bool,
    history_page_size: u64,
    max_history_page_size: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            archive_superseded_polls: false,
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            max_history_page_size: DEFAULT_MAX_HISTORY_PAGE_SIZE,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let max_history_page_size = value.max_history_page_size.max(1);
        Self {
            archive_superseded_polls: value.archive_superseded_polls,
            history_page_size: value.history_page_size.clamp(1, max_history_page_size),
            max_history_page_size,
        }
    }
}

/// Where archived polls are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryBackend {
    /// MongoDB, configured through `MONGO_URI` / `MONGO_DB`.
    Mongo,
    /// Process memory; history is lost on restart.
    Memory,
}

impl HistoryBackend {
    /// Read [`HISTORY_BACKEND_ENV`], defaulting to MongoDB.
    pub fn from_env() -> Self {
        match env::var(HISTORY_BACKEND_ENV) {
            Ok(value) => Self::parse(&value),
            Err(_) => HistoryBackend::Mongo,
        }
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => HistoryBackend::Memory,
            "mongo" | "mongodb" | "" => HistoryBackend::Mongo,
            other => {
                warn!(backend = other, "unknown history backend; using mongo");
                HistoryBackend::Mongo
            }
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn write_config(contents: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("live-poll-back-{}.json", Uuid::new_v4()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = AppConfig::load_from(Path::new("/definitely/not/here.json"));
        assert_eq!(config, AppConfig::default());
        assert!(!config.archive_superseded_polls);
        assert_eq!(config.history_page_size, 20);
        assert_eq!(config.max_history_page_size, 100);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let path = write_config(r#"{"archive_superseded_polls": true}"#);
        let config = AppConfig::load_from(&path);
        fs::remove_file(&path).unwrap();

        assert!(config.archive_superseded_polls);
        assert_eq!(config.history_page_size, 20);
    }

    #[test]
    fn page_size_is_capped_by_the_maximum() {
        let path = write_config(r#"{"history_page_size": 500, "max_history_page_size": 50}"#);
        let config = AppConfig::load_from(&path);
        fs::remove_file(&path).unwrap();

        assert_eq!(config.history_page_size, 50);
        assert_eq!(config.max_history_page_size, 50);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let path = write_config("{ not json");
        let config = AppConfig::load_from(&path);
        fs::remove_file(&path).unwrap();

        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn history_backend_names() {
        assert_eq!(HistoryBackend::parse("memory"), HistoryBackend::Memory);
        assert_eq!(HistoryBackend::parse(" Mongo "), HistoryBackend::Mongo);
        assert_eq!(HistoryBackend::parse("sqlite"), HistoryBackend::Mongo);
    }
}
