//! Front-end settings, read from an optional TOML file.
//!
//! ```toml
//! backend_url = "http://127.0.0.1:5001"
//! store_dir = "data"
//! poll_interval_ms = 4000
//! request_timeout_secs = 120
//! ```
//!
//! Every key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// File read when `--settings` is not given. Missing is fine.
pub const DEFAULT_SETTINGS_PATH: &str = "tableau_export.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Base URL of the export backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Directory holding saved configurations.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    /// Time between status requests.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Per-request timeout. Uploads and synchronous exports can be slow.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("data")
}

const fn default_poll_interval_ms() -> u64 {
    4000
}

const fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            store_dir: default_store_dir(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Settings {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Loads settings from `path`, or from [`DEFAULT_SETTINGS_PATH`] if it
/// exists.
///
/// # Errors
///
/// * [`SettingsError::Read`] if an explicitly given file cannot be read
/// * [`SettingsError::Parse`] if the file is not valid settings TOML
pub fn load(path: Option<&Path>) -> Result<Settings, SettingsError> {
    let (path, required) = path.map_or_else(
        || (PathBuf::from(DEFAULT_SETTINGS_PATH), false),
        |p| (p.to_path_buf(), true),
    );

    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No {} found, using default settings", path.display());
            return Ok(Settings::default());
        }
        Err(source) => return Err(SettingsError::Read { path, source }),
    };

    let settings = toml::from_str(&text).map_err(|source| SettingsError::Parse {
        path: path.clone(),
        source,
    })?;
    log::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings: Settings = toml::from_str("poll_interval_ms = 1000").unwrap();
        assert_eq!(settings.poll_interval(), Duration::from_secs(1));
        assert_eq!(settings.backend_url, "http://127.0.0.1:5001");
        assert_eq!(settings.store_dir, PathBuf::from("data"));
        assert_eq!(settings.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn explicit_file_is_required() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load(Some(&tmp.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn explicit_file_is_parsed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.toml");
        std::fs::write(
            &path,
            "backend_url = \"http://exporter:5001\"\nstore_dir = \"/var/lib/exporter\"\n",
        )
        .unwrap();

        let settings = load(Some(&path)).unwrap();
        assert_eq!(settings.backend_url, "http://exporter:5001");
        assert_eq!(settings.store_dir, PathBuf::from("/var/lib/exporter"));
        assert_eq!(settings.poll_interval_ms, 4000);
    }

    #[test]
    fn malformed_file_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.toml");
        std::fs::write(&path, "poll_interval_ms = \"soon\"").unwrap();

        assert!(matches!(
            load(Some(&path)),
            Err(SettingsError::Parse { .. })
        ));
    }
}
