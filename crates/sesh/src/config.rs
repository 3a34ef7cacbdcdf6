//! Client configuration.
//!
//! Loaded from `config.toml` under the platform config directory; every
//! field has a default so a missing file is not an error.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Default backend URL when nothing is configured.
const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the control API.
    pub server_url: String,
    /// Realtime handshake budget, seconds.
    pub connect_timeout_secs: u64,
    /// Readiness poll interval, milliseconds.
    pub poll_interval_ms: u64,
    /// Wall-clock budget for readiness polling, seconds.
    pub readiness_budget_secs: u64,
    /// Settle delay between the first user message and the run trigger,
    /// milliseconds. The backend has been observed to process the run
    /// trigger before the message write completes without it.
    pub run_trigger_delay_ms: u64,
    /// How long a turn may stay silent before the one-time history
    /// fallback, seconds.
    pub turn_content_timeout_secs: u64,
    /// TTL for the conversation-list cache, seconds.
    pub cache_ttl_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            connect_timeout_secs: 30,
            poll_interval_ms: 2000,
            readiness_budget_secs: 120,
            run_trigger_delay_ms: 500,
            turn_content_timeout_secs: 60,
            cache_ttl_secs: 300,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the default location, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> ClientResult<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &std::path::Path) -> ClientResult<Self> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let raw = std::fs::read_to_string(&expanded)
            .map_err(|e| ClientError::Store(format!("reading {}: {}", expanded, e)))?;
        toml::from_str(&raw).map_err(|e| ClientError::Store(format!("parsing {}: {}", expanded, e)))
    }

    /// Default config file path (`~/.config/sesh/config.toml` on Linux).
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sesh").join("config.toml"))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn readiness_budget(&self) -> Duration {
        Duration::from_secs(self.readiness_budget_secs)
    }

    pub fn run_trigger_delay(&self) -> Duration {
        Duration::from_millis(self.run_trigger_delay_ms)
    }

    pub fn turn_content_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_content_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_millis(2000));
        assert_eq!(config.readiness_budget(), Duration::from_secs(120));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_url = \"http://backend.local:8080\"").unwrap();
        writeln!(file, "poll_interval_ms = 250").unwrap();

        let config = ClientConfig::load_from(file.path()).unwrap();
        assert_eq!(config.server_url, "http://backend.local:8080");
        assert_eq!(config.poll_interval_ms, 250);
        // Untouched fields keep their defaults.
        assert_eq!(config.readiness_budget_secs, 120);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_url = [not toml").unwrap();
        assert!(ClientConfig::load_from(file.path()).is_err());
    }
}
