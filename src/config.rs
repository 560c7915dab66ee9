//! Server configuration: TOML file, then environment, then CLI flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite connection string (e.g. `sqlite://librarium.db`)
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum pooled database connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Lifetime of a login session
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    /// Period between overdue sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Allow cross-origin requests from any origin
    #[serde(default)]
    pub cors_allow_any: bool,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite://librarium.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_sweep_interval_secs() -> u64 {
    24 * 60 * 60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            session_ttl_hours: default_session_ttl_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
            cors_allow_any: false,
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file. Missing keys take their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: ServerConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Apply `LIBRARIUM_*` / `DATABASE_URL` environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(bind) = std::env::var("LIBRARIUM_BIND") {
            self.bind = bind;
        }

        if let Ok(port) = std::env::var("LIBRARIUM_PORT") {
            match port.parse() {
                Ok(p) => self.port = p,
                Err(_) => tracing::warn!(value = %port, "ignoring invalid LIBRARIUM_PORT"),
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }

        if let Ok(ttl) = std::env::var("LIBRARIUM_SESSION_TTL_HOURS") {
            if let Ok(hours) = ttl.parse() {
                self.session_ttl_hours = hours;
            }
        }

        if let Ok(secs) = std::env::var("LIBRARIUM_SWEEP_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                self.sweep_interval_secs = secs;
            }
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.sweep_interval(), Duration::from_secs(86_400));
        assert_eq!(config.session_ttl(), chrono::Duration::hours(24));
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9090\ndatabase_url = \"sqlite::memory:\"").unwrap();

        let config = ServerConfig::load_from(file.path()).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_connections, 5);
        assert!(!config.cors_allow_any);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        assert!(ServerConfig::load_from(file.path()).is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("LIBRARIUM_PORT", "7070");
        std::env::set_var("LIBRARIUM_SWEEP_INTERVAL_SECS", "60");

        let mut config = ServerConfig::default();
        config.apply_env();

        std::env::remove_var("LIBRARIUM_PORT");
        std::env::remove_var("LIBRARIUM_SWEEP_INTERVAL_SECS");

        assert_eq!(config.port, 7070);
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    #[serial]
    fn test_invalid_env_port_is_ignored() {
        std::env::set_var("LIBRARIUM_PORT", "eighty");

        let mut config = ServerConfig::default();
        config.apply_env();

        std::env::remove_var("LIBRARIUM_PORT");

        assert_eq!(config.port, 8080);
    }
}
