//! Command-line flags for `librarium-server`.

use crate::config::ServerConfig;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Library management server
#[derive(Parser, Debug, Default)]
#[command(name = "librarium-server", about = "Library management server", version)]
pub struct Args {
    #[arg(short, long, value_name = "FILE", help = "TOML config file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Port to listen on")]
    pub port: Option<u16>,

    #[arg(long, help = "Address to bind to")]
    pub bind: Option<String>,

    #[arg(long, env = "DATABASE_URL", value_name = "URL", help = "SQLite connection string")]
    pub database_url: Option<String>,

    #[arg(
        long = "sweep-interval-secs",
        value_name = "SECS",
        help = "Seconds between overdue sweeps"
    )]
    pub sweep_interval_secs: Option<u64>,

    #[arg(long, help = "Allow cross-origin requests from any origin")]
    pub cors_allow_any: bool,
}

impl Args {
    /// Build the effective config: file, then environment, then flags.
    pub fn resolve_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load_from(path)?,
            None => ServerConfig::default(),
        };
        config.apply_env();
        self.apply_to(&mut config);
        Ok(config)
    }

    fn apply_to(&self, config: &mut ServerConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
        }
        if let Some(secs) = self.sweep_interval_secs {
            config.sweep_interval_secs = secs;
        }
        if self.cors_allow_any {
            config.cors_allow_any = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "librarium-server",
            "--port",
            "9000",
            "--database-url",
            "sqlite::memory:",
            "--sweep-interval-secs",
            "60",
        ])
        .unwrap();
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.sweep_interval_secs, Some(60));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = ServerConfig::default();
        let args = Args {
            port: Some(9000),
            bind: Some("127.0.0.1".into()),
            cors_allow_any: true,
            ..Default::default()
        };
        args.apply_to(&mut config);
        assert_eq!(config.listen_addr(), "127.0.0.1:9000");
        assert!(config.cors_allow_any);
        assert_eq!(config.database_url, "sqlite://librarium.db");
    }

    #[test]
    fn test_unset_flags_keep_config() {
        let mut config = ServerConfig {
            port: 7000,
            ..Default::default()
        };
        Args::default().apply_to(&mut config);
        assert_eq!(config.port, 7000);
        assert!(!config.cors_allow_any);
    }
}
