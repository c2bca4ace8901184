//! Process-wide configuration, resolved once at startup from environment
//! variables and overridden by CLI flags (CLI takes precedence).
//!
//! Mirrors `original_source/runserver.py`'s argparse-then-env resolution:
//! env vars supply the defaults, a present CLI flag always wins.

use crate::error::ConfigError;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_ADMISSION_CEILING: usize = 100;
const DEFAULT_PORT: u16 = 8000;

/// CLI surface. Every flag is optional; an absent flag falls back to the
/// matching environment variable, then to the hardcoded default.
#[derive(Debug, clap::Parser)]
#[command(about = "Hedged HTTP front-end for a flaky upstream JSON service")]
pub struct Cli {
    /// Upstream url. Falls back to REMOTE_URL if not given.
    #[arg(env = "REMOTE_URL")]
    pub remote: Option<String>,

    /// Maximum time in seconds to wait for a single remote response.
    #[arg(long, env = "REQ_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Number of requests the server can process concurrently.
    #[arg(long, env = "REQ_LIMIT")]
    pub limit: Option<usize>,

    /// Port number to listen on.
    #[arg(long, env = "PORT_NUMBER")]
    pub port: Option<u16>,
}

/// Resolved, immutable process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub upstream_url: String,
    pub per_attempt_timeout: Duration,
    pub admission_ceiling: usize,
    pub port: u16,
}

impl AppConfig {
    /// Builds the config from a parsed [`Cli`]. `clap`'s `env` attribute
    /// already folds in the environment variables listed above, so by the
    /// time `Cli::parse()` returns, CLI-over-env precedence has already been
    /// applied; this step only fills in the hardcoded defaults.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let upstream_url = cli.remote.ok_or(ConfigError::MissingUpstreamUrl)?;

        Ok(Self {
            upstream_url,
            per_attempt_timeout: Duration::from_secs(cli.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            admission_ceiling: cli.limit.unwrap_or(DEFAULT_ADMISSION_CEILING),
            port: cli.port.unwrap_or(DEFAULT_PORT),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_remote_is_a_config_error() {
        let cli = Cli {
            remote: None,
            timeout: None,
            limit: None,
            port: None,
        };
        assert!(matches!(
            AppConfig::from_cli(cli),
            Err(ConfigError::MissingUpstreamUrl)
        ));
    }

    #[test]
    fn defaults_match_spec() {
        let cli = Cli {
            remote: Some("http://localhost:9000".to_string()),
            timeout: None,
            limit: None,
            port: None,
        };
        let config = AppConfig::from_cli(cli).unwrap();
        assert_eq!(config.per_attempt_timeout, Duration::from_secs(10));
        assert_eq!(config.admission_ceiling, 100);
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cli = Cli {
            remote: Some("http://localhost:9000".to_string()),
            timeout: Some(5),
            limit: Some(10),
            port: Some(9090),
        };
        let config = AppConfig::from_cli(cli).unwrap();
        assert_eq!(config.per_attempt_timeout, Duration::from_secs(5));
        assert_eq!(config.admission_ceiling, 10);
        assert_eq!(config.port, 9090);
    }
}
