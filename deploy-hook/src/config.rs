//! Configuration module for environment variable parsing.
//!
//! Everything has a sensible default except the webhook secret, which must be
//! provided at startup.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

const DEFAULT_PORT: u16 = 6666;
const DEFAULT_LOG_FILE: &str = "/var/log/webhook-deploy.log";
const DEFAULT_RUNNER: &str = "/bin/bash";
const DEFAULT_SCRIPT: &str = "./deploy.sh";
const DEFAULT_DEPLOY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `WEBHOOK_SECRET` was not set, or set to an empty string.
    #[error("WEBHOOK_SECRET must be set to a non-empty value")]
    MissingSecret,
}

/// Secret shared with the webhook sender, used as the HMAC key.
///
/// Cloning is cheap. The `Debug` output never contains the secret itself.
#[derive(Clone)]
pub struct SharedSecret(Arc<[u8]>);

impl SharedSecret {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([redacted])")
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// HMAC key for `X-Hub-Signature-256` verification
    pub webhook_secret: SharedSecret,

    /// Append-only audit log of webhook and deployment activity
    pub log_file: PathBuf,

    /// Interpreter used to run the deploy script
    pub deploy_runner: PathBuf,

    /// Deploy script, called as `<runner> <script> <project> <clone_url>`
    pub deploy_script: PathBuf,

    /// Maximum run time of a single deployment
    pub deploy_timeout: Duration,

    /// Maximum time spent handling a single HTTP request
    pub request_timeout: Duration,

    /// Largest webhook body accepted
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let webhook_secret = lookup("WEBHOOK_SECRET")
            .filter(|s| !s.is_empty())
            .map(SharedSecret::new)
            .ok_or(ConfigError::MissingSecret)?;

        Ok(Config {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),

            webhook_secret,

            log_file: lookup("DEPLOY_LOG_FILE")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
                .into(),

            deploy_runner: lookup("DEPLOY_RUNNER")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_RUNNER.to_string())
                .into(),

            deploy_script: lookup("DEPLOY_SCRIPT")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SCRIPT.to_string())
                .into(),

            deploy_timeout: parse_secs(
                &lookup,
                "DEPLOY_TIMEOUT_SECS",
                DEFAULT_DEPLOY_TIMEOUT_SECS,
            ),

            request_timeout: parse_secs(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),

            max_body_bytes: parse_or(&lookup, "MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
        })
    }
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = match lookup(name) {
        Some(v) => v,
        None => return default,
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Parse a number of seconds in `1..=MAX_TIMEOUT_SECS` into a duration.
fn parse_secs<F>(lookup: &F, name: &str, default: u64) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(lookup, name, default) {
        0 => {
            warn!(env_var = name, "Zero timeout is not allowed, using default");
            Duration::from_secs(default)
        }
        secs if secs > MAX_TIMEOUT_SECS => {
            warn!(
                env_var = name,
                value = secs,
                max = MAX_TIMEOUT_SECS,
                "Timeout above maximum, using default"
            );
            Duration::from_secs(default)
        }
        secs => Duration::from_secs(secs),
    }
}
