//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::pipeline::Topology;
use crate::stream::SessionConfig;
use crate::stream::backoff::DEFAULT_DELAYS;
use crate::stream::log::DEFAULT_CAPACITY;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the dashboard backend, e.g. `http://localhost:8000`.
    pub api_url: String,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub event_log_capacity: usize,
    pub reconnect_delays: Vec<Duration>,
    /// Optional TOML file overriding the standard stage topology.
    pub pipeline_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let event_log_capacity = match optional_var("EVENT_LOG_CAPACITY") {
            Some(raw) => parse_capacity(&raw)?,
            None => DEFAULT_CAPACITY,
        };
        let reconnect_delays = match optional_var("RECONNECT_DELAYS_MS") {
            Some(raw) => parse_delays(&raw)?,
            None => DEFAULT_DELAYS.to_vec(),
        };

        Ok(Self {
            api_url: required_var("PEACE_API_URL")?
                .trim_end_matches('/')
                .to_string(),
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            event_log_capacity,
            reconnect_delays,
            pipeline_file: optional_var("PIPELINE_FILE").map(PathBuf::from),
        })
    }

    /// Session tuning derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            event_log_capacity: self.event_log_capacity,
            reconnect_delays: self.reconnect_delays.clone(),
            ..SessionConfig::default()
        }
    }

    /// The configured stage topology, or the standard one.
    pub fn topology(&self) -> Result<Topology> {
        match self.pipeline_file {
            Some(ref path) => Topology::load_from_file(path),
            None => Ok(Topology::standard()),
        }
    }
}

fn required_var(name: &str) -> Result<String> {
    optional_var(name)
        .ok_or_else(|| Error::Config(format!("required environment variable {name} is not set")))
}

/// Unset and empty are treated alike.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Upper bound on `EVENT_LOG_CAPACITY`.
pub const MAX_EVENT_LOG_CAPACITY: usize = 100_000;

fn parse_capacity(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(Error::Config(
            "EVENT_LOG_CAPACITY must be greater than zero".to_string(),
        )),
        Ok(n) if n > MAX_EVENT_LOG_CAPACITY => Err(Error::Config(format!(
            "EVENT_LOG_CAPACITY must be at most {MAX_EVENT_LOG_CAPACITY}, got {n}"
        ))),
        Ok(n) => Ok(n),
        Err(e) => Err(Error::Config(format!(
            "EVENT_LOG_CAPACITY is not a number ({raw}): {e}"
        ))),
    }
}

/// Comma-separated milliseconds, e.g. `1000,2000,5000`.
fn parse_delays(raw: &str) -> Result<Vec<Duration>> {
    let delays = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>().map(Duration::from_millis).map_err(|e| {
                Error::Config(format!("RECONNECT_DELAYS_MS entry {part:?} is invalid: {e}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if delays.is_empty() {
        return Err(Error::Config(
            "RECONNECT_DELAYS_MS must list at least one delay".to_string(),
        ));
    }
    Ok(delays)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_parse_with_whitespace() {
        let delays = parse_delays(" 100, 250 ,1000").unwrap();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(250),
                Duration::from_millis(1000)
            ]
        );
    }

    #[test]
    fn delays_reject_garbage_and_empty() {
        assert!(matches!(parse_delays("100,abc"), Err(Error::Config(_))));
        assert!(matches!(parse_delays(" , "), Err(Error::Config(_))));
    }

    #[test]
    fn capacity_must_be_positive() {
        assert_eq!(parse_capacity("50").unwrap(), 50);
        assert!(parse_capacity("0").is_err());
        assert!(parse_capacity("-1").is_err());
    }

    #[test]
    fn capacity_is_bounded() {
        assert_eq!(
            parse_capacity("100000").unwrap(),
            MAX_EVENT_LOG_CAPACITY
        );
        assert!(parse_capacity("100001").is_err());
        assert!(parse_capacity("2000000000000").is_err());
    }
}
