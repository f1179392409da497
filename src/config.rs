//! Environment-driven configuration.

use std::time::Duration;

use anyhow::{Context, Result};

/// Default arrivals poll interval when `ARRIVALS_FETCH_DELAY_SECS` is unset.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the HTTP/WebSocket listener. `PORT`, default 7000.
    pub port: u16,
    /// TfL Unified API base URL. `TFL_BASE_URL`.
    pub tfl_base_url: String,
    /// TfL application id. `TFL_APP_ID`, may be empty.
    pub tfl_app_id: String,
    /// TfL application key. `TFL_APP_KEY`, may be empty.
    pub tfl_app_key: String,
    /// Interval between arrival fetches per stop.
    /// `ARRIVALS_FETCH_DELAY_SECS`, default 10, minimum 1.
    pub arrivals_poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().context("PORT must be a valid port number")?,
            Err(_) => 7000,
        };

        let poll_secs = match std::env::var("ARRIVALS_FETCH_DELAY_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .context("ARRIVALS_FETCH_DELAY_SECS must be a whole number of seconds")?
                .max(1),
            Err(_) => DEFAULT_POLL_INTERVAL_SECS,
        };

        Ok(Config {
            port,
            tfl_base_url: std::env::var("TFL_BASE_URL")
                .unwrap_or_else(|_| "https://api.tfl.gov.uk".to_string()),
            tfl_app_id: std::env::var("TFL_APP_ID").unwrap_or_default(),
            tfl_app_key: std::env::var("TFL_APP_KEY").unwrap_or_default(),
            arrivals_poll_interval: Duration::from_secs(poll_secs),
        })
    }
}
