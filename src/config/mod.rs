//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Every variable
//! is optional. The API key is wrapped in `secrecy::SecretString` so it never
//! reaches a log line.

pub mod secrets;

use std::time::Duration;

use secrets::SecretString;

use crate::engine::{BudgetPolicy, ControllerConfig};
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct Config {
    pub api_key: Option<SecretString>,
    pub max_jobs_anonymous: usize,
    pub max_jobs_authenticated: usize,
    pub refresh_interval: Duration,
    pub admission_interval: Duration,
    pub poll_interval: Duration,
    pub poll_spacing: Duration,
    pub verbose: bool,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = ControllerConfig::default();

        Ok(Self {
            api_key: std::env::var("JOBGATE_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
            max_jobs_anonymous: parsed_var("JOBGATE_MAX_JOBS_ANON", defaults.budget.anonymous)?,
            max_jobs_authenticated: parsed_var(
                "JOBGATE_MAX_JOBS_USER",
                defaults.budget.authenticated,
            )?,
            refresh_interval: millis_var("JOBGATE_REFRESH_INTERVAL_MS", defaults.refresh_interval)?,
            admission_interval: millis_var(
                "JOBGATE_ADMISSION_INTERVAL_MS",
                defaults.admission_interval,
            )?,
            poll_interval: millis_var("JOBGATE_POLL_INTERVAL_MS", defaults.poll_interval)?,
            poll_spacing: millis_var("JOBGATE_POLL_SPACING_MS", defaults.poll_spacing)?,
            verbose: parsed_var("JOBGATE_VERBOSE", defaults.verbose)?,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Whether an API key is configured.
    pub fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }

    /// Loop timings and budget tiers for the controller.
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            refresh_interval: self.refresh_interval,
            admission_interval: self.admission_interval,
            poll_interval: self.poll_interval,
            poll_spacing: self.poll_spacing,
            budget: BudgetPolicy {
                anonymous: self.max_jobs_anonymous,
                authenticated: self.max_jobs_authenticated,
            },
            verbose: self.verbose,
        }
    }
}

fn parsed_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid value for {name}: {raw:?} ({e})"))),
        Err(_) => Ok(default),
    }
}

fn millis_var(name: &str, default: Duration) -> Result<Duration> {
    let default_ms = default.as_millis() as u64;
    parsed_var(name, default_ms).map(Duration::from_millis)
}
