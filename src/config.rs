use anyhow::{Context, Result};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::time::DEFAULT_WINDOW_MS;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:1426";
const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
struct SetupConfigOverrides {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    time_window_ms: Option<i64>,
}

fn setup_config_path() -> Option<PathBuf> {
    std::env::var("ANOMALY_CHART_SETUP_CONFIG_PATH")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn load_setup_config_overrides(path: &Path) -> Option<SetupConfigOverrides> {
    if !path.exists() {
        return None;
    }
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read setup config; using env defaults"
            );
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse setup config; using env defaults"
            );
            None
        }
    }
}

/// Fallback filter when `RUST_LOG` is unset. Read before the subscriber is
/// installed, so it comes from the environment (and `.env`) only.
pub fn log_filter_from_env() -> String {
    dotenv().ok();
    std::env::var("ANOMALY_CHART_LOG_FILTER")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub base_url: String,
    pub timezone: Tz,
    pub request_timeout: Duration,
    pub time_window_ms: i64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timezone: chrono_tz::America::Los_Angeles,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            time_window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

impl ChartConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let overrides = setup_config_path()
            .as_deref()
            .and_then(load_setup_config_overrides);
        Self::resolve(
            |key| {
                std::env::var(key)
                    .ok()
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            },
            overrides.as_ref(),
        )
    }

    /// Env values win; setup-file values only fill keys the env left unset.
    fn resolve(
        env: impl Fn(&str) -> Option<String>,
        overrides: Option<&SetupConfigOverrides>,
    ) -> Result<Self> {
        let base_url = env("ANOMALY_CHART_BASE_URL")
            .or_else(|| {
                overrides
                    .and_then(|ov| ov.base_url.as_deref())
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url)
            .with_context(|| format!("ANOMALY_CHART_BASE_URL is not a valid url: {base_url}"))?;

        let timezone_name = env("ANOMALY_CHART_TIMEZONE")
            .or_else(|| overrides.and_then(|ov| ov.timezone.clone()))
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_name
            .trim()
            .parse()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("ANOMALY_CHART_TIMEZONE is not a known zone: {timezone_name}"))?;

        let request_timeout_secs = env("ANOMALY_CHART_REQUEST_TIMEOUT_SECS")
            .and_then(|value| value.parse::<u64>().ok())
            .or_else(|| overrides.and_then(|ov| ov.request_timeout_secs))
            .filter(|value| *value != 0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let time_window_ms = env("ANOMALY_CHART_WINDOW_MS")
            .and_then(|value| value.parse::<i64>().ok())
            .or_else(|| overrides.and_then(|ov| ov.time_window_ms))
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_WINDOW_MS);

        Ok(Self {
            base_url,
            timezone,
            request_timeout: Duration::from_secs(request_timeout_secs),
            time_window_ms,
        })
    }
}
