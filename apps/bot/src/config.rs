use std::env::var;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use market::{DEFAULT_SUMMARY_URL, ScanConfig, Thresholds};

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub target_channel_id: u64,
    pub version: String,
    pub redis_url: String,
    pub redis_key_prefix: String,
    pub summary_url: String,
    pub profit_minimum: i64,
    pub profit_percentage: f64,
    pub scan_interval: Duration,
    pub notify_pacing: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN not set")?,
            target_channel_id: parse_required("DISCORD_TARGET_CHANNEL_ID")?,
            version: var("APP_VERSION").unwrap_or_else(|_| "Unknown".to_string()),
            redis_url: var("REDIS_URL").context("REDIS_URL not set")?,
            redis_key_prefix: var("REDIS_KEY_PREFIX").unwrap_or_else(|_| "ge".to_string()),
            summary_url: var("SUMMARY_URL").unwrap_or_else(|_| DEFAULT_SUMMARY_URL.to_string()),
            profit_minimum: parse_or("PROFIT_MINIMUM", 1000)?,
            profit_percentage: parse_or("PROFIT_PERCENTAGE", 5.0)?,
            scan_interval: Duration::from_secs(parse_or("SCAN_INTERVAL_SECS", 120)?),
            notify_pacing: Duration::from_millis(parse_or("NOTIFY_PACING_MS", 200)?),
        };

        ensure!(
            config.target_channel_id != 0,
            "DISCORD_TARGET_CHANNEL_ID must be non-zero"
        );
        ensure!(
            config.profit_minimum >= 0 && config.profit_percentage >= 0.0,
            "profit thresholds must be non-negative"
        );

        Ok(config)
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            interval: self.scan_interval,
            pacing: self.notify_pacing,
            thresholds: Thresholds {
                profit_minimum: self.profit_minimum,
                profit_percentage: self.profit_percentage,
            },
        }
    }
}

fn parse_required<T>(name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = var(name).with_context(|| format!("{name} not set"))?;
    raw.trim()
        .parse()
        .with_context(|| format!("{name} is not valid: {raw}"))
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} is not valid: {raw}")),
        Err(_) => Ok(default),
    }
}
