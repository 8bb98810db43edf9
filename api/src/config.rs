use crate::group::namer::DEFAULT_GROUP_PREFIX;
use crate::notification::DEFAULT_QUEUE_CAPACITY;
use crate::recharge::{DEFAULT_MARGIN_MINUTES, MAX_MARGIN_MINUTES};
use anyhow::Context;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub slack_hook_url: Option<String>,
    pub group_prefix: String,
    pub group_auto_create: bool,
    pub notification_queue_capacity: usize,
    pub recharge_margin_minutes: i64,
    /// `None` disables the periodic orphan sweep.
    pub orphan_cleanup_interval: Option<Duration>,
}

impl Config {
    pub fn new() -> anyhow::Result<Config> {
        _ = dotenvy::dotenv();

        let cleanup_secs: u64 = parse_var("ORPHAN_CLEANUP_INTERVAL_SECS", 300)?;

        Ok(Config {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is required.")?,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            slack_hook_url: env::var("SLACK_HOOK_URL").ok().filter(|url| !url.is_empty()),
            group_prefix: env::var("GROUP_PREFIX")
                .unwrap_or_else(|_| DEFAULT_GROUP_PREFIX.to_string()),
            group_auto_create: parse_var("GROUP_AUTO_CREATE", true)?,
            notification_queue_capacity: parse_var(
                "NOTIFICATION_QUEUE_CAPACITY",
                DEFAULT_QUEUE_CAPACITY,
            )?,
            recharge_margin_minutes: margin_minutes(parse_var(
                "RECHARGE_MARGIN_MINUTES",
                DEFAULT_MARGIN_MINUTES,
            )?)?,
            orphan_cleanup_interval: (cleanup_secs > 0).then(|| Duration::from_secs(cleanup_secs)),
        })
    }
}

fn margin_minutes(minutes: i64) -> anyhow::Result<i64> {
    anyhow::ensure!(
        (0..=MAX_MARGIN_MINUTES).contains(&minutes),
        "RECHARGE_MARGIN_MINUTES must be between 0 and {MAX_MARGIN_MINUTES}, got {minutes}"
    );
    Ok(minutes)
}

/// Unset falls back to `default`; set but malformed is an error.
fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {value}")),
        Err(_) => Ok(default),
    }
}
