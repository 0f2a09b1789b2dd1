use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use job_scraper::{FetcherConfig, RetryPolicy};
use notifier::SmtpSettings;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub fetcher: FetcherConfig,
    /// Local wall-clock time of the daily digest.
    pub digest_time: NaiveTime,
    pub scheduler_poll: Duration,
    /// `None` when no SMTP credentials are set; email alerts are then disabled.
    pub smtp: Option<SmtpSettings>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = FetcherConfig::default();

        let fetcher = FetcherConfig {
            base_url: get("JOB_SITE_URL").unwrap_or(defaults.base_url.clone()),
            request_delay: Duration::from_millis(
                parse_or(&get, "FETCH_DELAY_MS", 1000)
                    .context("FETCH_DELAY_MS must be a number of milliseconds")?,
            ),
            retry: RetryPolicy {
                max_retries: parse_or(&get, "FETCH_MAX_RETRIES", 2)
                    .context("FETCH_MAX_RETRIES must be a valid number")?,
                backoff: Duration::from_millis(
                    parse_or(&get, "FETCH_BACKOFF_MS", 2000)
                        .context("FETCH_BACKOFF_MS must be a number of milliseconds")?,
                ),
            },
            ..defaults
        };

        let digest_time = match get("DIGEST_TIME") {
            Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                .with_context(|| format!("DIGEST_TIME must be HH:MM, got `{}`", raw))?,
            None => NaiveTime::from_hms_opt(8, 0, 0).context("invalid default digest time")?,
        };

        let smtp = match (get("SMTP_USERNAME"), get("SMTP_PASSWORD")) {
            (Some(username), Some(password)) => Some(SmtpSettings {
                host: get("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                port: parse_or(&get, "SMTP_PORT", 465).context("SMTP_PORT must be a valid port")?,
                from: get("SMTP_FROM").unwrap_or_else(|| username.clone()),
                username,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string()),
            fetcher,
            digest_time,
            scheduler_poll: Duration::from_secs(
                parse_or(&get, "SCHEDULER_POLL_SECS", 60)
                    .context("SCHEDULER_POLL_SECS must be a number of seconds")?,
            ),
            smtp,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => Ok(raw.trim().parse()?),
        None => Ok(default),
    }
}
