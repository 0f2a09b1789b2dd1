use std::thread;
use std::time::Duration;

use common::{JobListing, SearchCriteria};
use reqwest::blocking::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::parse::{SelectorConfig, Selectors, parse_listings};
use crate::FetchError;

/// Backoff for transient failures. Attempt `n` (from 0) waits `backoff * 2^n`
/// before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Site root, e.g. `https://www.indeed.fr`. Relative links resolve against it.
    pub base_url: String,
    pub search_path: String,
    /// Cards kept per (keyword, location) pair, before the company filter.
    pub results_per_pair: usize,
    /// Pause between consecutive pairs.
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub selectors: SelectorConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.indeed.fr".to_string(),
            search_path: "/jobs".to_string(),
            results_per_pair: 10,
            request_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            selectors: SelectorConfig::default(),
        }
    }
}

/// Blocking search-and-scrape client.
///
/// Built on `reqwest::blocking`, so it must be created and used off the async
/// runtime (inside `spawn_blocking` or a plain thread).
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    base_url: Url,
    search_url: Url,
    selectors: Selectors,
    config: FetcherConfig,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.base_url)?;
        let search_url = base_url.join(&config.search_path)?;
        let selectors = Selectors::new(&config.selectors)?;
        let client = Client::builder()
            .user_agent(concat!("job-scraper/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            search_url,
            selectors,
            config,
        })
    }

    /// Search URL for one pair, e.g. `/jobs?q=garde+d%27enfants&l=France`.
    pub fn search_url(&self, keyword: &str, location: &str) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("q", keyword)
            .append_pair("l", location);
        url
    }

    /// Runs every (keyword, location) pair in order and concatenates the
    /// results. Pairs that fail are logged and contribute nothing.
    pub fn fetch(&self, criteria: &SearchCriteria) -> Vec<JobListing> {
        info!(
            "Fetching jobs for {} keyword/location pairs",
            criteria.pair_count()
        );

        let mut results = Vec::new();
        let mut first = true;

        for keyword in &criteria.keywords {
            for location in &criteria.locations {
                if !first && !self.config.request_delay.is_zero() {
                    thread::sleep(self.config.request_delay);
                }
                first = false;

                match self.fetch_pair(keyword, location, criteria) {
                    Ok(jobs) => {
                        debug!("{} jobs for '{}' in {}", jobs.len(), keyword, location);
                        results.extend(jobs);
                    }
                    Err(e) => {
                        warn!("Skipping '{}' in {}: {}", keyword, location, e);
                    }
                }
            }
        }

        info!("Fetched {} jobs in total", results.len());
        results
    }

    /// Fetches and filters a single pair.
    pub fn fetch_pair(
        &self,
        keyword: &str,
        location: &str,
        criteria: &SearchCriteria,
    ) -> Result<Vec<JobListing>, FetchError> {
        let url = self.search_url(keyword, location);
        let body = self.get_with_retry(&url)?;

        let jobs = parse_listings(
            &body,
            &self.base_url,
            location,
            &self.selectors,
            self.config.results_per_pair,
        )
        .into_iter()
        .filter(|job| criteria.matches_company(&job.company))
        .collect();

        Ok(jobs)
    }

    fn get_with_retry(&self, url: &Url) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            match self.get(url) {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.config.retry.max_retries => {
                    let delay = self.config.retry.delay_for(attempt);
                    warn!(
                        "Attempt {} for {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        url,
                        e,
                        delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn get(&self, url: &Url) -> Result<String, FetchError> {
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        Ok(response.text()?)
    }
}
