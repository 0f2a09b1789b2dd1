//! Job Search Scraper CLI
//!
//! Runs one search across every keyword/location pair and prints the
//! matching listings as JSON on stdout.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use common::SearchCriteria;
use job_scraper::{Fetcher, FetcherConfig, RetryPolicy};

#[derive(Debug, Parser)]
#[command(name = "scraper", about = "Scrape job listings for keyword/location pairs")]
struct Args {
    /// Search keyword (repeatable)
    #[arg(short, long = "keyword", required = true)]
    keywords: Vec<String>,

    /// Location to search in (repeatable)
    #[arg(short, long = "location", required = true)]
    locations: Vec<String>,

    /// Only keep companies containing this text, case-insensitive (repeatable)
    #[arg(short, long = "company")]
    companies: Vec<String>,

    /// Job site root URL
    #[arg(long, default_value = "https://www.indeed.fr")]
    base_url: String,

    /// Pause between requests, in milliseconds
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,

    /// Retries for transient failures
    #[arg(long, default_value_t = 2)]
    max_retries: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = FetcherConfig {
        base_url: args.base_url,
        request_delay: Duration::from_millis(args.delay_ms),
        retry: RetryPolicy {
            max_retries: args.max_retries,
            ..RetryPolicy::default()
        },
        ..FetcherConfig::default()
    };
    let fetcher = Fetcher::new(config).context("Failed to build fetcher")?;

    let criteria = SearchCriteria {
        keywords: args.keywords,
        locations: args.locations,
        companies: args.companies,
    };

    tracing::info!(
        "Searching {} keywords in {} locations",
        criteria.keywords.len(),
        criteria.locations.len()
    );

    let jobs = fetcher.fetch(&criteria);

    let json_output =
        serde_json::to_string_pretty(&jobs).context("Failed to serialize jobs to JSON")?;
    println!("{}", json_output);

    tracing::info!("Found {} jobs", jobs.len());
    Ok(())
}
