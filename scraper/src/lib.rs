//! Job search scraper
//!
//! Queries a job-search site for every (keyword, location) pair, scrapes the
//! result cards and filters them by company.

mod error;
mod fetcher;
mod parse;

pub use error::FetchError;
pub use fetcher::{Fetcher, FetcherConfig, RetryPolicy};
pub use parse::{SelectorConfig, Selectors, parse_listings};
