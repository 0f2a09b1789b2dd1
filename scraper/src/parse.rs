//! Result-card extraction.

use common::JobListing;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::FetchError;

const NO_TITLE: &str = "No title";
const UNKNOWN_COMPANY: &str = "Unknown";

/// CSS selectors for the search results markup. The site changes its markup
/// without notice, so these are configurable.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub card: String,
    pub title: String,
    pub company: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            card: "a.tapItem".to_string(),
            title: "h2".to_string(),
            company: "span.companyName".to_string(),
        }
    }
}

/// Compiled selectors, built once per fetcher.
#[derive(Debug)]
pub struct Selectors {
    card: Selector,
    title: Selector,
    company: Selector,
}

impl Selectors {
    pub fn new(config: &SelectorConfig) -> Result<Self, FetchError> {
        Ok(Self {
            card: compile(&config.card)?,
            title: compile(&config.title)?,
            company: compile(&config.company)?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector).map_err(|e| FetchError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Extracts up to `limit` listings from a results page.
///
/// Cards beyond the first `limit` are ignored. Cards without an `href` are
/// dropped, since they have no link to resolve. Relative links resolve
/// against `base`.
pub fn parse_listings(
    html: &str,
    base: &Url,
    location: &str,
    selectors: &Selectors,
    limit: usize,
) -> Vec<JobListing> {
    let document = Html::parse_document(html);

    document
        .select(&selectors.card)
        .take(limit)
        .filter_map(|card| {
            let link = card
                .value()
                .attr("href")
                .and_then(|href| base.join(href).ok())?;

            let title = first_text(card, &selectors.title).unwrap_or_else(|| NO_TITLE.to_string());
            let company =
                first_text(card, &selectors.company).unwrap_or_else(|| UNKNOWN_COMPANY.to_string());

            Some(JobListing {
                title,
                company,
                location: location.to_string(),
                link: link.to_string(),
            })
        })
        .collect()
}

/// Whitespace-normalized text of the first match, if any.
fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element.select(selector).next().map(|el| {
        el.text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ")
    })
}
