//! Types shared by the scraper, the notifier and the web server.

use serde::{Deserialize, Serialize};

/// One scraped job posting.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JobListing {
    pub title: String,
    pub company: String,
    pub location: String,
    /// Absolute URL of the posting.
    pub link: String,
}

/// What to search for. Keywords and locations are queried in the order given.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    /// Company substrings, matched case-insensitively. Empty keeps everything.
    pub companies: Vec<String>,
}

impl SearchCriteria {
    /// Returns true when `company` passes the company filter.
    pub fn matches_company(&self, company: &str) -> bool {
        if self.companies.is_empty() {
            return true;
        }
        let company = company.to_lowercase();
        self.companies
            .iter()
            .any(|c| company.contains(&c.to_lowercase()))
    }

    /// Number of (keyword, location) pairs a fetch will query.
    pub fn pair_count(&self) -> usize {
        self.keywords.len() * self.locations.len()
    }
}

/// Recipient and criteria for the daily digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub email: String,
    pub criteria: SearchCriteria,
}

/// Job categories offered in the UI: (display label, search keyword).
pub const JOB_CATEGORIES: &[(&str, &str)] = &[
    ("Aide-soignant(e)", "aide soignante"),
    ("Femme de ménage", "femme de ménage"),
    ("Garde d'enfants", "garde d'enfants"),
    ("Chauffeur", "chauffeur"),
    ("Agent de sécurité", "agent de sécurité"),
    ("Jardinier", "jardinier"),
    ("Cuisinier / Cuisinière", "cuisinier"),
    ("Serveur / Serveuse", "serveur"),
    ("Réceptionniste", "réceptionniste"),
    ("Ouvrier du bâtiment", "ouvrier bâtiment"),
    ("Infirmier / Infirmière", "infirmier"),
    ("Technicien / Technicienne", "technicien"),
    ("Assistant administratif", "assistant administratif"),
    ("Employé de supermarché", "employé supermarché"),
    ("Agent d'entretien", "agent d'entretien"),
];

/// Categories pre-selected in the UI.
pub const DEFAULT_CATEGORIES: &[&str] = &["Aide-soignant(e)", "Femme de ménage", "Garde d'enfants"];

/// Looks up the search keyword for a category label.
pub fn category_keyword(label: &str) -> Option<&'static str> {
    JOB_CATEGORIES
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, keyword)| *keyword)
}

/// Splits a comma-separated input into trimmed, non-empty items.
pub fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Escapes text for inclusion in HTML content or a quoted attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
