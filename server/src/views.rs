//! HTML for the job finder page.

use common::{JOB_CATEGORIES, JobListing, SearchCriteria, category_keyword, escape_html, parse_list};

/// Values of the search form, as submitted or as defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInput {
    /// Selected category labels, see [`JOB_CATEGORIES`].
    pub categories: Vec<String>,
    pub locations: String,
    pub companies: String,
    pub email: String,
}

impl Default for FormInput {
    fn default() -> Self {
        Self {
            categories: common::DEFAULT_CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            locations: "France, Belgique, Suisse".to_string(),
            companies: String::new(),
            email: String::new(),
        }
    }
}

impl FormInput {
    /// Decodes an `application/x-www-form-urlencoded` body. Each selected
    /// category arrives as its own `category` pair.
    pub fn from_urlencoded(body: &[u8]) -> Self {
        let mut input = Self {
            categories: Vec::new(),
            locations: String::new(),
            companies: String::new(),
            email: String::new(),
        };
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "category" => input.categories.push(value.into_owned()),
                "locations" => input.locations = value.into_owned(),
                "companies" => input.companies = value.into_owned(),
                "email" => input.email = value.trim().to_string(),
                _ => {}
            }
        }
        input
    }

    /// Unknown category labels are ignored.
    pub fn criteria(&self) -> SearchCriteria {
        SearchCriteria {
            keywords: self
                .categories
                .iter()
                .filter_map(|label| category_keyword(label))
                .map(str::to_string)
                .collect(),
            locations: parse_list(&self.locations),
            companies: parse_list(&self.companies),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Warning(String),
    Error(String),
}

impl Notice {
    fn render(&self) -> String {
        let (class, text) = match self {
            Notice::Success(t) => ("success", t),
            Notice::Warning(t) => ("warning", t),
            Notice::Error(t) => ("error", t),
        };
        format!("<p class=\"notice {}\">{}</p>", class, escape_html(text))
    }
}

const STYLE: &str = "body{font-family:sans-serif;max-width:42rem;margin:2rem auto;padding:0 1rem}\
label{display:block;margin-top:1rem}input,select{width:100%}\
.notice{padding:.5rem}.success{background:#e6f4ea}.warning{background:#fff4e5}.error{background:#fdecea}";

/// Full page: form, optional notice, then any results.
pub fn page(form: &FormInput, notice: Option<&Notice>, jobs: &[JobListing]) -> String {
    let options: String = JOB_CATEGORIES
        .iter()
        .map(|(label, _)| {
            let selected = if form.categories.iter().any(|c| c == label) {
                " selected"
            } else {
                ""
            };
            let label = escape_html(label);
            format!("<option value=\"{label}\"{selected}>{label}</option>")
        })
        .collect();

    let results: String = jobs.iter().map(render_job).collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
<meta charset="utf-8">
<title>Job Finder – Basan Groupe</title>
<style>{style}</style>
</head>
<body>
<h1>🔎 French-speaking Job Finder</h1>
<p>Find trending jobs in French-speaking countries. Filter by company and category. Receive daily updates by email!</p>
<form method="post" action="/search">
<label>📌 Select job categories to search:
<select name="category" multiple size="8">{options}</select></label>
<label>🌍 Enter locations (comma-separated)
<input type="text" name="locations" value="{locations}"></label>
<label>🏢 Enter preferred companies (optional, comma-separated)
<input type="text" name="companies" value="{companies}"></label>
<label>✉️ Enter your email to receive daily job alerts
<input type="email" name="email" value="{email}"></label>
<p>
<button type="submit" formaction="/search">Search Jobs Now</button>
<button type="submit" formaction="/notifications">Start Daily Email Notifications</button>
</p>
</form>
{notice}
{results}
</body>
</html>
"#,
        style = STYLE,
        options = options,
        locations = escape_html(&form.locations),
        companies = escape_html(&form.companies),
        email = escape_html(&form.email),
        notice = notice.map(Notice::render).unwrap_or_default(),
        results = results,
    )
}

fn render_job(job: &JobListing) -> String {
    format!(
        "<div class=\"job\"><p><strong>{}</strong> at <em>{}</em> – {}</p>\
         <p><a href=\"{}\">View Listing</a></p><hr></div>",
        escape_html(&job.title),
        escape_html(&job.company),
        escape_html(&job.location),
        escape_html(&job.link),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_decoding_collects_repeated_categories() {
        let body = b"category=Chauffeur&category=Jardinier&locations=France%2C+Suisse&companies=&email=+me%40example.com+";
        let form = FormInput::from_urlencoded(body);

        assert_eq!(form.categories, vec!["Chauffeur", "Jardinier"]);
        assert_eq!(form.locations, "France, Suisse");
        assert_eq!(form.email, "me@example.com");

        let criteria = form.criteria();
        assert_eq!(criteria.keywords, vec!["chauffeur", "jardinier"]);
        assert_eq!(criteria.locations, vec!["France", "Suisse"]);
        assert!(criteria.companies.is_empty());
    }

    #[test]
    fn test_unknown_categories_are_ignored() {
        let form = FormInput::from_urlencoded(b"category=Astronaute&category=Serveur+%2F+Serveuse");
        assert_eq!(form.criteria().keywords, vec!["serveur"]);
    }

    #[test]
    fn test_default_form_preselects_categories() {
        let html = page(&FormInput::default(), None, &[]);

        assert!(html.contains("<option value=\"Aide-soignant(e)\" selected>"));
        assert!(html.contains("<option value=\"Chauffeur\">"));
        assert!(html.contains("value=\"France, Belgique, Suisse\""));
    }

    #[test]
    fn test_page_renders_notice_and_jobs() {
        let jobs = vec![JobListing {
            title: "Chauffeur <VL>".to_string(),
            company: "Uber".to_string(),
            location: "France".to_string(),
            link: "https://www.indeed.fr/rc/clk?jk=1".to_string(),
        }];
        let html = page(
            &FormInput::default(),
            Some(&Notice::Success("1 jobs found!".to_string())),
            &jobs,
        );

        assert!(html.contains("<p class=\"notice success\">1 jobs found!</p>"));
        assert!(html.contains("<strong>Chauffeur &lt;VL&gt;</strong> at <em>Uber</em> – France"));
        assert!(html.contains("href=\"https://www.indeed.fr/rc/clk?jk=1\""));
    }
}
