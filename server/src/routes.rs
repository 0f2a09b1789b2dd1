use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, RawForm, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
};
use common::{JobListing, SearchCriteria, Subscription, parse_list};
use job_scraper::{Fetcher, FetcherConfig};
use serde::{Deserialize, Serialize};

use crate::scheduler::DigestScheduler;
use crate::views::{FormInput, Notice, page};

/// Upper bound on keyword x location pairs for one `/api/jobs` request.
pub const MAX_API_PAIRS: usize = 12;

/// Shared application state
pub struct AppState {
    pub fetcher_config: FetcherConfig,
    /// `None` when email delivery is not configured.
    pub scheduler: Option<DigestScheduler>,
}

/// Query parameters for the JSON endpoint; lists are comma-separated.
#[derive(Debug, Deserialize)]
pub struct JobsParams {
    keywords: Option<String>,
    locations: Option<String>,
    companies: Option<String>,
}

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct JobsResponse {
    total_results: usize,
    results: Vec<JobListing>,
}

pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/search", post(search_handler))
        .route("/notifications", post(notifications_handler))
        .route("/api/jobs", get(jobs_handler))
        .with_state(state)
}

/// Runs the blocking fetcher off the async executor.
async fn run_fetch(config: FetcherConfig, criteria: SearchCriteria) -> anyhow::Result<Vec<JobListing>> {
    let jobs = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<JobListing>> {
        let fetcher = Fetcher::new(config)?;
        Ok(fetcher.fetch(&criteria))
    })
    .await??;
    Ok(jobs)
}

/// Handler for GET / (root)
async fn index_handler() -> Html<String> {
    Html(page(&FormInput::default(), None, &[]))
}

/// Handler for POST /search
async fn search_handler(State(state): State<Arc<AppState>>, RawForm(body): RawForm) -> Html<String> {
    let form = FormInput::from_urlencoded(&body);
    let criteria = form.criteria();

    if criteria.keywords.is_empty() || criteria.locations.is_empty() {
        let notice = Notice::Warning(
            "Select at least one job category and enter at least one location.".to_string(),
        );
        return Html(page(&form, Some(&notice), &[]));
    }

    match run_fetch(state.fetcher_config.clone(), criteria).await {
        Ok(jobs) if jobs.is_empty() => {
            let notice =
                Notice::Warning("No jobs found. Try different filters or locations.".to_string());
            Html(page(&form, Some(&notice), &[]))
        }
        Ok(jobs) => {
            let notice = Notice::Success(format!("{} jobs found!", jobs.len()));
            Html(page(&form, Some(&notice), &jobs))
        }
        Err(e) => {
            tracing::error!("Search failed: {:#}", e);
            let notice = Notice::Error("Search failed, please try again later.".to_string());
            Html(page(&form, Some(&notice), &[]))
        }
    }
}

/// Handler for POST /notifications
async fn notifications_handler(
    State(state): State<Arc<AppState>>,
    RawForm(body): RawForm,
) -> Html<String> {
    let form = FormInput::from_urlencoded(&body);
    let notice = subscribe(&state, &form);
    Html(page(&form, Some(&notice), &[]))
}

fn subscribe(state: &AppState, form: &FormInput) -> Notice {
    if form.email.is_empty() {
        return Notice::Error("Please enter a valid email address.".to_string());
    }
    if let Err(e) = notifier::parse_mailbox(&form.email) {
        tracing::debug!("Rejected subscription: {}", e);
        return Notice::Error("Please enter a valid email address.".to_string());
    }
    let Some(scheduler) = &state.scheduler else {
        return Notice::Error(
            "Email notifications are not configured on this server.".to_string(),
        );
    };

    let subscription = Subscription {
        email: form.email.clone(),
        criteria: form.criteria(),
    };
    match scheduler.subscribe(subscription) {
        Ok(replaced) => Notice::Success(format!(
            "📧 Daily email alerts {} for {} at {}",
            if replaced { "updated" } else { "scheduled" },
            form.email,
            scheduler.digest_time().format("%H:%M")
        )),
        Err(e) => {
            tracing::error!("Failed to start digest scheduler: {}", e);
            Notice::Error("Could not start daily notifications.".to_string())
        }
    }
}

/// Handler for GET /api/jobs?keywords=<k1,k2>&locations=<l1,l2>&companies=<c1>
///
/// Requests covering more than [`MAX_API_PAIRS`] keyword/location pairs are
/// rejected with 400, since each pair is a separate rate-limited fetch.
async fn jobs_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JobsParams>,
) -> Result<Json<JobsResponse>, (StatusCode, String)> {
    let criteria = SearchCriteria {
        keywords: parse_list(params.keywords.as_deref().unwrap_or_default()),
        locations: parse_list(params.locations.as_deref().unwrap_or_default()),
        companies: parse_list(params.companies.as_deref().unwrap_or_default()),
    };

    let pairs = criteria.pair_count();
    if pairs == 0 {
        return Ok(Json(JobsResponse {
            total_results: 0,
            results: vec![],
        }));
    }
    if pairs > MAX_API_PAIRS {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "{} keyword/location pairs requested, at most {} allowed",
                pairs, MAX_API_PAIRS
            ),
        ));
    }

    let results = run_fetch(state.fetcher_config.clone(), criteria)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Search failed: {:#}", e);
            vec![]
        });

    Ok(Json(JobsResponse {
        total_results: results.len(),
        results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::DigestTask;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::NaiveTime;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state(base_url: &str, with_scheduler: bool) -> Arc<AppState> {
        let task: DigestTask = Arc::new(|_: &Subscription| {});
        Arc::new(AppState {
            fetcher_config: FetcherConfig {
                base_url: base_url.to_string(),
                request_delay: Duration::ZERO,
                retry: job_scraper::RetryPolicy::none(),
                ..FetcherConfig::default()
            },
            scheduler: with_scheduler.then(|| {
                DigestScheduler::new(
                    NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                    Duration::from_secs(60),
                    task,
                )
            }),
        })
    }

    fn form_post(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_renders_form() {
        let app = build_app(state("http://127.0.0.1:9", false));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Search Jobs Now"));
        assert!(html.contains("Start Daily Email Notifications"));
    }

    #[tokio::test]
    async fn test_search_lists_jobs() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/jobs")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"<a class="tapItem" href="/a"><h2>Chauffeur VTC</h2><span class="companyName">Uber</span></a>
                   <a class="tapItem" href="/b"><h2>Chauffeur PL</h2><span class="companyName">Geodis</span></a>"#,
            )
            .create_async()
            .await;

        let app = build_app(state(&server.url(), false));
        let response = app
            .oneshot(form_post("/search", "category=Chauffeur&locations=France"))
            .await
            .unwrap();

        let html = body_text(response).await;
        assert!(html.contains("2 jobs found!"));
        assert!(html.contains("<strong>Chauffeur VTC</strong> at <em>Uber</em> – France"));
    }

    #[tokio::test]
    async fn test_search_without_results_warns() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/jobs")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let app = build_app(state(&server.url(), false));
        let response = app
            .oneshot(form_post("/search", "category=Chauffeur&locations=France"))
            .await
            .unwrap();

        assert!(body_text(response).await.contains("No jobs found."));
    }

    #[tokio::test]
    async fn test_search_without_category_warns() {
        let app = build_app(state("http://127.0.0.1:9", false));
        let response = app
            .oneshot(form_post("/search", "locations=France"))
            .await
            .unwrap();

        assert!(body_text(response).await.contains("Select at least one job category"));
    }

    #[tokio::test]
    async fn test_notifications_require_email() {
        let app = build_app(state("http://127.0.0.1:9", true));
        let response = app
            .oneshot(form_post("/notifications", "category=Chauffeur&locations=France&email="))
            .await
            .unwrap();

        assert!(body_text(response).await.contains("Please enter a valid email address."));
    }

    #[tokio::test]
    async fn test_notifications_disabled_without_smtp() {
        let app = build_app(state("http://127.0.0.1:9", false));
        let response = app
            .oneshot(form_post(
                "/notifications",
                "category=Chauffeur&locations=France&email=me%40example.com",
            ))
            .await
            .unwrap();

        assert!(body_text(response).await.contains("not configured"));
    }

    #[tokio::test]
    async fn test_notifications_subscribe() {
        let state = state("http://127.0.0.1:9", true);
        let app = build_app(Arc::clone(&state));
        let response = app
            .oneshot(form_post(
                "/notifications",
                "category=Chauffeur&locations=France%2C+Belgique&email=me%40example.com",
            ))
            .await
            .unwrap();

        assert!(
            body_text(response)
                .await
                .contains("Daily email alerts scheduled for me@example.com at 08:00")
        );

        let response = build_app(Arc::clone(&state))
            .oneshot(form_post(
                "/notifications",
                "category=Chauffeur&locations=France%2C+Belgique&email=me%40example.com",
            ))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("Daily email alerts updated"));

        let scheduler = state.scheduler.as_ref().unwrap();
        let current = scheduler.subscription("me@example.com").unwrap();
        assert_eq!(current.criteria.keywords, vec!["chauffeur"]);
        assert_eq!(current.criteria.locations, vec!["France", "Belgique"]);
        assert_eq!(scheduler.subscriptions().len(), 1);
    }

    #[tokio::test]
    async fn test_second_subscriber_keeps_first() {
        let state = state("http://127.0.0.1:9", true);
        for body in [
            "category=Chauffeur&locations=France&email=alice%40example.com",
            "category=Jardinier&locations=Suisse&email=bob%40example.com",
        ] {
            let response = build_app(Arc::clone(&state))
                .oneshot(form_post("/notifications", body))
                .await
                .unwrap();
            assert!(body_text(response).await.contains("Daily email alerts scheduled"));
        }

        let scheduler = state.scheduler.as_ref().unwrap();
        assert_eq!(scheduler.subscriptions().len(), 2);
        assert_eq!(
            scheduler.subscription("alice@example.com").unwrap().criteria.keywords,
            vec!["chauffeur"]
        );
        assert_eq!(
            scheduler.subscription("bob@example.com").unwrap().criteria.keywords,
            vec!["jardinier"]
        );
    }

    #[tokio::test]
    async fn test_api_jobs_rejects_too_many_pairs() {
        // No mock server: the request must be refused before any fetch.
        let app = build_app(state("http://127.0.0.1:9", false));
        let keywords: Vec<String> = (0..MAX_API_PAIRS).map(|i| format!("k{i}")).collect();
        let uri = format!(
            "/api/jobs?keywords={}&locations=France,Suisse",
            keywords.join(",")
        );
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("at most 12 allowed"));
    }

    #[tokio::test]
    async fn test_api_jobs_without_pairs_is_empty() {
        let app = build_app(state("http://127.0.0.1:9", false));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/jobs?keywords=chauffeur")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["total_results"], 0);
    }

    #[tokio::test]
    async fn test_api_jobs_filters_by_company() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/jobs")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"<a class="tapItem" href="/a"><h2>Technicien</h2><span class="companyName">TechCorp</span></a>
                   <a class="tapItem" href="/b"><h2>Technicien</h2><span class="companyName">Acme</span></a>"#,
            )
            .create_async()
            .await;

        let app = build_app(state(&server.url(), false));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/jobs?keywords=technicien&locations=France&companies=tech")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["total_results"], 1);
        assert_eq!(json["results"][0]["company"], "TechCorp");
        assert_eq!(json["results"][0]["location"], "France");
    }
}
