// tests/api_http.rs
//
// HTTP surface over a temp data dir:
// - /health liveness
// - /v1/digest 404 before the first run, 200 after POST /admin/recompute
// - /v1/sources ranked by score
// - a broken source config turns recompute into a 500
// - /v1/articles paging, filters and time-range validation
// - /v1/articles/{id} by link id
// - /readyz follows data dir and source config readability

use std::path::Path;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::Router;
use chrono::{TimeZone, Utc};
use http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt; // for `oneshot`

use news_digest::api::{router, AppState};
use news_digest::ingest::providers::StaticFeedFetcher;
use news_digest::job::link_id;
use news_digest::{DigestConfig, DigestJob, FixedClock, Pipeline};

const ALPHA: &str = include_str!("fixtures/alpha_rss.xml");
const BETA: &str = include_str!("fixtures/beta_atom.xml");

fn app(dir: &Path, sources: Option<&str>) -> Router {
    if let Some(json) = sources {
        std::fs::write(dir.join("sources.json"), json).unwrap();
    }
    let fetcher = StaticFeedFetcher::new()
        .with_feed("https://alpha.test/rss", ALPHA)
        .with_feed("https://beta.test/atom", BETA);
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap());
    let cfg = DigestConfig::default().with_data_dir(dir);
    let job = DigestJob::new(Pipeline::new(cfg, Arc::new(fetcher), Arc::new(clock)));
    router(AppState::new(job))
}

const SOURCES: &str = r#"[
  {"id": "alpha", "name": "Alpha Daily", "rss": "https://alpha.test/rss", "base_authority": 1.0},
  {"id": "beta", "name": "Beta Wire", "rss": "https://beta.test/atom", "base_authority": 1.2},
  {"id": "quiet", "name": "Quiet Gazette", "rss": "https://quiet.test/rss", "base_authority": 0.5}
]"#;

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_ok() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Some(SOURCES));
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn digest_is_404_until_recomputed() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Some(SOURCES));

    let (status, body) = send(&app, "GET", "/v1/digest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "daily digest not generated");
    assert!(body["hint"].as_str().unwrap().contains("/admin/recompute"));

    let (status, body) = send(&app, "POST", "/admin/recompute").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["items"], 5);
    assert_eq!(body["fallback_from_previous"], false);

    let (status, body) = send(&app, "GET", "/v1/digest").await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(items[0]["link"], "https://beta.test/auto-paper");
    assert_eq!(items[0]["id"].as_str().unwrap().len(), 12);
    assert_eq!(body["research_target"], 2);
    assert_eq!(body["research_selected"], 2);
    assert_eq!(body["slots"]["quiet"], 3);
    assert!(body["metrics"]["alpha"]["impact_factor"].is_number());
}

#[tokio::test]
async fn sources_are_ranked_by_score() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Some(SOURCES));

    let (status, _) = send(&app, "GET", "/v1/sources").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, "POST", "/admin/recompute").await;
    let (status, body) = send(&app, "GET", "/v1/sources").await;
    assert_eq!(status, StatusCode::OK);

    let rows = body.as_array().unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r["source_id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["beta", "alpha", "quiet"]);
    assert_eq!(rows[0]["name"], "Beta Wire");
    assert_eq!(rows[2]["score"], 0.5);
    assert_eq!(rows[2]["slots_today"], 3);
}

#[tokio::test]
async fn recompute_without_sources_is_500() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), None);

    let (status, body) = send(&app, "POST", "/admin/recompute").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("source"));

    let (status, _) = send(&app, "GET", "/v1/digest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Some(SOURCES));
    let (status, _) = send(&app, "GET", "/v2/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn links(body: &Value) -> Vec<&str> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|it| it["link"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn articles_page_newest_first_with_clamped_limit() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Some(SOURCES));

    let (status, body) = send(&app, "GET", "/v1/articles").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "daily digest not generated");

    send(&app, "POST", "/admin/recompute").await;

    let (status, body) = send(&app, "GET", "/v1/articles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 20);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["total"], 5);
    assert_eq!(links(&body)[0], "https://beta.test/auto-paper");

    let (_, body) = send(&app, "GET", "/v1/articles?limit=2&offset=1").await;
    assert_eq!(
        links(&body),
        vec!["https://alpha.test/ev-range", "https://alpha.test/ai-chip"]
    );

    let (_, body) = send(&app, "GET", "/v1/articles?limit=0").await;
    assert_eq!(body["limit"], 1);
    assert_eq!(links(&body).len(), 1);

    let (_, body) = send(&app, "GET", "/v1/articles?limit=500").await;
    assert_eq!(body["limit"], 100);

    let (_, body) = send(&app, "GET", "/v1/articles?limit=abc&offset=-4").await;
    assert_eq!(body["limit"], 20);
    assert_eq!(body["offset"], 0);
    assert_eq!(links(&body).len(), 5);

    let (_, body) = send(&app, "GET", "/v1/articles?offset=9").await;
    assert!(links(&body).is_empty());
    assert_eq!(body["total"], 5);
}

#[tokio::test]
async fn articles_filter_by_text_source_and_time() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Some(SOURCES));
    send(&app, "POST", "/admin/recompute").await;

    let (_, body) = send(&app, "GET", "/v1/articles?q=ELECTION").await;
    assert_eq!(links(&body), vec!["https://alpha.test/election"]);

    // Summary text is searched too.
    let (_, body) = send(&app, "GET", "/v1/articles?q=three-year").await;
    assert_eq!(links(&body), vec!["https://beta.test/auto-paper"]);

    let (_, body) = send(&app, "GET", "/v1/articles?source=beta").await;
    assert_eq!(
        links(&body),
        vec!["https://beta.test/auto-paper", "https://beta.test/esports"]
    );

    let (status, body) = send(
        &app,
        "GET",
        "/v1/articles?from=2025-06-10T08:30:00Z&to=2025-06-10T10:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        links(&body),
        vec!["https://alpha.test/ev-range", "https://alpha.test/ai-chip"]
    );
}

#[tokio::test]
async fn articles_reject_bad_time_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Some(SOURCES));
    send(&app, "POST", "/admin/recompute").await;

    let (status, body) = send(&app, "GET", "/v1/articles?from=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid from, expected RFC3339");

    let (status, body) = send(&app, "GET", "/v1/articles?to=2025-06-10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid to, expected RFC3339");

    let (status, body) = send(
        &app,
        "GET",
        "/v1/articles?from=2025-06-11T00:00:00Z&to=2025-06-10T00:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "invalid time range: from must be before or equal to to"
    );
}

#[tokio::test]
async fn article_lookup_by_link_id() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Some(SOURCES));
    send(&app, "POST", "/admin/recompute").await;

    let id = link_id("https://alpha.test/election");
    let (status, body) = send(&app, "GET", &format!("/v1/articles/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["title"], "Parliament debates new election rules");
    assert_eq!(body["source_name"], "Alpha Daily");

    let (status, body) = send(&app, "GET", "/v1/articles/000000000000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "article not found");
}

#[tokio::test]
async fn readyz_tracks_source_config() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), None);

    let (status, body) = send(&app, "GET", "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");
    assert!(body["error"].as_str().unwrap().contains("sources.json"));

    std::fs::write(dir.path().join("sources.json"), SOURCES).unwrap();
    let (status, body) = send(&app, "GET", "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn readyz_fails_when_data_dir_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir(&data).unwrap();
    let app = app(&data, Some(SOURCES));
    std::fs::remove_dir_all(&data).unwrap();

    let (status, body) = send(&app, "GET", "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("data dir"));
}
