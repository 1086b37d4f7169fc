//! Read-only HTTP view of the persisted digest, plus "recompute now".

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path as UrlPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::job::{load_digest, DigestItem, DigestJob};
use crate::sources::load_sources;

#[derive(Clone)]
pub struct AppState {
    pub job: Arc<DigestJob>,
}

impl AppState {
    pub fn new(job: DigestJob) -> Self {
        Self { job: Arc::new(job) }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/readyz", get(readyz))
        .route("/v1/digest", get(get_digest))
        .route("/v1/articles", get(list_articles))
        .route("/v1/articles/{id}", get(get_article))
        .route("/v1/sources", get(get_sources))
        .route("/admin/recompute", post(recompute))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn not_generated() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "daily digest not generated",
            "hint": "run: cargo run --bin digest_job, or POST /admin/recompute",
        })),
    )
        .into_response()
}

fn bad_request(msg: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
}

/// Ready when the data dir can be listed and the source config loads.
async fn readyz(State(state): State<AppState>) -> Response {
    let cfg = state.job.pipeline().config();
    let data_dir = cfg
        .digest_path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let check = std::fs::read_dir(data_dir)
        .with_context(|| format!("reading data dir {}", data_dir.display()))
        .and_then(|_| load_sources(&cfg.sources_path).map_err(anyhow::Error::from));
    match check {
        Ok(_) => Json(json!({ "status": "ready" })).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "error": format!("{e:#}") })),
        )
            .into_response(),
    }
}

async fn get_digest(State(state): State<AppState>) -> Response {
    match load_digest(state.job.digest_path()) {
        Some(record) => Json(record).into_response(),
        None => not_generated(),
    }
}

const DEFAULT_PAGE_LIMIT: usize = 20;
const MAX_PAGE_LIMIT: usize = 100;

/// Raw query strings; unparsable numbers fall back to their defaults.
#[derive(Debug, Default, Deserialize)]
struct ArticleQuery {
    limit: Option<String>,
    offset: Option<String>,
    q: Option<String>,
    source: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

fn int_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_bound(raw: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>, Response> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => DateTime::parse_from_rfc3339(v)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| bad_request(&format!("invalid {name}, expected RFC3339"))),
    }
}

fn matches(item: &DigestItem, needle: Option<&str>, source: Option<&str>) -> bool {
    if source.is_some_and(|s| item.source_id != s) {
        return false;
    }
    needle.map_or(true, |n| {
        item.title.to_lowercase().contains(n) || item.summary.to_lowercase().contains(n)
    })
}

/// Digest items, newest first, filtered and paginated.
async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<ArticleQuery>,
) -> Response {
    let limit = int_or(query.limit.as_deref(), DEFAULT_PAGE_LIMIT as i64)
        .clamp(1, MAX_PAGE_LIMIT as i64) as usize;
    let offset = int_or(query.offset.as_deref(), 0).max(0) as usize;
    let from = match parse_bound(query.from.as_deref(), "from") {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let to = match parse_bound(query.to.as_deref(), "to") {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            return bad_request("invalid time range: from must be before or equal to to");
        }
    }

    let Some(record) = load_digest(state.job.digest_path()) else {
        return not_generated();
    };

    let needle = query
        .q
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());
    let source = query.source.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let mut items: Vec<DigestItem> = record
        .items
        .into_iter()
        .filter(|it| matches(it, needle.as_deref(), source))
        .filter(|it| from.map_or(true, |f| it.published_at >= f))
        .filter(|it| to.map_or(true, |t| it.published_at <= t))
        .collect();
    items.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| a.link.cmp(&b.link))
    });
    let total = items.len();
    let page: Vec<DigestItem> = items.into_iter().skip(offset).take(limit).collect();

    Json(json!({
        "items": page,
        "limit": limit,
        "offset": offset,
        "total": total,
    }))
    .into_response()
}

async fn get_article(State(state): State<AppState>, UrlPath(id): UrlPath<String>) -> Response {
    let Some(record) = load_digest(state.job.digest_path()) else {
        return not_generated();
    };
    match record.items.into_iter().find(|it| it.id == id) {
        Some(item) => Json(item).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "article not found" })),
        )
            .into_response(),
    }
}

#[derive(serde::Serialize)]
struct SourceRow {
    source_id: String,
    name: String,
    score: f64,
    slots_today: u32,
}

/// Ranked source table: score desc, then id.
async fn get_sources(State(state): State<AppState>) -> Response {
    let Some(record) = load_digest(state.job.digest_path()) else {
        return not_generated();
    };

    // Names are cosmetic; fall back to ids if the config cannot be read.
    let names: HashMap<String, String> =
        load_sources(&state.job.pipeline().config().sources_path)
            .map(|v| v.into_iter().map(|s| (s.id, s.name)).collect())
            .unwrap_or_default();

    let mut rows: Vec<SourceRow> = record
        .scores
        .iter()
        .map(|(id, &score)| SourceRow {
            source_id: id.clone(),
            name: names.get(id).cloned().unwrap_or_else(|| id.clone()),
            score,
            slots_today: record.slots.get(id).copied().unwrap_or(0),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.source_id.cmp(&b.source_id))
    });
    Json(rows).into_response()
}

async fn recompute(State(state): State<AppState>) -> Response {
    match state.job.run_once().await {
        Ok(record) => Json(json!({
            "status": "ok",
            "generated_at": record.generated_at,
            "items": record.items.len(),
            "fallback_from_previous": record.fallback_from_previous,
            "notes": record.notes,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(target: "digest", error = ?e, "recompute failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "error": format!("{e:#}") })),
            )
                .into_response()
        }
    }
}
