// src/ingest/mod.rs
pub mod feed;
pub mod providers;
pub mod types;

use crate::classify::classify;
use crate::ingest::feed::parse_timestamp;
use crate::ingest::types::{Article, FeedFetcher, RawEntry};
use crate::sources::Source;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

/// Titles shorter than this (after trimming) are treated as junk.
pub const MIN_TITLE_CHARS: usize = 8;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_entries_total", "Raw entries parsed from feeds.");
        describe_counter!(
            "ingest_kept_total",
            "Entries kept after validation + classification."
        );
        describe_counter!(
            "ingest_dropped_total",
            "Entries dropped as untrustworthy, undated, off-topic or duplicate."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Feed fetch/parse failures (source skipped for the run)."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Normalize feed text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Source must be configured, title long enough, link plain HTTP(S).
pub fn is_trustworthy(allowed_ids: &HashSet<&str>, source_id: &str, title: &str, link: &str) -> bool {
    if !allowed_ids.contains(source_id) {
        return false;
    }
    if title.trim().chars().count() < MIN_TITLE_CHARS {
        return false;
    }
    link.starts_with("http://") || link.starts_with("https://")
}

/// Validate and classify the raw entries of one source.
/// Returns the kept articles and the number of dropped entries.
pub fn articles_from_entries(
    source: &Source,
    allowed_ids: &HashSet<&str>,
    entries: Vec<RawEntry>,
) -> (Vec<Article>, usize) {
    let mut dropped = 0usize;
    let mut out = Vec::with_capacity(entries.len());

    for e in entries {
        let title = normalize_text(&e.title);
        let link = e.link.trim().to_string();
        if !is_trustworthy(allowed_ids, &source.id, &title, &link) {
            dropped += 1;
            continue;
        }
        let Some(published_at) = e.published.as_deref().and_then(parse_timestamp) else {
            dropped += 1;
            continue;
        };
        let summary = normalize_text(&e.summary);
        let c = classify(&title, &summary);
        if c.categories.is_empty() {
            dropped += 1;
            continue;
        }
        out.push(Article {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            title,
            link,
            published_at,
            summary,
            categories: c.categories,
            is_research: c.is_research,
        });
    }

    (out, dropped)
}

/// Outcome of fetching every configured source once.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub articles: Vec<Article>,
    pub dropped: usize,
    /// Sources whose fetch failed; they contribute zero articles.
    pub failed_sources: Vec<String>,
}

/// Fetch and classify all sources. A failing source is logged and skipped;
/// links repeated across the run keep their first occurrence.
pub async fn load_articles(sources: &[Source], fetcher: &dyn FeedFetcher) -> IngestReport {
    ensure_metrics_described();

    let allowed: HashSet<&str> = sources.iter().map(|s| s.id.as_str()).collect();
    let mut report = IngestReport::default();
    let mut seen_links: HashSet<String> = HashSet::new();

    for source in sources {
        let entries = match fetcher.fetch(source).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    target: "ingest",
                    error = ?e,
                    source = %source.id,
                    fetcher = fetcher.name(),
                    "feed fetch failed; skipping source"
                );
                counter!("ingest_source_errors_total").increment(1);
                report.failed_sources.push(source.id.clone());
                continue;
            }
        };

        let (articles, mut dropped) = articles_from_entries(source, &allowed, entries);
        let mut kept = 0usize;
        for a in articles {
            if seen_links.insert(a.link.clone()) {
                report.articles.push(a);
                kept += 1;
            } else {
                dropped += 1;
            }
        }
        report.dropped += dropped;

        tracing::debug!(target: "ingest", source = %source.id, kept, dropped, "source ingested");
        counter!("ingest_kept_total").increment(kept as u64);
        counter!("ingest_dropped_total").increment(dropped as u64);
    }

    report
}
