//! # Digest Selector
//! Picks the bounded daily article set.
//!
//! 1. Research quota: research articles in a priority category, ranked by
//!    source score then recency, each consuming one of its source's slots.
//! 2. Fill: sources by descending score, each taking its remaining slots
//!    from its own articles, newest first.
//! 3. Merge newest first and truncate to the output cap.
//!
//! Links are never selected twice. Every ordering ends in a unique key
//! (link or source id) so ties cannot depend on input order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::ingest::types::Article;
use crate::scoring::ScoreSet;
use crate::slots::SlotAllocation;

pub const DEFAULT_RESEARCH_QUOTA: u32 = 2;
pub const DEFAULT_OUTPUT_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub research_quota: u32,
    pub output_cap: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            research_quota: DEFAULT_RESEARCH_QUOTA,
            output_cap: DEFAULT_OUTPUT_CAP,
        }
    }
}

/// Final article list plus quota bookkeeping and degraded-condition notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub items: Vec<Article>,
    pub research_target: u32,
    pub research_selected: u32,
    pub notes: Vec<String>,
}

fn desc_f64(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Priority research candidates in quota order: source score desc, then
/// newest first, then link.
fn research_pool<'a>(articles: &'a [Article], scores: &ScoreSet) -> Vec<&'a Article> {
    let mut pool: Vec<&Article> = articles.iter().filter(|a| a.is_priority_research()).collect();
    pool.sort_by(|a, b| {
        desc_f64(scores.score_of(&a.source_id), scores.score_of(&b.source_id))
            .then_with(|| b.published_at.cmp(&a.published_at))
            .then_with(|| a.link.cmp(&b.link))
    });
    pool
}

/// Select the digest. Consumes `slots` and returns what capacity is left.
pub fn select_articles(
    articles: &[Article],
    mut slots: SlotAllocation,
    scores: &ScoreSet,
    policy: SelectionPolicy,
) -> (Selection, SlotAllocation) {
    let mut selected: Vec<&Article> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    // --- Pass 1: research quota ---
    let mut quota_hits = 0u32;
    for a in research_pool(articles, scores) {
        if quota_hits >= policy.research_quota {
            break;
        }
        if seen.contains(a.link.as_str()) {
            continue;
        }
        if !slots.take_one(&a.source_id) {
            continue;
        }
        seen.insert(a.link.as_str());
        selected.push(a);
        quota_hits += 1;
    }

    // --- Pass 2: fill by source rank ---
    let mut by_source: BTreeMap<&str, Vec<&Article>> = BTreeMap::new();
    for a in articles {
        by_source.entry(a.source_id.as_str()).or_default().push(a);
    }
    for list in by_source.values_mut() {
        list.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.link.cmp(&b.link))
        });
    }

    let mut ranked: Vec<(String, f64)> = slots
        .iter()
        .map(|(id, _)| (id.to_string(), scores.score_of(id)))
        .collect();
    ranked.sort_by(|a, b| desc_f64(a.1, b.1).then_with(|| a.0.cmp(&b.0)));

    for (source_id, _) in &ranked {
        let Some(list) = by_source.get(source_id.as_str()) else {
            continue;
        };
        for a in list {
            if slots.get(source_id) == 0 {
                break;
            }
            if !seen.insert(a.link.as_str()) {
                continue;
            }
            slots.take_one(source_id);
            selected.push(a);
        }
    }

    // --- Merge ---
    selected.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| desc_f64(scores.score_of(&a.source_id), scores.score_of(&b.source_id)))
            .then_with(|| a.link.cmp(&b.link))
    });
    selected.truncate(policy.output_cap);

    let items: Vec<Article> = selected.into_iter().cloned().collect();
    let research_selected = items.iter().filter(|a| a.is_priority_research()).count() as u32;

    let mut notes = Vec::new();
    if items.len() < policy.output_cap {
        notes.push(format!(
            "only {} articles met the criteria today (target {})",
            items.len(),
            policy.output_cap
        ));
    }
    if research_selected < policy.research_quota {
        notes.push(format!(
            "research quota of {} not met; included all {} available AI/auto research articles",
            policy.research_quota, research_selected
        ));
    }

    tracing::debug!(
        target: "digest",
        items = items.len(),
        research_selected,
        slots_left = slots.total(),
        "selection finished"
    );

    (
        Selection {
            items,
            research_target: policy.research_quota,
            research_selected,
            notes,
        },
        slots,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Category;
    use chrono::{Duration, TimeZone, Utc};

    fn art(source: &str, n: i64, research: bool, cat: Category) -> Article {
        Article {
            source_id: source.into(),
            source_name: source.into(),
            title: format!("{source} headline {n}"),
            link: format!("https://{source}.test/{n}"),
            published_at: Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap() + Duration::hours(n),
            summary: String::new(),
            categories: [cat].into_iter().collect(),
            is_research: research,
        }
    }

    fn scores(pairs: &[(&str, f64)]) -> ScoreSet {
        ScoreSet {
            scores: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            metrics: BTreeMap::new(),
        }
    }

    fn slots(pairs: &[(&str, u32)]) -> SlotAllocation {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn research_quota_is_served_first_even_from_low_ranked_source() {
        let articles = vec![
            art("a", 10, false, Category::Games),
            art("a", 11, false, Category::Games),
            art("b", 1, true, Category::Ai),
            art("b", 2, false, Category::Politics),
        ];
        let (sel, left) = select_articles(
            &articles,
            slots(&[("a", 2), ("b", 1)]),
            &scores(&[("a", 3.0), ("b", 1.0)]),
            SelectionPolicy::default(),
        );
        let links: Vec<&str> = sel.items.iter().map(|a| a.link.as_str()).collect();
        // b's single slot went to its research article, not its newer one.
        assert_eq!(links, vec!["https://a.test/11", "https://a.test/10", "https://b.test/1"]);
        assert_eq!(sel.research_selected, 1);
        assert_eq!(left.total(), 0);
    }

    #[test]
    fn research_pool_orders_by_score_then_recency_then_link() {
        let mut twin = art("mid", 9, true, Category::Auto);
        twin.link = "https://mid.test/09".into();
        let articles = vec![
            art("low", 20, true, Category::Ai),
            art("mid", 5, true, Category::Ai),
            art("top", 1, true, Category::Auto),
            art("mid", 9, true, Category::Ai),
            twin,
            art("top", 2, false, Category::Ai),
            art("top", 3, true, Category::Politics),
        ];
        let pool = research_pool(&articles, &scores(&[("top", 3.0), ("mid", 2.0), ("low", 1.0)]));
        let links: Vec<&str> = pool.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://top.test/1",
                "https://mid.test/09",
                "https://mid.test/9",
                "https://mid.test/5",
                "https://low.test/20",
            ]
        );
    }

    #[test]
    fn quota_takes_best_source_then_newest_of_tied_source() {
        // One slot each. The quota picks consume top's and mid's slot, so
        // their non-research articles and mid's older research article stay out.
        let articles = vec![
            art("top", 1, true, Category::Auto),
            art("top", 30, false, Category::Games),
            art("mid", 5, true, Category::Ai),
            art("mid", 9, true, Category::Ai),
            art("mid", 31, false, Category::Games),
            art("low", 20, true, Category::Ai),
            art("low", 32, false, Category::Games),
        ];
        let (sel, left) = select_articles(
            &articles,
            slots(&[("top", 1), ("mid", 1), ("low", 1)]),
            &scores(&[("top", 3.0), ("mid", 2.0), ("low", 1.0)]),
            SelectionPolicy::default(),
        );
        let links: Vec<&str> = sel.items.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://low.test/32", "https://mid.test/9", "https://top.test/1"]
        );
        assert_eq!(sel.research_selected, 2);
        assert_eq!(left.total(), 0);
    }

    #[test]
    fn duplicate_links_are_selected_once() {
        let mut dup = art("b", 5, true, Category::Auto);
        dup.link = "https://a.test/5".into();
        let articles = vec![art("a", 5, true, Category::Auto), dup];
        let (sel, _) = select_articles(
            &articles,
            slots(&[("a", 3), ("b", 3)]),
            &scores(&[("a", 2.0), ("b", 1.0)]),
            SelectionPolicy::default(),
        );
        assert_eq!(sel.items.len(), 1);
        assert_eq!(sel.items[0].source_id, "a");
    }

    #[test]
    fn output_is_capped_and_newest_first() {
        let articles: Vec<Article> = (0..30)
            .map(|n| art(if n % 2 == 0 { "a" } else { "b" }, n, false, Category::Games))
            .collect();
        let policy = SelectionPolicy {
            research_quota: 0,
            output_cap: 4,
        };
        let (sel, _) = select_articles(
            &articles,
            slots(&[("a", 3), ("b", 3)]),
            &scores(&[("a", 1.0), ("b", 1.0)]),
            policy,
        );
        assert_eq!(sel.items.len(), 4);
        assert!(sel
            .items
            .windows(2)
            .all(|w| w[0].published_at >= w[1].published_at));
        assert!(sel.notes.is_empty());
    }

    #[test]
    fn shortfall_and_unmet_quota_are_noted() {
        let articles = vec![art("a", 1, true, Category::Ai), art("a", 2, false, Category::Games)];
        let (sel, _) = select_articles(
            &articles,
            slots(&[("a", 3)]),
            &scores(&[("a", 1.0)]),
            SelectionPolicy::default(),
        );
        assert_eq!(sel.items.len(), 2);
        assert_eq!(sel.research_target, 2);
        assert_eq!(sel.research_selected, 1);
        assert_eq!(sel.notes.len(), 2);
        assert!(sel.notes[0].contains("only 2 articles"));
        assert!(sel.notes[1].contains("included all 1"));
    }

    #[test]
    fn research_in_non_priority_category_does_not_count() {
        let articles = vec![art("a", 1, true, Category::Politics)];
        let (sel, _) = select_articles(
            &articles,
            slots(&[("a", 3)]),
            &scores(&[("a", 1.0)]),
            SelectionPolicy::default(),
        );
        assert_eq!(sel.items.len(), 1);
        assert_eq!(sel.research_selected, 0);
    }
}
