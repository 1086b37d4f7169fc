//! # Classifier
//! Keyword-based topic tagging and research detection for article text.
//!
//! - Categories are not mutually exclusive; an article may carry several.
//! - Matching is case-insensitive and anchored at the start of a word.
//!   Keywords of four or more characters match any word they begin
//!   (`auto` matches "automotive", `research` matches "researchers").
//!   Shorter ones must be the whole word, plural `s` allowed
//!   (`car` matches "cars", not "career"; `ai` never matches "said").
//! - Pure: no I/O, no failure modes. No match yields an empty set / `false`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Topics eligible for the daily digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ai,
    Auto,
    Games,
    Politics,
}

impl Category {
    /// The full target category set, in canonical order.
    pub const ALL: [Category; 4] = [
        Category::Ai,
        Category::Auto,
        Category::Games,
        Category::Politics,
    ];

    /// Categories with the highest editorial priority (research quota pool).
    pub const PRIORITY: [Category; 2] = [Category::Ai, Category::Auto];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Ai => "ai",
            Category::Auto => "auto",
            Category::Games => "games",
            Category::Politics => "politics",
        }
    }

    pub fn is_priority(self) -> bool {
        Self::PRIORITY.contains(&self)
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Category::Ai => &[
                "ai",
                "artificial intelligence",
                "machine learning",
                "llm",
                "robot",
                "deep learning",
            ],
            Category::Auto => &[
                "auto",
                "car",
                "vehicle",
                "ev",
                "electric vehicle",
                "autonomous",
                "battery",
            ],
            Category::Games => &["game", "gaming", "esports", "console"],
            Category::Politics => &[
                "election",
                "government",
                "policy",
                "minister",
                "president",
                "parliament",
                "congress",
            ],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const RESEARCH_KEYWORDS: &[&str] = &[
    "study",
    "studies",
    "research",
    "paper",
    "journal",
    "university",
    "conference",
    "arxiv",
    "nature",
    "science",
];

/// Result of classifying one article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub categories: BTreeSet<Category>,
    pub is_research: bool,
}

impl Classification {
    /// True when the article is research AND carries a priority category.
    pub fn is_priority_research(&self) -> bool {
        self.is_research && self.categories.iter().any(|c| c.is_priority())
    }
}

/// Keywords shorter than this must match a whole word.
const PREFIX_MATCH_MIN_CHARS: usize = 4;

/// Build one alternation regex from a keyword list.
/// Multi-word keywords tolerate any run of whitespace between words.
fn keyword_regex(keywords: &[&str]) -> Regex {
    let pattern = |k: &str| {
        k.split_whitespace()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"\s+")
    };
    let (short, long): (Vec<&str>, Vec<&str>) = keywords
        .iter()
        .copied()
        .partition(|k| k.chars().count() < PREFIX_MATCH_MIN_CHARS);

    let mut alts = Vec::with_capacity(2);
    if !short.is_empty() {
        let words: Vec<String> = short.into_iter().map(pattern).collect();
        alts.push(format!(r"(?:{})s?\b", words.join("|")));
    }
    if !long.is_empty() {
        let stems: Vec<String> = long.into_iter().map(pattern).collect();
        alts.push(format!(r"(?:{})\w*", stems.join("|")));
    }
    // Keyword lists are static; a failure here is a programming error.
    Regex::new(&format!(r"\b(?:{})", alts.join("|"))).expect("static keyword regex")
}

static CATEGORY_RES: Lazy<Vec<(Category, Regex)>> = Lazy::new(|| {
    Category::ALL
        .iter()
        .map(|&c| (c, keyword_regex(c.keywords())))
        .collect()
});

static RESEARCH_RE: Lazy<Regex> = Lazy::new(|| keyword_regex(RESEARCH_KEYWORDS));

/// Tag `title` + `summary` with categories and a research flag.
pub fn classify(title: &str, summary: &str) -> Classification {
    let text = format!("{title} {summary}").to_lowercase();

    let categories = CATEGORY_RES
        .iter()
        .filter(|(_, re)| re.is_match(&text))
        .map(|(c, _)| *c)
        .collect();

    Classification {
        categories,
        is_research: RESEARCH_RE.is_match(&text),
    }
}
