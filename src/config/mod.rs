// src/config/mod.rs
//! Runtime configuration for the digest job and the HTTP API.
//!
//! Lookup order:
//! 1) `$DIGEST_CONFIG_PATH` (must exist)
//! 2) `config/digest.toml`
//! 3) built-in defaults
//!
//! Afterwards `DIGEST_DATA_DIR` re-roots the three data files and
//! `DIGEST_TOTAL_SLOTS` overrides the slot budget.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::providers::http::DEFAULT_USER_AGENT;
use crate::select::{SelectionPolicy, DEFAULT_OUTPUT_CAP, DEFAULT_RESEARCH_QUOTA};
use crate::slots::{DEFAULT_MAX_SLOTS_PER_SOURCE, DEFAULT_TOTAL_SLOTS};

pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const ENV_DATA_DIR: &str = "DIGEST_DATA_DIR";
pub const ENV_TOTAL_SLOTS: &str = "DIGEST_TOTAL_SLOTS";
pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";

fn default_sources_path() -> PathBuf {
    PathBuf::from("data/sources.json")
}
fn default_weights_path() -> PathBuf {
    PathBuf::from("data/weights.json")
}
fn default_digest_path() -> PathBuf {
    PathBuf::from("data/daily_digest.json")
}
fn default_total_slots() -> u32 {
    DEFAULT_TOTAL_SLOTS
}
fn default_max_slots() -> u32 {
    DEFAULT_MAX_SLOTS_PER_SOURCE
}
fn default_research_quota() -> u32 {
    DEFAULT_RESEARCH_QUOTA
}
fn default_fetch_timeout_secs() -> u64 {
    15
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default = "default_sources_path")]
    pub sources_path: PathBuf,
    #[serde(default = "default_weights_path")]
    pub weights_path: PathBuf,
    #[serde(default = "default_digest_path")]
    pub digest_path: PathBuf,
    /// Daily slot budget; also the digest length cap.
    #[serde(default = "default_total_slots")]
    pub total_slots: u32,
    #[serde(default = "default_max_slots")]
    pub max_slots_per_source: u32,
    #[serde(default = "default_research_quota")]
    pub research_quota: u32,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            sources_path: default_sources_path(),
            weights_path: default_weights_path(),
            digest_path: default_digest_path(),
            total_slots: default_total_slots(),
            max_slots_per_source: default_max_slots(),
            research_quota: default_research_quota(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl DigestConfig {
    /// Load from an explicit TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading digest config from {}", path.display()))?;
        let cfg: DigestConfig = toml::from_str(&content)
            .with_context(|| format!("parsing digest config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks, then apply env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_CONFIG_PATH))?
        } else {
            Self::default()
        };

        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            cfg = cfg.with_data_dir(Path::new(&dir));
        }
        if let Some(n) = std::env::var(ENV_TOTAL_SLOTS)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
        {
            cfg.total_slots = n;
        }
        Ok(cfg.sanitized())
    }

    /// Place the three data files under `dir`, keeping their file names.
    pub fn with_data_dir(mut self, dir: &Path) -> Self {
        let rebase = |p: &Path| dir.join(p.file_name().unwrap_or(p.as_os_str()));
        self.sources_path = rebase(&self.sources_path);
        self.weights_path = rebase(&self.weights_path);
        self.digest_path = rebase(&self.digest_path);
        self
    }

    fn sanitized(mut self) -> Self {
        self.total_slots = self.total_slots.max(1);
        self.max_slots_per_source = self.max_slots_per_source.max(1);
        self.fetch_timeout_secs = self.fetch_timeout_secs.clamp(1, 300);
        if self.user_agent.trim().is_empty() {
            self.user_agent = default_user_agent();
        }
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            research_quota: self.research_quota,
            output_cap: usize::try_from(self.total_slots).unwrap_or(DEFAULT_OUTPUT_CAP),
        }
    }
}
