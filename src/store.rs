//! Versioned JSON persistence: the weekly score cache and generic
//! atomic read/write helpers shared with the digest record.
//!
//! The score cache is read-check-maybe-write. The whole sequence runs under
//! an exclusive lock on a sibling `.lock` file so two job instances cannot
//! interleave their read and write. The lock is polled without blocking the
//! runtime; after [`DEFAULT_LOCK_WAIT`] the run proceeds unlocked.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use metrics::counter;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::types::Article;
use crate::scoring::{compute_scores, score_window, ScoreMetrics, ScoreSet, ALGORITHM_VERSION};
use crate::sources::Source;

/// Read and deserialize `path`. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let v = serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(v))
}

/// Serialize `value` as pretty JSON into `path` via temp file + rename.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let tmp = sibling(path, "tmp");
    {
        let mut f = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        serde_json::to_writer_pretty(&mut f, value).context("serializing json")?;
        f.write_all(b"\n")?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}

/// Persisted score cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsRecord {
    pub algorithm_version: String,
    pub updated_at: DateTime<Utc>,
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub metrics: BTreeMap<String, ScoreMetrics>,
}

impl WeightsRecord {
    pub fn into_score_set(self) -> ScoreSet {
        ScoreSet {
            scores: self.scores,
            metrics: self.metrics,
        }
    }
}

/// Why the cached scores were not reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    Absent,
    Unreadable,
    VersionMismatch,
    Expired,
    MissingSources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "cache", content = "reason")]
pub enum CacheOutcome {
    Hit,
    Miss(MissReason),
}

pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(10);
const LOCK_POLL: Duration = Duration::from_millis(25);

/// File-backed score cache.
#[derive(Debug, Clone)]
pub struct WeightsStore {
    path: PathBuf,
    lock_wait: Duration,
}

/// Holds the exclusive cache lock until dropped.
struct LockGuard(File);

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.0.unlock();
    }
}

impl WeightsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    /// How long to wait for another holder of the cache lock.
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record; any read or parse failure counts as a miss.
    pub fn load(&self) -> std::result::Result<WeightsRecord, MissReason> {
        match read_json::<WeightsRecord>(&self.path) {
            Ok(Some(r)) => Ok(r),
            Ok(None) => Err(MissReason::Absent),
            Err(e) => {
                tracing::warn!(target: "scoring", error = ?e, "weights cache unreadable; recomputing");
                Err(MissReason::Unreadable)
            }
        }
    }

    pub fn save(&self, record: &WeightsRecord) -> Result<()> {
        write_json_atomic(&self.path, record)
    }

    async fn lock(&self) -> Result<LockGuard> {
        let lock_path = self.lock_path();
        if let Some(dir) = lock_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("opening {}", lock_path.display()))?;

        let contended = fs2::lock_contended_error().kind();
        let deadline = tokio::time::Instant::now() + self.lock_wait;
        loop {
            match f.try_lock_exclusive() {
                Ok(()) => return Ok(LockGuard(f)),
                Err(e) if e.kind() == contended && tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(LOCK_POLL).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("locking {}", lock_path.display()))
                }
            }
        }
    }

    /// Reuse the cached scores when they are same-version, younger than the
    /// scoring window, and cover every source; otherwise recompute and persist.
    pub async fn load_or_update_scores(
        &self,
        sources: &[Source],
        articles: &[Article],
        now: DateTime<Utc>,
    ) -> (ScoreSet, CacheOutcome) {
        let _guard = match self.lock().await {
            Ok(g) => Some(g),
            Err(e) => {
                tracing::warn!(target: "scoring", error = ?e, "weights lock unavailable; continuing unlocked");
                None
            }
        };

        let reason = match self.load() {
            Ok(record) => match check_record(&record, sources, now) {
                None => {
                    counter!("scores_cache_hits_total").increment(1);
                    tracing::info!(
                        target: "scoring",
                        updated_at = %record.updated_at,
                        "reusing cached weekly scores"
                    );
                    return (record.into_score_set(), CacheOutcome::Hit);
                }
                Some(reason) => reason,
            },
            Err(reason) => reason,
        };

        let set = compute_scores(sources, articles, now);
        let record = WeightsRecord {
            algorithm_version: ALGORITHM_VERSION.to_string(),
            updated_at: now,
            scores: set.scores.clone(),
            metrics: set.metrics.clone(),
        };
        if let Err(e) = self.save(&record) {
            tracing::warn!(target: "scoring", error = ?e, "failed to persist weekly scores");
        }
        counter!("scores_recomputed_total").increment(1);
        tracing::info!(target: "scoring", ?reason, sources = sources.len(), "weekly scores recomputed");
        (set, CacheOutcome::Miss(reason))
    }
}

/// `None` when the record may be reused as-is.
fn check_record(record: &WeightsRecord, sources: &[Source], now: DateTime<Utc>) -> Option<MissReason> {
    if record.algorithm_version != ALGORITHM_VERSION {
        return Some(MissReason::VersionMismatch);
    }
    let age = now - record.updated_at;
    // A timestamp from the future is as untrustworthy as an old one.
    if age < chrono::Duration::zero() || age >= score_window() {
        return Some(MissReason::Expired);
    }
    if !sources.iter().all(|s| record.scores.contains_key(&s.id)) {
        return Some(MissReason::MissingSources);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_json_missing_is_none_and_garbage_is_err() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("x.json");
        assert!(read_json::<WeightsRecord>(&p).unwrap().is_none());
        fs::write(&p, "{oops").unwrap();
        assert!(read_json::<WeightsRecord>(&p).is_err());
    }

    #[test]
    fn atomic_write_creates_parent_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nested").join("w.json");
        let rec = WeightsRecord {
            algorithm_version: "v".into(),
            updated_at: Utc::now(),
            scores: BTreeMap::from([("a".to_string(), 1.0)]),
            metrics: BTreeMap::new(),
        };
        write_json_atomic(&p, &rec).unwrap();
        let back: WeightsRecord = read_json(&p).unwrap().unwrap();
        assert_eq!(back, rec);
        assert!(!sibling(&p, "tmp").exists());
    }

    #[tokio::test]
    async fn contended_lock_is_polled_without_stalling_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = WeightsStore::new(dir.path().join("weights.json"));
        let held = File::create(store.lock_path()).unwrap();
        held.lock_exclusive().unwrap();

        // Single-threaded runtime: the release below only runs if the lock
        // wait yields back to the scheduler.
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            held.unlock().unwrap();
        });
        let guard = tokio::time::timeout(Duration::from_secs(5), store.lock())
            .await
            .expect("lock wait stalled")
            .unwrap();
        release.await.unwrap();
        drop(guard);
    }

    #[tokio::test]
    async fn lock_gives_up_after_the_wait() {
        let dir = tempfile::tempdir().unwrap();
        let store = WeightsStore::new(dir.path().join("weights.json"))
            .with_lock_wait(Duration::from_millis(60));
        let held = File::create(store.lock_path()).unwrap();
        held.lock_exclusive().unwrap();

        assert!(store.lock().await.is_err());
        held.unlock().unwrap();
        assert!(store.lock().await.is_ok());
    }

    #[test]
    fn sibling_appends_extension() {
        let p = Path::new("data/weights.json");
        assert_eq!(sibling(p, "lock"), PathBuf::from("data/weights.json.lock"));
    }
}
