// src/cache/mod.rs — Learning cache: best artifact per query plus issue→fix statistics

pub mod fingerprint;
pub mod schema;
pub mod store;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::chart::Artifact;
use crate::infra::config::CacheConfig;
use fingerprint::{normalize, Fingerprint};
use store::Store;

/// Best-known result for one normalized query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub query: String,
    pub normalized_query: String,
    pub artifact: Artifact,
    pub revision_text: String,
    pub best_score: f64,
    pub created_at: String,
    pub updated_at: String,
}

/// What the loop hands to the cache after a completed run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub query: String,
    pub artifact: Artifact,
    /// Prompt text of the best iteration.
    pub revision_text: String,
    pub combined_score: f64,
    pub iterations: usize,
    pub termination: String,
    /// Distinct rule issue tags seen anywhere in the run.
    pub issues: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub run_id: String,
    pub entry_written: bool,
    pub fixes_added: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueFix {
    pub tag: String,
    pub text: String,
    pub score: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStat {
    pub tag: String,
    pub occurrences: u64,
    pub last_seen: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_runs: u64,
    pub distinct_fingerprints: u64,
    /// `None` until a run has been recorded.
    pub avg_score: Option<f64>,
    pub cached_entries: u64,
    pub issue_tags: u64,
    pub fixes: u64,
}

/// Shared handle over the SQLite store.
///
/// Writers are serialized by the mutex; each call locks, does its work in
/// one transaction and releases. Share it as `Arc<ArtifactCache>`.
pub struct ArtifactCache {
    store: Mutex<Store>,
    config: CacheConfig,
}

impl ArtifactCache {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path, config: CacheConfig) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        schema::run_migrations(&conn)?;
        tracing::debug!(path = %path.display(), "Opened artifact cache");

        Ok(Self {
            store: Mutex::new(Store::new(conn)),
            config,
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory(config: CacheConfig) -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            store: Mutex::new(Store::new(conn)),
            config,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| anyhow::anyhow!("artifact cache lock poisoned"))
    }

    /// Exact hit by fingerprint, trusted only when the stored normalized text
    /// matches the query's.
    pub fn lookup_exact(&self, query: &str) -> anyhow::Result<Option<CacheEntry>> {
        let normalized = normalize(query);
        let fp = Fingerprint::of_normalized(&normalized);
        let entry = self.lock()?.get_entry(fp.as_str())?;

        Ok(entry.filter(|e| {
            let verified = e.normalized_query == normalized;
            if !verified {
                tracing::warn!(fingerprint = %fp, "Fingerprint collision; ignoring cached entry");
            }
            verified
        }))
    }

    /// Record a completed run. The entry is only replaced by an equal or
    /// better score, and only when the score clears `min_entry_score`.
    pub fn record(&self, run: &RunRecord) -> anyhow::Result<RecordOutcome> {
        let normalized = normalize(&run.query);
        let fp = Fingerprint::of_normalized(&normalized);
        let run_id = uuid::Uuid::new_v4().to_string();

        let outcome =
            self.lock()?
                .record_run(&run_id, fp.as_str(), &normalized, run, &self.config)?;

        tracing::info!(
            run_id = %outcome.run_id,
            score = run.combined_score,
            entry_written = outcome.entry_written,
            fixes_added = outcome.fixes_added,
            "Recorded run"
        );
        Ok(outcome)
    }

    /// Highest-scoring remembered fix for an issue tag.
    pub fn best_fix(&self, tag: &str) -> anyhow::Result<Option<IssueFix>> {
        self.lock()?.best_fix(tag)
    }

    pub fn fixes_for(&self, tag: &str, limit: usize) -> anyhow::Result<Vec<IssueFix>> {
        self.lock()?.fixes_for(tag, limit)
    }

    pub fn top_issues(&self, limit: usize) -> anyhow::Result<Vec<IssueStat>> {
        self.lock()?.top_issues(limit)
    }

    pub fn stats(&self) -> anyhow::Result<CacheStats> {
        self.lock()?.stats()
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        self.lock()?.clear()
    }

    pub fn reset_fixes(&self) -> anyhow::Result<()> {
        self.lock()?.reset_fixes()
    }

    /// Entries whose normalized query is close to this one. Informational
    /// only: never served as a cache hit.
    pub fn find_similar(
        &self,
        query: &str,
        min_similarity: f64,
    ) -> anyhow::Result<Vec<(CacheEntry, f64)>> {
        let normalized = normalize(query);
        let entries = self.lock()?.list_entries()?;

        let mut matches: Vec<(CacheEntry, f64)> = entries
            .into_iter()
            .filter(|e| e.normalized_query != normalized)
            .map(|e| {
                let sim = strsim::normalized_levenshtein(&normalized, &e.normalized_query);
                (e, sim)
            })
            .filter(|(_, sim)| *sim >= min_similarity)
            .collect();
        matches.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(matches)
    }

    #[cfg(test)]
    pub(crate) fn with_store<T>(&self, f: impl FnOnce(&Store) -> T) -> T {
        f(&self.lock().expect("lock"))
    }
}
