// src/cache/store.rs — SQLite operations

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{CacheEntry, CacheStats, IssueFix, IssueStat, RecordOutcome, RunRecord};
use crate::chart::Artifact;
use crate::infra::config::CacheConfig;

/// Low-level SQLite operations for the learning cache.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    // -- Entries --

    pub fn get_entry(&self, fingerprint: &str) -> anyhow::Result<Option<CacheEntry>> {
        let row = self
            .conn
            .query_row(
                "SELECT fingerprint, query, normalized_query, artifact, revision_text,
                        best_score, created_at, updated_at
                 FROM cache_entries WHERE fingerprint = ?1",
                params![fingerprint],
                raw_entry,
            )
            .optional()?;
        row.map(RawEntry::into_entry).transpose()
    }

    pub fn list_entries(&self) -> anyhow::Result<Vec<CacheEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT fingerprint, query, normalized_query, artifact, revision_text,
                    best_score, created_at, updated_at
             FROM cache_entries ORDER BY best_score DESC, fingerprint",
        )?;
        let raws = stmt
            .query_map([], raw_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawEntry::into_entry).collect()
    }

    /// Insert or replace an entry, but only when `score` is at least the stored
    /// score. Returns whether a row was written.
    pub fn upsert_entry(
        &self,
        fingerprint: &str,
        query: &str,
        normalized_query: &str,
        artifact: &Artifact,
        revision_text: &str,
        score: f64,
    ) -> anyhow::Result<bool> {
        upsert_entry(
            &self.conn,
            fingerprint,
            query,
            normalized_query,
            artifact,
            revision_text,
            score,
        )
    }

    // -- Runs --

    /// Record a finished run in one transaction: run log, issue counters,
    /// fixes (with pruning) and the monotonic entry upsert.
    pub fn record_run(
        &self,
        run_id: &str,
        fingerprint: &str,
        normalized_query: &str,
        run: &RunRecord,
        cfg: &CacheConfig,
    ) -> anyhow::Result<RecordOutcome> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO runs (id, fingerprint, query, combined_score, iterations, termination, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                fingerprint,
                run.query,
                run.combined_score,
                run.iterations as i64,
                run.termination,
                now
            ],
        )?;

        for tag in &run.issues {
            tx.execute(
                "INSERT INTO issue_stats (tag, occurrences, last_seen) VALUES (?1, 1, ?2)
                 ON CONFLICT(tag) DO UPDATE SET
                    occurrences = occurrences + 1,
                    last_seen = excluded.last_seen",
                params![tag, now],
            )?;
        }

        let mut fixes_added = 0;
        let fix_text = run.revision_text.trim();
        if run.combined_score >= cfg.fix_min_score && !fix_text.is_empty() {
            for tag in &run.issues {
                tx.execute(
                    "INSERT INTO issue_fixes (tag, fix_text, score, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![tag, fix_text, run.combined_score, now],
                )?;
                fixes_added += 1;
                // Keep only the best-scoring fixes; ties keep the older row.
                tx.execute(
                    "DELETE FROM issue_fixes
                     WHERE tag = ?1 AND id NOT IN (
                        SELECT id FROM issue_fixes WHERE tag = ?1
                        ORDER BY score DESC, id ASC LIMIT ?2
                     )",
                    params![tag, cfg.max_fixes_per_issue as i64],
                )?;
            }
        }

        let mut entry_written = false;
        if run.combined_score >= cfg.min_entry_score {
            entry_written = upsert_entry(
                &tx,
                fingerprint,
                &run.query,
                normalized_query,
                &run.artifact,
                &run.revision_text,
                run.combined_score,
            )?;
        }

        tx.commit()?;

        Ok(RecordOutcome {
            run_id: run_id.to_string(),
            entry_written,
            fixes_added,
        })
    }

    // -- Issues & fixes --

    pub fn best_fix(&self, tag: &str) -> anyhow::Result<Option<IssueFix>> {
        Ok(self
            .conn
            .query_row(
                "SELECT tag, fix_text, score, created_at FROM issue_fixes
                 WHERE tag = ?1 ORDER BY score DESC, id ASC LIMIT 1",
                params![tag],
                issue_fix,
            )
            .optional()?)
    }

    pub fn fixes_for(&self, tag: &str, limit: usize) -> anyhow::Result<Vec<IssueFix>> {
        let mut stmt = self.conn.prepare(
            "SELECT tag, fix_text, score, created_at FROM issue_fixes
             WHERE tag = ?1 ORDER BY score DESC, id ASC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![tag, limit as i64], issue_fix)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn top_issues(&self, limit: usize) -> anyhow::Result<Vec<IssueStat>> {
        let mut stmt = self.conn.prepare(
            "SELECT tag, occurrences, last_seen FROM issue_stats
             ORDER BY occurrences DESC, tag ASC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |r| {
                Ok(IssueStat {
                    tag: r.get(0)?,
                    occurrences: r.get::<_, i64>(1)? as u64,
                    last_seen: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- Maintenance --

    pub fn stats(&self) -> anyhow::Result<CacheStats> {
        let (total_runs, distinct_fingerprints, avg_score): (i64, i64, Option<f64>) =
            self.conn.query_row(
                "SELECT COUNT(*), COUNT(DISTINCT fingerprint), AVG(combined_score) FROM runs",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )?;
        let count = |sql: &str| -> anyhow::Result<u64> {
            Ok(self.conn.query_row(sql, [], |r| r.get::<_, i64>(0))? as u64)
        };

        Ok(CacheStats {
            total_runs: total_runs as u64,
            distinct_fingerprints: distinct_fingerprints as u64,
            avg_score,
            cached_entries: count("SELECT COUNT(*) FROM cache_entries")?,
            issue_tags: count("SELECT COUNT(*) FROM issue_stats")?,
            fixes: count("SELECT COUNT(*) FROM issue_fixes")?,
        })
    }

    /// Delete every row from every table.
    pub fn clear(&self) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM cache_entries;
             DELETE FROM runs;
             DELETE FROM issue_stats;
             DELETE FROM issue_fixes;",
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Forget issue statistics and fixes; entries and the run log stay.
    pub fn reset_fixes(&self) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM issue_stats;
             DELETE FROM issue_fixes;",
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Monotonic upsert: an existing row is only replaced by an equal or better score.
fn upsert_entry(
    conn: &Connection,
    fingerprint: &str,
    query: &str,
    normalized_query: &str,
    artifact: &Artifact,
    revision_text: &str,
    score: f64,
) -> anyhow::Result<bool> {
    let now = Utc::now().to_rfc3339();
    let artifact_json = serde_json::to_string(artifact)?;
    let changed = conn.execute(
        "INSERT INTO cache_entries
            (fingerprint, query, normalized_query, artifact, revision_text,
             best_score, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
         ON CONFLICT(fingerprint) DO UPDATE SET
            query = excluded.query,
            normalized_query = excluded.normalized_query,
            artifact = excluded.artifact,
            revision_text = excluded.revision_text,
            best_score = excluded.best_score,
            updated_at = excluded.updated_at
         WHERE excluded.best_score >= cache_entries.best_score",
        params![
            fingerprint,
            query,
            normalized_query,
            artifact_json,
            revision_text,
            score,
            now
        ],
    )?;
    Ok(changed > 0)
}

// ─── Row mapping ────────────────────────────────────────────────────────────

struct RawEntry {
    fingerprint: String,
    query: String,
    normalized_query: String,
    artifact: String,
    revision_text: String,
    best_score: f64,
    created_at: String,
    updated_at: String,
}

impl RawEntry {
    fn into_entry(self) -> anyhow::Result<CacheEntry> {
        let artifact = Artifact::parse(&self.artifact).map_err(|e| {
            anyhow::anyhow!("stored artifact for {} is unreadable: {}", self.fingerprint, e)
        })?;
        Ok(CacheEntry {
            fingerprint: self.fingerprint,
            query: self.query,
            normalized_query: self.normalized_query,
            artifact,
            revision_text: self.revision_text,
            best_score: self.best_score,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn raw_entry(r: &Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        fingerprint: r.get(0)?,
        query: r.get(1)?,
        normalized_query: r.get(2)?,
        artifact: r.get(3)?,
        revision_text: r.get(4)?,
        best_score: r.get(5)?,
        created_at: r.get(6)?,
        updated_at: r.get(7)?,
    })
}

fn issue_fix(r: &Row<'_>) -> rusqlite::Result<IssueFix> {
    Ok(IssueFix {
        tag: r.get(0)?,
        text: r.get(1)?,
        score: r.get(2)?,
        created_at: r.get(3)?,
    })
}
