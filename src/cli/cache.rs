// src/cli/cache.rs — `chartsmith cache` maintenance commands

use super::CacheAction;
use crate::cache::fingerprint::Fingerprint;
use crate::cache::ArtifactCache;
use crate::infra::config::Config;

const TOP_ISSUES: usize = 10;
const SIMILAR_THRESHOLD: f64 = 0.6;

pub fn run_cache_command(action: CacheAction, config: &Config) -> anyhow::Result<()> {
    let path = config.cache.db_path();
    let cache = ArtifactCache::open(&path, config.cache.clone())?;
    handle(&cache, action, &mut std::io::stdout())
}

/// Dispatch one action against an open cache, writing to `out`.
pub fn handle(
    cache: &ArtifactCache,
    action: CacheAction,
    out: &mut impl std::io::Write,
) -> anyhow::Result<()> {
    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            writeln!(out, "Cache")?;
            writeln!(out, "  Runs:         {}", stats.total_runs)?;
            writeln!(out, "  Queries:      {}", stats.distinct_fingerprints)?;
            match stats.avg_score {
                Some(avg) => writeln!(out, "  Avg score:    {:.2}", avg)?,
                None => writeln!(out, "  Avg score:    -")?,
            }
            writeln!(out, "  Entries:      {}", stats.cached_entries)?;
            writeln!(
                out,
                "  Issues:       {} tag(s), {} fix(es)",
                stats.issue_tags, stats.fixes
            )?;

            let top = cache.top_issues(TOP_ISSUES)?;
            if !top.is_empty() {
                writeln!(out)?;
                writeln!(out, "  Frequent issues:")?;
                for issue in top {
                    writeln!(out, "    {:<24} {}", issue.tag, issue.occurrences)?;
                }
            }
        }
        CacheAction::Clear => {
            cache.clear()?;
            writeln!(out, "Cache cleared.")?;
        }
        CacheAction::ResetFixes => {
            cache.reset_fixes()?;
            writeln!(out, "Issue statistics and fixes cleared; cached charts kept.")?;
        }
        CacheAction::Show { query } => {
            let query = query.join(" ");
            match cache.lookup_exact(&query)? {
                Some(entry) => {
                    writeln!(out, "Fingerprint: {}", Fingerprint::of(&query))?;
                    writeln!(out, "Score:       {:.2}", entry.best_score)?;
                    writeln!(out, "Updated:     {}", entry.updated_at)?;
                    writeln!(out, "Prompt:\n{}\n", entry.revision_text)?;
                    writeln!(out, "{}", entry.artifact.to_pretty_json())?;
                }
                None => {
                    writeln!(out, "No cached chart for \"{}\".", query)?;
                    let similar = cache.find_similar(&query, SIMILAR_THRESHOLD)?;
                    if !similar.is_empty() {
                        writeln!(out, "Similar requests:")?;
                        for (entry, sim) in similar.iter().take(5) {
                            writeln!(
                                out,
                                "  {:.2}  {} (score {:.2})",
                                sim, entry.query, entry.best_score
                            )?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RunRecord;
    use crate::chart::templates::template_for;
    use crate::infra::config::CacheConfig;

    fn seeded() -> ArtifactCache {
        let cache = ArtifactCache::in_memory(CacheConfig::default()).unwrap();
        cache
            .record(&RunRecord {
                query: "sales by region".into(),
                artifact: template_for("sales by region"),
                revision_text: "Plot sales per region".into(),
                combined_score: 9.0,
                iterations: 2,
                termination: "stop_success".into(),
                issues: ["not_responsive".to_string()].into_iter().collect(),
            })
            .unwrap();
        cache
    }

    fn output(cache: &ArtifactCache, action: CacheAction) -> String {
        let mut buf = Vec::new();
        handle(cache, action, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_stats_lists_frequent_issues() {
        let text = output(&seeded(), CacheAction::Stats);
        assert!(text.contains("Runs:         1"));
        assert!(text.contains("Avg score:    9.00"));
        assert!(text.contains("not_responsive"));
    }

    #[test]
    fn test_show_hit_and_similar() {
        let cache = seeded();
        let hit = output(
            &cache,
            CacheAction::Show {
                query: vec!["Sales".into(), "by".into(), "Region".into()],
            },
        );
        assert!(hit.contains("Score:       9.00"));
        assert!(hit.contains("Plot sales per region"));

        let miss = output(
            &cache,
            CacheAction::Show {
                query: vec!["sales by regions".into()],
            },
        );
        assert!(miss.contains("No cached chart"));
        assert!(miss.contains("sales by region (score 9.00)"));
    }

    #[test]
    fn test_reset_fixes_keeps_entries() {
        let cache = seeded();
        output(&cache, CacheAction::ResetFixes);
        let stats = cache.stats().unwrap();
        assert_eq!(stats.fixes, 0);
        assert_eq!(stats.cached_entries, 1);

        output(&cache, CacheAction::Clear);
        assert_eq!(cache.stats().unwrap().cached_entries, 0);
    }
}
