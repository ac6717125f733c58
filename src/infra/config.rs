// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::infra::errors::ChartsmithError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub iteration: IterationConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// "provider/model"; when unset the first discovered provider's default is used.
    pub generator: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub offline: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            max_retries: 2,
            offline: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationConfig {
    pub max_iterations: usize,
    pub cache_first: bool,
    pub preflight_clarify: bool,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            cache_first: true,
            preflight_clarify: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub rule_weight: f64,
    pub quality_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rule_weight: 0.4,
            quality_weight: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub success_threshold: f64,
    pub good_threshold: f64,
    pub critical_floor: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            success_threshold: 9.5,
            good_threshold: 8.0,
            critical_floor: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
    pub min_entry_score: f64,
    pub fix_min_score: f64,
    pub max_fixes_per_issue: usize,
    /// Below this combined score the reviser seeds revisions from past fixes.
    pub seed_below_score: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            min_entry_score: 8.0,
            fix_min_score: 7.0,
            max_fixes_per_issue: 20,
            seed_below_score: 8.0,
        }
    }
}

impl CacheConfig {
    pub fn db_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(paths::db_path)
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply CHARTSMITH_* environment overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ChartsmithError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides through an arbitrary lookup (injectable for tests).
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ChartsmithError> {
        if let Some(model) = lookup("CHARTSMITH_MODEL") {
            self.models.generator = Some(model);
        }
        if let Some(v) = lookup("CHARTSMITH_MAX_ITERATIONS") {
            self.iteration.max_iterations = parse_env("CHARTSMITH_MAX_ITERATIONS", &v)?;
        }
        if let Some(v) = lookup("CHARTSMITH_RULE_WEIGHT") {
            self.scoring.rule_weight = parse_env("CHARTSMITH_RULE_WEIGHT", &v)?;
        }
        if let Some(v) = lookup("CHARTSMITH_QUALITY_WEIGHT") {
            self.scoring.quality_weight = parse_env("CHARTSMITH_QUALITY_WEIGHT", &v)?;
        }
        if let Some(v) = lookup("CHARTSMITH_OFFLINE") {
            self.provider.offline = matches!(v.as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Reject configurations the loop cannot run with.
    pub fn validate(&self) -> Result<(), ChartsmithError> {
        let s = &self.scoring;
        if s.rule_weight < 0.0 || s.quality_weight < 0.0 {
            return Err(ChartsmithError::Config(
                "scoring weights must be non-negative".into(),
            ));
        }
        if ((s.rule_weight + s.quality_weight) - 1.0).abs() > 1e-6 {
            return Err(ChartsmithError::Config(format!(
                "scoring weights must sum to 1.0 (got {} + {})",
                s.rule_weight, s.quality_weight
            )));
        }
        let p = &self.policy;
        if !(p.critical_floor < p.good_threshold && p.good_threshold <= p.success_threshold) {
            return Err(ChartsmithError::Config(
                "policy thresholds must satisfy critical_floor < good_threshold <= success_threshold"
                    .into(),
            ));
        }
        if self.iteration.max_iterations == 0 {
            return Err(ChartsmithError::Config(
                "iteration.max_iterations must be at least 1".into(),
            ));
        }
        if self.cache.max_fixes_per_issue == 0 {
            return Err(ChartsmithError::Config(
                "cache.max_fixes_per_issue must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ChartsmithError> {
    value
        .trim()
        .parse()
        .map_err(|_| ChartsmithError::Config(format!("invalid value for {key}: '{value}'")))
}
