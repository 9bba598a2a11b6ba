//! Loading grader configuration (budgets, default policy, extra datasets and challenges) from TOML.
//!
//! See `GraderConfig` for the expected schema. Every section is optional.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::diagnostic::DEFAULT_MAX_SAMPLES;
use crate::domain::ReferenceSpec;
use crate::normalize::{NormalizationPolicy, PolicyOverrides};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct GraderConfig {
  #[serde(default)]
  pub grading: GradingSettings,
  /// Extra datasets as JSON files; they override built-in datasets with the same id.
  #[serde(default)]
  pub dataset_files: Vec<String>,
  #[serde(default)]
  pub challenges: Vec<ChallengeCfg>,
  #[serde(default)]
  pub rate_limit: RateLimitCfg,
}

/// Budgets and caps for one grading session.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GradingSettings {
  pub total_budget_ms: u64,
  pub learner_timeout_ms: u64,
  pub reference_timeout_ms: u64,
  pub max_rows: usize,
  pub max_concurrent_runs: usize,
  pub engine_fault_retries: u32,
  pub diagnostic_samples: usize,
  pub max_query_bytes: usize,
  pub policy: NormalizationPolicy,
}

impl Default for GradingSettings {
  fn default() -> Self {
    Self {
      total_budget_ms: 5_000,
      learner_timeout_ms: 2_500,
      reference_timeout_ms: 2_500,
      max_rows: 10_000,
      max_concurrent_runs: 8,
      engine_fault_retries: 1,
      diagnostic_samples: DEFAULT_MAX_SAMPLES,
      max_query_bytes: 20_000,
      policy: NormalizationPolicy::default(),
    }
  }
}

impl GradingSettings {
  /// (learner, reference) sub-budgets. If they add up to more than the total,
  /// both are scaled down proportionally.
  pub fn budgets(&self) -> (Duration, Duration) {
    let total = self.total_budget_ms.max(2);
    let learner = self.learner_timeout_ms.max(1);
    let reference = self.reference_timeout_ms.max(1);
    // Widened so absurd config values cannot overflow.
    let sum = learner as u128 + reference as u128;
    if sum <= total as u128 {
      return (Duration::from_millis(learner), Duration::from_millis(reference));
    }
    let scaled = ((total as u128 * learner as u128 / sum) as u64).clamp(1, total - 1);
    (Duration::from_millis(scaled), Duration::from_millis(total - scaled))
  }
}

/// Challenge entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ChallengeCfg {
  #[serde(default)] pub id: Option<String>,
  pub title: String,
  #[serde(default = "default_difficulty")] pub difficulty: String,
  pub dataset_id: String,
  pub prompt: String,
  pub reference: ReferenceSpec,
  #[serde(default)] pub policy: PolicyOverrides,
}

fn default_difficulty() -> String {
  "medium".into()
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct RateLimitCfg {
  /// Grading requests per user per minute; 0 disables limiting.
  #[serde(default)]
  pub requests_per_minute: u32,
}

/// Attempt to load `GraderConfig` from GRADER_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<GraderConfig> {
  let path = std::env::var("GRADER_CONFIG_PATH").ok()?;
  load_config_file(&path)
}

pub fn load_config_file(path: &str) -> Option<GraderConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<GraderConfig>(&s) {
      Ok(cfg) => {
        info!(target: "sql_grader", %path, challenges = cfg.challenges.len(), dataset_files = cfg.dataset_files.len(), "Loaded grader config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "sql_grader", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "sql_grader", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
