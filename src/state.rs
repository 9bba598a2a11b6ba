//! Application state: dataset and challenge catalogs, the grader, progress and rate limiting.
//!
//! Everything here is built once at startup. The catalogs are read-only afterwards;
//! the only mutable state is the progress store and the limiter windows.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::challenges::ChallengeCatalog;
use crate::config::{load_config_from_env, GraderConfig};
use crate::dataset::{DatasetCatalog, DatasetProvider};
use crate::limiter::{self, RateLimiter};
use crate::progress::{InMemoryProgressStore, ProgressStore};
use crate::runner::SqlRunner;
use crate::seeds::{seed_challenges, seed_datasets};
use crate::session::Grader;

#[derive(Clone)]
pub struct AppState {
    pub datasets: Arc<DatasetCatalog>,
    pub challenges: Arc<ChallengeCatalog>,
    pub grader: Grader,
    pub progress: Arc<dyn ProgressStore>,
    pub limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    /// Build state from env: load config (if any), then seeds plus configured extras.
    pub fn new() -> Self {
        Self::from_config(load_config_from_env().unwrap_or_default())
    }

    #[instrument(level = "info", skip_all)]
    pub fn from_config(cfg: GraderConfig) -> Self {
        let extra = DatasetCatalog::load_files(&cfg.dataset_files);
        let datasets = Arc::new(DatasetCatalog::build(seed_datasets(), extra));
        let challenges = Arc::new(ChallengeCatalog::build(
            seed_challenges(),
            &cfg.challenges,
            datasets.as_ref(),
            &cfg.grading.policy,
        ));

        let settings = cfg.grading;
        let (learner_budget, reference_budget) = settings.budgets();
        info!(
            target: "sql_grader",
            datasets = datasets.list().len(),
            challenges = challenges.len(),
            learner_budget_ms = learner_budget.as_millis() as u64,
            reference_budget_ms = reference_budget.as_millis() as u64,
            max_rows = settings.max_rows,
            max_concurrent_runs = settings.max_concurrent_runs,
            rate_limit_per_minute = cfg.rate_limit.requests_per_minute,
            "Grader ready"
        );

        // Separate pools: runaway learner queries must not hold up reference runs.
        let learner_runner = Arc::new(SqlRunner::new(settings.max_rows, settings.max_concurrent_runs));
        let reference_runner = Arc::new(SqlRunner::new(settings.max_rows, settings.max_concurrent_runs));
        let grader = Grader::new(datasets.clone(), learner_runner, settings).with_reference_runner(reference_runner);

        Self {
            datasets,
            challenges,
            grader,
            progress: Arc::new(InMemoryProgressStore::default()),
            limiter: limiter::from_config(&cfg.rate_limit),
        }
    }
}
