//! Challenge catalog: built-in seeds plus config entries, validated against the dataset catalog.

use std::collections::HashMap;

use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::compare::{shape_policy, Expectation};
use crate::config::ChallengeCfg;
use crate::dataset::DatasetProvider;
use crate::domain::{Challenge, ChallengeSource, ReferenceSpec};
use crate::guard::check_read_only;
use crate::normalize::NormalizationPolicy;

#[derive(Clone, Default)]
pub struct ChallengeCatalog {
    by_id: HashMap<String, Challenge>,
    order: Vec<String>,
}

impl ChallengeCatalog {
    /// Config entries come first and win over seeds with the same id.
    /// Entries pointing at unknown datasets or carrying an unusable reference are skipped.
    #[instrument(level = "info", skip_all, fields(seeds = seeds.len(), configured = configured.len()))]
    pub fn build(
        seeds: Vec<Challenge>,
        configured: &[ChallengeCfg],
        datasets: &dyn DatasetProvider,
        policy: &NormalizationPolicy,
    ) -> Self {
        let mut catalog = Self::default();
        let from_config = configured.iter().map(|cc| Challenge {
            id: cc.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: cc.title.clone(),
            difficulty: cc.difficulty.clone(),
            dataset_id: cc.dataset_id.clone(),
            prompt: cc.prompt.clone(),
            reference: cc.reference.clone(),
            policy: cc.policy.clone(),
            source: ChallengeSource::Config,
        });

        for c in from_config.chain(seeds) {
            if catalog.by_id.contains_key(&c.id) {
                continue;
            }
            if datasets.load(&c.dataset_id).is_none() {
                error!(target: "catalog", id = %c.id, dataset = %c.dataset_id, "Skipping challenge: unknown dataset");
                continue;
            }
            if let Err(reason) = check_reference(&c, policy) {
                error!(target: "catalog", id = %c.id, %reason, "Skipping challenge: invalid reference");
                continue;
            }
            catalog.order.push(c.id.clone());
            catalog.by_id.insert(c.id.clone(), c);
        }

        let mut by_difficulty: HashMap<&str, usize> = HashMap::new();
        for c in catalog.by_id.values() {
            *by_difficulty.entry(c.difficulty.as_str()).or_default() += 1;
        }
        for (difficulty, count) in by_difficulty {
            info!(target: "catalog", %difficulty, count, "Startup challenge inventory");
        }
        catalog
    }

    pub fn get(&self, id: &str) -> Option<&Challenge> {
        self.by_id.get(id)
    }

    /// Challenges in catalog order (config entries, then seeds).
    pub fn list(&self) -> Vec<&Challenge> {
        self.order.iter().filter_map(|id| self.by_id.get(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

fn check_reference(c: &Challenge, policy: &NormalizationPolicy) -> Result<(), String> {
    match &c.reference {
        ReferenceSpec::SolutionQuery(sql) => check_read_only(sql).map_err(|e| e.to_string()),
        ReferenceSpec::ExpectedShape(shape) => {
            Expectation::from_shape(shape, &shape_policy(shape, policy, &c.policy)).map(|_| ())
        }
    }
}
