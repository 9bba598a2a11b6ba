//! Per-user challenge progress. The grader never writes here itself; callers record
//! verdicts after grading.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::{Verdict, VerdictStatus};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeProgress {
    pub challenge_id: String,
    pub attempts: u32,
    pub solved: bool,
    pub best_score: f32,
    pub last_status: VerdictStatus,
    pub last_submission_id: String,
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn record(&self, user_id: &str, challenge_id: &str, verdict: &Verdict);
    /// All progress for a user, ordered by challenge id.
    async fn get(&self, user_id: &str) -> Vec<ChallengeProgress>;
}

#[derive(Default)]
pub struct InMemoryProgressStore {
    by_user: RwLock<HashMap<String, HashMap<String, ChallengeProgress>>>,
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    #[instrument(level = "debug", skip(self, verdict), fields(status = ?verdict.status))]
    async fn record(&self, user_id: &str, challenge_id: &str, verdict: &Verdict) {
        let mut by_user = self.by_user.write().await;
        let entry = by_user
            .entry(user_id.to_string())
            .or_default()
            .entry(challenge_id.to_string())
            .or_insert_with(|| ChallengeProgress {
                challenge_id: challenge_id.to_string(),
                attempts: 0,
                solved: false,
                best_score: 0.0,
                last_status: verdict.status,
                last_submission_id: String::new(),
            });
        entry.attempts += 1;
        entry.solved |= verdict.status == VerdictStatus::Correct;
        entry.best_score = entry.best_score.max(verdict.score);
        entry.last_status = verdict.status;
        entry.last_submission_id = verdict.submission_id.clone();
        debug!(target: "progress", attempts = entry.attempts, solved = entry.solved, "Progress recorded");
    }

    async fn get(&self, user_id: &str) -> Vec<ChallengeProgress> {
        let by_user = self.by_user.read().await;
        let mut out: Vec<ChallengeProgress> = by_user
            .get(user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        out.sort_by(|a, b| a.challenge_id.cmp(&b.challenge_id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(status: VerdictStatus, score: f32) -> Verdict {
        Verdict {
            submission_id: uuid::Uuid::new_v4().to_string(),
            status,
            score,
            message: String::new(),
            diagnostic: None,
            failure: None,
            execution_ms_learner: Some(1),
            execution_ms_reference: Some(1),
        }
    }

    #[tokio::test]
    async fn keeps_best_score_and_solved_flag() {
        let store = InMemoryProgressStore::default();
        store.record("u1", "c1", &verdict(VerdictStatus::Incorrect, 40.0)).await;
        store.record("u1", "c1", &verdict(VerdictStatus::Correct, 100.0)).await;
        store.record("u1", "c1", &verdict(VerdictStatus::RuntimeError, 0.0)).await;
        store.record("u1", "a0", &verdict(VerdictStatus::Timeout, 0.0)).await;

        let p = store.get("u1").await;
        assert_eq!(p.len(), 2);
        assert_eq!(p[0].challenge_id, "a0");
        let c1 = &p[1];
        assert_eq!(c1.attempts, 3);
        assert!(c1.solved);
        assert_eq!(c1.best_score, 100.0);
        assert_eq!(c1.last_status, VerdictStatus::RuntimeError);
        assert!(store.get("someone-else").await.is_empty());
    }
}
