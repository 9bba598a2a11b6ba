//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::dataset::{ColumnDef, Dataset};
use crate::domain::{Challenge, ChallengeSource, GradingRequest, ReferenceSpec, Verdict};
use crate::normalize::PolicyOverrides;
use crate::progress::ChallengeProgress;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Grade(GradeIn),
    SubmitChallenge {
        #[serde(rename = "challengeId")]
        challenge_id: String,
        query: String,
        #[serde(default, rename = "userId")]
        user_id: Option<String>,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Verdict(GradeOut),
    Error(ErrorOut),
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeIn {
    pub dataset_id: String,
    pub query: String,
    pub reference: ReferenceSpec,
    #[serde(default)]
    pub policy: PolicyOverrides,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub challenge_id: Option<String>,
}

impl GradeIn {
    pub fn to_request(&self) -> GradingRequest {
        GradingRequest {
            dataset_id: self.dataset_id.clone(),
            learner_query: self.query.clone(),
            reference: self.reference.clone(),
            policy: self.policy.clone(),
        }
    }
}

/// The verdict plus a short `outcome` code (ok, mismatch, error, timeout).
#[derive(Debug, Serialize)]
pub struct GradeOut {
    #[serde(flatten)]
    pub verdict: Verdict,
    pub outcome: &'static str,
}

impl From<Verdict> for GradeOut {
    fn from(verdict: Verdict) -> Self {
        let outcome = verdict.status.outcome();
        Self { verdict, outcome }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIn {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub datasets: usize,
    pub challenges: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableOut {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub row_count: usize,
}

/// Dataset schema without the fixture rows.
#[derive(Debug, Serialize)]
pub struct DatasetOut {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tables: Vec<TableOut>,
}

pub fn dataset_out(ds: &Dataset) -> DatasetOut {
    DatasetOut {
        id: ds.id.clone(),
        title: ds.title.clone(),
        description: ds.description.clone(),
        tables: ds
            .tables
            .iter()
            .map(|t| TableOut { name: t.name.clone(), columns: t.columns.clone(), row_count: t.rows.len() })
            .collect(),
    }
}

/// Public challenge DTO. Never carries the reference.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeOut {
    pub id: String,
    pub title: String,
    pub difficulty: String,
    pub dataset_id: String,
    pub prompt: String,
    pub source: ChallengeSource,
}

pub fn challenge_out(c: &Challenge) -> ChallengeOut {
    ChallengeOut {
        id: c.id.clone(),
        title: c.title.clone(),
        difficulty: c.difficulty.clone(),
        dataset_id: c.dataset_id.clone(),
        prompt: c.prompt.clone(),
        source: c.source,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOut {
    pub user_id: String,
    pub challenges: Vec<ChallengeProgress>,
}
