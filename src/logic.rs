//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Grading an ad-hoc submission (rate limit, grade, record progress)
//!   - Grading a submission against a catalog challenge
//!   - Dataset and challenge listings

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::GradingRequest;
use crate::error::GradingError;
use crate::limiter::RateDecision;
use crate::protocol::{challenge_out, dataset_out, ChallengeOut, DatasetOut, ErrorOut, GradeIn, GradeOut};
use crate::state::AppState;
use crate::dataset::DatasetProvider;

/// Anything that stops a request before it becomes a verdict.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Grading(#[from] GradingError),
  #[error("unknown challenge '{0}'")]
  UnknownChallenge(String),
  #[error("unknown dataset '{0}'")]
  UnknownDataset(String),
  #[error("too many grading requests; retry in {retry_after_secs}s")]
  RateLimited { retry_after_secs: u64 },
  #[error("{0}")]
  BadRequest(String),
}

impl ApiError {
  pub fn code(&self) -> &'static str {
    match self {
      ApiError::Grading(e) => e.code(),
      ApiError::UnknownChallenge(_) => "unknown_challenge",
      ApiError::UnknownDataset(_) => "unknown_dataset",
      ApiError::RateLimited { .. } => "rate_limited",
      ApiError::BadRequest(_) => "bad_request",
    }
  }

  pub fn body(&self) -> ErrorOut {
    ErrorOut { error: self.code().into(), message: self.to_string() }
  }
}

const ANONYMOUS: &str = "anonymous";

async fn admit(state: &AppState, user_id: Option<&str>) -> Result<(), ApiError> {
  let key = user_id.unwrap_or(ANONYMOUS);
  match state.limiter.check(key).await {
    RateDecision::Allow => Ok(()),
    RateDecision::Deny { retry_after } => {
      warn!(target: "grading", user = %key, "Grading request rate limited");
      Err(ApiError::RateLimited { retry_after_secs: retry_after.as_secs().max(1) })
    }
  }
}

async fn grade_and_record(
  state: &AppState,
  req: &GradingRequest,
  user_id: Option<&str>,
  challenge_id: Option<&str>,
) -> Result<GradeOut, ApiError> {
  let verdict = state.grader.grade(req).await?;
  if let (Some(user), Some(challenge)) = (user_id, challenge_id) {
    state.progress.record(user, challenge, &verdict).await;
  }
  Ok(GradeOut::from(verdict))
}

#[instrument(level = "info", skip(state, body), fields(dataset = %body.dataset_id, query_len = body.query.len(), user = ?body.user_id))]
pub async fn grade_submission(state: &AppState, body: &GradeIn) -> Result<GradeOut, ApiError> {
  admit(state, body.user_id.as_deref()).await?;
  let out = grade_and_record(state, &body.to_request(), body.user_id.as_deref(), body.challenge_id.as_deref()).await?;
  info!(target: "grading", id = %out.verdict.submission_id, outcome = out.outcome, "Submission graded");
  Ok(out)
}

#[instrument(level = "info", skip(state, query), fields(%challenge_id, query_len = query.len(), user = ?user_id))]
pub async fn submit_challenge(
  state: &AppState,
  challenge_id: &str,
  query: &str,
  user_id: Option<&str>,
) -> Result<GradeOut, ApiError> {
  let ch = state
    .challenges
    .get(challenge_id)
    .ok_or_else(|| ApiError::UnknownChallenge(challenge_id.to_string()))?;
  admit(state, user_id).await?;
  let req = GradingRequest {
    dataset_id: ch.dataset_id.clone(),
    learner_query: query.to_string(),
    reference: ch.reference.clone(),
    policy: ch.policy.clone(),
  };
  let out = grade_and_record(state, &req, user_id, Some(challenge_id)).await?;
  info!(target: "grading", id = %out.verdict.submission_id, %challenge_id, outcome = out.outcome, "Challenge submission graded");
  Ok(out)
}

pub fn list_datasets(state: &AppState) -> Vec<DatasetOut> {
  state.datasets.list().iter().map(|d| dataset_out(d)).collect()
}

pub fn get_dataset(state: &AppState, id: &str) -> Result<DatasetOut, ApiError> {
  state
    .datasets
    .load(id)
    .map(|d| dataset_out(&d))
    .ok_or_else(|| ApiError::UnknownDataset(id.to_string()))
}

pub fn list_challenges(state: &AppState) -> Vec<ChallengeOut> {
  state.challenges.list().into_iter().map(challenge_out).collect()
}

pub fn get_challenge(state: &AppState, id: &str) -> Result<ChallengeOut, ApiError> {
  state
    .challenges
    .get(id)
    .map(challenge_out)
    .ok_or_else(|| ApiError::UnknownChallenge(id.to_string()))
}
