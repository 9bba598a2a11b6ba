//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{rejection::JsonRejection, Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::dataset::DatasetProvider;
use crate::logic::{self, ApiError};
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Grading(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::UnknownChallenge(_) | ApiError::UnknownDataset(_) => StatusCode::NOT_FOUND,
      ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
    };
    (status, Json(self.body())).into_response()
  }
}

fn bad_json(rejection: JsonRejection) -> ApiError {
  warn!(target: "sql_grader", error = %rejection.body_text(), "Rejected request body");
  ApiError::BadRequest(rejection.body_text())
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, datasets: state.datasets.list().len(), challenges: state.challenges.len() })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_grade(
  State(state): State<Arc<AppState>>,
  body: Result<Json<GradeIn>, JsonRejection>,
) -> Result<Json<GradeOut>, ApiError> {
  let Json(body) = body.map_err(bad_json)?;
  let out = logic::grade_submission(&state, &body).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_datasets(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::list_datasets(&state))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_dataset(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<DatasetOut>, ApiError> {
  logic::get_dataset(&state, &id).map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_challenges(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::list_challenges(&state))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_challenge(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<ChallengeOut>, ApiError> {
  logic::get_challenge(&state, &id).map(Json)
}

#[instrument(level = "info", skip(state, body), fields(%id))]
pub async fn http_post_submit(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  body: Result<Json<SubmitIn>, JsonRejection>,
) -> Result<Json<GradeOut>, ApiError> {
  let Json(body) = body.map_err(bad_json)?;
  let out = logic::submit_challenge(&state, &id, &body.query, body.user_id.as_deref()).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> impl IntoResponse {
  let challenges = state.progress.get(&user_id).await;
  info!(target: "progress", %user_id, entries = challenges.len(), "HTTP progress served");
  Json(ProgressOut { user_id, challenges })
}

#[cfg(test)]
mod tests {
  use axum::body::{to_bytes, Body};
  use axum::http::{Request, StatusCode};
  use serde_json::{json, Value};
  use tower::ServiceExt;

  use crate::config::GraderConfig;
  use crate::routes::build_router;
  use crate::state::AppState;
  use std::sync::Arc;

  fn app() -> axum::Router {
    build_router(Arc::new(AppState::from_config(GraderConfig::default())))
  }

  async fn call(app: axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        req = req.header("content-type", "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = app.oneshot(req.body(body).expect("request")).await.expect("response");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
  }

  #[tokio::test]
  async fn grade_correct_submission() {
    let (status, v) = call(
      app(),
      "POST",
      "/grade",
      Some(json!({
        "datasetId": "titanic",
        "query": "SELECT * FROM passengers WHERE survived = 1",
        "reference": { "solutionQuery": "SELECT * FROM passengers WHERE survived=1" }
      })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "correct");
    assert_eq!(v["outcome"], "ok");
    assert_eq!(v["score"], 100.0);
    assert!(v["submissionId"].is_string());
  }

  #[tokio::test]
  async fn syntax_error_is_a_200_verdict() {
    let (status, v) = call(
      app(),
      "POST",
      "/api/v1/grade",
      Some(json!({
        "datasetId": "titanic",
        "query": "SELCT * FROM passengers",
        "reference": { "solutionQuery": "SELECT * FROM passengers" }
      })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "runtime_error");
    assert_eq!(v["outcome"], "error");
    assert_eq!(v["failure"]["side"], "learner");
    assert_eq!(v["failure"]["kind"], "syntax_error");
    assert!(v["executionMsReference"].is_null());
  }

  #[tokio::test]
  async fn caller_mistakes_are_400() {
    let (status, v) = call(
      app(),
      "POST",
      "/grade",
      Some(json!({ "datasetId": "atlantis", "query": "SELECT 1", "reference": { "solutionQuery": "SELECT 1" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "unknown_dataset");

    let (status, v) = call(
      app(),
      "POST",
      "/grade",
      Some(json!({ "datasetId": "titanic", "query": "", "reference": { "solutionQuery": "SELECT 1" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "empty_query");

    let (status, v) = call(
      app(),
      "POST",
      "/grade",
      Some(json!({
        "datasetId": "titanic",
        "query": "SELECT 1",
        "reference": { "solutionQuery": "SELECT 1", "expectedShape": { "rowCount": 1 } }
      })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "bad_request");
  }

  #[tokio::test]
  async fn challenge_flow_and_progress() {
    let app = app();
    let (status, list) = call(app.clone(), "GET", "/api/v1/challenges", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().map(|a| !a.is_empty()).unwrap_or(false));
    assert!(!list.to_string().contains("solutionQuery"));

    let (status, v) = call(
      app.clone(),
      "POST",
      "/api/v1/challenges/movies-last-century/submit",
      Some(json!({ "query": "SELECT year, title FROM movies WHERE year < 2000", "userId": "ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["diagnostic"]["kind"], "ColumnOrderMismatch");

    let (status, v) = call(app.clone(), "GET", "/api/v1/progress/ada", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["challenges"][0]["challengeId"], "movies-last-century");
    assert_eq!(v["challenges"][0]["attempts"], 1);

    let (status, _) = call(app, "POST", "/api/v1/challenges/nope/submit", Some(json!({ "query": "SELECT 1" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn datasets_expose_schema_not_rows() {
    let (status, v) = call(app(), "GET", "/api/v1/datasets/titanic", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["tables"][0]["name"], "passengers");
    assert_eq!(v["tables"][0]["rowCount"], 20);
    assert!(v["tables"][0].get("rows").is_none());

    let (status, v) = call(app(), "GET", "/api/v1/datasets/atlantis", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["error"], "unknown_dataset");
  }

  #[tokio::test]
  async fn health_reports_catalog_sizes() {
    let (status, v) = call(app(), "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["ok"], true);
    assert_eq!(v["datasets"], 4);
  }
}
