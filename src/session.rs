//! Grading session controller: validates a request, runs the learner and reference
//! queries under separate sub-budgets, compares, and always resolves to a `Verdict`.
//!
//! The reference query starts as soon as the learner query has compiled, so the two
//! run in parallel, yet a learner query that fails to compile never causes the
//! reference to execute.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{oneshot, watch};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::compare::{compare, shape_policy, Expectation};
use crate::config::GradingSettings;
use crate::dataset::{Dataset, DatasetProvider};
use crate::diagnostic::{explain, explain_failure};
use crate::domain::{GradingRequest, ReferenceSpec, ResultSet, RunFailure, Side, Verdict, VerdictStatus};
use crate::error::{GradingError, RunnerError};
use crate::guard::{check_read_only, has_top_level_order_by};
use crate::normalize::{normalize, NormalizationPolicy};
use crate::runner::QueryRunner;
use crate::util::trunc_for_log;

/// Lifecycle of one submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Received,
    RunningLearner,
    RunningReference,
    Normalizing,
    Comparing,
    Done,
    Failed,
}

/// A verdict together with the stages the session went through.
#[derive(Debug)]
pub struct Graded {
    pub verdict: Verdict,
    pub stages: Vec<Stage>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Compile {
    Pending,
    Ready,
    Failed,
}

struct SideRun {
    result: Result<ResultSet, RunnerError>,
    elapsed: Duration,
}

/// How the learner result will be judged, resolved before anything runs.
enum Plan<'a> {
    Query { sql: &'a str, policy: NormalizationPolicy },
    Shape { expectation: Expectation, policy: NormalizationPolicy },
}

#[derive(Clone)]
pub struct Grader {
    datasets: Arc<dyn DatasetProvider>,
    runner: Arc<dyn QueryRunner>,
    reference_runner: Arc<dyn QueryRunner>,
    settings: GradingSettings,
}

impl Grader {
    pub fn new(datasets: Arc<dyn DatasetProvider>, runner: Arc<dyn QueryRunner>, settings: GradingSettings) -> Self {
        Self { datasets, reference_runner: runner.clone(), runner, settings }
    }

    /// Run reference queries on their own runner, so learner queries that hold every
    /// learner slot cannot starve them.
    pub fn with_reference_runner(mut self, runner: Arc<dyn QueryRunner>) -> Self {
        self.reference_runner = runner;
        self
    }

    pub async fn grade(&self, req: &GradingRequest) -> Result<Verdict, GradingError> {
        self.grade_traced(req).await.map(|g| g.verdict)
    }

    /// Caller mistakes come back as `Err`; everything that happens to the queries
    /// themselves comes back as a verdict.
    #[instrument(level = "info", skip(self, req), fields(dataset = %req.dataset_id, query_len = req.learner_query.len()))]
    pub async fn grade_traced(&self, req: &GradingRequest) -> Result<Graded, GradingError> {
        let mut stages = vec![Stage::Received];
        let dataset = self.validate(req)?;
        let plan = self.plan(req)?;
        let (learner_budget, reference_budget) = self.settings.budgets();
        debug!(target: "grading", query = %trunc_for_log(&req.learner_query, 80), "Submission received");

        stages.push(Stage::RunningLearner);
        let (learner, reference, expectation, policy) = match plan {
            Plan::Shape { expectation, policy } => {
                let learner = self.run_side(Side::Learner, &dataset, &req.learner_query, learner_budget, None).await;
                (learner, None, Some(expectation), policy)
            }
            Plan::Query { sql, policy } => {
                let (compiled_tx, mut compiled_rx) = watch::channel(Compile::Pending);
                let learner = self.run_side(Side::Learner, &dataset, &req.learner_query, learner_budget, Some(&compiled_tx));
                let reference = async {
                    let ready = compiled_rx.wait_for(|c| *c != Compile::Pending).await.map(|c| *c);
                    if !matches!(ready, Ok(Compile::Ready)) {
                        return None;
                    }
                    Some(self.run_side(Side::Reference, &dataset, sql, reference_budget, None).await)
                };
                let (learner, reference) = tokio::join!(learner, reference);
                (learner, reference, None, policy)
            }
        };
        if reference.is_some() {
            stages.push(Stage::RunningReference);
        }

        let ms_learner = Some(millis(learner.elapsed));
        let ms_reference = reference.as_ref().map(|r| millis(r.elapsed));

        let learner_rs = match learner.result {
            Ok(rs) => rs,
            Err(e) => {
                stages.push(Stage::Failed);
                return Ok(Graded { verdict: self.failed(Side::Learner, e, ms_learner, ms_reference), stages });
            }
        };
        let expectation = match (expectation, reference) {
            (Some(exp), _) => exp,
            (None, Some(SideRun { result: Ok(rs), .. })) => {
                stages.push(Stage::Normalizing);
                Expectation::from_reference(normalize(&rs, &policy))
            }
            (None, Some(SideRun { result: Err(e), .. })) => {
                stages.push(Stage::Failed);
                return Ok(Graded { verdict: self.failed(Side::Reference, e, ms_learner, ms_reference), stages });
            }
            (None, None) => {
                // Only reachable if the runner succeeded without signalling compilation.
                stages.push(Stage::Failed);
                let e = RunnerError::EngineFault("reference was not executed".into());
                return Ok(Graded { verdict: self.failed(Side::Reference, e, ms_learner, ms_reference), stages });
            }
        };

        if stages.last() != Some(&Stage::Normalizing) {
            stages.push(Stage::Normalizing);
        }
        let learner_norm = normalize(&learner_rs, &policy);
        stages.push(Stage::Comparing);
        let cmp = compare(&learner_norm, &expectation, &policy, self.settings.diagnostic_samples);
        stages.push(Stage::Done);

        let verdict = Verdict {
            submission_id: Uuid::new_v4().to_string(),
            status: if cmp.is_correct() { VerdictStatus::Correct } else { VerdictStatus::Incorrect },
            score: cmp.score,
            message: match &cmp.diagnostic {
                None => "Correct! Your query returns the expected result.".to_string(),
                Some(d) => explain(d, self.settings.diagnostic_samples),
            },
            diagnostic: cmp.diagnostic,
            failure: None,
            execution_ms_learner: ms_learner,
            execution_ms_reference: ms_reference,
        };
        info!(target: "grading", id = %verdict.submission_id, status = ?verdict.status, score = verdict.score, ms_learner, ms_reference, "Verdict");
        Ok(Graded { verdict, stages })
    }

    fn validate(&self, req: &GradingRequest) -> Result<Arc<Dataset>, GradingError> {
        if req.learner_query.trim().is_empty() {
            return Err(GradingError::EmptyQuery);
        }
        if req.learner_query.len() > self.settings.max_query_bytes {
            return Err(GradingError::QueryTooLarge { size: req.learner_query.len(), limit: self.settings.max_query_bytes });
        }
        self.datasets
            .load(&req.dataset_id)
            .ok_or_else(|| GradingError::UnknownDataset(req.dataset_id.clone()))
    }

    fn plan<'a>(&self, req: &'a GradingRequest) -> Result<Plan<'a>, GradingError> {
        match &req.reference {
            ReferenceSpec::SolutionQuery(sql) => {
                check_read_only(sql).map_err(|e| GradingError::InvalidReferenceSpec(e.to_string()))?;
                let mut policy = self.settings.policy.with_overrides(&req.policy);
                if req.policy.ignore_row_order.is_none() {
                    policy.ignore_row_order = !has_top_level_order_by(sql);
                }
                Ok(Plan::Query { sql, policy })
            }
            ReferenceSpec::ExpectedShape(shape) => {
                let policy = shape_policy(shape, &self.settings.policy, &req.policy);
                let expectation = Expectation::from_shape(shape, &policy).map_err(GradingError::InvalidReferenceSpec)?;
                Ok(Plan::Shape { expectation, policy })
            }
        }
    }

    /// Run one side under its own sub-budget. Engine faults are retried within
    /// whatever is left of that budget; nothing else is.
    async fn run_side(
        &self,
        side: Side,
        dataset: &Arc<Dataset>,
        sql: &str,
        budget: Duration,
        compiled: Option<&watch::Sender<Compile>>,
    ) -> SideRun {
        let runner = match side {
            Side::Learner => &self.runner,
            Side::Reference => &self.reference_runner,
        };
        let started = Instant::now();
        let mut attempt: u32 = 0;
        let result = loop {
            attempt += 1;
            let remaining = budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break Err(RunnerError::Timeout);
            }
            let result = match compiled {
                Some(state) => {
                    let (tx, rx) = oneshot::channel();
                    let forward = async {
                        if rx.await.is_ok() {
                            state.send_replace(Compile::Ready);
                        }
                    };
                    let (result, _) = tokio::join!(runner.run(dataset.clone(), sql, remaining, Some(tx)), forward);
                    result
                }
                None => runner.run(dataset.clone(), sql, remaining, None).await,
            };
            match result {
                Err(e) if e.is_retryable() && attempt <= self.settings.engine_fault_retries => {
                    warn!(target: "grading", %side, attempt, error = %e, "Transient engine fault; retrying");
                }
                other => break other,
            }
        };
        if let Some(state) = compiled {
            state.send_if_modified(|c| {
                if *c == Compile::Pending {
                    *c = Compile::Failed;
                    true
                } else {
                    false
                }
            });
        }
        if let Err(e) = &result {
            debug!(target: "grading", %side, attempt, error = %e, "Run failed");
        }
        SideRun { result, elapsed: started.elapsed() }
    }

    fn failed(&self, side: Side, e: RunnerError, ms_learner: Option<u64>, ms_reference: Option<u64>) -> Verdict {
        // The learner sees their own engine message, never the reference's.
        let message = if side == Side::Learner { runner_message(&e) } else { String::new() };
        let failure = RunFailure { side, kind: e.kind(), message };
        let status = if matches!(e, RunnerError::Timeout) { VerdictStatus::Timeout } else { VerdictStatus::RuntimeError };
        let verdict = Verdict {
            submission_id: Uuid::new_v4().to_string(),
            status,
            score: 0.0,
            message: explain_failure(&failure),
            diagnostic: None,
            failure: Some(failure),
            execution_ms_learner: ms_learner,
            execution_ms_reference: ms_reference,
        };
        info!(target: "grading", id = %verdict.submission_id, status = ?verdict.status, %side, kind = ?e.kind(), "Verdict (failed run)");
        verdict
    }
}

/// Engine message without the variant prefix `RunnerError`'s Display adds.
fn runner_message(e: &RunnerError) -> String {
    match e {
        RunnerError::SyntaxError(m) | RunnerError::Forbidden(m) | RunnerError::EngineFault(m) => m.clone(),
        other => other.to_string(),
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u64::MAX as u128) as u64
}
