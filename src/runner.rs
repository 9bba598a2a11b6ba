//! Embedded SQL runner: executes one read-only query against a fresh copy of a dataset.
//!
//! Execution happens on tokio's blocking pool, gated by a semaphore so at most
//! `max_concurrent_runs` engine calls are in flight. A SQLite progress handler polls a
//! cancellation flag and the deadline, so a timeout or a dropped caller stops the engine
//! itself instead of leaving it to run to completion in the background.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::ErrorCode;
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, instrument, warn};

use crate::dataset::Dataset;
use crate::domain::{ResultSet, Value};
use crate::error::RunnerError;
use crate::guard::check_read_only;

/// VM instructions between progress-handler polls.
const PROGRESS_OPS: i32 = 1_000;
/// How long past the deadline we wait for the engine to notice before giving up on it.
const STOP_GRACE: Duration = Duration::from_millis(250);

#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Run `query` with a hard time budget. `compiled` fires once the statement has
    /// been prepared successfully; it is dropped unsent if preparation fails.
    async fn run(
        &self,
        dataset: Arc<Dataset>,
        query: &str,
        timeout: Duration,
        compiled: Option<oneshot::Sender<()>>,
    ) -> Result<ResultSet, RunnerError>;
}

#[derive(Clone)]
pub struct SqlRunner {
    max_rows: usize,
    permits: Arc<Semaphore>,
}

impl SqlRunner {
    pub fn new(max_rows: usize, max_concurrent_runs: usize) -> Self {
        Self {
            max_rows,
            permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
        }
    }
}

/// Raises the cancellation flag when the awaiting future goes away.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl QueryRunner for SqlRunner {
    #[instrument(level = "debug", skip(self, dataset, query, compiled), fields(dataset = %dataset.id, query_len = query.len(), timeout_ms = timeout.as_millis() as u64))]
    async fn run(
        &self,
        dataset: Arc<Dataset>,
        query: &str,
        timeout: Duration,
        compiled: Option<oneshot::Sender<()>>,
    ) -> Result<ResultSet, RunnerError> {
        check_read_only(query)?;

        let started = Instant::now();
        let permit = match tokio::time::timeout(timeout, self.permits.clone().acquire_owned()).await {
            Ok(Ok(p)) => p,
            Ok(Err(_)) => return Err(RunnerError::EngineFault("runner pool is closed".into())),
            Err(_) => {
                warn!(target: "runner", "No runner slot freed up within the time budget");
                return Err(RunnerError::EngineFault("all runners are busy".into()));
            }
        };
        let remaining = timeout.saturating_sub(started.elapsed());
        let deadline = Instant::now() + remaining;

        let cancel = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = CancelOnDrop(cancel.clone());
        let flag = cancel.clone();
        let sql = query.to_string();
        let max_rows = self.max_rows;
        let task = tokio::task::spawn_blocking(move || {
            // Held until the engine call returns, not until the caller stops waiting.
            let _permit = permit;
            execute(&dataset, &sql, deadline, &flag, max_rows, compiled)
        });

        match tokio::time::timeout(remaining + STOP_GRACE, task).await {
            Ok(Ok(result)) => {
                if let Ok(rs) = &result {
                    debug!(target: "runner", rows = rs.rows.len(), columns = ?rs.column_names(), elapsed_ms = started.elapsed().as_millis() as u64, "Query finished");
                }
                result
            }
            Ok(Err(e)) => Err(RunnerError::EngineFault(format!("runner task failed: {e}"))),
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                warn!(target: "runner", "Engine did not stop at its deadline; abandoning the call");
                Err(RunnerError::Timeout)
            }
        }
    }
}

fn execute(
    dataset: &Dataset,
    sql: &str,
    deadline: Instant,
    cancel: &Arc<AtomicBool>,
    max_rows: usize,
    compiled: Option<oneshot::Sender<()>>,
) -> Result<ResultSet, RunnerError> {
    let conn = dataset
        .materialize()
        .map_err(|e| RunnerError::EngineFault(format!("failed to load dataset '{}': {e}", dataset.id)))?;

    let flag = cancel.clone();
    conn.progress_handler(
        PROGRESS_OPS,
        Some(move || flag.load(Ordering::Relaxed) || Instant::now() >= deadline),
    );

    let mut stmt = conn.prepare(sql).map_err(|e| classify(e, cancel))?;
    if !stmt.readonly() {
        return Err(RunnerError::Forbidden("statement would modify the database".into()));
    }
    if let Some(tx) = compiled {
        let _ = tx.send(());
    }

    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let width = names.len();
    let mut out: Vec<Vec<Value>> = Vec::new();
    let mut rows = stmt.query([]).map_err(|e| classify(e, cancel))?;
    while let Some(row) = rows.next().map_err(|e| classify(e, cancel))? {
        if out.len() >= max_rows {
            return Err(RunnerError::TooManyRows { limit: max_rows });
        }
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            let v = row.get_ref(i).map_err(|e| RunnerError::EngineFault(e.to_string()))?;
            values.push(from_sql(v));
        }
        out.push(values);
    }

    ResultSet::new(names, out).map_err(RunnerError::EngineFault)
}

fn from_sql(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => {
            let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
            Value::Text(format!("x'{hex}'"))
        }
    }
}

/// Interrupts are ours (timeout or cancel); resource and I/O failures are transient;
/// everything else is a deterministic problem with the query.
fn classify(e: rusqlite::Error, cancel: &AtomicBool) -> RunnerError {
    match &e {
        rusqlite::Error::SqliteFailure(err, msg) => match err.code {
            ErrorCode::OperationInterrupted => {
                if cancel.load(Ordering::Relaxed) {
                    RunnerError::Cancelled
                } else {
                    RunnerError::Timeout
                }
            }
            ErrorCode::ReadOnly => RunnerError::Forbidden("statement would modify the database".into()),
            ErrorCode::OutOfMemory
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure
            | ErrorCode::InternalMalfunction => RunnerError::EngineFault(e.to_string()),
            _ => RunnerError::SyntaxError(msg.clone().unwrap_or_else(|| e.to_string())),
        },
        _ => RunnerError::EngineFault(e.to_string()),
    }
}
