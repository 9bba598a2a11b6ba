//! Domain models shared by the grader: result values, result sets, reference specs, verdicts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::PolicyOverrides;

/// A single SQL result value. Booleans are not a storage class in SQLite, so they never appear.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
}

impl Value {
  pub fn value_type(&self) -> ValueType {
    match self {
      Value::Null => ValueType::Null,
      Value::Integer(_) => ValueType::Integer,
      Value::Real(_) => ValueType::Real,
      Value::Text(_) => ValueType::Text,
    }
  }

  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Value::Integer(i) => Some(*i as f64),
      Value::Real(r) => Some(*r),
      _ => None,
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Null => f.write_str("NULL"),
      Value::Integer(i) => write!(f, "{i}"),
      Value::Real(r) => write!(f, "{r}"),
      Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
    }
  }
}

/// Type of a column, inferred from the values it holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
  Null,
  Integer,
  Real,
  Text,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
  pub name: String,
  #[serde(rename = "type")]
  pub inferred_type: ValueType,
}

/// Columnar output of one query. Every row has exactly `columns.len()` values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
  pub columns: Vec<Column>,
  pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
  /// Build a result set, inferring each column's type from its non-null values.
  /// Fails if any row has the wrong width.
  pub fn new(names: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, String> {
    if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != names.len()) {
      return Err(format!(
        "row {} has {} values but there are {} columns",
        idx,
        row.len(),
        names.len()
      ));
    }
    let columns = names
      .into_iter()
      .enumerate()
      .map(|(idx, name)| Column { name, inferred_type: infer_type(rows.iter().map(|r| &r[idx])) })
      .collect();
    Ok(Self { columns, rows })
  }

  pub fn column_names(&self) -> Vec<String> {
    self.columns.iter().map(|c| c.name.clone()).collect()
  }
}

/// Integer and real values in one column widen to real; text wins over numbers.
fn infer_type<'a>(values: impl Iterator<Item = &'a Value>) -> ValueType {
  let mut out = ValueType::Null;
  for v in values {
    out = match (out, v.value_type()) {
      (acc, ValueType::Null) => acc,
      (ValueType::Null, t) => t,
      (ValueType::Text, _) | (_, ValueType::Text) => ValueType::Text,
      (ValueType::Integer, ValueType::Integer) => ValueType::Integer,
      _ => ValueType::Real,
    };
  }
  out
}

/// How a submission is judged: run a canonical query, or check a declared shape.
/// Exactly one form is present; serde's external tagging enforces that on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceSpec {
  SolutionQuery(String),
  ExpectedShape(ExpectedShape),
}

/// Declarative expectation. Absent fields are not checked.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedShape {
  #[serde(default)]
  pub columns: Option<Vec<String>>,
  #[serde(default)]
  pub row_count: Option<usize>,
  #[serde(default)]
  pub rows: Option<Vec<Vec<Value>>>,
  #[serde(default)]
  pub column_order_matters: bool,
  #[serde(default)]
  pub row_order_matters: bool,
}

/// Where a challenge came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeSource {
  Seed,
  Config,
}

/// A graded exercise: a prompt over a dataset plus the hidden reference.
#[derive(Clone, Debug)]
pub struct Challenge {
  pub id: String,
  pub title: String,
  pub difficulty: String,
  pub dataset_id: String,
  pub prompt: String,
  pub reference: ReferenceSpec,
  pub policy: PolicyOverrides,
  pub source: ChallengeSource,
}

#[derive(Clone, Debug)]
pub struct GradingRequest {
  pub dataset_id: String,
  pub learner_query: String,
  pub reference: ReferenceSpec,
  pub policy: PolicyOverrides,
}

/// Which query a timing or failure belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
  Learner,
  Reference,
}

impl fmt::Display for Side {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Side::Learner => f.write_str("learner"),
      Side::Reference => f.write_str("reference"),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
  Correct,
  Incorrect,
  RuntimeError,
  Timeout,
}

impl VerdictStatus {
  /// Short outcome code used on the wire next to `status`.
  pub fn outcome(self) -> &'static str {
    match self {
      VerdictStatus::Correct => "ok",
      VerdictStatus::Incorrect => "mismatch",
      VerdictStatus::RuntimeError => "error",
      VerdictStatus::Timeout => "timeout",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  SyntaxError,
  Forbidden,
  Timeout,
  EngineFault,
  TooManyRows,
  Cancelled,
}

/// Why a query could not produce a result, and on which side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
  pub side: Side,
  pub kind: FailureKind,
  pub message: String,
}

/// A bounded sample of rows, with the total they were drawn from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSample {
  pub columns: Vec<String>,
  pub rows: Vec<Vec<Value>>,
  pub total: usize,
}

impl RowSample {
  pub fn is_empty(&self) -> bool {
    self.total == 0
  }
}

/// Why a learner result differs from the expectation. Never carries reference SQL text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all_fields = "camelCase")]
pub enum Diagnostic {
  RowCountMismatch {
    learner: usize,
    reference: usize,
    missing: RowSample,
    extra: RowSample,
  },
  MissingRows {
    missing: RowSample,
  },
  ExtraRows {
    extra: RowSample,
  },
  ColumnMismatch {
    learner_columns: usize,
    expected_columns: usize,
    missing_columns: Vec<String>,
    unexpected_columns: Vec<String>,
  },
  ColumnOrderMismatch {
    learner: Vec<String>,
    expected: Vec<String>,
  },
  ValueMismatch {
    columns: Vec<String>,
    missing: RowSample,
    extra: RowSample,
  },
  RowOrderMismatch {
    first_mismatch_row: usize,
  },
}

/// Final outcome of grading one submission. Immutable once built.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
  pub submission_id: String,
  pub status: VerdictStatus,
  pub score: f32,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub diagnostic: Option<Diagnostic>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub failure: Option<RunFailure>,
  pub execution_ms_learner: Option<u64>,
  pub execution_ms_reference: Option<u64>,
}
