//! Human-readable explanations for diagnostics and run failures.
//!
//! Messages never quote reference SQL and show at most `max_samples` rows per list.

use crate::domain::{Diagnostic, FailureKind, RowSample, RunFailure, Side, Value};

pub const DEFAULT_MAX_SAMPLES: usize = 5;

pub fn explain(diag: &Diagnostic, max_samples: usize) -> String {
    match diag {
        Diagnostic::RowCountMismatch { learner, reference, missing, extra } => {
            let mut out = format!(
                "Your query returned {} but {} {} expected.",
                plural(*learner, "row"),
                reference,
                if *reference == 1 { "was" } else { "were" }
            );
            push_sample(&mut out, "missing", missing, max_samples);
            push_sample(&mut out, "unexpected", extra, max_samples);
            out
        }
        Diagnostic::MissingRows { missing } => {
            let mut out = format!("Your query is missing {}.", plural(missing.total, "expected row"));
            push_sample(&mut out, "missing", missing, max_samples);
            out
        }
        Diagnostic::ExtraRows { extra } => {
            let mut out = format!("Your query returned {} too many.", plural(extra.total, "row"));
            push_sample(&mut out, "unexpected", extra, max_samples);
            out
        }
        Diagnostic::ColumnMismatch { learner_columns: 0, .. } => {
            "Your query returned no columns.".to_string()
        }
        Diagnostic::ColumnMismatch {
            learner_columns,
            expected_columns,
            missing_columns,
            unexpected_columns,
        } => {
            let mut out = if learner_columns == expected_columns {
                format!("Your query returned the right number of columns ({learner_columns}) but not the expected ones.")
            } else {
                format!(
                    "Your query returned {} but {} {} expected.",
                    plural(*learner_columns, "column"),
                    expected_columns,
                    if *expected_columns == 1 { "was" } else { "were" }
                )
            };
            if !missing_columns.is_empty() {
                out.push_str(&format!(" Missing: {}.", missing_columns.join(", ")));
            }
            if !unexpected_columns.is_empty() {
                out.push_str(&format!(" Not expected: {}.", unexpected_columns.join(", ")));
            }
            out
        }
        Diagnostic::ColumnOrderMismatch { learner, expected } => format!(
            "Your columns are right but in the wrong order: expected {}, got {}.",
            expected.join(", "),
            learner.join(", ")
        ),
        Diagnostic::ValueMismatch { columns, missing, extra } => {
            let mut out = format!(
                "Your query returned the right number of rows but {} {} different values.",
                plural(extra.total.max(missing.total), "row"),
                if extra.total.max(missing.total) == 1 { "has" } else { "have" }
            );
            if !columns.is_empty() {
                out.push_str(&format!(" Check: {}.", columns.join(", ")));
            }
            push_sample(&mut out, "missing", missing, max_samples);
            push_sample(&mut out, "unexpected", extra, max_samples);
            out
        }
        Diagnostic::RowOrderMismatch { first_mismatch_row } => format!(
            "Your rows are right but in the wrong order, starting at row {}. Check your ORDER BY.",
            first_mismatch_row + 1
        ),
    }
}

/// Reference-side failures are described without the engine message, which may quote the reference.
pub fn explain_failure(failure: &RunFailure) -> String {
    match (failure.side, failure.kind) {
        (Side::Learner, FailureKind::SyntaxError) => format!("Your SQL has an error: {}", failure.message),
        (Side::Learner, FailureKind::Forbidden) => format!("Your query was not run: {}", failure.message),
        (Side::Learner, FailureKind::Timeout) => {
            "Your query took too long and was stopped. Look for a missing join condition.".to_string()
        }
        (Side::Learner, FailureKind::TooManyRows) => format!("Your query returned too many rows: {}", failure.message),
        (Side::Learner, FailureKind::EngineFault) => {
            "The SQL engine failed while running your query. Please try again.".to_string()
        }
        (_, FailureKind::Cancelled) => "Grading was cancelled.".to_string(),
        (Side::Reference, FailureKind::Timeout) => {
            "The reference solution took too long to evaluate; this is not a problem with your query.".to_string()
        }
        (Side::Reference, _) => {
            "The reference solution could not be evaluated; this is not a problem with your query.".to_string()
        }
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

fn push_sample(out: &mut String, label: &str, sample: &RowSample, max_samples: usize) {
    if sample.is_empty() {
        return;
    }
    let shown: Vec<&Vec<Value>> = sample.rows.iter().take(max_samples).collect();
    if shown.is_empty() {
        return;
    }
    let rows: Vec<String> = shown.iter().map(|r| render_row(r)).collect();
    if shown.len() < sample.total {
        out.push_str(&format!(
            " Showing {} of {} {label} rows ({}): {}",
            shown.len(),
            sample.total,
            sample.columns.join(", "),
            rows.join(", ")
        ));
    } else {
        out.push_str(&format!(
            " {} {label} ({}): {}",
            if sample.total == 1 { "1 row" } else { "Rows" },
            sample.columns.join(", "),
            rows.join(", ")
        ));
    }
}

fn render_row(row: &[Value]) -> String {
    let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
    format!("({})", cells.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(total: usize) -> RowSample {
        RowSample {
            columns: vec!["name".into(), "age".into()],
            rows: (0..total.min(5))
                .map(|i| vec![Value::Text(format!("p{i}")), Value::Integer(i as i64)])
                .collect(),
            total,
        }
    }

    #[test]
    fn row_count_message_names_both_counts_and_bounds_samples() {
        let d = Diagnostic::RowCountMismatch {
            learner: 12,
            reference: 14,
            missing: sample(3),
            extra: RowSample::default(),
        };
        let msg = explain(&d, 2);
        assert!(msg.starts_with("Your query returned 12 rows but 14 were expected."), "{msg}");
        assert!(msg.contains("Showing 2 of 3 missing rows (name, age)"), "{msg}");
        assert!(msg.contains("('p1', 1)"));
        assert!(!msg.contains("p2"));
    }

    #[test]
    fn column_mismatch_lists_missing_columns() {
        let d = Diagnostic::ColumnMismatch {
            learner_columns: 1,
            expected_columns: 2,
            missing_columns: vec!["age".into()],
            unexpected_columns: vec![],
        };
        assert_eq!(explain(&d, 5), "Your query returned 1 column but 2 were expected. Missing: age.");
    }

    #[test]
    fn reference_failures_do_not_echo_engine_messages() {
        let f = RunFailure {
            side: Side::Reference,
            kind: FailureKind::SyntaxError,
            message: "near \"SECRET_COLUMN\": syntax error".into(),
        };
        assert!(!explain_failure(&f).contains("SECRET_COLUMN"));
    }

    #[test]
    fn learner_syntax_errors_are_shown() {
        let f = RunFailure {
            side: Side::Learner,
            kind: FailureKind::SyntaxError,
            message: "near \"SELCT\": syntax error".into(),
        };
        assert_eq!(explain_failure(&f), "Your SQL has an error: near \"SELCT\": syntax error");
    }

    #[test]
    fn text_values_are_quoted() {
        assert_eq!(render_row(&[Value::Text("O'Brien".into()), Value::Null]), "('O''Brien', NULL)");
    }
}
