//! Equivalence checking of a normalized learner result against an expectation.
//!
//! Checks run in a fixed order and stop at the first failure: zero columns, column set,
//! column order, row count, multiset row difference, row order.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{Diagnostic, ExpectedShape, ResultSet, RowSample, Value};
use crate::normalize::{
    cells_equal, cmp_cells, normalize, rows_equal, Cell, NormalizationPolicy,
    NormalizedResult, PolicyOverrides,
};

/// Credit for a result with the right content but the wrong column or row arrangement.
const ARRANGEMENT_CREDIT: f32 = 75.0;

/// What the learner result is checked against. Built from a reference result or a shape.
#[derive(Clone, Debug)]
pub struct Expectation {
    pub result: NormalizedResult,
    pub check_columns: bool,
    pub row_count: Option<usize>,
    pub check_rows: bool,
}

impl Expectation {
    pub fn from_reference(result: NormalizedResult) -> Self {
        Self {
            row_count: Some(result.rows.len()),
            result,
            check_columns: true,
            check_rows: true,
        }
    }

    /// Build from a declared shape. `policy` must already reflect the shape's
    /// order flags; rows without column names force positional matching.
    pub fn from_shape(shape: &ExpectedShape, policy: &NormalizationPolicy) -> Result<Self, String> {
        if shape.columns.is_none() && shape.row_count.is_none() && shape.rows.is_none() {
            return Err("expectedShape must declare at least one of columns, rowCount or rows".into());
        }
        if matches!(&shape.columns, Some(c) if c.is_empty()) {
            return Err("expectedShape.columns must not be empty".into());
        }
        if let (Some(n), Some(rows)) = (shape.row_count, &shape.rows) {
            if n != rows.len() {
                return Err(format!("rowCount is {n} but {} rows are listed", rows.len()));
            }
        }

        let rows = shape.rows.clone().unwrap_or_default();
        let names = match &shape.columns {
            Some(cols) => cols.clone(),
            None => {
                let width = rows.first().map(Vec::len).unwrap_or(0);
                (1..=width).map(|i| format!("column{i}")).collect()
            }
        };
        let result = ResultSet::new(names, rows).map_err(|e| format!("expectedShape.rows: {e}"))?;
        let check_columns = shape.columns.is_some() || !result.columns.is_empty();

        Ok(Self {
            result: normalize(&result, policy),
            check_columns,
            row_count: shape.row_count,
            check_rows: shape.rows.is_some(),
        })
    }
}

/// Policy for grading against a shape: the shape's own order flags win over overrides,
/// and rows without column names can only be matched by position.
pub fn shape_policy(
    shape: &ExpectedShape,
    base: &NormalizationPolicy,
    overrides: &PolicyOverrides,
) -> NormalizationPolicy {
    let mut policy = base.with_overrides(overrides);
    policy.ignore_column_order = !shape.column_order_matters;
    policy.ignore_row_order = !shape.row_order_matters;
    if shape.columns.is_none() {
        policy.ignore_column_names = true;
    }
    policy
}

#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub diagnostic: Option<Diagnostic>,
    pub score: f32,
}

impl Comparison {
    fn correct() -> Self {
        Self { diagnostic: None, score: 100.0 }
    }

    fn mismatch(diagnostic: Diagnostic, score: f32) -> Self {
        Self { diagnostic: Some(diagnostic), score }
    }

    pub fn is_correct(&self) -> bool {
        self.diagnostic.is_none()
    }
}

pub fn compare(
    learner: &NormalizedResult,
    expected: &Expectation,
    policy: &NormalizationPolicy,
    max_samples: usize,
) -> Comparison {
    let exp = &expected.result;

    if learner.width() == 0 {
        return Comparison::mismatch(
            Diagnostic::ColumnMismatch {
                learner_columns: 0,
                expected_columns: exp.width(),
                missing_columns: if policy.ignore_column_names { vec![] } else { exp.columns.clone() },
                unexpected_columns: vec![],
            },
            0.0,
        );
    }

    if expected.check_columns {
        if let Some(cmp) = check_columns(learner, exp, policy) {
            return cmp;
        }
    }

    let eps = policy.numeric_epsilon;
    let diff = if expected.check_rows {
        diff_rows(&learner.sorted_rows(), &exp.sorted_rows(), eps)
    } else {
        RowDiff::default()
    };
    let row_score = |l: usize, r: usize| -> f32 {
        let denom = l.max(r);
        if denom == 0 {
            100.0
        } else {
            100.0 * diff.matched as f32 / denom as f32
        }
    };

    if let Some(n) = expected.row_count {
        if learner.rows.len() != n {
            let score = if expected.check_rows { row_score(learner.rows.len(), n) } else { 0.0 };
            return Comparison::mismatch(
                Diagnostic::RowCountMismatch {
                    learner: learner.rows.len(),
                    reference: n,
                    missing: sample(&exp.columns, &diff.missing, max_samples),
                    extra: sample(&learner.columns, &diff.extra, max_samples),
                },
                score,
            );
        }
    }

    if !expected.check_rows {
        return Comparison::correct();
    }

    let score = row_score(learner.rows.len(), exp.rows.len());
    match (diff.missing.is_empty(), diff.extra.is_empty()) {
        (true, true) => {}
        (false, true) => {
            return Comparison::mismatch(
                Diagnostic::MissingRows { missing: sample(&exp.columns, &diff.missing, max_samples) },
                score,
            )
        }
        (true, false) => {
            return Comparison::mismatch(
                Diagnostic::ExtraRows { extra: sample(&learner.columns, &diff.extra, max_samples) },
                score,
            )
        }
        (false, false) => {
            return Comparison::mismatch(
                Diagnostic::ValueMismatch {
                    columns: differing_columns(learner, exp, eps),
                    missing: sample(&exp.columns, &diff.missing, max_samples),
                    extra: sample(&learner.columns, &diff.extra, max_samples),
                },
                score,
            )
        }
    }

    if !policy.ignore_row_order {
        if let Some(idx) = learner
            .rows
            .iter()
            .zip(&exp.rows)
            .position(|(l, r)| !rows_equal(l, r, eps))
        {
            return Comparison::mismatch(
                Diagnostic::RowOrderMismatch { first_mismatch_row: idx },
                ARRANGEMENT_CREDIT,
            );
        }
    }

    Comparison::correct()
}

fn check_columns(
    learner: &NormalizedResult,
    exp: &NormalizedResult,
    policy: &NormalizationPolicy,
) -> Option<Comparison> {
    let positional = policy.ignore_column_names || exp.keys.iter().any(Option::is_none);
    if positional {
        if learner.width() == exp.width() {
            return None;
        }
        return Some(Comparison::mismatch(
            Diagnostic::ColumnMismatch {
                learner_columns: learner.width(),
                expected_columns: exp.width(),
                missing_columns: vec![],
                unexpected_columns: vec![],
            },
            0.0,
        ));
    }

    let missing = multiset_minus(&exp.keys, &exp.columns, &learner.keys);
    let unexpected = multiset_minus(&learner.keys, &learner.columns, &exp.keys);
    if !missing.is_empty() || !unexpected.is_empty() {
        return Some(Comparison::mismatch(
            Diagnostic::ColumnMismatch {
                learner_columns: learner.width(),
                expected_columns: exp.width(),
                missing_columns: missing,
                unexpected_columns: unexpected,
            },
            0.0,
        ));
    }

    if !policy.ignore_column_order && learner.keys != exp.keys {
        return Some(Comparison::mismatch(
            Diagnostic::ColumnOrderMismatch {
                learner: learner.columns.clone(),
                expected: exp.columns.clone(),
            },
            ARRANGEMENT_CREDIT,
        ));
    }
    None
}

/// Display names of the keys in `a` that `b` lacks, counting duplicates.
fn multiset_minus(a: &[Option<String>], display: &[String], b: &[Option<String>]) -> Vec<String> {
    let mut available: BTreeMap<&Option<String>, usize> = BTreeMap::new();
    for k in b {
        *available.entry(k).or_default() += 1;
    }
    let mut out = Vec::new();
    for (k, name) in a.iter().zip(display) {
        match available.get_mut(k) {
            Some(n) if *n > 0 => *n -= 1,
            _ => out.push(name.clone()),
        }
    }
    out
}

#[derive(Debug, Default)]
struct RowDiff {
    missing: Vec<Vec<Cell>>,
    extra: Vec<Vec<Cell>>,
    matched: usize,
}

/// Bit-exact identity of a row.
#[derive(PartialEq, Eq, Hash)]
enum ExactKey<'a> {
    Null,
    Int(i64),
    Real(u64),
    Text(&'a str),
}

/// Everything about a row except its numbers, which may still match within tolerance.
#[derive(PartialEq, Eq, Hash)]
enum LooseKey<'a> {
    Null,
    Number,
    Text(&'a str),
}

fn exact_key(row: &[Cell]) -> Vec<ExactKey<'_>> {
    row.iter()
        .map(|c| match c {
            Cell::Null => ExactKey::Null,
            Cell::Int(i) => ExactKey::Int(*i),
            Cell::Real { value, .. } => ExactKey::Real(value.to_bits()),
            Cell::Text(t) => ExactKey::Text(t),
        })
        .collect()
}

fn loose_key(row: &[Cell]) -> Vec<LooseKey<'_>> {
    row.iter()
        .map(|c| match c {
            Cell::Null => LooseKey::Null,
            Cell::Int(_) | Cell::Real { .. } => LooseKey::Number,
            Cell::Text(t) => LooseKey::Text(t),
        })
        .collect()
}

fn numeric(c: &Cell) -> f64 {
    match c {
        Cell::Int(i) => *i as f64,
        Cell::Real { value, .. } => *value,
        _ => 0.0,
    }
}

/// Widest distance from `v` at which another number can still be equal to it:
/// `|v-w| <= eps * max(1, |v|, |w|)` implies `|w| <= |v| / (1 - eps)`.
fn reach(v: f64, eps: f64) -> f64 {
    if eps >= 1.0 {
        return f64::INFINITY;
    }
    // Slack for rounding in the bound itself.
    eps * 1f64.max(v.abs() / (1.0 - eps)) * (1.0 + 1e-9)
}

/// Multiset difference under tolerant equality.
///
/// Bit-identical rows are paired through a hash first. The rest are grouped by their
/// non-numeric content, and each learner row takes the first unpaired expected row
/// of its group whose pivot number lies within reach and whose cells all match.
/// Rows come back in the order they were given.
fn diff_rows(learner: &[Vec<Cell>], expected: &[Vec<Cell>], eps: f64) -> RowDiff {
    let mut diff = RowDiff::default();
    let mut learner_used = vec![false; learner.len()];
    let mut expected_used = vec![false; expected.len()];

    let mut exact: HashMap<Vec<ExactKey<'_>>, Vec<usize>> = HashMap::new();
    for (j, row) in expected.iter().enumerate().rev() {
        exact.entry(exact_key(row)).or_default().push(j);
    }
    for (i, row) in learner.iter().enumerate() {
        if let Some(j) = exact.get_mut(&exact_key(row)).and_then(Vec::pop) {
            learner_used[i] = true;
            expected_used[j] = true;
            diff.matched += 1;
        }
    }

    let mut groups: HashMap<Vec<LooseKey<'_>>, (usize, Vec<usize>)> = HashMap::new();
    for (j, row) in expected.iter().enumerate().filter(|(j, _)| !expected_used[*j]) {
        let Some(pivot) = row.iter().position(|c| matches!(c, Cell::Int(_) | Cell::Real { .. })) else {
            // Without numbers only exact equality applies, and that pass is done.
            continue;
        };
        groups.entry(loose_key(row)).or_insert_with(|| (pivot, Vec::new())).1.push(j);
    }
    for (pivot, members) in groups.values_mut() {
        let c = *pivot;
        members.sort_by(|a, b| numeric(&expected[*a][c]).total_cmp(&numeric(&expected[*b][c])));
    }

    for (i, row) in learner.iter().enumerate() {
        if learner_used[i] {
            continue;
        }
        let Some((pivot, members)) = groups.get(&loose_key(row)) else {
            continue;
        };
        let v = numeric(&row[*pivot]);
        let r = reach(v, eps);
        let start = members.partition_point(|&j| numeric(&expected[j][*pivot]) < v - r);
        for &j in &members[start..] {
            if numeric(&expected[j][*pivot]) > v + r {
                break;
            }
            if !expected_used[j] && rows_equal(row, &expected[j], eps) {
                learner_used[i] = true;
                expected_used[j] = true;
                diff.matched += 1;
                break;
            }
        }
    }

    diff.extra = learner.iter().zip(&learner_used).filter(|(_, u)| !**u).map(|(r, _)| r.clone()).collect();
    diff.missing = expected.iter().zip(&expected_used).filter(|(_, u)| !**u).map(|(r, _)| r.clone()).collect();
    diff
}

/// Columns whose value multisets differ, a hint at a wrong expression or aggregate.
fn differing_columns(learner: &NormalizedResult, exp: &NormalizedResult, eps: f64) -> Vec<String> {
    (0..learner.width().min(exp.width()))
        .filter(|&c| {
            let mut l: Vec<&Cell> = learner.rows.iter().map(|r| &r[c]).collect();
            let mut r: Vec<&Cell> = exp.rows.iter().map(|r| &r[c]).collect();
            l.sort_by(|a, b| cmp_cells(a, b, eps));
            r.sort_by(|a, b| cmp_cells(a, b, eps));
            l.len() != r.len() || l.iter().zip(&r).any(|(a, b)| !cells_equal(a, b, eps))
        })
        .map(|c| learner.columns[c].clone())
        .collect()
}

fn sample(columns: &[String], rows: &[Vec<Cell>], max: usize) -> RowSample {
    RowSample {
        columns: columns.to_vec(),
        rows: rows
            .iter()
            .take(max)
            .map(|r| r.iter().map(Cell::to_value).collect::<Vec<Value>>())
            .collect(),
        total: rows.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rs(names: &[&str], rows: Vec<Vec<Value>>) -> ResultSet {
        ResultSet::new(names.iter().map(|s| s.to_string()).collect(), rows).expect("valid")
    }

    fn int(i: i64) -> Value {
        Value::Integer(i)
    }

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    fn check(learner: &ResultSet, reference: &ResultSet, policy: &NormalizationPolicy) -> Comparison {
        let exp = Expectation::from_reference(normalize(reference, policy));
        compare(&normalize(learner, policy), &exp, policy, 5)
    }

    #[test]
    fn identical_results_in_any_row_order_are_correct() {
        let p = NormalizationPolicy::default();
        let a = rs(&["id", "name"], vec![vec![int(1), text("a")], vec![int(2), text("b")]]);
        let b = rs(&["ID", "name"], vec![vec![int(2), text("b")], vec![int(1), text("a")]]);
        assert!(check(&a, &b, &p).is_correct());
    }

    #[test]
    fn empty_against_empty_is_correct() {
        let p = NormalizationPolicy::default();
        let a = rs(&["id"], vec![]);
        assert!(check(&a, &a, &p).is_correct());
    }

    #[test]
    fn row_count_mismatch_reports_both_counts() {
        let p = NormalizationPolicy::default();
        let learner = rs(&["pclass", "n"], (1..=4).map(|c| vec![int(c), int(10)]).collect());
        let reference = rs(&["pclass", "n"], (1..=3).map(|c| vec![int(c), int(10)]).collect());
        let cmp = check(&learner, &reference, &p);
        match cmp.diagnostic {
            Some(Diagnostic::RowCountMismatch { learner, reference, ref extra, .. }) => {
                assert_eq!((learner, reference), (4, 3));
                assert_eq!(extra.total, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cmp.score, 75.0);
    }

    #[test]
    fn different_column_names_are_a_column_mismatch() {
        let p = NormalizationPolicy::default();
        let learner = rs(&["name"], vec![vec![text("a")]]);
        let reference = rs(&["name", "age"], vec![vec![text("a"), int(3)]]);
        match check(&learner, &reference, &p).diagnostic {
            Some(Diagnostic::ColumnMismatch { missing_columns, unexpected_columns, .. }) => {
                assert_eq!(missing_columns, vec!["age".to_string()]);
                assert!(unexpected_columns.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ignoring_names_matches_positionally() {
        let p = NormalizationPolicy { ignore_column_names: true, ..Default::default() };
        let learner = rs(&["total"], vec![vec![int(3)]]);
        let reference = rs(&["COUNT(*)"], vec![vec![int(3)]]);
        assert!(check(&learner, &reference, &p).is_correct());
    }

    #[test]
    fn column_order_only_matters_when_asked() {
        let learner = rs(&["age", "name"], vec![vec![int(3), text("a")]]);
        let reference = rs(&["name", "age"], vec![vec![text("a"), int(3)]]);
        assert!(check(&learner, &reference, &NormalizationPolicy::default()).is_correct());

        let strict = NormalizationPolicy { ignore_column_order: false, ..Default::default() };
        let cmp = check(&learner, &reference, &strict);
        assert!(matches!(cmp.diagnostic, Some(Diagnostic::ColumnOrderMismatch { .. })));
        assert_eq!(cmp.score, ARRANGEMENT_CREDIT);
    }

    #[test]
    fn equal_counts_with_wrong_values_list_the_bad_column() {
        let p = NormalizationPolicy::default();
        let learner = rs(&["pclass", "avg_fare"], vec![vec![int(1), Value::Real(80.0)], vec![int(2), Value::Real(20.0)]]);
        let reference =
            rs(&["pclass", "avg_fare"], vec![vec![int(1), Value::Real(84.15)], vec![int(2), Value::Real(20.0)]]);
        let cmp = check(&learner, &reference, &p);
        match cmp.diagnostic {
            Some(Diagnostic::ValueMismatch { columns, missing, extra }) => {
                assert_eq!(columns, vec!["avg_fare".to_string()]);
                assert_eq!(missing.rows, vec![vec![int(1), Value::Real(84.15)]]);
                assert_eq!(extra.total, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cmp.score, 50.0);
    }

    #[test]
    fn numeric_tolerance_accepts_ninth_decimal_but_not_half_units() {
        let p = NormalizationPolicy::default();
        let a = rs(&["v"], vec![vec![Value::Real(29.699117647)]]);
        let b = rs(&["v"], vec![vec![Value::Real(29.699117641)]]);
        assert!(check(&a, &b, &p).is_correct());

        let c = rs(&["v"], vec![vec![Value::Real(3.5)]]);
        let d = rs(&["v"], vec![vec![int(3)]]);
        assert!(!check(&c, &d, &p).is_correct());
    }

    #[test]
    fn near_equal_reals_on_either_side_of_a_rounding_step_still_pair_up() {
        let p = NormalizationPolicy::default();
        let learner = rs(
            &["v", "z"],
            vec![vec![Value::Real(12.345675001), text("a")], vec![Value::Real(12.345674), text("b")]],
        );
        let reference = rs(
            &["v", "z"],
            vec![vec![Value::Real(12.345674999), text("a")], vec![Value::Real(12.345674), text("b")]],
        );
        let cmp = check(&learner, &reference, &p);
        assert!(cmp.is_correct(), "{:?}", cmp.diagnostic);
        assert_eq!(cmp.score, 100.0);
    }

    #[test]
    fn tolerance_holds_across_many_rows_and_columns_in_any_order() {
        let p = NormalizationPolicy::default();
        let cities = ["Oslo", "Lima", "Pune", "Kiev", "Rome", "Bonn"];
        let reference = rs(
            &["city", "avg_temp", "n"],
            cities
                .iter()
                .enumerate()
                .map(|(i, c)| vec![text(c), Value::Real(9.99999 + i as f64 * 1e-5), int(i as i64)])
                .collect(),
        );
        let learner = rs(
            &["n", "city", "avg_temp"],
            cities
                .iter()
                .enumerate()
                .rev()
                .map(|(i, c)| vec![int(i as i64), text(c), Value::Real(9.99999 + i as f64 * 1e-5 + 3e-9)])
                .collect(),
        );
        assert!(check(&learner, &reference, &p).is_correct());

        let mut rows = learner.rows.clone();
        rows[2][2] = Value::Real(10.5);
        let off = rs(&["n", "city", "avg_temp"], rows);
        match check(&off, &reference, &p).diagnostic {
            Some(Diagnostic::ValueMismatch { columns, missing, extra }) => {
                assert_eq!(columns, vec!["avg_temp".to_string()]);
                assert_eq!((missing.total, extra.total), (1, 1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn large_integers_within_tolerance_are_equal() {
        let p = NormalizationPolicy::default();
        let learner = rs(&["id", "n"], vec![vec![int(1), int(10_000_001)], vec![int(2), int(5)]]);
        let reference = rs(&["id", "n"], vec![vec![int(2), int(5)], vec![int(1), int(10_000_000)]]);
        assert!(check(&learner, &reference, &p).is_correct());
    }

    #[test]
    fn duplicate_rows_are_counted() {
        let p = NormalizationPolicy::default();
        let learner = rs(&["x"], vec![vec![int(1)], vec![int(1)], vec![int(2)]]);
        let reference = rs(&["x"], vec![vec![int(1)], vec![int(2)], vec![int(2)]]);
        let cmp = check(&learner, &reference, &p);
        assert!(matches!(cmp.diagnostic, Some(Diagnostic::ValueMismatch { .. })));
    }

    #[test]
    fn row_order_mismatch_when_order_matters() {
        let p = NormalizationPolicy { ignore_row_order: false, ..Default::default() };
        let learner = rs(&["x"], vec![vec![int(1)], vec![int(2)]]);
        let reference = rs(&["x"], vec![vec![int(2)], vec![int(1)]]);
        let cmp = check(&learner, &reference, &p);
        assert_eq!(cmp.diagnostic, Some(Diagnostic::RowOrderMismatch { first_mismatch_row: 0 }));
    }

    #[test]
    fn samples_are_bounded() {
        let p = NormalizationPolicy::default();
        let learner = rs(&["x"], vec![]);
        let reference = rs(&["x"], (0..20).map(|i| vec![int(i)]).collect());
        let exp = Expectation::from_reference(normalize(&reference, &p));
        let cmp = compare(&normalize(&learner, &p), &exp, &p, 3);
        match cmp.diagnostic {
            Some(Diagnostic::RowCountMismatch { missing, .. }) => {
                assert_eq!(missing.rows.len(), 3);
                assert_eq!(missing.total, 20);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shape_with_columns_only_checks_columns() {
        let p = NormalizationPolicy::default();
        let shape = ExpectedShape {
            columns: Some(vec!["name".into(), "age".into()]),
            ..Default::default()
        };
        let exp = Expectation::from_shape(&shape, &p).expect("valid shape");
        let learner = normalize(&rs(&["name"], vec![vec![text("a")]]), &p);
        assert!(matches!(
            compare(&learner, &exp, &p, 5).diagnostic,
            Some(Diagnostic::ColumnMismatch { .. })
        ));
        let learner = normalize(&rs(&["age", "name"], vec![vec![int(1), text("a")]]), &p);
        assert!(compare(&learner, &exp, &p, 5).is_correct());
    }

    #[test]
    fn shape_policy_follows_shape_flags() {
        let shape = ExpectedShape { rows: Some(vec![]), column_order_matters: true, ..Default::default() };
        let overrides = PolicyOverrides { ignore_column_order: Some(true), ..Default::default() };
        let p = shape_policy(&shape, &NormalizationPolicy::default(), &overrides);
        assert!(!p.ignore_column_order);
        assert!(p.ignore_row_order);
        assert!(p.ignore_column_names);
    }

    #[test]
    fn shape_rows_without_count_report_one_sided_differences() {
        let shape = ExpectedShape { rows: Some(vec![vec![int(1)], vec![int(2)]]), ..Default::default() };
        let p = shape_policy(&shape, &NormalizationPolicy::default(), &PolicyOverrides::default());
        let exp = Expectation::from_shape(&shape, &p).expect("valid shape");

        let learner = normalize(&rs(&["x"], vec![vec![int(1)]]), &p);
        assert!(matches!(compare(&learner, &exp, &p, 5).diagnostic, Some(Diagnostic::MissingRows { .. })));

        let learner = normalize(&rs(&["x"], vec![vec![int(1)], vec![int(2)], vec![int(3)]]), &p);
        assert!(matches!(compare(&learner, &exp, &p, 5).diagnostic, Some(Diagnostic::ExtraRows { .. })));
    }

    #[test]
    fn shape_row_count_only() {
        let p = NormalizationPolicy::default();
        let shape = ExpectedShape { row_count: Some(2), ..Default::default() };
        let exp = Expectation::from_shape(&shape, &p).expect("valid shape");
        let learner = normalize(&rs(&["x"], vec![vec![int(7)], vec![int(8)]]), &p);
        assert!(compare(&learner, &exp, &p, 5).is_correct());
        let learner = normalize(&rs(&["x"], vec![vec![int(7)]]), &p);
        assert!(matches!(
            compare(&learner, &exp, &p, 5).diagnostic,
            Some(Diagnostic::RowCountMismatch { learner: 1, reference: 2, .. })
        ));
    }

    #[test]
    fn inconsistent_shapes_are_rejected() {
        let p = NormalizationPolicy::default();
        assert!(Expectation::from_shape(&ExpectedShape::default(), &p).is_err());
        let bad = ExpectedShape { row_count: Some(3), rows: Some(vec![vec![int(1)]]), ..Default::default() };
        assert!(Expectation::from_shape(&bad, &p).is_err());
        let ragged = ExpectedShape {
            columns: Some(vec!["a".into(), "b".into()]),
            rows: Some(vec![vec![int(1)]]),
            ..Default::default()
        };
        assert!(Expectation::from_shape(&ragged, &p).is_err());
    }

    #[test]
    fn zero_learner_columns_are_always_incorrect() {
        let p = NormalizationPolicy::default();
        let shape = ExpectedShape { row_count: Some(0), ..Default::default() };
        let exp = Expectation::from_shape(&shape, &p).expect("valid shape");
        let learner = normalize(&ResultSet::default(), &p);
        assert!(matches!(
            compare(&learner, &exp, &p, 5).diagnostic,
            Some(Diagnostic::ColumnMismatch { learner_columns: 0, .. })
        ));
    }
}
