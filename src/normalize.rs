//! Result normalization: canonical column keys, tolerant numeric cells, canonical row order.
//!
//! Numbers carry both their exact value and a key quantized to the policy epsilon.
//! Ordering uses the key so values that are equal within tolerance usually sort next to
//! each other. Values near a rounding step can still land apart, so row matching never
//! relies on sort order; equality uses the relative+absolute tolerance rule directly.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::{ResultSet, Value};

pub const DEFAULT_EPSILON: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationPolicy {
    pub ignore_column_names: bool,
    pub ignore_row_order: bool,
    pub ignore_column_order: bool,
    pub numeric_epsilon: f64,
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        Self {
            ignore_column_names: false,
            ignore_row_order: true,
            ignore_column_order: true,
            numeric_epsilon: DEFAULT_EPSILON,
        }
    }
}

impl NormalizationPolicy {
    pub fn with_overrides(mut self, o: &PolicyOverrides) -> Self {
        if let Some(v) = o.ignore_column_names {
            self.ignore_column_names = v;
        }
        if let Some(v) = o.ignore_row_order {
            self.ignore_row_order = v;
        }
        if let Some(v) = o.ignore_column_order {
            self.ignore_column_order = v;
        }
        if let Some(v) = o.numeric_epsilon {
            self.numeric_epsilon = v.max(0.0);
        }
        self
    }
}

/// Per-request or per-challenge policy tweaks on top of the configured default.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyOverrides {
    #[serde(default)]
    pub ignore_column_names: Option<bool>,
    #[serde(default)]
    pub ignore_row_order: Option<bool>,
    #[serde(default)]
    pub ignore_column_order: Option<bool>,
    #[serde(default)]
    pub numeric_epsilon: Option<f64>,
}

/// A comparable value.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Real { value: f64, key: f64 },
    Text(String),
}

impl Cell {
    fn from_value(v: &Value, eps: f64) -> Self {
        match v {
            Value::Null => Cell::Null,
            Value::Integer(i) => Cell::Int(*i),
            Value::Real(r) if r.is_nan() => Cell::Null,
            Value::Real(r) => {
                // -0.0 and 0.0 must not sort apart.
                let value = if *r == 0.0 { 0.0 } else { *r };
                Cell::Real { value, key: quantize(value, eps) }
            }
            Value::Text(s) => Cell::Text(s.clone()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Int(i) => Value::Integer(*i),
            Cell::Real { value, .. } => Value::Real(*value),
            Cell::Text(s) => Value::Text(s.clone()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Null => 0,
            Cell::Int(_) | Cell::Real { .. } => 1,
            Cell::Text(_) => 2,
        }
    }

    /// Exact tie-break for numbers that share a quantized key.
    fn fine_key(&self) -> (f64, i64) {
        match self {
            Cell::Int(i) => (*i as f64, *i),
            Cell::Real { value, .. } => (*value, 0),
            _ => (0.0, 0),
        }
    }
}

/// Snap a number onto a grid whose spacing is `eps` scaled by its magnitude.
fn quantize(x: f64, eps: f64) -> f64 {
    if !x.is_finite() || eps <= 0.0 {
        return x;
    }
    let ax = x.abs();
    let step = if ax <= 1.0 { eps } else { eps * 10f64.powi(ax.log10().floor() as i32) };
    let q = (x / step).round() * step;
    if q == 0.0 {
        0.0
    } else {
        q
    }
}

/// Tolerant equality: `|a-b| <= eps * max(1, |a|, |b|)` for numbers, exact otherwise.
pub fn cells_equal(a: &Cell, b: &Cell, eps: f64) -> bool {
    match (a, b) {
        (Cell::Null, Cell::Null) => true,
        (Cell::Int(x), Cell::Int(y)) => {
            // Difference in i128 so extreme values neither overflow nor round to equal.
            let diff = (*x as i128 - *y as i128).unsigned_abs() as f64;
            x == y || diff <= eps * 1f64.max((*x as f64).abs()).max((*y as f64).abs())
        }
        (Cell::Text(x), Cell::Text(y)) => x == y,
        (Cell::Int(_) | Cell::Real { .. }, Cell::Int(_) | Cell::Real { .. }) => {
            let x = a.to_value().as_f64().unwrap_or(f64::NAN);
            let y = b.to_value().as_f64().unwrap_or(f64::NAN);
            if x == y {
                return true;
            }
            (x - y).abs() <= eps * 1f64.max(x.abs()).max(y.abs())
        }
        _ => false,
    }
}

/// Rank, then quantized number or text. Numbers equal within tolerance usually tie here.
fn cmp_coarse(a: &Cell, b: &Cell, eps: f64) -> Ordering {
    a.rank().cmp(&b.rank()).then_with(|| match (a, b) {
        (Cell::Text(x), Cell::Text(y)) => x.cmp(y),
        (Cell::Int(x), Cell::Int(y)) => quantize(*x as f64, eps).total_cmp(&quantize(*y as f64, eps)),
        (Cell::Int(x), Cell::Real { key, .. }) => quantize(*x as f64, eps).total_cmp(key),
        (Cell::Real { key, .. }, Cell::Int(y)) => key.total_cmp(&quantize(*y as f64, eps)),
        (Cell::Real { key: x, .. }, Cell::Real { key: y, .. }) => x.total_cmp(y),
        _ => Ordering::Equal,
    })
}

fn cmp_fine(a: &Cell, b: &Cell) -> Ordering {
    let (xa, ia) = a.fine_key();
    let (xb, ib) = b.fine_key();
    xa.total_cmp(&xb).then(ia.cmp(&ib))
}

/// Canonical total order: NULL first, then numbers, then text.
pub fn cmp_cells(a: &Cell, b: &Cell, eps: f64) -> Ordering {
    cmp_coarse(a, b, eps).then_with(|| cmp_fine(a, b))
}

/// Coarse keys of every column first, exact tie-breaks last, so rows whose numbers
/// differ only within tolerance are ordered by their remaining columns.
pub fn cmp_rows(a: &[Cell], b: &[Cell], eps: f64) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let o = cmp_coarse(x, y, eps);
        if o != Ordering::Equal {
            return o;
        }
    }
    for (x, y) in a.iter().zip(b) {
        let o = cmp_fine(x, y);
        if o != Ordering::Equal {
            return o;
        }
    }
    a.len().cmp(&b.len())
}

pub fn rows_equal(a: &[Cell], b: &[Cell], eps: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| cells_equal(x, y, eps))
}

/// A result set in canonical, comparable form. Derived and short-lived.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedResult {
    /// Display names, in the column order of `rows`.
    pub columns: Vec<String>,
    /// Matching keys; `None` when names are ignored and columns match by position.
    pub keys: Vec<Option<String>>,
    pub rows: Vec<Vec<Cell>>,
    pub rows_sorted: bool,
    pub epsilon: f64,
}

impl NormalizedResult {
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn sorted_rows(&self) -> Vec<Vec<Cell>> {
        let mut rows = self.rows.clone();
        if !self.rows_sorted {
            rows.sort_by(|a, b| cmp_rows(a, b, self.epsilon));
        }
        rows
    }
}

/// `COUNT( * )`, `"Count(*)"` and `count(*)` all name the same column.
pub fn column_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '"' && *c != '`')
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn normalize(result: &ResultSet, policy: &NormalizationPolicy) -> NormalizedResult {
    let eps = policy.numeric_epsilon;
    let mut order: Vec<usize> = (0..result.columns.len()).collect();
    let keys: Vec<Option<String>> = result
        .columns
        .iter()
        .map(|c| (!policy.ignore_column_names).then(|| column_key(&c.name)))
        .collect();

    if policy.ignore_column_order && !policy.ignore_column_names {
        // Stable: duplicate names keep their relative order, so the k-th `id` matches the k-th `id`.
        order.sort_by(|a, b| keys[*a].cmp(&keys[*b]));
    }

    let mut rows: Vec<Vec<Cell>> = result
        .rows
        .iter()
        .map(|row| order.iter().map(|&i| Cell::from_value(&row[i], eps)).collect())
        .collect();
    if policy.ignore_row_order {
        rows.sort_by(|a, b| cmp_rows(a, b, eps));
    }

    NormalizedResult {
        columns: order.iter().map(|&i| result.columns[i].name.clone()).collect(),
        keys: order.iter().map(|&i| keys[i].clone()).collect(),
        rows,
        rows_sorted: policy.ignore_row_order,
        epsilon: eps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rs(names: &[&str], rows: Vec<Vec<Value>>) -> ResultSet {
        ResultSet::new(names.iter().map(|s| s.to_string()).collect(), rows).expect("valid")
    }

    #[test]
    fn tolerance_is_relative_and_absolute() {
        let eps = DEFAULT_EPSILON;
        let a = Cell::from_value(&Value::Real(29.699117647), eps);
        let b = Cell::from_value(&Value::Real(29.699117648), eps);
        assert!(cells_equal(&a, &b, eps));
        let big_a = Cell::from_value(&Value::Real(1_000_000.0), eps);
        let big_b = Cell::from_value(&Value::Real(1_000_000.9), eps);
        assert!(cells_equal(&big_a, &big_b, eps));
        assert!(!cells_equal(&Cell::Int(3), &Cell::from_value(&Value::Real(3.5), eps), eps));
        assert!(cells_equal(&Cell::Int(2), &Cell::from_value(&Value::Real(2.0), eps), eps));
        assert!(!cells_equal(&Cell::Text("1".into()), &Cell::Int(1), eps));
    }

    #[test]
    fn integers_follow_the_same_tolerance_rule() {
        let eps = DEFAULT_EPSILON;
        assert!(cells_equal(&Cell::Int(10_000_001), &Cell::Int(10_000_000), eps));
        assert!(!cells_equal(&Cell::Int(1_001), &Cell::Int(1_000), eps));
        assert!(!cells_equal(&Cell::Int(i64::MAX), &Cell::Int(i64::MIN), eps));
        assert!(!cells_equal(&Cell::Int(3), &Cell::Int(4), 0.0));
    }

    #[test]
    fn nulls_sort_first_then_numbers_then_text() {
        let eps = DEFAULT_EPSILON;
        let mut cells = vec![
            Cell::Text("a".into()),
            Cell::Int(5),
            Cell::Null,
            Cell::from_value(&Value::Real(-1.5), eps),
        ];
        cells.sort_by(|a, b| cmp_cells(a, b, eps));
        assert_eq!(cells[0], Cell::Null);
        assert_eq!(cells[1].to_value(), Value::Real(-1.5));
        assert_eq!(cells[2], Cell::Int(5));
        assert_eq!(cells[3], Cell::Text("a".into()));
    }

    #[test]
    fn near_equal_reals_sort_by_following_columns() {
        let policy = NormalizationPolicy::default();
        let learner = normalize(
            &rs(
                &["avg", "name"],
                vec![
                    vec![Value::Real(1.0000000002), Value::Text("a".into())],
                    vec![Value::Real(1.0000000001), Value::Text("b".into())],
                ],
            ),
            &policy,
        );
        let names: Vec<_> = learner.rows.iter().map(|r| r[1].to_value()).collect();
        assert_eq!(names, vec![Value::Text("a".into()), Value::Text("b".into())]);
    }

    #[test]
    fn column_order_is_canonicalized_by_key() {
        let policy = NormalizationPolicy::default();
        let n = normalize(
            &rs(&["Name", "AGE"], vec![vec![Value::Text("x".into()), Value::Integer(3)]]),
            &policy,
        );
        assert_eq!(n.keys, vec![Some("age".to_string()), Some("name".to_string())]);
        assert_eq!(n.rows[0][0], Cell::Int(3));
    }

    #[test]
    fn ignoring_names_keeps_positions() {
        let policy = NormalizationPolicy { ignore_column_names: true, ..Default::default() };
        let n = normalize(&rs(&["b", "a"], vec![vec![Value::Integer(1), Value::Integer(2)]]), &policy);
        assert_eq!(n.keys, vec![None, None]);
        assert_eq!(n.columns, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn row_order_kept_when_it_matters() {
        let policy = NormalizationPolicy { ignore_row_order: false, ..Default::default() };
        let n = normalize(&rs(&["x"], vec![vec![Value::Integer(2)], vec![Value::Integer(1)]]), &policy);
        assert_eq!(n.rows, vec![vec![Cell::Int(2)], vec![Cell::Int(1)]]);
        assert!(!n.rows_sorted);
        assert_eq!(n.sorted_rows(), vec![vec![Cell::Int(1)], vec![Cell::Int(2)]]);
    }

    #[test]
    fn column_keys_ignore_case_spacing_and_quotes() {
        assert_eq!(column_key("COUNT( * )"), "count(*)");
        assert_eq!(column_key("\"Total\""), "total");
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let p = NormalizationPolicy::default().with_overrides(&PolicyOverrides {
            ignore_row_order: Some(false),
            numeric_epsilon: Some(-1.0),
            ..Default::default()
        });
        assert!(!p.ignore_row_order);
        assert!(p.ignore_column_order);
        assert_eq!(p.numeric_epsilon, 0.0);
    }
}
