//! Datasets: immutable schema + fixture rows, and the catalog that serves them.
//!
//! A dataset is never mutated after load. Every query runs against its own fresh
//! in-memory SQLite database built by `Dataset::materialize`, so nothing a query
//! does (temp tables, views, settings) can leak into another run.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::domain::Value;
use crate::error::DatasetError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    fn accepts(self, v: &Value) -> bool {
        matches!(
            (self, v),
            (_, Value::Null)
                | (ColumnType::Integer, Value::Integer(_))
                | (ColumnType::Real, Value::Integer(_) | Value::Real(_))
                | (ColumnType::Text, Value::Text(_))
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub tables: Vec<TableDef>,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(r) => SqlValue::Real(*r),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

impl Dataset {
    pub fn validate(&self) -> Result<(), DatasetError> {
        let invalid = |message: String| DatasetError::Invalid { dataset: self.id.clone(), message };
        if self.id.trim().is_empty() {
            return Err(invalid("dataset id is empty".into()));
        }
        if self.tables.is_empty() {
            return Err(invalid("dataset has no tables".into()));
        }
        let mut table_names = HashSet::new();
        for t in &self.tables {
            if t.name.trim().is_empty() {
                return Err(invalid("table name is empty".into()));
            }
            if !table_names.insert(t.name.to_lowercase()) {
                return Err(invalid(format!("duplicate table '{}'", t.name)));
            }
            if t.columns.is_empty() {
                return Err(invalid(format!("table '{}' has no columns", t.name)));
            }
            let mut col_names = HashSet::new();
            for c in &t.columns {
                if c.name.trim().is_empty() || !col_names.insert(c.name.to_lowercase()) {
                    return Err(invalid(format!("table '{}' has an empty or duplicate column '{}'", t.name, c.name)));
                }
            }
            for (idx, row) in t.rows.iter().enumerate() {
                if row.len() != t.columns.len() {
                    return Err(invalid(format!(
                        "table '{}' row {} has {} values, expected {}",
                        t.name,
                        idx,
                        row.len(),
                        t.columns.len()
                    )));
                }
                if let Some((c, v)) = t.columns.iter().zip(row).find(|(c, v)| !c.column_type.accepts(v)) {
                    return Err(invalid(format!(
                        "table '{}' row {} column '{}' holds {} but is declared {:?}",
                        t.name, idx, c.name, v, c.column_type
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build a fresh, query-only in-memory database holding this dataset.
    pub fn materialize(&self) -> Result<Connection, rusqlite::Error> {
        let mut conn = Connection::open_in_memory()?;
        let tx = conn.transaction()?;
        for t in &self.tables {
            let cols: Vec<String> = t
                .columns
                .iter()
                .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.sql()))
                .collect();
            tx.execute_batch(&format!("CREATE TABLE {} ({});", quote_ident(&t.name), cols.join(", ")))?;
            if t.rows.is_empty() {
                continue;
            }
            let placeholders = vec!["?"; t.columns.len()].join(", ");
            let mut stmt = tx.prepare(&format!("INSERT INTO {} VALUES ({})", quote_ident(&t.name), placeholders))?;
            for row in &t.rows {
                stmt.execute(params_from_iter(row.iter().map(to_sql)))?;
            }
        }
        tx.commit()?;
        conn.execute_batch("PRAGMA query_only = ON;")?;
        Ok(conn)
    }

    pub fn load_json_file(path: &Path) -> Result<Self, DatasetError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| DatasetError::Io { path: display.clone(), source })?;
        let ds: Dataset = serde_json::from_str(&raw).map_err(|source| DatasetError::Parse { path: display, source })?;
        ds.validate()?;
        Ok(ds)
    }
}

/// Source of named datasets for the grader.
pub trait DatasetProvider: Send + Sync {
    fn load(&self, id: &str) -> Option<Arc<Dataset>>;
    fn list(&self) -> Vec<Arc<Dataset>>;
}

/// In-memory catalog, built once at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct DatasetCatalog {
    by_id: HashMap<String, Arc<Dataset>>,
}

impl DatasetCatalog {
    /// Seeds first, then `extra` (later entries replace earlier ones with the same id).
    /// Invalid datasets are logged and skipped.
    #[instrument(level = "info", skip_all, fields(seeds = seeds.len(), extra = extra.len()))]
    pub fn build(seeds: Vec<Dataset>, extra: Vec<Dataset>) -> Self {
        let mut by_id = HashMap::new();
        for ds in seeds.into_iter().chain(extra) {
            if let Err(e) = ds.validate() {
                error!(target: "catalog", error = %e, "Skipping invalid dataset");
                continue;
            }
            let tables: usize = ds.tables.len();
            let rows: usize = ds.tables.iter().map(|t| t.rows.len()).sum();
            if by_id.contains_key(&ds.id) {
                warn!(target: "catalog", id = %ds.id, "Dataset overrides an earlier definition");
            }
            info!(target: "catalog", id = %ds.id, tables, rows, "Dataset loaded");
            by_id.insert(ds.id.clone(), Arc::new(ds));
        }
        Self { by_id }
    }

    /// Load every file, logging and skipping the ones that fail.
    pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Vec<Dataset> {
        paths
            .iter()
            .filter_map(|p| match Dataset::load_json_file(p.as_ref()) {
                Ok(ds) => Some(ds),
                Err(e) => {
                    error!(target: "catalog", error = %e, "Failed to load dataset file");
                    None
                }
            })
            .collect()
    }
}

impl DatasetProvider for DatasetCatalog {
    fn load(&self, id: &str) -> Option<Arc<Dataset>> {
        self.by_id.get(id).cloned()
    }

    fn list(&self) -> Vec<Arc<Dataset>> {
        let mut all: Vec<_> = self.by_id.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tiny() -> Dataset {
        Dataset {
            id: "tiny".into(),
            title: "Tiny".into(),
            description: String::new(),
            tables: vec![TableDef {
                name: "people".into(),
                columns: vec![
                    ColumnDef { name: "name".into(), column_type: ColumnType::Text },
                    ColumnDef { name: "age".into(), column_type: ColumnType::Real },
                ],
                rows: vec![
                    vec![Value::Text("Ann".into()), Value::Integer(30)],
                    vec![Value::Text("Bob".into()), Value::Null],
                ],
            }],
        }
    }

    #[test]
    fn materialize_loads_rows_and_is_query_only() {
        let conn = tiny().materialize().expect("materialize");
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM people", [], |r| r.get(0)).expect("count");
        assert_eq!(n, 2);
        assert!(conn.execute("DELETE FROM people", []).is_err());
        assert!(conn.execute_batch("CREATE TEMP TABLE t(x)").is_err());
    }

    #[test]
    fn each_materialization_is_independent() {
        let ds = tiny();
        let a = ds.materialize().expect("a");
        a.execute_batch("PRAGMA query_only = OFF; DELETE FROM people;").expect("own copy");
        let b = ds.materialize().expect("b");
        let n: i64 = b.query_row("SELECT COUNT(*) FROM people", [], |r| r.get(0)).expect("count");
        assert_eq!(n, 2);
    }

    #[test]
    fn validate_rejects_ragged_and_mistyped_rows() {
        let mut ds = tiny();
        ds.tables[0].rows.push(vec![Value::Text("Cy".into())]);
        assert!(ds.validate().is_err());

        let mut ds = tiny();
        ds.tables[0].rows.push(vec![Value::Integer(1), Value::Integer(2)]);
        assert!(ds.validate().is_err());
    }

    #[test]
    fn catalog_skips_invalid_and_later_definitions_win() {
        let mut broken = tiny();
        broken.id = "broken".into();
        broken.tables.clear();
        let mut replacement = tiny();
        replacement.title = "Replaced".into();
        let cat = DatasetCatalog::build(vec![tiny(), broken], vec![replacement]);
        assert!(cat.load("broken").is_none());
        assert_eq!(cat.load("tiny").map(|d| d.title.clone()), Some("Replaced".into()));
        assert_eq!(cat.list().len(), 1);
    }

    #[test]
    fn loads_json_files_with_nulls() {
        let mut f = tempfile::NamedTempFile::new().expect("tmp");
        write!(
            f,
            r#"{{"id":"j","tables":[{{"name":"t","columns":[{{"name":"x","type":"integer"}}],"rows":[[1],[null]]}}]}}"#
        )
        .expect("write");
        let ds = Dataset::load_json_file(f.path()).expect("load");
        assert_eq!(ds.tables[0].rows.len(), 2);
        assert_eq!(ds.tables[0].rows[1], vec![Value::Null]);
    }
}
