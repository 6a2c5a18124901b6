//! The table module
//! A named, schema-fixed collection of uniquely keyed rows, one unit of
//! persistence

use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Name of the reserved column holding a row's encoded token sequence.
pub const ENCODED_COLUMN: &str = "encoded_data";

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Text(String),
    Tokens(Vec<u64>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Tokens(ids) => write!(f, "{:?}", ids),
        }
    }
}

/// A row as a column-keyed record.
pub type Row = BTreeMap<String, Value>;

/// On-disk shape: self-describing header plus flat column-to-value records.
#[derive(Serialize, Deserialize)]
struct TableFile {
    name: String,
    columns: Vec<String>,
    primary_key: String,
    rows: Vec<Row>,
}

/// A named relation with a fixed, ordered column list and a unique primary
/// key. Rows are stored as tuples aligned to the column list and only ever
/// appended.
pub struct Table {
    name: String,
    columns: Vec<String>,
    primary_key: String,
    rows: Vec<Vec<Value>>,
    next_id: i64,
}

impl Table {
    /// Creates an empty table. The primary key is prepended to the column
    /// list when absent, and the reserved `encoded_data` column is appended
    /// when absent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] for an empty name or duplicate
    /// columns.
    pub fn create(name: &str, columns: &[String], primary_key: &str) -> Result<Table> {
        if name.trim().is_empty() {
            return Err(DbError::InvalidRow("table name cannot be empty".to_string()));
        }

        let mut full_columns = Vec::with_capacity(columns.len() + 2);
        if !columns.iter().any(|c| c == primary_key) {
            full_columns.push(primary_key.to_string());
        }
        full_columns.extend(columns.iter().cloned());
        if !full_columns.iter().any(|c| c == ENCODED_COLUMN) {
            full_columns.push(ENCODED_COLUMN.to_string());
        }

        for (i, column) in full_columns.iter().enumerate() {
            if full_columns[..i].contains(column) {
                return Err(DbError::InvalidRow(format!(
                    "duplicate column '{}' in table '{}'", column, name
                )));
            }
        }

        Ok(Table {
            name: name.to_string(),
            columns: full_columns,
            primary_key: primary_key.to_string(),
            rows: Vec::new(),
            next_id: 1,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Number of stored rows.
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Appends a row.
    ///
    /// When the primary key is omitted the auto-increment counter assigns
    /// it. A supplied key is checked for uniqueness against every stored
    /// row, and a supplied integer key at or above the counter advances it.
    /// The supplied key set must then equal the column set exactly.
    ///
    /// Returns the primary key value of the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] on a duplicate key or a key set that
    /// does not match the columns.
    pub fn insert_row(&mut self, mut values: Row) -> Result<Value> {
        let key = match values.get(&self.primary_key) {
            None => {
                let key = Value::Int(self.next_id);
                self.next_id += 1;
                values.insert(self.primary_key.clone(), key.clone());
                key
            }
            Some(supplied) => {
                let key_index = self.column_index(&self.primary_key);
                if self.rows.iter().any(|row| row[key_index] == *supplied) {
                    return Err(DbError::InvalidRow(format!(
                        "primary key '{}' is already in use in table '{}'",
                        supplied, self.name
                    )));
                }
                if let Value::Int(n) = supplied {
                    if *n >= self.next_id {
                        self.next_id = n + 1;
                    }
                }
                supplied.clone()
            }
        };

        self.validate_columns(&values)?;

        let tuple = self.columns.iter()
            .map(|column| values.remove(column).unwrap_or(Value::Text(String::new())))
            .collect();
        self.rows.push(tuple);

        Ok(key)
    }

    /// Supplied key set must equal the column set exactly.
    fn validate_columns(&self, values: &Row) -> Result<()> {
        let missing: Vec<&str> = self.columns.iter()
            .filter(|c| !values.contains_key(*c))
            .map(|c| c.as_str())
            .collect();
        let extra: Vec<&str> = values.keys()
            .filter(|k| !self.columns.contains(k))
            .map(|k| k.as_str())
            .collect();

        if !missing.is_empty() || !extra.is_empty() {
            return Err(DbError::InvalidRow(format!(
                "row does not match columns of table '{}' (missing: [{}], unexpected: [{}])",
                self.name,
                missing.join(", "),
                extra.join(", ")
            )));
        }

        Ok(())
    }

    fn column_index(&self, column: &str) -> usize {
        self.columns.iter().position(|c| c == column)
            .unwrap_or_else(|| panic!("column '{}' missing from table '{}'", column, self.name))
    }

    /// Materializes the stored tuples back into column-keyed records.
    pub fn rows(&self) -> Vec<Row> {
        self.rows.iter()
            .map(|tuple| {
                self.columns.iter()
                    .cloned()
                    .zip(tuple.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Serializes the full table state to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Loading`] when the file cannot be written.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| {
            DbError::Loading(format!(
                "cannot write table file '{}': {}", path.display(), e
            ))
        })?;

        let snapshot = TableFile {
            name: self.name.clone(),
            columns: self.columns.clone(),
            primary_key: self.primary_key.clone(),
            rows: self.rows(),
        };

        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, &snapshot).map_err(|e| {
            DbError::Loading(format!("table '{}' serialization failed: {}", self.name, e))
        })?;

        Ok(())
    }

    /// Reconstructs a table from its persisted file by replaying every
    /// stored record through [`insert_row`](Table::insert_row). A corrupted
    /// file with duplicate keys or mismatched columns is rejected here, not
    /// silently admitted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Loading`] on an unreadable, malformed or invalid
    /// file.
    pub fn load(path: &Path) -> Result<Table> {
        let file = File::open(path).map_err(|e| {
            DbError::Loading(format!("cannot open table file '{}': {}", path.display(), e))
        })?;

        let reader = BufReader::new(file);
        let stored: TableFile = bincode::deserialize_from(reader).map_err(|e| {
            DbError::Loading(format!("malformed table file '{}': {}", path.display(), e))
        })?;

        let mut table = Table::create(&stored.name, &stored.columns, &stored.primary_key)
            .map_err(|e| DbError::Loading(format!(
                "table file '{}' carries an invalid schema: {}", path.display(), e
            )))?;

        for record in stored.rows {
            table.insert_row(record).map_err(|e| DbError::Loading(format!(
                "table file '{}' carries an invalid row: {}", path.display(), e
            )))?;
        }

        Ok(table)
    }
}

#[cfg(test)]
mod table_test {
    use super::*;

    fn article_table() -> Table {
        let columns = vec!["title".to_string(), "content".to_string()];
        Table::create("articles", &columns, "id").unwrap()
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn full_row(title: &str, content: &str) -> Row {
        row(&[
            ("title", Value::Text(title.to_string())),
            ("content", Value::Text(content.to_string())),
            (ENCODED_COLUMN, Value::Tokens(vec![1, 2])),
        ])
    }

    #[test]
    fn test_create_prepends_key_and_appends_encoded() {
        let table = article_table();

        assert_eq!(table.columns(), ["id", "title", "content", ENCODED_COLUMN]);
        assert_eq!(table.primary_key(), "id");
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn test_create_keeps_existing_key_column() {
        let columns = vec!["url".to_string(), "content".to_string()];
        let table = Table::create("pages", &columns, "url").unwrap();

        assert_eq!(table.columns(), ["url", "content", ENCODED_COLUMN]);
    }

    #[test]
    fn test_create_rejects_duplicate_columns() {
        let columns = vec!["a".to_string(), "a".to_string()];

        assert!(matches!(
            Table::create("bad", &columns, "id"),
            Err(DbError::InvalidRow(_))
        ));
    }

    #[test]
    fn test_insert_auto_assigns_sequential_ids() {
        let mut table = article_table();

        let first = table.insert_row(full_row("a", "b")).unwrap();
        let second = table.insert_row(full_row("c", "d")).unwrap();

        assert_eq!(first, Value::Int(1));
        assert_eq!(second, Value::Int(2));
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn test_insert_increments_count_by_one() {
        let mut table = article_table();
        let before = table.count();

        table.insert_row(full_row("a", "b")).unwrap();

        assert_eq!(table.count(), before + 1);
    }

    #[test]
    fn test_explicit_id_advances_counter() {
        let mut table = article_table();

        let mut explicit = full_row("a", "b");
        explicit.insert("id".to_string(), Value::Int(10));
        table.insert_row(explicit).unwrap();

        // The next auto id continues past the explicit one
        let assigned = table.insert_row(full_row("c", "d")).unwrap();
        assert_eq!(assigned, Value::Int(11));
    }

    #[test]
    fn test_explicit_id_below_counter_does_not_regress() {
        let mut table = article_table();
        table.insert_row(full_row("a", "b")).unwrap();
        table.insert_row(full_row("c", "d")).unwrap();

        let mut explicit = full_row("e", "f");
        explicit.insert("id".to_string(), Value::Int(-5));
        table.insert_row(explicit).unwrap();

        let assigned = table.insert_row(full_row("g", "h")).unwrap();
        assert_eq!(assigned, Value::Int(3));
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let mut table = article_table();
        table.insert_row(full_row("a", "b")).unwrap();

        let mut duplicate = full_row("c", "d");
        duplicate.insert("id".to_string(), Value::Int(1));
        let result = table.insert_row(duplicate);

        assert!(matches!(result, Err(DbError::InvalidRow(_))));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let mut table = article_table();

        let partial = row(&[
            ("title", Value::Text("only title".to_string())),
            (ENCODED_COLUMN, Value::Tokens(vec![])),
        ]);
        let result = table.insert_row(partial);

        assert!(matches!(result, Err(DbError::InvalidRow(_))));
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn test_unexpected_column_is_rejected() {
        let mut table = article_table();

        let mut bloated = full_row("a", "b");
        bloated.insert("author".to_string(), Value::Text("nobody".to_string()));
        let result = table.insert_row(bloated);

        assert!(matches!(result, Err(DbError::InvalidRow(_))));
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn test_rows_materialize_in_insertion_order() {
        let mut table = article_table();
        table.insert_row(full_row("first", "x")).unwrap();
        table.insert_row(full_row("second", "y")).unwrap();

        let rows = table.rows();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], Value::Text("first".to_string()));
        assert_eq!(rows[0]["id"], Value::Int(1));
        assert_eq!(rows[1]["title"], Value::Text("second".to_string()));
        assert_eq!(rows[1]["id"], Value::Int(2));
    }

    #[test]
    fn test_text_primary_key() {
        let columns = vec!["url".to_string(), "content".to_string()];
        let mut table = Table::create("pages", &columns, "url").unwrap();

        let record = row(&[
            ("url", Value::Text("https://example.com".to_string())),
            ("content", Value::Text("hi".to_string())),
            (ENCODED_COLUMN, Value::Tokens(vec![1])),
        ]);
        let key = table.insert_row(record.clone()).unwrap();
        assert_eq!(key, Value::Text("https://example.com".to_string()));

        // Same url again collides
        assert!(matches!(table.insert_row(record), Err(DbError::InvalidRow(_))));
    }

    // ========== Persist/Load Tests ==========

    #[test]
    fn test_persist_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.table");

        let mut table = article_table();
        table.insert_row(full_row("a", "hello world")).unwrap();
        table.insert_row(full_row("b", "more text")).unwrap();
        table.persist(&path).unwrap();

        let loaded = Table::load(&path).unwrap();

        assert_eq!(loaded.name(), "articles");
        assert_eq!(loaded.columns(), table.columns());
        assert_eq!(loaded.primary_key(), "id");
        assert_eq!(loaded.rows(), table.rows());
    }

    #[test]
    fn test_load_continues_id_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.table");

        let mut table = article_table();
        table.insert_row(full_row("a", "b")).unwrap();
        table.insert_row(full_row("c", "d")).unwrap();
        table.persist(&path).unwrap();

        let mut loaded = Table::load(&path).unwrap();
        let assigned = loaded.insert_row(full_row("e", "f")).unwrap();

        assert_eq!(assigned, Value::Int(3));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();

        let result = Table::load(&dir.path().join("absent.table"));

        assert!(matches!(result, Err(DbError::Loading(_))));
    }

    #[test]
    fn test_load_garbage_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.table");
        std::fs::write(&path, b"not a table").unwrap();

        let result = Table::load(&path);

        assert!(matches!(result, Err(DbError::Loading(_))));
    }

    #[test]
    fn test_load_rejects_duplicate_keys_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forged.table");

        // Hand-build a file whose rows collide on the primary key
        let mut record = full_row("a", "b");
        record.insert("id".to_string(), Value::Int(1));
        let forged = TableFile {
            name: "articles".to_string(),
            columns: vec![
                "id".to_string(),
                "title".to_string(),
                "content".to_string(),
                ENCODED_COLUMN.to_string(),
            ],
            primary_key: "id".to_string(),
            rows: vec![record.clone(), record],
        };
        let file = File::create(&path).unwrap();
        bincode::serialize_into(BufWriter::new(file), &forged).unwrap();

        let result = Table::load(&path);

        assert!(matches!(result, Err(DbError::Loading(_))));
    }
}
