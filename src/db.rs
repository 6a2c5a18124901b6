//! The database module
//! Owns the vocabulary and the set of tables for one store directory, and
//! orchestrates encode-then-insert and cross-table scans

use crate::error::{DbError, Result};
use crate::table::{ENCODED_COLUMN, Row, Table, Value};
use crate::text;
use crate::vocab::Vocabulary;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

const VOCABULARY_FILE: &str = "vocabulary.bin";
const TABLE_EXTENSION: &str = "table";

/// A document store rooted at one directory.
///
/// The store owns the shared vocabulary and every table. The vocabulary is
/// guarded by a single reader-writer lock; each table is guarded by its own
/// mutex. No lock is ever held across a persistence write to a different
/// resource, and the encode and append steps of an insert are two disjoint
/// critical sections.
///
/// # Examples
///
/// ```
/// use docdb::{Database, Row, Value};
///
/// let dir = tempfile::tempdir().unwrap();
/// let db = Database::open(dir.path()).unwrap();
///
/// db.create_table("articles", &["title".into(), "content".into()], None).unwrap();
///
/// let mut row = Row::new();
/// row.insert("title".into(), Value::Text("greeting".into()));
/// row.insert("content".into(), Value::Text("hello world".into()));
/// let key = db.insert("articles", row).unwrap();
///
/// assert_eq!(key, Value::Int(1));
/// ```
pub struct Database {
    db_dir: PathBuf,
    vocabulary: RwLock<Vocabulary>,
    tables: RwLock<BTreeMap<String, Arc<Mutex<Table>>>>,
}

impl Database {
    /// Opens the store at `db_dir`, creating the directory when absent.
    ///
    /// Every `*.table` file in the directory is reconstructed through
    /// [`Table::load`]; the vocabulary file is loaded last. There is no
    /// partial-success mode: one bad file aborts the whole startup.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Loading`] on any unreadable or malformed file.
    pub fn open(db_dir: impl Into<PathBuf>) -> Result<Database> {
        let db_dir = db_dir.into();

        fs::create_dir_all(&db_dir).map_err(|e| {
            DbError::Loading(format!(
                "cannot create store directory '{}': {}", db_dir.display(), e
            ))
        })?;

        let mut tables = BTreeMap::new();
        let entries = fs::read_dir(&db_dir).map_err(|e| {
            DbError::Loading(format!(
                "cannot scan store directory '{}': {}", db_dir.display(), e
            ))
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                DbError::Loading(format!(
                    "cannot scan store directory '{}': {}", db_dir.display(), e
                ))
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TABLE_EXTENSION) {
                continue;
            }

            let table = Table::load(&path)?;
            tables.insert(table.name().to_string(), Arc::new(Mutex::new(table)));
        }

        let vocabulary = Vocabulary::open(db_dir.join(VOCABULARY_FILE))?;

        info!(
            dir = %db_dir.display(),
            tables = tables.len(),
            words = vocabulary.len(),
            "store opened"
        );

        Ok(Database {
            db_dir,
            vocabulary: RwLock::new(vocabulary),
            tables: RwLock::new(tables),
        })
    }

    /// Directory this store persists into.
    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.db_dir.join(format!("{}.{}", name, TABLE_EXTENSION))
    }

    fn vocab_read(&self) -> RwLockReadGuard<'_, Vocabulary> {
        self.vocabulary.read().expect("vocabulary lock poisoned")
    }

    fn vocab_write(&self) -> RwLockWriteGuard<'_, Vocabulary> {
        self.vocabulary.write().expect("vocabulary lock poisoned")
    }

    fn lock_table(handle: &Mutex<Table>) -> MutexGuard<'_, Table> {
        handle.lock().expect("table lock poisoned")
    }

    fn table_handle(&self, name: &str) -> Result<Arc<Mutex<Table>>> {
        let tables = self.tables.read().expect("table registry lock poisoned");
        tables.get(name).cloned().ok_or_else(|| {
            DbError::InvalidRow(format!("no such table '{}'", name))
        })
    }

    /// Creates and registers an empty table, persisting it immediately so a
    /// reopened store sees it.
    ///
    /// The table file name derives from the table name, so names are
    /// restricted to `[A-Za-z0-9_-]`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] when the name is taken or not
    /// filename-safe, [`DbError::Loading`] when the empty table cannot be
    /// persisted.
    pub fn create_table(
        &self,
        name: &str,
        columns: &[String],
        primary_key: Option<&str>,
    ) -> Result<()> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(DbError::InvalidRow(format!(
                "table name '{}' must be non-empty and use only letters, digits, '_' or '-'",
                name
            )));
        }

        let table = Table::create(name, columns, primary_key.unwrap_or("id"))?;

        let mut tables = self.tables.write().expect("table registry lock poisoned");
        if tables.contains_key(name) {
            return Err(DbError::InvalidRow(format!("table '{}' already exists", name)));
        }

        table.persist(&self.table_path(name))?;
        tables.insert(name.to_string(), Arc::new(Mutex::new(table)));

        info!(table = name, "table created");
        Ok(())
    }

    /// Names of all registered tables.
    pub fn table_names(&self) -> Vec<String> {
        let tables = self.tables.read().expect("table registry lock poisoned");
        tables.keys().cloned().collect()
    }

    /// Rows of one table as column-keyed records.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] when the table does not exist.
    pub fn table_rows(&self, name: &str) -> Result<Vec<Row>> {
        let handle = self.table_handle(name)?;
        let table = Self::lock_table(&handle);
        Ok(table.rows())
    }

    /// Full ordered column list of one table, primary key and
    /// `encoded_data` included.
    pub fn table_columns(&self, name: &str) -> Result<Vec<String>> {
        let handle = self.table_handle(name)?;
        let table = Self::lock_table(&handle);
        Ok(table.columns().to_vec())
    }

    /// Encodes a piece of text through the shared vocabulary. Empty text
    /// encodes to an empty sequence.
    pub fn encode_text(&self, text_input: &str) -> Result<Vec<u64>> {
        self.encode_words(&text::tokenize(text_input))
    }

    /// Encodes pre-tokenized words through the shared vocabulary.
    pub fn encode_words(&self, words: &[String]) -> Result<Vec<u64>> {
        if words.is_empty() {
            return Ok(Vec::new());
        }
        self.vocab_write().encode(words)
    }

    /// Reverse-maps encoded ids to text. Unknown ids decode to the empty
    /// string per position.
    pub fn decode(&self, ids: &[u64]) -> String {
        self.vocab_read().decode(ids)
    }

    /// Returns the vocabulary id of a word, if it has ever been encoded.
    pub fn lookup(&self, word: &str) -> Option<u64> {
        self.vocab_read().lookup(word)
    }

    /// Number of distinct words in the shared vocabulary.
    pub fn vocabulary_len(&self) -> usize {
        self.vocab_read().len()
    }

    /// Encodes the row's text and appends it to a table.
    ///
    /// The `encoded_data` value is computed here: every column except the
    /// primary key and `encoded_data` itself contributes, in column order,
    /// joined by single spaces. Encoding runs under the vocabulary lock,
    /// the append and persist under the table lock; the two are never held
    /// together.
    ///
    /// Returns the primary key value of the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] for an unknown table, a schema
    /// mismatch or a duplicate key, [`DbError::Encoding`] when encoding
    /// fails, and [`DbError::InsertInto`] wrapping anything unexpected
    /// after those have been ruled out.
    pub fn insert(&self, table_name: &str, mut values: Row) -> Result<Value> {
        let handle = self.table_handle(table_name)?;

        let (columns, primary_key) = {
            let table = Self::lock_table(&handle);
            (table.columns().to_vec(), table.primary_key().to_string())
        };

        let mut parts: Vec<String> = Vec::new();
        for column in &columns {
            if column == &primary_key || column == ENCODED_COLUMN {
                continue;
            }
            match values.get(column) {
                Some(Value::Text(s)) => parts.push(s.clone()),
                Some(Value::Int(n)) => parts.push(n.to_string()),
                Some(Value::Tokens(_)) | None => {}
            }
        }
        let encoded = self.encode_text(&parts.join(" "))?;
        values.insert(ENCODED_COLUMN.to_string(), Value::Tokens(encoded));

        let mut table = Self::lock_table(&handle);
        let key = table.insert_row(values)?;
        table.persist(&self.table_path(table_name)).map_err(|e| DbError::InsertInto {
            table: table_name.to_string(),
            source: Box::new(e),
        })?;

        debug!(table = table_name, key = %key, "row inserted");
        Ok(key)
    }

    /// Flattens every table's rows, tagging each with its source table
    /// name. Tables are visited in name order and rows in insertion order,
    /// so the enumeration is stable across calls.
    pub fn all_rows(&self) -> Vec<(String, Row)> {
        let handles: Vec<(String, Arc<Mutex<Table>>)> = {
            let tables = self.tables.read().expect("table registry lock poisoned");
            tables.iter().map(|(n, h)| (n.clone(), h.clone())).collect()
        };

        let mut all = Vec::new();
        for (name, handle) in handles {
            let table = Self::lock_table(&handle);
            for row in table.rows() {
                all.push((name.clone(), row));
            }
        }
        all
    }
}

#[cfg(test)]
mod db_test {
    use super::*;

    fn article_store() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let columns: Vec<String> = ["title", "content", "url"].iter().map(|s| s.to_string()).collect();
        db.create_table("articles", &columns, None).unwrap();
        (dir, db)
    }

    fn article(title: &str, content: &str, url: &str) -> Row {
        let mut row = Row::new();
        row.insert("title".to_string(), Value::Text(title.to_string()));
        row.insert("content".to_string(), Value::Text(content.to_string()));
        row.insert("url".to_string(), Value::Text(url.to_string()));
        row
    }

    #[test]
    fn test_open_empty_directory() {
        let dir = tempfile::tempdir().unwrap();

        let db = Database::open(dir.path()).unwrap();

        assert!(db.table_names().is_empty());
        assert_eq!(db.vocabulary_len(), 0);
    }

    #[test]
    fn test_create_table_registers_and_persists() {
        let (dir, db) = article_store();

        assert_eq!(db.table_names(), vec!["articles".to_string()]);
        assert!(dir.path().join("articles.table").exists());
    }

    #[test]
    fn test_create_table_name_collision() {
        let (_dir, db) = article_store();

        let result = db.create_table("articles", &["x".to_string()], None);

        assert!(matches!(result, Err(DbError::InvalidRow(_))));
    }

    #[test]
    fn test_create_table_rejects_unsafe_name() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();

        let result = db.create_table("../escape", &["x".to_string()], None);

        assert!(matches!(result, Err(DbError::InvalidRow(_))));
    }

    #[test]
    fn test_first_insert_gets_id_one_and_dense_tokens() {
        let (_dir, db) = article_store();

        let key = db.insert("articles", article("T", "hello world", "u")).unwrap();

        assert_eq!(key, Value::Int(1));
        let rows = db.table_rows("articles").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], Value::Int(1));
        // "t" is the first word ever seen, then "hello", "world", "u"
        let hello = db.lookup("hello").unwrap();
        let world = db.lookup("world").unwrap();
        assert_eq!(rows[0][ENCODED_COLUMN], Value::Tokens(vec![1, hello, world, 4]));
        assert_eq!((hello, world), (2, 3));
    }

    #[test]
    fn test_insert_into_missing_table() {
        let (_dir, db) = article_store();

        let result = db.insert("missing", article("a", "b", "c"));

        assert!(matches!(result, Err(DbError::InvalidRow(_))));
    }

    #[test]
    fn test_insert_rejects_partial_row() {
        let (_dir, db) = article_store();

        let mut partial = Row::new();
        partial.insert("title".to_string(), Value::Text("alone".to_string()));
        let result = db.insert("articles", partial);

        assert!(matches!(result, Err(DbError::InvalidRow(_))));
        assert_eq!(db.table_rows("articles").unwrap().len(), 0);
    }

    #[test]
    fn test_encoding_is_shared_across_tables() {
        let (_dir, db) = article_store();
        db.create_table("notes", &["body".to_string()], None).unwrap();

        db.insert("articles", article("x", "shared words", "y")).unwrap();
        let mut note = Row::new();
        note.insert("body".to_string(), Value::Text("shared words".to_string()));
        db.insert("notes", note).unwrap();

        let articles = db.table_rows("articles").unwrap();
        let notes = db.table_rows("notes").unwrap();
        let shared = db.lookup("shared").unwrap();
        let words = db.lookup("words").unwrap();
        // Both rows reference the same vocabulary ids
        match (&articles[0][ENCODED_COLUMN], &notes[0][ENCODED_COLUMN]) {
            (Value::Tokens(a), Value::Tokens(b)) => {
                assert!(a.contains(&shared) && a.contains(&words));
                assert_eq!(b, &vec![shared, words]);
            }
            other => panic!("expected token values, got {:?}", other),
        }
    }

    #[test]
    fn test_all_rows_tags_source_table() {
        let (_dir, db) = article_store();
        db.create_table("notes", &["body".to_string()], None).unwrap();

        db.insert("articles", article("a", "b", "c")).unwrap();
        let mut note = Row::new();
        note.insert("body".to_string(), Value::Text("d".to_string()));
        db.insert("notes", note).unwrap();

        let all = db.all_rows();

        assert_eq!(all.len(), 2);
        // Tables enumerate in name order
        assert_eq!(all[0].0, "articles");
        assert_eq!(all[1].0, "notes");
    }

    #[test]
    fn test_reopen_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::open(dir.path()).unwrap();
            let columns: Vec<String> = ["title", "content", "url"].iter().map(|s| s.to_string()).collect();
            db.create_table("articles", &columns, None).unwrap();
            db.insert("articles", article("T", "hello world", "u")).unwrap();
        }

        let reopened = Database::open(dir.path()).unwrap();

        assert_eq!(reopened.table_names(), vec!["articles".to_string()]);
        let rows = reopened.table_rows("articles").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["content"], Value::Text("hello world".to_string()));
        // Vocabulary ids survive the restart
        assert_eq!(reopened.lookup("hello"), Some(2));
        // And a new insert continues the id sequence
        let key = reopened.insert("articles", article("S", "more", "v")).unwrap();
        assert_eq!(key, Value::Int(2));
    }

    #[test]
    fn test_open_aborts_on_corrupt_table_file() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::open(dir.path()).unwrap();
            db.create_table("ok", &["a".to_string()], None).unwrap();
        }
        std::fs::write(dir.path().join("broken.table"), b"garbage").unwrap();

        let result = Database::open(dir.path());

        assert!(matches!(result, Err(DbError::Loading(_))));
    }

    #[test]
    fn test_decode_round_trip_through_store() {
        let (_dir, db) = article_store();
        db.insert("articles", article("T", "quick brown fox", "u")).unwrap();

        let ids = db.encode_text("quick brown fox").unwrap();

        assert_eq!(db.decode(&ids), "quick brown fox");
    }
}
