//! The similarity search module
//! Encodes a query, scans every stored row's encoded vector and ranks by
//! cosine similarity

use crate::db::Database;
use crate::error::{DbError, Result};
use crate::table::{ENCODED_COLUMN, Row, Value};
use crate::text;
use crate::vector;
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::debug;

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct Match {
    /// Table the row came from.
    pub table: String,
    /// The matched row, column-keyed.
    pub row: Row,
    /// Cosine similarity against the encoded query, in `[-1.0, 1.0]`.
    pub score: f64,
}

/// Nearest-neighbor search over every table of one store.
///
/// The scan is exhaustive by contract: every row of every table is scored
/// on each query. Scoring is a pure function of the query vector and the
/// row vector, so it fans out across the rayon pool.
///
/// # Examples
///
/// ```
/// use docdb::{Database, Engine, Row, Value};
///
/// let dir = tempfile::tempdir().unwrap();
/// let db = Database::open(dir.path()).unwrap();
/// db.create_table("articles", &["content".into()], None).unwrap();
///
/// let mut row = Row::new();
/// row.insert("content".into(), Value::Text("hello world".into()));
/// db.insert("articles", row).unwrap();
///
/// let engine = Engine::new(&db);
/// let results = engine.find_nearest("hello", 1).unwrap();
/// assert_eq!(results.len(), 1);
/// assert!(results[0].score > 0.0);
/// ```
pub struct Engine<'a> {
    db: &'a Database,
}

impl<'a> Engine<'a> {
    pub fn new(db: &'a Database) -> Engine<'a> {
        Engine { db }
    }

    /// Returns up to `n` rows ranked by cosine similarity against the
    /// query text, most similar first.
    ///
    /// The query is stop-word filtered before encoding; a query that cleans
    /// down to nothing returns no results. Ties rank by enumeration order,
    /// first-encountered row first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Loading`] when no rows exist in any table, and
    /// [`DbError::Encoding`] when encoding the query fails.
    pub fn find_nearest(&self, query_text: &str, n: usize) -> Result<Vec<Match>> {
        let cleaned = text::clean(query_text);
        let words = text::tokenize(&cleaned);
        if words.is_empty() {
            debug!("query cleaned down to nothing");
            return Ok(Vec::new());
        }

        let rows = self.db.all_rows();
        if rows.is_empty() {
            return Err(DbError::Loading("no documents to search".to_string()));
        }

        let query = self.db.encode_words(&words)?;

        let mut scored: Vec<Match> = rows
            .into_par_iter()
            .map(|(table, row)| {
                let score = match row.get(ENCODED_COLUMN) {
                    Some(Value::Tokens(encoded)) => vector::score_sequences(&query, encoded),
                    _ => vector::score_sequences(&query, &[]),
                };
                Match { table, row, score }
            })
            .collect();

        // Stable sort keeps enumeration order between equal scores
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(n);

        debug!(results = scored.len(), "query scored");
        Ok(scored)
    }
}
