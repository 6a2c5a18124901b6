//! # docdb - A Simple Document Store
//!
//! docdb is a minimal document store. Free text is encoded into integer
//! token sequences through a persistent, append-only vocabulary shared by
//! every table, and "find the most similar stored document" queries are
//! answered by cosine similarity over the raw encoded sequences.
//!
//! ## Example
//!
//! ```
//! use docdb::{Database, Engine, Row, Value};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let db = Database::open(dir.path()).unwrap();
//!
//! // Create a table and insert documents
//! db.create_table("articles", &["title".into(), "content".into()], None).unwrap();
//! let mut row = Row::new();
//! row.insert("title".into(), Value::Text("greeting".into()));
//! row.insert("content".into(), Value::Text("hello world".into()));
//! db.insert("articles", row).unwrap();
//!
//! // Search for the closest document
//! let engine = Engine::new(&db);
//! let results = engine.find_nearest("hello", 1).unwrap();
//! assert_eq!(results[0].table, "articles");
//! assert!(results[0].score > 0.0);
//! ```

pub mod error;
pub mod vector;
pub mod text;
pub mod vocab;
pub mod table;
mod db;
pub mod search;
pub mod fetch;
pub mod server;

// Re-export the primary public API
pub use db::Database;
pub use error::{DbError, Result};
pub use search::{Engine, Match};
pub use table::{Row, Table, Value};
pub use vocab::Vocabulary;
