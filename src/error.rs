//! Error taxonomy for docdb.
//!
//! Every fallible operation in the crate returns [`Result`], an alias for
//! [`std::result::Result`] with the error fixed to [`DbError`]. The variants
//! mirror the failure modes the rest of the crate constructs explicitly.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DbError>;

/// The single error type surfaced by every docdb operation.
#[derive(Debug, Error)]
pub enum DbError {
    /// A row or schema does not satisfy the table's constraints (unknown
    /// table, duplicate key, column mismatch, illegal name, …).
    #[error("{0}")]
    InvalidRow(String),

    /// Encoding free text into token ids, or (de)serializing the vocabulary,
    /// failed.
    #[error("{0}")]
    Encoding(String),

    /// Persisting a row into a table failed after the in-memory insert
    /// succeeded.
    #[error("failed to insert into table '{table}': {source}")]
    InsertInto {
        table: String,
        source: Box<DbError>,
    },

    /// Loading a table or the vocabulary from disk failed, or a search found
    /// no documents to consider.
    #[error("{0}")]
    Loading(String),

    /// Fetching a remote document over HTTP failed.
    #[error("{0}")]
    Fetch(String),
}
