//! The vocabulary module
//! An append-only word to id mapping shared by every table in a store

use crate::error::{DbError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

/// Append-only mapping from canonicalized word to a positive integer id.
///
/// Ids are dense, start at 1 and are assigned in order of first appearance.
/// They are never reused or reassigned. The full mapping is rewritten to
/// disk every time an encode call introduces a new word.
pub struct Vocabulary {
    words: HashMap<String, u64>,
    path: PathBuf,
}

impl Vocabulary {
    /// Loads the vocabulary from `path`, starting empty when the file does
    /// not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Loading`] when the file exists but cannot be read
    /// or deserialized.
    pub fn open(path: impl Into<PathBuf>) -> Result<Vocabulary> {
        let path = path.into();

        if !path.exists() {
            return Ok(Vocabulary { words: HashMap::new(), path });
        }

        let file = File::open(&path).map_err(|e| {
            DbError::Loading(format!("cannot open vocabulary file '{}': {}", path.display(), e))
        })?;
        let reader = BufReader::new(file);
        let words: HashMap<String, u64> = bincode::deserialize_from(reader).map_err(|e| {
            DbError::Loading(format!("malformed vocabulary file '{}': {}", path.display(), e))
        })?;

        Ok(Vocabulary { words, path })
    }

    /// Number of distinct words known to the vocabulary.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn canonical(word: &str) -> String {
        word.trim().to_lowercase()
    }

    /// Returns the id of a word, or `None` when it has never been encoded.
    /// Pure read, no mutation.
    pub fn lookup(&self, word: &str) -> Option<u64> {
        self.words.get(&Self::canonical(word)).copied()
    }

    /// Encodes words into ids, assigning `len + 1` to each previously unseen
    /// word. Order and duplicates are preserved; this is not a histogram.
    ///
    /// An empty input encodes to an empty sequence. If any new word was
    /// added, the whole vocabulary is persisted before returning.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Encoding`] when the write-through persist fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use docdb::Vocabulary;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let mut vocab = Vocabulary::open(dir.path().join("vocabulary.bin")).unwrap();
    ///
    /// let ids = vocab.encode(&["Hello".into(), "world".into(), "hello".into()]).unwrap();
    /// assert_eq!(ids, vec![1, 2, 1]);
    /// assert_eq!(vocab.lookup("HELLO"), Some(1));
    /// ```
    pub fn encode(&mut self, words: &[String]) -> Result<Vec<u64>> {
        let mut tokens = Vec::with_capacity(words.len());
        let mut changed = false;

        for word in words {
            let canonical = Self::canonical(word);
            match self.words.get(&canonical) {
                Some(&id) => tokens.push(id),
                None => {
                    let id = self.words.len() as u64 + 1;
                    self.words.insert(canonical, id);
                    tokens.push(id);
                    changed = true;
                }
            }
        }

        if changed {
            self.persist()?;
        }

        Ok(tokens)
    }

    /// Reverse-maps ids to their words via an inverted index built on
    /// demand. Unknown ids map to the empty string; this never fails.
    pub fn decode(&self, ids: &[u64]) -> String {
        let inverted: HashMap<u64, &str> = self.words.iter()
            .map(|(word, &id)| (id, word.as_str()))
            .collect();

        ids.iter()
            .map(|id| inverted.get(id).copied().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn persist(&self) -> Result<()> {
        let file = File::create(&self.path).map_err(|e| {
            DbError::Encoding(format!(
                "cannot write vocabulary file '{}': {}", self.path.display(), e
            ))
        })?;

        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, &self.words)
            .map_err(|e| DbError::Encoding(format!("vocabulary serialization failed: {}", e)))?;

        Ok(())
    }
}
