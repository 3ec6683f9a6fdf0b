//! Embedding subsetting.
//!
//! The external corpus is a whitespace-delimited text file: a header line,
//! then one `<key> <d0> <d1> … <dN>` line per entry. It can hold hundreds of
//! thousands of entries, so it is streamed line by line and only lines
//! whose normalised key is required by the catalog are parsed.
//!
//! When the corpus holds several lines with the same normalised key the
//! last one read wins; the earlier entry is dropped and the overwrite is
//! logged at `debug`.

use rusqlite::params;
use semcat_types::{ObjectRecord, normalize_key};
use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use tracing::debug;

use crate::error::StoreError;
use crate::store::KnowledgeStore;
use crate::vector::{pack_vector, unpack_vector};

const PROGRESS_EVERY: usize = 100_000;

/// Normalised embedding keys referenced by `records`.
pub fn required_keys(records: &[ObjectRecord]) -> HashSet<String> {
    records
        .iter()
        .map(|r| normalize_key(&r.embedding_key))
        .filter(|k| !k.is_empty())
        .collect()
}

/// The part of the corpus the catalog needs.
#[derive(Debug, Default, Clone)]
pub struct EmbeddingSubset {
    /// normalised key -> (original-case key, vector)
    entries: HashMap<String, (String, Vec<f32>)>,
    lines_scanned: usize,
}

impl EmbeddingSubset {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Corpus lines read, header excluded.
    pub fn lines_scanned(&self) -> usize {
        self.lines_scanned
    }

    /// Vector for `key`, matched after normalisation.
    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.entries
            .get(&normalize_key(key))
            .map(|(_, v)| v.as_slice())
    }

    /// `(original-case key, vector)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.entries
            .values()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Required keys the corpus had no entry for, sorted.
    pub fn missing(&self, required: &HashSet<String>) -> Vec<String> {
        let mut missing: Vec<String> = required
            .iter()
            .filter(|k| !self.entries.contains_key(*k))
            .cloned()
            .collect();
        missing.sort();
        missing
    }
}

/// Stream `reader` once, keeping the vectors whose normalised key is in
/// `required`.
///
/// A matched line whose values are not floats, or whose length differs from
/// `dimension`, is [`StoreError::MalformedInput`]. Unmatched lines are never
/// parsed beyond their key.
pub fn subset_corpus<R: BufRead>(
    mut reader: R,
    required: &HashSet<String>,
    dimension: usize,
) -> Result<EmbeddingSubset, StoreError> {
    let mut subset = EmbeddingSubset::default();
    let mut line = String::new();

    // Header: entry count and dimension, not needed.
    if reader.read_line(&mut line)? == 0 {
        return Ok(subset);
    }

    let mut line_no = 1usize;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;
        subset.lines_scanned += 1;
        if subset.lines_scanned % PROGRESS_EVERY == 0 {
            debug!(lines = subset.lines_scanned, matched = subset.len(), "scanning corpus");
        }

        let mut tokens = line.split_whitespace();
        let Some(raw_key) = tokens.next() else {
            continue;
        };
        let key = normalize_key(raw_key);
        if !required.contains(&key) {
            continue;
        }

        let vector = tokens
            .map(|t| t.parse::<f32>())
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|e| {
                StoreError::MalformedInput(format!("corpus line {line_no} ('{raw_key}'): {e}"))
            })?;
        if vector.len() != dimension {
            return Err(StoreError::MalformedInput(format!(
                "corpus line {line_no} ('{raw_key}'): expected {dimension} values, found {}",
                vector.len()
            )));
        }

        if let Some((previous, _)) = subset.entries.get(&key) {
            debug!(key = %key, previous = %previous, replacement = raw_key, line = line_no,
                "duplicate corpus key; keeping the later entry");
        }
        subset.entries.insert(key, (raw_key.to_string(), vector));
    }

    debug!(lines = subset.lines_scanned, matched = subset.len(), "corpus scan complete");
    Ok(subset)
}

impl KnowledgeStore {
    /// Persist every entry of `subset` in one transaction.
    pub fn insert_embeddings(&self, subset: &EmbeddingSubset) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO embeddings (key, vector) VALUES (?1, ?2)")?;
            for (key, vector) in subset.iter() {
                stmt.execute(params![key, pack_vector(vector)])?;
            }
        }
        tx.commit()?;
        Ok(subset.len())
    }

    /// Stored embedding for `key`, `None` when the corpus had no entry.
    pub fn embedding(&self, key: &str) -> Result<Option<Vec<f32>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT vector FROM embeddings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key.trim()])?;
        match rows.next()? {
            Some(row) => Ok(Some(unpack_vector(&row.get::<_, Vec<u8>>(0)?))),
            None => Ok(None),
        }
    }

    /// Every stored embedding, keyed by its original-case corpus key.
    pub fn embeddings(&self) -> Result<HashMap<String, Vec<f32>>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT key, vector FROM embeddings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let (key, blob) = row?;
            out.insert(key, unpack_vector(&blob));
        }
        Ok(out)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
