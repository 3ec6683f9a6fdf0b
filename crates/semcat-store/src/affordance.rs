//! Affordance flags and their PCA-reduced encoding.
//!
//! The flag universe is the sorted union of every record's affordance set.
//! Each object becomes one boolean row over that universe; objects without
//! an annotation contribute an all-false row to the fit. Flags are stored
//! as `(object, flag) -> value` rows and the reduced vector as a packed
//! blob, NULL for objects that carried no annotation.

use ndarray::Array2;
use rusqlite::params;
use semcat_pca::{ComponentCount, Pca};
use semcat_types::ObjectRecord;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::StoreError;
use crate::store::{KnowledgeStore, ensure_known};
use crate::vector::{pack_vector, unpack_vector};

/// Dense `objects × flags` boolean matrix, as `0.0` / `1.0`.
#[derive(Debug, Clone)]
pub struct AffordanceMatrix {
    /// Object keys in row order.
    pub objects: Vec<String>,
    /// Flag names in column order, sorted.
    pub flags: Vec<String>,
    /// Whether each row came from an explicit annotation.
    pub annotated: Vec<bool>,
    pub values: Array2<f64>,
}

impl AffordanceMatrix {
    pub fn from_records(records: &[ObjectRecord]) -> Self {
        let universe: BTreeSet<&String> = records
            .iter()
            .filter_map(|r| r.affordance_flags.as_ref())
            .flatten()
            .collect();
        let flags: Vec<String> = universe.into_iter().cloned().collect();
        let column: BTreeMap<&str, usize> = flags
            .iter()
            .enumerate()
            .map(|(i, f)| (f.as_str(), i))
            .collect();

        let mut values = Array2::<f64>::zeros((records.len(), flags.len()));
        for (row, record) in records.iter().enumerate() {
            for flag in record.affordance_flags.iter().flatten() {
                if let Some(&col) = column.get(flag.as_str()) {
                    values[[row, col]] = 1.0;
                }
            }
        }

        Self {
            objects: records.iter().map(|r| r.key.trim().to_string()).collect(),
            flags,
            annotated: records.iter().map(|r| r.affordance_flags.is_some()).collect(),
            values,
        }
    }

    pub fn n_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn n_flags(&self) -> usize {
        self.flags.len()
    }

    /// `true` when there is nothing to fit.
    pub fn is_degenerate(&self) -> bool {
        self.n_objects() == 0 || self.n_flags() == 0
    }
}

/// Output of [`compress`].
#[derive(Debug, Clone)]
pub struct AffordanceCompression {
    pub n_components: usize,
    /// One reduced row per matrix row.
    pub reduced: Array2<f64>,
    /// Reconstruction error for `k = 0..=curve_max_k`.
    pub error_curve: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
}

/// Fit PCA to `matrix`, compute the diagnostic error curve, and project
/// every row onto the components selected by `count`. The curve and the
/// projection share one fitted model.
pub fn compress(
    matrix: &AffordanceMatrix,
    count: ComponentCount,
    curve_max_k: usize,
) -> Result<AffordanceCompression, StoreError> {
    let pca = Pca::fit(&matrix.values)?;
    let error_curve = pca.error_curve(&matrix.values, curve_max_k)?;
    let n_components = pca.resolve(count)?;
    let reduced = pca.transform(&matrix.values, n_components)?;
    debug!(
        objects = matrix.n_objects(),
        flags = matrix.n_flags(),
        n_components,
        "affordance matrix compressed"
    );
    Ok(AffordanceCompression {
        n_components,
        reduced,
        error_curve,
        explained_variance_ratio: pca.explained_variance_ratio().to_vec(),
    })
}

impl KnowledgeStore {
    /// Persist the flag set, every object's flag mapping, and its reduced
    /// vector when `compression` is given.
    pub fn insert_affordances(
        &self,
        matrix: &AffordanceMatrix,
        compression: Option<&AffordanceCompression>,
    ) -> Result<usize, StoreError> {
        if let Some(c) = compression {
            if c.reduced.nrows() != matrix.n_objects() {
                return Err(StoreError::MalformedInput(format!(
                    "reduced matrix has {} rows for {} objects",
                    c.reduced.nrows(),
                    matrix.n_objects()
                )));
            }
        }

        let known = self.known_object_keys()?;
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut insert_kind =
                tx.prepare("INSERT INTO affordance_kinds (flag, position) VALUES (?1, ?2)")?;
            for (position, flag) in matrix.flags.iter().enumerate() {
                insert_kind.execute(params![flag, position as i64])?;
            }

            let mut insert_flag = tx.prepare(
                "INSERT INTO affordance_flags (object_key, flag, value) VALUES (?1, ?2, ?3)",
            )?;
            let mut insert_vector = tx.prepare(
                "INSERT INTO affordance_vectors (object_key, reduced_vector) VALUES (?1, ?2)",
            )?;
            for (row, key) in matrix.objects.iter().enumerate() {
                ensure_known(&known, "affordance_flags", key)?;
                for (col, flag) in matrix.flags.iter().enumerate() {
                    insert_flag.execute(params![key, flag, matrix.values[[row, col]] > 0.5])?;
                }
                let blob = match compression {
                    Some(c) if matrix.annotated[row] => {
                        let v: Vec<f32> = c.reduced.row(row).iter().map(|&x| x as f32).collect();
                        Some(pack_vector(&v))
                    }
                    _ => None,
                };
                insert_vector.execute(params![key, blob])?;
            }
        }
        tx.commit()?;
        Ok(matrix.n_objects())
    }

    /// Flag mapping and reduced vector of `object_key`. An object without
    /// affordance rows gets an empty mapping and `None`.
    pub fn affordances(
        &self,
        object_key: &str,
    ) -> Result<(BTreeMap<String, bool>, Option<Vec<f32>>), StoreError> {
        let key = object_key.trim();
        let mut flags = BTreeMap::new();
        {
            let mut stmt = self.conn.prepare_cached(
                "SELECT flag, value FROM affordance_flags WHERE object_key = ?1",
            )?;
            let rows = stmt.query_map(params![key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
            })?;
            for row in rows {
                let (flag, value) = row?;
                flags.insert(flag, value);
            }
        }

        let mut stmt = self.conn.prepare_cached(
            "SELECT reduced_vector FROM affordance_vectors WHERE object_key = ?1",
        )?;
        let mut rows = stmt.query(params![key])?;
        let reduced = match rows.next()? {
            Some(row) => row.get::<_, Option<Vec<u8>>>(0)?.map(|b| unpack_vector(&b)),
            None => None,
        };
        Ok((flags, reduced))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
