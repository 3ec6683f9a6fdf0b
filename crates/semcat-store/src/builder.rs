//! One-shot store build.
//!
//! [`StoreBuilder::build`] runs every ingestion phase in order against a
//! fresh store:
//!
//! 1. validate the catalog records
//! 2. subset the embedding corpus and store the matches
//! 3. object rows, then scenes, receptacles, materials and actions
//! 4. the category hierarchy
//! 5. affordance flags and their PCA-reduced vectors
//! 6. build provenance in `store_meta`
//!
//! Each phase commits on its own. Any error aborts the build and leaves a
//! partial store that must be discarded.

use chrono::Utc;
use semcat_pca::ComponentCount;
use semcat_types::{EMBEDDING_DIM, HIERARCHY_ROOT, ObjectRecord, normalize_key};
use serde::Serialize;
use std::collections::HashSet;
use std::io::{BufRead, Read};
use tracing::{info, warn};
use uuid::Uuid;

use crate::affordance::{AffordanceMatrix, compress};
use crate::embeddings::{required_keys, subset_corpus};
use crate::error::StoreError;
use crate::hierarchy::HierarchyReport;
use crate::ingest::TagRelation;
use crate::store::{BuildInfo, KnowledgeStore};

/// Tunables for [`StoreBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub components: ComponentCount,
    /// Largest `k` of the diagnostic reconstruction-error curve.
    pub curve_max_k: usize,
    pub embedding_dim: usize,
    pub hierarchy_root: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            components: ComponentCount::Mle,
            curve_max_k: 24,
            embedding_dim: EMBEDDING_DIM,
            hierarchy_root: HIERARCHY_ROOT.to_string(),
        }
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub build_id: Uuid,
    pub objects: usize,
    pub embeddings: usize,
    /// Normalised embedding keys the corpus had no entry for.
    pub missing_embeddings: Vec<String>,
    pub corpus_lines: usize,
    pub scenes: usize,
    pub receptacles: usize,
    pub materials: usize,
    pub actions: usize,
    pub hierarchy: HierarchyReport,
    pub affordance_flags: usize,
    /// `None` when compression was skipped.
    pub n_components: Option<usize>,
    pub error_curve: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
}

/// Parse a JSON array of [`ObjectRecord`]s.
pub fn load_catalog<R: Read>(reader: R) -> Result<Vec<ObjectRecord>, StoreError> {
    serde_json::from_reader(reader)
        .map_err(|e| StoreError::MalformedInput(format!("catalog: {e}")))
}

/// Reject records with a blank key or embedding key, and duplicate keys.
pub fn validate_records(records: &[ObjectRecord]) -> Result<(), StoreError> {
    let mut seen = HashSet::new();
    for (i, r) in records.iter().enumerate() {
        if r.key.trim().is_empty() {
            return Err(StoreError::MalformedInput(format!("record {i} has a blank key")));
        }
        if r.embedding_key.trim().is_empty() {
            return Err(StoreError::MalformedInput(format!(
                "object '{}' has a blank embedding key",
                r.key
            )));
        }
        if !seen.insert(normalize_key(&r.key)) {
            return Err(StoreError::MalformedInput(format!(
                "duplicate object key '{}'",
                r.key
            )));
        }
    }
    Ok(())
}

pub struct StoreBuilder {
    options: BuildOptions,
}

impl StoreBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Populate `store` from `records` and the embedding `corpus`.
    pub fn build<R: BufRead>(
        &self,
        store: &KnowledgeStore,
        records: &[ObjectRecord],
        corpus: R,
    ) -> Result<BuildReport, StoreError> {
        validate_records(records)?;
        let existing = store.object_count()?;
        if existing > 0 {
            return Err(StoreError::StoreNotEmpty(existing));
        }
        let build_id = Uuid::new_v4();
        info!(%build_id, objects = records.len(), "starting store build");

        // Embeddings
        let required = required_keys(records);
        let subset = subset_corpus(corpus, &required, self.options.embedding_dim)?;
        let embeddings = store.insert_embeddings(&subset)?;
        let missing_embeddings = subset.missing(&required);
        if !missing_embeddings.is_empty() {
            warn!(count = missing_embeddings.len(), keys = ?missing_embeddings,
                "embedding corpus has no entry for some keys");
        }
        info!(embeddings, corpus_lines = subset.lines_scanned(), "embeddings stored");

        // Relations
        let objects = store.insert_objects(records)?;
        let mut tag_counts = [0usize; 3];
        for (i, relation) in TagRelation::ALL.into_iter().enumerate() {
            tag_counts[i] = store.insert_tags(relation, records)?;
        }
        let actions = store.insert_actions(records)?;
        info!(
            objects,
            scenes = tag_counts[0],
            receptacles = tag_counts[1],
            materials = tag_counts[2],
            actions,
            "relations ingested"
        );

        // Hierarchy
        let hierarchy = store.build_hierarchy(records, &self.options.hierarchy_root)?;
        info!(nodes = hierarchy.nodes, edges = hierarchy.edges, "hierarchy built");

        // Affordances
        let matrix = AffordanceMatrix::from_records(records);
        let compression = if matrix.is_degenerate() {
            warn!(
                objects = matrix.n_objects(),
                flags = matrix.n_flags(),
                "no affordance flags to compress; skipping PCA"
            );
            None
        } else {
            Some(compress(
                &matrix,
                self.options.components,
                self.options.curve_max_k,
            )?)
        };
        store.insert_affordances(&matrix, compression.as_ref())?;
        let n_components = compression.as_ref().map(|c| c.n_components);
        info!(flags = matrix.n_flags(), n_components = ?n_components, "affordances stored");

        store.write_build_info(&BuildInfo {
            build_id,
            built_at: Utc::now(),
            hierarchy_root: self.options.hierarchy_root.clone(),
            embedding_dim: self.options.embedding_dim,
            objects,
            affordance_flags: matrix.n_flags(),
            n_components,
        })?;
        info!(%build_id, "store build complete");

        let (error_curve, explained_variance_ratio) = compression
            .map(|c| (c.error_curve, c.explained_variance_ratio))
            .unwrap_or_default();
        Ok(BuildReport {
            build_id,
            objects,
            embeddings,
            missing_embeddings,
            corpus_lines: subset.lines_scanned(),
            scenes: tag_counts[0],
            receptacles: tag_counts[1],
            materials: tag_counts[2],
            actions,
            hierarchy,
            affordance_flags: matrix.n_flags(),
            n_components,
            error_curve,
            explained_variance_ratio,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn options() -> BuildOptions {
        BuildOptions {
            components: ComponentCount::Fixed(1),
            curve_max_k: 4,
            embedding_dim: 2,
            ..BuildOptions::default()
        }
    }

    fn catalog() -> Vec<ObjectRecord> {
        load_catalog(Cursor::new(
            r#"[{"key": "Apple", "embedding_key": "apple",
                 "category_paths": [["Food", "Fruit"]],
                 "affordance_flags": ["edible"]},
                {"key": "Mug", "embedding_key": "mug",
                 "scenes": ["Kitchen"],
                 "affordance_flags": ["container"]}]"#,
        ))
        .unwrap()
    }

    #[test]
    fn defaults_match_the_catalog_conventions() {
        let opts = BuildOptions::default();
        assert_eq!(opts.components, ComponentCount::Mle);
        assert_eq!(opts.curve_max_k, 24);
        assert_eq!(opts.embedding_dim, 300);
        assert_eq!(opts.hierarchy_root, "Object");
    }

    #[test]
    fn build_reports_counts_and_records_provenance() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let corpus = Cursor::new("2 2\napple 0.1 0.2\nbanana 0.3 0.4\n");
        let report = StoreBuilder::new(options()).build(&store, &catalog(), corpus).unwrap();

        assert_eq!(report.objects, 2);
        assert_eq!(report.embeddings, 1);
        assert_eq!(report.missing_embeddings, vec!["mug"]);
        assert_eq!(report.scenes, 1);
        assert_eq!(report.hierarchy, HierarchyReport { nodes: 3, edges: 1 });
        assert_eq!(report.affordance_flags, 2);
        assert_eq!(report.n_components, Some(1));
        assert_eq!(report.error_curve.len(), 5);

        let info = store.build_info().unwrap().unwrap();
        assert_eq!(info.build_id, report.build_id);
        assert_eq!(info.n_components, Some(1));
        assert_eq!(info.objects, 2);
    }

    #[test]
    fn second_build_into_same_store_is_refused() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let builder = StoreBuilder::new(options());
        builder.build(&store, &catalog(), Cursor::new("0 2\n")).unwrap();
        let err = builder.build(&store, &catalog(), Cursor::new("0 2\n")).unwrap_err();
        assert!(matches!(err, StoreError::StoreNotEmpty(2)));
    }

    #[test]
    fn catalog_without_flags_skips_compression() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let records = load_catalog(Cursor::new(r#"[{"key": "Rock", "embedding_key": "rock"}]"#)).unwrap();
        let report = StoreBuilder::new(options())
            .build(&store, &records, Cursor::new("0 2\n"))
            .unwrap();
        assert_eq!(report.n_components, None);
        assert!(report.error_curve.is_empty());
    }

    // ── validation ───────────────────────────────────────────────────────────

    #[test]
    fn duplicate_keys_are_malformed() {
        let records = load_catalog(Cursor::new(
            r#"[{"key": "Apple", "embedding_key": "apple"},
                {"key": " apple", "embedding_key": "apple"}]"#,
        ))
        .unwrap();
        assert!(matches!(validate_records(&records), Err(StoreError::MalformedInput(_))));
    }

    #[test]
    fn blank_embedding_key_is_malformed() {
        let records =
            load_catalog(Cursor::new(r#"[{"key": "Apple", "embedding_key": "  "}]"#)).unwrap();
        let store = KnowledgeStore::open_in_memory().unwrap();
        let err = StoreBuilder::new(options())
            .build(&store, &records, Cursor::new("0 2\n"))
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedInput(_)));
        assert_eq!(store.object_count().unwrap(), 0);
    }

    #[test]
    fn catalog_missing_required_field_is_malformed() {
        let err = load_catalog(Cursor::new(r#"[{"key": "Apple"}]"#)).unwrap_err();
        assert!(matches!(err, StoreError::MalformedInput(_)));
    }
}
