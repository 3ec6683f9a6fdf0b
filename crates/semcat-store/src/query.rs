//! Read path: composite per-object records.
//!
//! Keys are matched after trimming, with Unicode case folding. A missing embedding
//! or affordance annotation is a normal state and shows up as `None` in the
//! record; only an unknown key, or a corrupt hierarchy, is an error.

use rusqlite::{OptionalExtension, params};
use semcat_types::{ActionProperty, CompositeRecord};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::StoreError;
use crate::ingest::TagRelation;
use crate::store::KnowledgeStore;

/// Result of [`KnowledgeStore::load_all`].
#[derive(Debug, Default)]
pub struct LoadAll {
    pub records: BTreeMap<String, CompositeRecord>,
    /// Objects whose load failed, with the error.
    pub failures: BTreeMap<String, StoreError>,
}

struct ObjectRow {
    key: String,
    embedding_key: String,
    lexical_tag: Option<String>,
    interaction_context: Option<String>,
}

impl KnowledgeStore {
    fn object_row(&self, key: &str) -> Result<Option<ObjectRow>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT key, embedding_key, lexical_tag, interaction_context
             FROM objects WHERE key = ?1",
        )?;
        Ok(stmt
            .query_row(params![key.trim()], |row| {
                Ok(ObjectRow {
                    key: row.get(0)?,
                    embedding_key: row.get(1)?,
                    lexical_tag: row.get(2)?,
                    interaction_context: row.get(3)?,
                })
            })
            .optional()?)
    }

    /// Everything stored about `key`, joined across all relations.
    pub fn load(&self, key: &str) -> Result<CompositeRecord, StoreError> {
        let root = self.hierarchy_root()?;
        self.load_under(key, &root)
    }

    fn load_under(&self, key: &str, root: &str) -> Result<CompositeRecord, StoreError> {
        let row = self
            .object_row(key)?
            .ok_or_else(|| StoreError::NotFound(key.trim().to_string()))?;
        let k = row.key.as_str();

        let embedding = self.embedding(&row.embedding_key)?;
        let (affordances, reduced_affordances) = self.affordances(k)?;
        Ok(CompositeRecord {
            embedding,
            scenes: self.scenes(k)?,
            receptacles: self.receptacles(k)?,
            materials: self.materials(k)?,
            actions: self.actions(k)?,
            category_paths: self.category_paths_under(k, root)?,
            affordances,
            reduced_affordances,
            key: row.key,
            embedding_key: row.embedding_key,
            lexical_tag: row.lexical_tag,
            interaction_context: row.interaction_context,
        })
    }

    /// [`load`](Self::load) every stored object. One object's failure does
    /// not stop the others.
    pub fn load_all(&self) -> Result<LoadAll, StoreError> {
        let root = self.hierarchy_root()?;
        let mut out = LoadAll::default();
        for key in self.object_keys()? {
            match self.load_under(&key, &root) {
                Ok(record) => {
                    out.records.insert(key, record);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to load object");
                    out.failures.insert(key, e);
                }
            }
        }
        Ok(out)
    }

    /// Tags of `object_key` for one relation, in insertion order.
    pub fn tags(&self, relation: TagRelation, object_key: &str) -> Result<Vec<String>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE object_key = ?1 ORDER BY rowid",
            relation.column(),
            relation.table()
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![object_key.trim()], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn scenes(&self, object_key: &str) -> Result<Vec<String>, StoreError> {
        self.tags(TagRelation::Scene, object_key)
    }

    pub fn receptacles(&self, object_key: &str) -> Result<Vec<String>, StoreError> {
        self.tags(TagRelation::Receptacle, object_key)
    }

    pub fn materials(&self, object_key: &str) -> Result<Vec<String>, StoreError> {
        self.tags(TagRelation::Material, object_key)
    }

    pub fn actions(&self, object_key: &str) -> Result<Vec<ActionProperty>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT action, partial FROM actions WHERE object_key = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![object_key.trim()], |row| {
            Ok(ActionProperty::new(row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildOptions, StoreBuilder, load_catalog};
    use semcat_pca::ComponentCount;
    use std::io::Cursor;

    fn built_store() -> KnowledgeStore {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let records = load_catalog(Cursor::new(
            r#"[{"key": "Apple", "embedding_key": "apple",
                 "lexical_tag": "apple.n.01",
                 "scenes": ["Kitchen"],
                 "materials": ["Food"],
                 "actions": ["Slice (Some)", "Pickup"],
                 "category_paths": [["Food", "Produce", "Fruit"]],
                 "affordance_flags": ["edible", "graspable"]},
                {"key": "Mug", "embedding_key": "mug",
                 "receptacles": ["Sink", "Shelf"],
                 "category_paths": [["Household", "Kitchenware"]]},
                {"key": "Pot", "embedding_key": "pot",
                 "category_paths": [["Household", "Kitchenware", "Cookware"]],
                 "affordance_flags": ["container"]}]"#,
        ))
        .unwrap();
        let options = BuildOptions {
            components: ComponentCount::Fixed(2),
            curve_max_k: 4,
            embedding_dim: 3,
            ..BuildOptions::default()
        };
        StoreBuilder::new(options)
            .build(&store, &records, Cursor::new("1 3\napple 1 2 3\n"))
            .unwrap();
        store
    }

    #[test]
    fn load_joins_every_relation() {
        let store = built_store();
        let apple = store.load("  APPLE ").unwrap();
        assert_eq!(apple.key, "Apple");
        assert_eq!(apple.lexical_tag.as_deref(), Some("apple.n.01"));
        assert_eq!(apple.embedding, Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(apple.scenes, vec!["Kitchen"]);
        assert_eq!(apple.materials, vec!["Food"]);
        assert_eq!(
            apple.actions,
            vec![ActionProperty::new("Slice", true), ActionProperty::new("Pickup", false)]
        );
        assert_eq!(apple.category_paths, vec![vec!["Food", "Produce", "Fruit"]]);
        assert_eq!(apple.affordances.get("edible"), Some(&true));
        assert_eq!(apple.reduced_affordances.map(|v| v.len()), Some(2));
    }

    #[test]
    fn missing_embedding_and_annotation_are_not_errors() {
        let store = built_store();
        let mug = store.load("mug").unwrap();
        assert!(mug.embedding.is_none());
        assert_eq!(mug.receptacles, vec!["Sink", "Shelf"]);
        assert!(mug.affordances.values().all(|v| !v));
        assert_eq!(mug.affordances.len(), 3);
        assert!(mug.reduced_affordances.is_none());
    }

    #[test]
    fn unknown_key_is_not_found() {
        let store = built_store();
        match store.load("Toaster") {
            Err(StoreError::NotFound(key)) => assert_eq!(key, "Toaster"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn load_all_returns_every_object() {
        let store = built_store();
        let all = store.load_all().unwrap();
        assert!(all.failures.is_empty());
        assert_eq!(
            all.records.keys().collect::<Vec<_>>(),
            vec!["Apple", "Mug", "Pot"]
        );
    }

    #[test]
    fn non_ascii_keys_match_in_any_case() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let records = load_catalog(Cursor::new(
            r#"[{"key": "Éclair", "embedding_key": "ÉCLAIR", "scenes": ["Bakery"]}]"#,
        ))
        .unwrap();
        let options = BuildOptions {
            components: ComponentCount::Fixed(1),
            embedding_dim: 2,
            ..BuildOptions::default()
        };
        let report = StoreBuilder::new(options)
            .build(&store, &records, Cursor::new("1 2\néclair 1 2\n"))
            .unwrap();
        assert_eq!(report.embeddings, 1);
        assert!(report.missing_embeddings.is_empty());

        for key in ["Éclair", "éclair", "ÉCLAIR"] {
            let record = store.load(key).unwrap();
            assert_eq!(record.key, "Éclair");
            assert_eq!(record.embedding, Some(vec![1.0, 2.0]));
            assert_eq!(record.scenes, vec!["Bakery"]);
        }
    }

    #[test]
    fn load_all_strips_configured_root() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let records = load_catalog(Cursor::new(
            r#"[{"key": "Apple", "embedding_key": "apple", "category_paths": [["Food", "Fruit"]]},
                {"key": "Mug", "embedding_key": "mug", "category_paths": [["Household"]]}]"#,
        ))
        .unwrap();
        let options = BuildOptions {
            components: ComponentCount::Fixed(1),
            embedding_dim: 1,
            hierarchy_root: "Catalog".to_string(),
            ..BuildOptions::default()
        };
        StoreBuilder::new(options)
            .build(&store, &records, Cursor::new("1 1\napple 1\n"))
            .unwrap();

        let all = store.load_all().unwrap();
        assert!(all.failures.is_empty());
        assert_eq!(all.records["Apple"].category_paths, vec![vec!["Food", "Fruit"]]);
        assert_eq!(all.records["Mug"].category_paths, vec![vec!["Household"]]);
        assert_eq!(store.load("mug").unwrap().category_paths, vec![vec!["Household"]]);
    }

    #[test]
    fn load_all_isolates_corrupt_objects() {
        let store = built_store();
        store
            .conn
            .execute_batch(
                "PRAGMA foreign_keys = OFF;
                 UPDATE hierarchy SET parent = 'Cookware' WHERE node = 'Household';
                 PRAGMA foreign_keys = ON;",
            )
            .unwrap();
        let all = store.load_all().unwrap();
        assert!(all.records.contains_key("Apple"));
        assert!(matches!(all.failures.get("Mug"), Some(StoreError::CycleDetected { .. })));
        assert!(matches!(all.failures.get("Pot"), Some(StoreError::CycleDetected { .. })));
    }
}
