//! Relational ingestion: object rows and the flat per-object relations.
//!
//! Each insert runs in its own transaction and commits on success, so a
//! failure leaves earlier phases in place. Every relation row is checked
//! against the object set before it is written; SQLite's foreign keys back
//! the same rule.

use rusqlite::params;
use semcat_types::{ActionProperty, ObjectRecord, material_term};
use std::fmt;

use crate::error::StoreError;
use crate::store::{KnowledgeStore, ensure_known};

/// The three many-to-many tag relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagRelation {
    Scene,
    Receptacle,
    Material,
}

impl TagRelation {
    pub const ALL: [TagRelation; 3] = [Self::Scene, Self::Receptacle, Self::Material];

    pub fn table(self) -> &'static str {
        match self {
            Self::Scene => "scenes",
            Self::Receptacle => "receptacles",
            Self::Material => "materials",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Receptacle => "receptacle",
            Self::Material => "material",
        }
    }

    /// Tags of `record` for this relation, as they are stored.
    pub fn tags(self, record: &ObjectRecord) -> Result<Vec<String>, StoreError> {
        match self {
            Self::Scene => Ok(record.scenes.clone()),
            Self::Receptacle => Ok(record.receptacles.clone()),
            Self::Material => record
                .materials
                .iter()
                .map(|raw| {
                    material_term(raw).map(str::to_string).ok_or_else(|| {
                        StoreError::MalformedInput(format!(
                            "object '{}' has an empty material descriptor",
                            record.key
                        ))
                    })
                })
                .collect(),
        }
    }

    fn insert_sql(self) -> String {
        let verb = match self {
            Self::Receptacle => "INSERT OR IGNORE",
            _ => "INSERT",
        };
        format!(
            "{verb} INTO {} (object_key, {}) VALUES (?1, ?2)",
            self.table(),
            self.column()
        )
    }
}

impl fmt::Display for TagRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl KnowledgeStore {
    /// Insert one `objects` row per record.
    pub fn insert_objects(&self, records: &[ObjectRecord]) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO objects (key, embedding_key, lexical_tag, interaction_context)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.key.trim(),
                    r.embedding_key.trim(),
                    r.lexical_tag,
                    r.interaction_context
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Flatten and insert one tag relation for every record. Returns the
    /// number of rows written (receptacle duplicates are not counted).
    pub fn insert_tags(
        &self,
        relation: TagRelation,
        records: &[ObjectRecord],
    ) -> Result<usize, StoreError> {
        let known = self.known_object_keys()?;
        let tx = self.conn.unchecked_transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(&relation.insert_sql())?;
            for r in records {
                let tags = relation.tags(r)?;
                if tags.is_empty() {
                    continue;
                }
                ensure_known(&known, relation.table(), &r.key)?;
                for tag in &tags {
                    written += stmt.execute(params![r.key.trim(), tag])?;
                }
            }
        }
        tx.commit()?;
        Ok(written)
    }

    pub fn insert_scenes(&self, records: &[ObjectRecord]) -> Result<usize, StoreError> {
        self.insert_tags(TagRelation::Scene, records)
    }

    /// Receptacle pairs already present are ignored.
    pub fn insert_receptacles(&self, records: &[ObjectRecord]) -> Result<usize, StoreError> {
        self.insert_tags(TagRelation::Receptacle, records)
    }

    /// Each descriptor is reduced to its [`material_term`].
    pub fn insert_materials(&self, records: &[ObjectRecord]) -> Result<usize, StoreError> {
        self.insert_tags(TagRelation::Material, records)
    }

    /// Insert actions with the partial-applicability marker split off.
    pub fn insert_actions(&self, records: &[ObjectRecord]) -> Result<usize, StoreError> {
        let known = self.known_object_keys()?;
        let tx = self.conn.unchecked_transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO actions (object_key, action, partial) VALUES (?1, ?2, ?3)",
            )?;
            for r in records {
                if r.actions.is_empty() {
                    continue;
                }
                ensure_known(&known, "actions", &r.key)?;
                for raw in &r.actions {
                    let action = ActionProperty::parse(raw);
                    written += stmt.execute(params![r.key.trim(), action.action, action.partial])?;
                }
            }
        }
        tx.commit()?;
        Ok(written)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> ObjectRecord {
        serde_json::from_str(json).unwrap()
    }

    fn count(store: &KnowledgeStore, table: &str) -> i64 {
        store
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn objects_then_tags_are_written() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let records = vec![record(
            r#"{"key": "Apple", "embedding_key": "apple",
                "scenes": ["Kitchen", "LivingRoom"],
                "materials": ["Food"]}"#,
        )];
        assert_eq!(store.insert_objects(&records).unwrap(), 1);
        assert_eq!(store.insert_scenes(&records).unwrap(), 2);
        assert_eq!(store.insert_materials(&records).unwrap(), 1);
        assert_eq!(count(&store, "scenes"), 2);
    }

    #[test]
    fn receptacle_pairs_are_deduplicated() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let records = vec![record(
            r#"{"key": "Mug", "embedding_key": "mug",
                "receptacles": ["Sink", "Sink", "Shelf"]}"#,
        )];
        store.insert_objects(&records).unwrap();
        assert_eq!(store.insert_receptacles(&records).unwrap(), 2);
        assert_eq!(store.insert_receptacles(&records).unwrap(), 0);
        assert_eq!(count(&store, "receptacles"), 2);
    }

    #[test]
    fn materials_keep_the_middle_term() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let records = vec![record(
            r#"{"key": "Vase", "embedding_key": "vase",
                "materials": ["Hollow Glass", "Ceramic"]}"#,
        )];
        store.insert_objects(&records).unwrap();
        store.insert_materials(&records).unwrap();
        let mut stmt = store.conn.prepare("SELECT material FROM materials ORDER BY material").unwrap();
        let stored: Vec<String> = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(stored, vec!["Ceramic", "Glass"]);
    }

    #[test]
    fn empty_material_descriptor_is_malformed() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let records = vec![record(r#"{"key": "Box", "embedding_key": "box", "materials": [" "]}"#)];
        store.insert_objects(&records).unwrap();
        let err = store.insert_materials(&records).unwrap_err();
        assert!(matches!(err, StoreError::MalformedInput(_)));
        assert_eq!(count(&store, "materials"), 0);
    }

    #[test]
    fn actions_record_partial_flag() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let records = vec![record(
            r#"{"key": "Bread", "embedding_key": "bread",
                "actions": ["Slice (Some)", "Pickup"]}"#,
        )];
        store.insert_objects(&records).unwrap();
        assert_eq!(store.insert_actions(&records).unwrap(), 2);
        let partial: bool = store
            .conn
            .query_row("SELECT partial FROM actions WHERE action = 'Slice'", [], |r| r.get(0))
            .unwrap();
        assert!(partial);
    }

    #[test]
    fn tags_for_unknown_object_violate_integrity() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let records = vec![record(r#"{"key": "Ghost", "embedding_key": "ghost", "scenes": ["Attic"]}"#)];
        let err = store.insert_scenes(&records).unwrap_err();
        match err {
            StoreError::ReferentialIntegrity { relation, key } => {
                assert_eq!(relation, "scenes");
                assert_eq!(key, "Ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
        let err = store
            .insert_actions(&[record(r#"{"key": "Ghost", "embedding_key": "g", "actions": ["Open"]}"#)])
            .unwrap_err();
        assert!(matches!(err, StoreError::ReferentialIntegrity { relation: "actions", .. }));
    }

    #[test]
    fn tag_rows_match_objects_case_insensitively() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        store
            .insert_objects(&[record(r#"{"key": "Apple", "embedding_key": "apple"}"#)])
            .unwrap();
        let lower = vec![record(r#"{"key": "apple", "embedding_key": "apple", "scenes": ["Kitchen"]}"#)];
        assert_eq!(store.insert_scenes(&lower).unwrap(), 1);
    }

    #[test]
    fn duplicate_object_key_is_rejected_by_the_store() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let records = vec![
            record(r#"{"key": "Apple", "embedding_key": "apple"}"#),
            record(r#"{"key": "APPLE", "embedding_key": "apple"}"#),
        ];
        assert!(matches!(store.insert_objects(&records), Err(StoreError::Sqlite(_))));
        assert_eq!(store.object_count().unwrap(), 0, "failed phase is rolled back");
    }
}
