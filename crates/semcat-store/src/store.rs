//! Store handle and schema.
//!
//! [`KnowledgeStore`] owns one SQLite connection. It is opened explicitly,
//! passed by reference to every build and query operation, and closed
//! explicitly; there is no process-wide connection and no implicit
//! reconnect.
//!
//! # Storage layout
//!
//! | table                | columns                                                    |
//! |----------------------|------------------------------------------------------------|
//! | `objects`            | `key` (PK, case-insensitive), `embedding_key`, `lexical_tag`, `interaction_context` |
//! | `embeddings`         | `key` (PK, case-insensitive), `vector` BLOB (LE `f32`)     |
//! | `hierarchy`          | `node` (PK), `parent` (NULL for a root)                    |
//! | `object_category`    | `object_key`, `node` – unique pairs                        |
//! | `scenes`             | `object_key`, `scene`                                      |
//! | `receptacles`        | `object_key`, `receptacle` – unique pairs                  |
//! | `materials`          | `object_key`, `material`                                   |
//! | `actions`            | `object_key`, `action`, `partial` (0/1)                    |
//! | `affordance_kinds`   | `flag` (PK), `position`                                    |
//! | `affordance_flags`   | `object_key`, `flag`, `value` (0/1) – PK pair              |
//! | `affordance_vectors` | `object_key` (PK), `reduced_vector` BLOB or NULL           |
//! | `store_meta`         | `key` (PK), `value`                                        |
//!
//! Every `object_key` column is a foreign key into `objects`. Key columns use
//! the `UNICASE` collation, which compares by Unicode lowercasing exactly as
//! [`normalize_key`] does. SQLite's built-in `NOCASE` only folds ASCII, so
//! the collation and foreign-key enforcement are installed on every
//! connection before the first statement runs.
//!
//! # Example
//!
//! ```rust
//! use semcat_store::KnowledgeStore;
//!
//! let store = KnowledgeStore::open_in_memory().unwrap();
//! assert_eq!(store.object_count().unwrap(), 0);
//! assert!(store.build_info().unwrap().is_none());
//! store.close().unwrap();
//! ```

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use semcat_types::{HIERARCHY_ROOT, normalize_key};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

use crate::error::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS objects (
    key                 TEXT NOT NULL PRIMARY KEY COLLATE UNICASE,
    embedding_key       TEXT NOT NULL,
    lexical_tag         TEXT,
    interaction_context TEXT
);
CREATE TABLE IF NOT EXISTS embeddings (
    key    TEXT NOT NULL PRIMARY KEY COLLATE UNICASE,
    vector BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS hierarchy (
    node   TEXT NOT NULL PRIMARY KEY,
    parent TEXT REFERENCES hierarchy(node)
);
CREATE TABLE IF NOT EXISTS object_category (
    object_key TEXT NOT NULL COLLATE UNICASE REFERENCES objects(key),
    node       TEXT NOT NULL REFERENCES hierarchy(node),
    UNIQUE (object_key, node)
);
CREATE TABLE IF NOT EXISTS scenes (
    object_key TEXT NOT NULL COLLATE UNICASE REFERENCES objects(key),
    scene      TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS receptacles (
    object_key TEXT NOT NULL COLLATE UNICASE REFERENCES objects(key),
    receptacle TEXT NOT NULL,
    UNIQUE (object_key, receptacle)
);
CREATE TABLE IF NOT EXISTS materials (
    object_key TEXT NOT NULL COLLATE UNICASE REFERENCES objects(key),
    material   TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS actions (
    object_key TEXT NOT NULL COLLATE UNICASE REFERENCES objects(key),
    action     TEXT NOT NULL,
    partial    INTEGER NOT NULL CHECK (partial IN (0, 1))
);
CREATE TABLE IF NOT EXISTS affordance_kinds (
    flag     TEXT NOT NULL PRIMARY KEY,
    position INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS affordance_flags (
    object_key TEXT NOT NULL COLLATE UNICASE REFERENCES objects(key),
    flag       TEXT NOT NULL REFERENCES affordance_kinds(flag),
    value      INTEGER NOT NULL CHECK (value IN (0, 1)),
    PRIMARY KEY (object_key, flag)
);
CREATE TABLE IF NOT EXISTS affordance_vectors (
    object_key     TEXT NOT NULL PRIMARY KEY COLLATE UNICASE REFERENCES objects(key),
    reduced_vector BLOB
);
CREATE TABLE IF NOT EXISTS store_meta (
    key   TEXT NOT NULL PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_object_category_object ON object_category(object_key);
CREATE INDEX IF NOT EXISTS idx_scenes_object ON scenes(object_key);
CREATE INDEX IF NOT EXISTS idx_materials_object ON materials(object_key);
CREATE INDEX IF NOT EXISTS idx_actions_object ON actions(object_key);
";

const BUILD_INFO_KEY: &str = "build_info";

/// Name of the key collation registered on every connection.
const KEY_COLLATION: &str = "UNICASE";

fn configure(conn: &Connection) -> Result<(), StoreError> {
    conn.create_collation(KEY_COLLATION, |a: &str, b: &str| {
        a.to_lowercase().cmp(&b.to_lowercase())
    })?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// BuildInfo
// ─────────────────────────────────────────────────────────────────────────────

/// Provenance of a finished build, persisted in `store_meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
    /// Implicit top-level label of the category hierarchy.
    pub hierarchy_root: String,
    pub embedding_dim: usize,
    pub objects: usize,
    pub affordance_flags: usize,
    /// Length of every reduced affordance vector, `None` when no
    /// compression ran.
    pub n_components: Option<usize>,
}

// ─────────────────────────────────────────────────────────────────────────────
// KnowledgeStore
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed semantic object catalog.
pub struct KnowledgeStore {
    pub(crate) conn: Connection,
}

impl KnowledgeStore {
    /// Open (or create) a persistent store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a temporary in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an existing store for queries only.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        configure(&conn)?;
        Ok(Self { conn })
    }

    /// Close the underlying connection, surfacing any error SQLite reports.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        configure(&self.conn)?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Number of rows in `objects`.
    pub fn object_count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Normalised keys of every stored object.
    pub(crate) fn known_object_keys(&self) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT key FROM objects")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut keys = HashSet::new();
        for key in rows {
            keys.insert(normalize_key(&key?));
        }
        Ok(keys)
    }

    /// Provenance of the last completed build, if any.
    pub fn build_info(&self) -> Result<Option<BuildInfo>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![BUILD_INFO_KEY],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StoreError::MalformedInput(format!("store_meta.{BUILD_INFO_KEY}: {e}"))),
            None => Ok(None),
        }
    }

    pub(crate) fn write_build_info(&self, info: &BuildInfo) -> Result<(), StoreError> {
        let json = serde_json::to_string(info)
            .map_err(|e| StoreError::MalformedInput(format!("build info: {e}")))?;
        self.conn.execute(
            "INSERT OR REPLACE INTO store_meta (key, value) VALUES (?1, ?2)",
            params![BUILD_INFO_KEY, json],
        )?;
        Ok(())
    }

    /// Top-level hierarchy label recorded by the build, or
    /// [`HIERARCHY_ROOT`] for a store without build info.
    pub fn hierarchy_root(&self) -> Result<String, StoreError> {
        Ok(self
            .build_info()?
            .map(|info| info.hierarchy_root)
            .unwrap_or_else(|| HIERARCHY_ROOT.to_string()))
    }
}

/// Fail with [`StoreError::ReferentialIntegrity`] unless `key` names a known
/// object.
pub(crate) fn ensure_known(
    known: &HashSet<String>,
    relation: &'static str,
    key: &str,
) -> Result<(), StoreError> {
    if known.contains(&normalize_key(key)) {
        Ok(())
    } else {
        Err(StoreError::ReferentialIntegrity {
            relation,
            key: key.to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
