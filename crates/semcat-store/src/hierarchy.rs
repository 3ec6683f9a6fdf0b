//! Category hierarchy: building the parent forest and walking it back.
//!
//! Every category path is implicitly rooted under a top-level label
//! (`"Object"` by default). The builder records each node once with the
//! first parent it is seen under; later paths that disagree are ignored, so
//! the `hierarchy` table is always a forest.
//!
//! Resolution walks parent edges iteratively from an object's direct
//! category. A revisited node, or a chain longer than
//! [`MAX_HIERARCHY_DEPTH`], means the stored structure is corrupt and is
//! reported as [`StoreError::CycleDetected`].

use rusqlite::{OptionalExtension, params};
use semcat_types::ObjectRecord;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{KnowledgeStore, ensure_known};

/// Upper bound on nodes visited while resolving one path.
pub const MAX_HIERARCHY_DEPTH: usize = 256;

/// Counts produced by [`KnowledgeStore::build_hierarchy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HierarchyReport {
    /// Rows in `hierarchy`, root included.
    pub nodes: usize,
    /// Rows in `object_category`.
    pub edges: usize,
}

impl KnowledgeStore {
    /// Build the category forest and the object -> direct category edges.
    pub fn build_hierarchy(
        &self,
        records: &[ObjectRecord],
        root: &str,
    ) -> Result<HierarchyReport, StoreError> {
        let known = self.known_object_keys()?;
        let tx = self.conn.unchecked_transaction()?;
        let mut report = HierarchyReport::default();
        {
            let mut insert_node =
                tx.prepare("INSERT INTO hierarchy (node, parent) VALUES (?1, ?2)")?;
            let mut insert_edge = tx.prepare(
                "INSERT OR IGNORE INTO object_category (object_key, node) VALUES (?1, ?2)",
            )?;

            let mut created: HashSet<String> = HashSet::new();
            insert_node.execute(params![root, None::<String>])?;
            created.insert(root.to_string());

            for r in records {
                for path in &r.category_paths {
                    let Some(leaf) = path.last() else {
                        continue;
                    };
                    let mut parent = root;
                    for label in path {
                        if created.insert(label.clone()) {
                            insert_node.execute(params![label, parent])?;
                        } else {
                            debug!(node = %label, "hierarchy node already placed; keeping first parent");
                        }
                        parent = label.as_str();
                    }
                    ensure_known(&known, "object_category", &r.key)?;
                    report.edges += insert_edge.execute(params![r.key.trim(), leaf])?;
                }
            }
            report.nodes = created.len();
        }
        tx.commit()?;
        Ok(report)
    }

    /// Parent of `node`. The outer `Option` is `None` when the node has no
    /// row at all; the inner one is `None` for a root.
    pub fn parent_of(&self, node: &str) -> Result<Option<Option<String>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT parent FROM hierarchy WHERE node = ?1")?;
        Ok(stmt
            .query_row(params![node], |row| row.get::<_, Option<String>>(0))
            .optional()?)
    }

    /// Walk from `leaf` up to a root and return the labels root-to-leaf,
    /// without the implicit top-level `root` label.
    pub fn resolve_path(
        &self,
        object_key: &str,
        leaf: &str,
        root: &str,
    ) -> Result<Vec<String>, StoreError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut path = Vec::new();
        let mut current = leaf.to_string();
        loop {
            if !visited.insert(current.clone()) || visited.len() > MAX_HIERARCHY_DEPTH {
                return Err(StoreError::CycleDetected {
                    object_key: object_key.to_string(),
                    node: current,
                });
            }
            let parent = self
                .parent_of(&current)?
                .ok_or_else(|| StoreError::ReferentialIntegrity {
                    relation: "hierarchy",
                    key: current.clone(),
                })?;
            path.push(current);
            match parent {
                Some(p) => current = p,
                None => break,
            }
        }
        path.reverse();
        if path.first().is_some_and(|n| n == root) {
            path.remove(0);
        }
        Ok(path)
    }

    /// One resolved path per direct category of `object_key`, sorted.
    pub fn category_paths(&self, object_key: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let root = self.hierarchy_root()?;
        self.category_paths_under(object_key, &root)
    }

    /// [`category_paths`](Self::category_paths) with the hierarchy root
    /// already resolved by the caller.
    pub fn category_paths_under(
        &self,
        object_key: &str,
        root: &str,
    ) -> Result<Vec<Vec<String>>, StoreError> {
        let leaves: Vec<String> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT node FROM object_category WHERE object_key = ?1 ORDER BY rowid",
            )?;
            let rows = stmt.query_map(params![object_key.trim()], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        let mut paths = leaves
            .iter()
            .map(|leaf| self.resolve_path(object_key, leaf, root))
            .collect::<Result<Vec<_>, _>>()?;
        paths.sort();
        Ok(paths)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
