//! Distinct value sets over the stored relations.

use crate::error::StoreError;
use crate::store::KnowledgeStore;

impl KnowledgeStore {
    fn distinct(&self, sql: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Affordance flag names in matrix column order.
    pub fn affordance_kinds(&self) -> Result<Vec<String>, StoreError> {
        self.distinct("SELECT flag FROM affordance_kinds ORDER BY position")
    }

    pub fn action_kinds(&self) -> Result<Vec<String>, StoreError> {
        self.distinct("SELECT DISTINCT action FROM actions ORDER BY action")
    }

    pub fn material_kinds(&self) -> Result<Vec<String>, StoreError> {
        self.distinct("SELECT DISTINCT material FROM materials ORDER BY material")
    }

    pub fn receptacle_kinds(&self) -> Result<Vec<String>, StoreError> {
        self.distinct("SELECT DISTINCT receptacle FROM receptacles ORDER BY receptacle")
    }

    pub fn scene_kinds(&self) -> Result<Vec<String>, StoreError> {
        self.distinct("SELECT DISTINCT scene FROM scenes ORDER BY scene")
    }

    /// Stored object keys, original case.
    pub fn object_keys(&self) -> Result<Vec<String>, StoreError> {
        self.distinct("SELECT key FROM objects ORDER BY key")
    }

    /// Every category label, root included.
    pub fn hierarchy_nodes(&self) -> Result<Vec<String>, StoreError> {
        self.distinct("SELECT node FROM hierarchy ORDER BY node")
    }
}
