use semcat_pca::PcaError;
use thiserror::Error;

/// Errors that can arise from building or querying a [`KnowledgeStore`].
///
/// Build-time errors abort the whole build. At query time only
/// [`NotFound`](StoreError::NotFound) and structural corruption
/// ([`CycleDetected`](StoreError::CycleDetected),
/// [`ReferentialIntegrity`](StoreError::ReferentialIntegrity)) surface;
/// missing embeddings and affordances are represented as `None` instead.
///
/// [`KnowledgeStore`]: crate::KnowledgeStore
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCA error: {0}")]
    Pca(#[from] PcaError),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Relation '{relation}' references unknown key '{key}'")]
    ReferentialIntegrity { relation: &'static str, key: String },
    #[error("Cycle detected in category hierarchy at node '{node}' while resolving '{object_key}'")]
    CycleDetected { object_key: String, node: String },
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Store already holds {0} objects; builds require a fresh store")]
    StoreNotEmpty(usize),
}
