//! `semcat-store` – The Catalog Store.
//!
//! Links a fixed catalog of physical objects to lexical embeddings, a
//! retail-style category hierarchy, scene / receptacle / material / action
//! tags, and a PCA-compressed affordance vector, all persisted in one SQLite
//! file behind an explicit [`KnowledgeStore`] handle.
//!
//! # Modules
//!
//! - [`store`] – [`KnowledgeStore`]: open / close, schema, build provenance.
//! - [`embeddings`] – streams an external embedding corpus and keeps only the
//!   keys the catalog references.
//! - [`ingest`] – object rows and the flat tag / action relations.
//! - [`hierarchy`] – builds the category forest and resolves category paths
//!   with a cycle guard.
//! - [`affordance`] – boolean affordance matrix, PCA compression, and its
//!   persistence.
//! - [`builder`] – [`StoreBuilder`]: the one-shot build pipeline.
//! - [`query`] – [`KnowledgeStore::load`] / [`KnowledgeStore::load_all`].
//! - [`metadata`] – distinct value sets for each tag dimension.
//! - [`vector`] – little-endian `f32` blob packing.
//!
//! # Example
//!
//! ```rust
//! use semcat_store::{BuildOptions, KnowledgeStore, StoreBuilder, load_catalog};
//! use semcat_pca::ComponentCount;
//! use std::io::Cursor;
//!
//! let catalog = r#"[{"key": "Apple", "embedding_key": "apple",
//!                    "category_paths": [["Food", "Produce", "Fruit"]],
//!                    "affordance_flags": ["edible"]}]"#;
//! let records = load_catalog(Cursor::new(catalog)).unwrap();
//!
//! let store = KnowledgeStore::open_in_memory().unwrap();
//! let options = BuildOptions {
//!     components: ComponentCount::Fixed(1),
//!     embedding_dim: 2,
//!     ..BuildOptions::default()
//! };
//! StoreBuilder::new(options)
//!     .build(&store, &records, Cursor::new("1 2\napple 0.5 0.25\n"))
//!     .unwrap();
//!
//! let apple = store.load("apple").unwrap();
//! assert_eq!(apple.category_paths, vec![vec!["Food", "Produce", "Fruit"]]);
//! assert_eq!(apple.embedding, Some(vec![0.5, 0.25]));
//! ```

pub mod affordance;
pub mod builder;
pub mod embeddings;
pub mod error;
pub mod hierarchy;
pub mod ingest;
pub mod metadata;
pub mod query;
pub mod store;
pub mod vector;

pub use builder::{BuildOptions, BuildReport, StoreBuilder, load_catalog};
pub use error::StoreError;
pub use hierarchy::MAX_HIERARCHY_DEPTH;
pub use ingest::TagRelation;
pub use query::LoadAll;
pub use store::{BuildInfo, KnowledgeStore};
