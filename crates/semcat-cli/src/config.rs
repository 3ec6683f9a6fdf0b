//! Build configuration – reads/writes `semcat.toml`.

use semcat_pca::ComponentCount;
use semcat_store::BuildOptions;
use semcat_types::{EMBEDDING_DIM, HIERARCHY_ROOT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "semcat.toml";

/// Persisted build and query configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file the catalog is built into and queried from.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// JSON array of catalog object records.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// Embedding corpus (header line, then `<key> <values…>` per line).
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,

    /// PCA component count: `"mle"` or an integer.
    #[serde(default = "default_components")]
    pub components: String,

    #[serde(default = "default_curve_max_k")]
    pub curve_max_k: usize,

    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    #[serde(default = "default_hierarchy_root")]
    pub hierarchy_root: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("semcat.db")
}
fn default_catalog_path() -> PathBuf {
    PathBuf::from("catalog.json")
}
fn default_corpus_path() -> PathBuf {
    PathBuf::from("numberbatch-en.txt")
}
fn default_components() -> String {
    ComponentCount::Mle.to_string()
}
fn default_curve_max_k() -> usize {
    24
}
fn default_embedding_dim() -> usize {
    EMBEDDING_DIM
}
fn default_hierarchy_root() -> String {
    HIERARCHY_ROOT.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            catalog_path: default_catalog_path(),
            corpus_path: default_corpus_path(),
            components: default_components(),
            curve_max_k: default_curve_max_k(),
            embedding_dim: default_embedding_dim(),
            hierarchy_root: default_hierarchy_root(),
        }
    }
}

impl Config {
    pub fn component_count(&self) -> Result<ComponentCount, String> {
        self.components.parse()
    }

    pub fn build_options(&self) -> Result<BuildOptions, String> {
        Ok(BuildOptions {
            components: self.component_count()?,
            curve_max_k: self.curve_max_k,
            embedding_dim: self.embedding_dim,
            hierarchy_root: self.hierarchy_root.clone(),
        })
    }
}

/// Load the config from `path`. Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load the config from `path`, falling back to defaults (with environment
/// overrides applied) when the file is absent.
pub fn load_or_default(path: &Path) -> Result<Config, String> {
    match load_from(path)? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

/// Apply `SEMCAT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SEMCAT_DB_PATH` | `db_path` |
/// | `SEMCAT_CATALOG_PATH` | `catalog_path` |
/// | `SEMCAT_CORPUS_PATH` | `corpus_path` |
/// | `SEMCAT_COMPONENTS` | `components` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SEMCAT_DB_PATH") {
        cfg.db_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("SEMCAT_CATALOG_PATH") {
        cfg.catalog_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("SEMCAT_CORPUS_PATH") {
        cfg.corpus_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("SEMCAT_COMPONENTS")
        && v.parse::<ComponentCount>().is_ok()
    {
        cfg.components = v.trim().to_string();
    }
}

/// Save the config to `path`, creating parent directories if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
