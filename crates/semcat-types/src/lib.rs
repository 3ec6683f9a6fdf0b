use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Length of every lexical embedding vector stored in the catalog.
pub const EMBEDDING_DIM: usize = 300;

/// Implicit top-level label every category path is rooted under.
pub const HIERARCHY_ROOT: &str = "Object";

/// Marker appended to an action label when it applies only to some
/// instances of an object (e.g. `"Slice (Some)"`).
pub const PARTIAL_MARKER: &str = " (Some)";

/// Normalise a lookup key: surrounding whitespace removed, lower-cased.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Reduce a raw material descriptor to its defining term: the token at
/// index `len / 2` of its whitespace-separated words (`"Hollow Glass"` ->
/// `"Glass"`, `"Metal"` -> `"Metal"`).
///
/// Returns `None` when the descriptor has no tokens.
pub fn material_term(descriptor: &str) -> Option<&str> {
    let tokens: Vec<&str> = descriptor.split_whitespace().collect();
    tokens.get(tokens.len() / 2).copied()
}

/// One entry of a catalog's JSON input, the contract consumed by the store
/// builder.
///
/// Field aliases accept the column names of the AI2-THOR object dump the
/// catalog was historically exported as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ObjectRecord {
    /// Canonical object name (e.g. `"Apple"`).
    #[serde(alias = "Object Type")]
    pub key: String,
    /// Key of this object's lexical embedding in the external corpus.
    #[serde(alias = "Conceptnet Name")]
    pub embedding_key: String,
    /// Optional lexical classification tag (e.g. a WordNet synset name).
    #[serde(default, alias = "Wordnet Name")]
    pub lexical_tag: Option<String>,
    /// Free-text interaction context. An empty string is read as absent.
    #[serde(
        default,
        alias = "Contextual Interactions",
        deserialize_with = "empty_as_none"
    )]
    #[schemars(with = "Option<String>")]
    pub interaction_context: Option<String>,
    #[serde(default, alias = "Scenes")]
    pub scenes: Vec<String>,
    #[serde(default, alias = "Default Compatible Receptacles")]
    pub receptacles: Vec<String>,
    /// Raw material descriptors; only [`material_term`] of each is stored.
    #[serde(default, alias = "Material Properties")]
    pub materials: Vec<String>,
    /// Action labels, optionally carrying the [`PARTIAL_MARKER`].
    #[serde(default, alias = "Actionable Properties")]
    pub actions: Vec<String>,
    /// Category paths, most general label first, implicitly rooted under
    /// [`HIERARCHY_ROOT`].
    #[serde(default, alias = "path")]
    pub category_paths: Vec<Vec<String>>,
    /// Affordance flags that hold for this object. `None` means the object
    /// has no affordance annotation at all.
    #[serde(default, alias = "RoboCSE")]
    pub affordance_flags: Option<BTreeSet<String>>,
}

fn empty_as_none<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

/// An action that can be performed on an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionProperty {
    /// Action label with any partial-applicability marker stripped.
    pub action: String,
    /// `true` when the action applies only to some instances.
    pub partial: bool,
}

impl ActionProperty {
    pub fn new(action: impl Into<String>, partial: bool) -> Self {
        Self {
            action: action.into(),
            partial,
        }
    }

    /// Parse a raw action label such as `"Slice (Some)"`.
    pub fn parse(raw: &str) -> Self {
        let partial = raw.contains(PARTIAL_MARKER);
        Self {
            action: raw.replace(PARTIAL_MARKER, ""),
            partial,
        }
    }
}

impl fmt::Display for ActionProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.partial {
            write!(f, "{}{}", self.action, PARTIAL_MARKER)
        } else {
            f.write_str(&self.action)
        }
    }
}

/// Everything the store knows about one object, joined across all
/// relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRecord {
    /// Canonical key as stored (case may differ from the lookup key).
    pub key: String,
    pub embedding_key: String,
    /// Lexical embedding, `None` when the corpus had no entry for the key.
    pub embedding: Option<Vec<f32>>,
    pub lexical_tag: Option<String>,
    pub interaction_context: Option<String>,
    pub scenes: Vec<String>,
    pub receptacles: Vec<String>,
    pub materials: Vec<String>,
    pub actions: Vec<ActionProperty>,
    /// One root-to-leaf path per direct category of the object.
    pub category_paths: Vec<Vec<String>>,
    /// Affordance flag name -> value, over the store's full flag set.
    pub affordances: BTreeMap<String, bool>,
    /// PCA-reduced affordance vector.
    pub reduced_affordances: Option<Vec<f32>>,
}
