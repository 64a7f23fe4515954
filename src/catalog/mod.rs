//! Field catalog: the read-only view of entity metadata the engine reports over.
//!
//! The engine never reads global metadata. A [`FieldCatalog`] is injected
//! into the engine and the filter translator, and every lookup handles the
//! not-found case explicitly.
//!
//! - [`field`] - field types, select options, field definitions
//! - [`options`] - reportable entity/field listing with display labels

mod field;
mod options;

pub use field::{FieldDef, FieldType, SelectOptions};
pub(crate) use field::value_text;
pub use options::{format_label, report_options, EntityOption, FieldOption};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for catalog loading.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read catalog file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse catalog TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unsupported catalog format: {0}")]
    UnsupportedFormat(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Metadata for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
    /// Display label override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Field name -> definition.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
}

impl EntityMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: &str, def: FieldDef) -> Self {
        self.fields.insert(name.to_string(), def);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }
}

/// Read-only access to entity metadata.
///
/// Implementations must be cheap to query; the engine calls them several
/// times per request.
pub trait FieldCatalog: Send + Sync {
    /// Look up an entity by key.
    fn get(&self, entity: &str) -> Option<&EntityMeta>;

    /// Protected entities are never reportable.
    fn is_protected(&self, entity: &str) -> bool;

    /// All entity keys, in a stable order.
    fn entity_names(&self) -> Vec<String>;
}

/// In-memory catalog, built in code or loaded from a JSON/TOML document.
///
/// ```json
/// {
///   "entities": {
///     "orders": { "fields": { "status": { "type": "select", "options": {"open": "Open"} } } }
///   },
///   "protected_entities": ["users"]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryCatalog {
    #[serde(default)]
    entities: HashMap<String, EntityMeta>,

    #[serde(default, rename = "protected_entities")]
    protected: HashSet<String>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, name: &str, meta: EntityMeta) -> Self {
        self.entities.insert(name.to_string(), meta);
        self
    }

    pub fn protect(mut self, name: &str) -> Self {
        self.protected.insert(name.to_lowercase());
        self
    }

    pub fn from_json_str(s: &str) -> CatalogResult<Self> {
        Ok(serde_json::from_str::<Self>(s)?.normalized())
    }

    pub fn from_toml_str(s: &str) -> CatalogResult<Self> {
        Ok(toml::from_str::<Self>(s)?.normalized())
    }

    /// Load from a `.json` or `.toml` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatalogError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            other => Err(CatalogError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    fn normalized(mut self) -> Self {
        self.protected = self.protected.iter().map(|p| p.to_lowercase()).collect();
        self
    }
}

impl FieldCatalog for MemoryCatalog {
    fn get(&self, entity: &str) -> Option<&EntityMeta> {
        self.entities.get(entity)
    }

    fn is_protected(&self, entity: &str) -> bool {
        self.protected.contains(&entity.to_lowercase())
    }

    fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.keys().cloned().collect();
        names.sort();
        names
    }
}
