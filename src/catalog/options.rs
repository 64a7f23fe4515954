//! Listing of reportable entities and their fields.
//!
//! Used to populate report builders: protected entities are left out and
//! every entity/field gets a human-readable label.

use inflector::Inflector;
use serde::Serialize;

use super::{FieldCatalog, SelectOptions};

/// One reportable entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityOption {
    pub name: String,
    pub label: String,
    pub fields: Vec<FieldOption>,
}

/// One field of a reportable entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldOption {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<SelectOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

/// Turn a key such as `date_created` or `customerName` into `Date Created`
/// / `Customer Name`.
pub fn format_label(key: &str) -> String {
    key.to_title_case()
}

/// Entities available for reporting, sorted by name.
pub fn report_options(catalog: &dyn FieldCatalog) -> Vec<EntityOption> {
    catalog
        .entity_names()
        .into_iter()
        .filter(|name| !catalog.is_protected(name))
        .filter_map(|name| {
            let meta = catalog.get(&name)?;
            let fields = meta
                .fields
                .iter()
                .map(|(field, def)| FieldOption {
                    name: field.clone(),
                    label: def.label.clone().unwrap_or_else(|| format_label(field)),
                    field_type: def
                        .field_type
                        .as_ref()
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_else(|| "string".to_string()),
                    options: def.options.clone(),
                    entity: def.entity.clone(),
                })
                .collect();
            Some(EntityOption {
                label: meta.label.clone().unwrap_or_else(|| format_label(&name)),
                name,
                fields,
            })
        })
        .collect()
}
