use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level schema definition parsed from a schema YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub entities: BTreeMap<String, EntityDefinition>,
}

/// Definition of a single entity type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Human readable name used in error messages ("Study", "Dataset")
    #[serde(default)]
    pub title: Option<String>,
    /// Store collection; defaults to the entity name
    #[serde(default)]
    pub collection: Option<String>,
    /// HTTP route segment; defaults to the entity name
    #[serde(default)]
    pub route: Option<String>,
    /// ID prefix for counter-assigned IDs. Entities without a prefix take
    /// the `id` supplied by the client.
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub references: BTreeMap<String, ReferenceDefinition>,
}

/// Definition of a reference field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDefinition {
    pub target: String,
    #[serde(default)]
    pub many: bool,
}
