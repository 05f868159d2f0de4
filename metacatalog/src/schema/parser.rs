use crate::error::Result;
use super::types::SchemaDefinition;
use std::path::Path;

/// The schema shipped with the crate
pub const BUILTIN_SCHEMA: &str = include_str!("builtin.yaml");

/// Parse a schema YAML file into a SchemaDefinition
pub fn parse_schema(path: &Path) -> Result<SchemaDefinition> {
    let content = std::fs::read_to_string(path)?;
    parse_schema_str(&content)
}

/// Parse a schema YAML string into a SchemaDefinition
pub fn parse_schema_str(content: &str) -> Result<SchemaDefinition> {
    let schema: SchemaDefinition = serde_yaml::from_str(content)?;
    Ok(schema)
}
