mod parser;
mod types;

pub use parser::{parse_schema, parse_schema_str, BUILTIN_SCHEMA};
pub use types::{EntityDefinition, ReferenceDefinition, SchemaDefinition};

use crate::error::{CatalogError, Result};
use std::collections::HashMap;
use std::path::Path;

/// A resolved entity type: where its documents live and which of their
/// fields point at other entities.
#[derive(Debug, Clone)]
pub struct EntityType {
    pub name: String,
    pub title: String,
    pub collection: String,
    pub route: String,
    pub prefix: Option<String>,
    pub references: Vec<ReferenceField>,
}

impl EntityType {
    /// Whether IDs for this entity are assigned from the store counter
    pub fn assigns_ids(&self) -> bool {
        self.prefix.is_some()
    }

    /// Look up the declaration of a reference field by name
    pub fn reference(&self, field: &str) -> Option<&ReferenceField> {
        self.references.iter().find(|r| r.field == field)
    }
}

/// A declared reference field and the entity type it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceField {
    pub field: String,
    pub target: String,
    pub many: bool,
}

/// Read-only registry of entity types. Reference targets are stored by
/// name and resolved through the registry, so cycles between entity types
/// are representable.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    entities: Vec<EntityType>,
    by_name: HashMap<String, usize>,
    by_route: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Registry for the schema shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_definition(parse_schema_str(BUILTIN_SCHEMA)?)
    }

    /// Load a registry from a schema file, or the built-in schema when no
    /// path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(CatalogError::Schema(format!(
                        "schema file not found: {}",
                        path.display()
                    )));
                }
                Self::from_definition(parse_schema(path)?)
            }
            None => Self::builtin(),
        }
    }

    /// Build and check a registry from a parsed definition
    pub fn from_definition(definition: SchemaDefinition) -> Result<Self> {
        if definition.entities.is_empty() {
            return Err(CatalogError::Schema("schema declares no entities".into()));
        }

        let mut entities = Vec::with_capacity(definition.entities.len());
        let mut by_name = HashMap::new();
        let mut by_route = HashMap::new();
        let mut collections: HashMap<String, String> = HashMap::new();

        for (name, def) in &definition.entities {
            let collection = def.collection.clone().unwrap_or_else(|| name.clone());
            let route = def.route.clone().unwrap_or_else(|| name.clone());

            if let Some(other) = collections.insert(collection.clone(), name.clone()) {
                return Err(CatalogError::Schema(format!(
                    "entities '{other}' and '{name}' share collection '{collection}'"
                )));
            }
            if by_route.contains_key(&route) {
                return Err(CatalogError::Schema(format!(
                    "route '{route}' of entity '{name}' is already in use"
                )));
            }

            let mut references = Vec::with_capacity(def.references.len());
            for (field, reference) in &def.references {
                if !definition.entities.contains_key(&reference.target) {
                    return Err(CatalogError::Schema(format!(
                        "reference '{name}.{field}' targets unknown entity '{}'",
                        reference.target
                    )));
                }
                references.push(ReferenceField {
                    field: field.clone(),
                    target: reference.target.clone(),
                    many: reference.many,
                });
            }

            let prefix = def
                .prefix
                .as_deref()
                .map(|p| p.trim_end_matches(':').to_string())
                .filter(|p| !p.is_empty());

            let index = entities.len();
            by_name.insert(name.clone(), index);
            by_route.insert(route.clone(), index);
            entities.push(EntityType {
                name: name.clone(),
                title: def.title.clone().unwrap_or_else(|| name.clone()),
                collection,
                route,
                prefix,
                references,
            });
        }

        Ok(SchemaRegistry {
            entities,
            by_name,
            by_route,
        })
    }

    /// All entity types, ordered by name
    pub fn entities(&self) -> &[EntityType] {
        &self.entities
    }

    /// Get an entity type by name
    pub fn entity(&self, name: &str) -> Result<&EntityType> {
        self.by_name
            .get(name)
            .map(|&i| &self.entities[i])
            .ok_or_else(|| CatalogError::Schema(format!("unknown entity type '{name}'")))
    }

    /// Get an entity type by its HTTP route segment
    pub fn entity_by_route(&self, route: &str) -> Option<&EntityType> {
        self.by_route.get(route).map(|&i| &self.entities[i])
    }

    pub fn collection_name_of(&self, name: &str) -> Result<&str> {
        Ok(&self.entity(name)?.collection)
    }

    pub fn reference_fields_of(&self, name: &str) -> Result<&[ReferenceField]> {
        Ok(&self.entity(name)?.references)
    }

    /// The entity type a reference field points at
    pub fn target_of(&self, reference: &ReferenceField) -> Result<&EntityType> {
        self.entity(&reference.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_schema() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert_eq!(registry.entities().len(), 7);

        let study = registry.entity("study").unwrap();
        assert_eq!(study.title, "Study");
        assert_eq!(study.collection, "study");
        assert_eq!(study.route, "studies");
        assert_eq!(study.prefix.as_deref(), Some("STU"));
        assert_eq!(
            study.reference("publications"),
            Some(&ReferenceField {
                field: "publications".into(),
                target: "publication".into(),
                many: true,
            })
        );
        assert!(!study.reference("has_experiment").unwrap().many);
    }

    #[test]
    fn test_builtin_reference_fields() {
        let registry = SchemaRegistry::builtin().unwrap();

        let mut dataset_refs: Vec<&str> = registry
            .reference_fields_of("dataset")
            .unwrap()
            .iter()
            .map(|r| r.field.as_str())
            .collect();
        dataset_refs.sort();
        assert_eq!(
            dataset_refs,
            vec!["files", "has_data_access_policy", "has_study"]
        );

        let dap = registry.reference_fields_of("data_access_policy").unwrap();
        assert_eq!(dap.len(), 1);
        assert_eq!(
            registry.target_of(&dap[0]).unwrap().name,
            "data_access_committee"
        );

        for leaf in ["experiment", "file", "publication", "data_access_committee"] {
            assert!(registry.reference_fields_of(leaf).unwrap().is_empty());
        }
    }

    #[test]
    fn test_collection_and_route_lookup() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert_eq!(
            registry.collection_name_of("data_access_policy").unwrap(),
            "data_access_policy"
        );
        assert_eq!(
            registry.entity_by_route("data_access_policies").unwrap().name,
            "data_access_policy"
        );
        assert!(registry.entity_by_route("nope").is_none());
        assert!(matches!(
            registry.entity("nope"),
            Err(CatalogError::Schema(_))
        ));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let def = parse_schema_str(
            "entities:\n  study:\n    references:\n      has_x: { target: missing }\n",
        )
        .unwrap();
        let err = SchemaRegistry::from_definition(def).unwrap_err();
        assert!(err.to_string().contains("unknown entity 'missing'"));
    }

    #[test]
    fn test_duplicate_collection_rejected() {
        let def = parse_schema_str(
            "entities:\n  a: { collection: shared }\n  b: { collection: shared }\n",
        )
        .unwrap();
        assert!(SchemaRegistry::from_definition(def).is_err());
    }

    #[test]
    fn test_cyclic_schema_allowed() {
        let def = parse_schema_str(
            r#"
entities:
  study:
    references:
      has_dataset: { target: dataset }
  dataset:
    references:
      has_study: { target: study }
"#,
        )
        .unwrap();
        let registry = SchemaRegistry::from_definition(def).unwrap();
        let reference = &registry.reference_fields_of("study").unwrap()[0];
        assert_eq!(registry.target_of(reference).unwrap().name, "dataset");
    }

    #[test]
    fn test_prefix_colon_is_trimmed() {
        let def = parse_schema_str("entities:\n  study: { prefix: \"STU:\" }\n  file: { prefix: \"\" }\n").unwrap();
        let registry = SchemaRegistry::from_definition(def).unwrap();
        assert_eq!(registry.entity("study").unwrap().prefix.as_deref(), Some("STU"));
        assert!(!registry.entity("file").unwrap().assigns_ids());
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("schema.yaml");
        std::fs::write(&path, BUILTIN_SCHEMA).unwrap();
        let registry = SchemaRegistry::load(Some(&path)).unwrap();
        assert_eq!(registry.entities().len(), 7);

        let missing = tmp.path().join("missing.yaml");
        assert!(matches!(
            SchemaRegistry::load(Some(&missing)),
            Err(CatalogError::Schema(_))
        ));
    }
}
