use crate::document::{type_name, Document, ReferenceValue};
use crate::error::{CatalogError, Result};
use crate::schema::EntityType;

/// Result of validating a document
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Validate a document against its entity type.
/// Malformed IDs and reference fields of the wrong shape are errors; a
/// reference whose cardinality differs from its declaration is a warning,
/// since embedding follows the stored shape.
pub fn validate_document(entity: &EntityType, document: &Document) -> ValidationResult {
    let mut result = ValidationResult {
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    if let Some(id) = document.get("id") {
        match id.as_str() {
            Some("") => result.errors.push("Field 'id' must not be empty".into()),
            Some(_) => {}
            None => result.errors.push(format!(
                "Field 'id' expected string, got {}",
                type_name(id)
            )),
        }
    }

    for reference in &entity.references {
        match ReferenceValue::parse(&reference.field, document.get(&reference.field)) {
            Ok(ReferenceValue::Single(_)) if reference.many => result.warnings.push(format!(
                "Field '{}' declares a list of {} references but holds a single ID",
                reference.field, reference.target
            )),
            Ok(ReferenceValue::Many(_)) if !reference.many => result.warnings.push(format!(
                "Field '{}' declares a single {} reference but holds a list",
                reference.field, reference.target
            )),
            Ok(_) => {}
            Err(e) => result.errors.push(e.to_string()),
        }
    }

    result
}

/// Validate a document before it is written. Returns the warnings, or a
/// validation error listing every problem.
pub fn validate_and_prepare(entity: &EntityType, document: &Document) -> Result<Vec<String>> {
    let result = validate_document(entity, document);

    if !result.is_ok() {
        return Err(CatalogError::Validation(format!(
            "{} validation failed:\n  - {}",
            entity.title,
            result.errors.join("\n  - ")
        )));
    }

    for warning in &result.warnings {
        log::warn!("{}: {warning}", entity.title);
    }
    Ok(result.warnings)
}
