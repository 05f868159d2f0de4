use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    #[error("Reference field '{field}' holds {found}, expected a string ID or a list of string IDs")]
    InvalidReferenceShape { field: String, found: String },

    #[error("Cyclic reference detected at {collection}/{id}")]
    CyclicReferenceDetected { collection: String, id: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
