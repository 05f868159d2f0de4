pub mod catalog;
pub mod config;
pub mod document;
pub mod embed;
pub mod error;
pub mod schema;
pub mod store;
pub mod system_db;
pub mod validation;

pub use catalog::{Catalog, EntityHandle};
pub use config::Config;
pub use document::{Document, ReferenceValue};
pub use embed::{embed, CancelFlag, EmbedOptions, Embedder};
pub use error::{CatalogError, Result};
pub use schema::{EntityType, ReferenceField, SchemaRegistry};
pub use store::DocumentStore;
pub use system_db::SystemDb;
