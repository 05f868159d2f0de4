use crate::config::Config;
use crate::document::Document;
use crate::embed::{CancelFlag, EmbedOptions, Embedder};
use crate::error::{CatalogError, Result};
use crate::schema::{EntityType, SchemaRegistry};
use crate::store::DocumentStore;
use crate::system_db::SystemDb;
use crate::validation;
use std::path::Path;

/// The main entry point: the schema registry and the document store,
/// with an entity handle per entity type for CRUD and embedding.
pub struct Catalog {
    registry: SchemaRegistry,
    store: Box<dyn DocumentStore>,
    embed_options: EmbedOptions,
}

impl Catalog {
    pub fn new(registry: SchemaRegistry, store: Box<dyn DocumentStore>) -> Self {
        Catalog {
            registry,
            store,
            embed_options: EmbedOptions::default(),
        }
    }

    pub fn with_embed_options(mut self, options: EmbedOptions) -> Self {
        self.embed_options = options;
        self
    }

    /// Open the catalog described by `config`: load the schema and open
    /// the SQLite store (`:memory:` for a transient one).
    pub fn open(config: &Config) -> Result<Self> {
        let registry = SchemaRegistry::load(config.schema_path.as_deref())?;
        let store = if config.database.path == ":memory:" {
            SystemDb::open_in_memory()?
        } else {
            SystemDb::open(Path::new(&config.database.path))?
        };
        log::info!(
            "Opened catalog at {} with {} entity types",
            config.database.path,
            registry.entities().len()
        );
        Ok(Catalog::new(registry, Box::new(store)).with_embed_options(config.embed.clone()))
    }

    /// Built-in schema over an in-memory store
    pub fn open_in_memory() -> Result<Self> {
        Ok(Catalog::new(
            SchemaRegistry::builtin()?,
            Box::new(SystemDb::open_in_memory()?),
        ))
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Get a handle for an entity type by name
    pub fn entity(&self, name: &str) -> Result<EntityHandle<'_>> {
        let entity = self.registry.entity(name)?;
        Ok(EntityHandle {
            catalog: self,
            entity,
        })
    }

    /// Get a handle for an entity type by HTTP route segment
    pub fn route(&self, route: &str) -> Option<EntityHandle<'_>> {
        self.registry
            .entity_by_route(route)
            .map(|entity| EntityHandle {
                catalog: self,
                entity,
            })
    }

    /// Document counts per entity type
    pub fn status(&self) -> Result<serde_json::Value> {
        let mut entities = serde_json::Map::new();
        for entity in self.registry.entities() {
            let count = self.store.count(&entity.collection)?;
            entities.insert(
                entity.name.clone(),
                serde_json::json!({
                    "collection": entity.collection,
                    "route": entity.route,
                    "documents": count,
                }),
            );
        }
        Ok(serde_json::json!({ "entities": entities }))
    }

    /// Delete every document and reset every ID counter.
    /// Returns the number of documents removed.
    pub fn reset(&self) -> Result<usize> {
        let mut removed = 0;
        for entity in self.registry.entities() {
            let n = self.store.clear(&entity.collection)?;
            log::info!("Deleted {n} records from collection {}", entity.collection);
            removed += n;
        }
        Ok(removed)
    }
}

/// CRUD access to the documents of one entity type
pub struct EntityHandle<'a> {
    catalog: &'a Catalog,
    entity: &'a EntityType,
}

impl<'a> EntityHandle<'a> {
    pub fn entity_type(&self) -> &'a EntityType {
        self.entity
    }

    /// IDs of all documents, ordered
    pub fn list(&self) -> Result<Vec<String>> {
        self.catalog.store.list_ids(&self.entity.collection)
    }

    /// All documents, ordered by ID
    pub fn list_documents(&self) -> Result<Vec<Document>> {
        self.catalog.store.find_all(&self.entity.collection)
    }

    /// Get a document by ID, with its references embedded when `embedded`.
    pub fn get(&self, id: &str, embedded: bool) -> Result<Document> {
        self.get_cancellable(id, embedded, &CancelFlag::new())
    }

    /// Like [`get`](Self::get), stopping the embedding once `cancel` is set.
    pub fn get_cancellable(&self, id: &str, embedded: bool, cancel: &CancelFlag) -> Result<Document> {
        let document = self.fetch(id)?;
        if !embedded {
            return Ok(document);
        }
        Embedder::new(&self.catalog.registry, self.catalog.store.as_ref())
            .with_options(&self.catalog.embed_options)
            .with_cancel(cancel)
            .embed(document, self.entity)
    }

    /// Add a document. Entities with an ID prefix get the next counter ID,
    /// replacing any client `id`; others must carry their own `id`.
    pub fn add(&self, mut document: Document) -> Result<Document> {
        if self.entity.assigns_ids() {
            document.remove("id");
        }
        validation::validate_and_prepare(self.entity, &document)?;

        let id = match &self.entity.prefix {
            Some(prefix) => {
                let id = self
                    .catalog
                    .store
                    .next_id(&self.entity.collection, prefix)?;
                document.set_id(id.clone());
                id
            }
            None => document
                .id()
                .map(str::to_string)
                .ok_or_else(|| {
                    CatalogError::Validation(format!(
                        "{} requires a string 'id' field",
                        self.entity.title
                    ))
                })?,
        };

        self.catalog.store.insert(&self.entity.collection, &document)?;
        log::info!("Added {} {id}", self.entity.title);
        self.fetch(&id)
    }

    /// Overlay `partial` onto the stored document and persist the result.
    pub fn update(&self, id: &str, partial: Document) -> Result<Document> {
        let mut document = self.fetch(id)?;

        if let Some(new_id) = partial.get("id") {
            if new_id.as_str() != Some(id) {
                return Err(CatalogError::Validation(format!(
                    "{} '{id}' cannot change its id to {new_id}",
                    self.entity.title
                )));
            }
        }

        document.merge(partial);
        validation::validate_and_prepare(self.entity, &document)?;
        self.catalog.store.replace(&self.entity.collection, &document)?;
        log::info!("Updated {} {id}", self.entity.title);
        self.fetch(id)
    }

    /// Add a batch of documents, stopping at the first failure.
    /// Returns the IDs in input order.
    pub fn load(&self, documents: Vec<Document>) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(documents.len());
        for document in documents {
            let added = self.add(document)?;
            ids.extend(added.id().map(str::to_string));
        }
        Ok(ids)
    }

    fn fetch(&self, id: &str) -> Result<Document> {
        self.catalog
            .store
            .find_one(&self.entity.collection, id)?
            .ok_or_else(|| CatalogError::NotFound {
                entity: self.entity.title.clone(),
                id: id.to_string(),
            })
    }
}
