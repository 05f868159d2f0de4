//! Reference embedding.
//!
//! Walks the reference fields declared for an entity type and replaces each
//! referenced ID with the referenced document, embedded in turn through its
//! own reference fields. Recursion is driven by the data; a path of visited
//! `(collection, id)` pairs turns a reference cycle into
//! [`CatalogError::CyclicReferenceDetected`] instead of unbounded recursion.

use crate::document::{Document, ReferenceValue};
use crate::error::{CatalogError, Result};
use crate::schema::{EntityType, SchemaRegistry};
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation signal shared between a request and the embedding it drives.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tuning for an embed call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedOptions {
    /// Remember lookups within one call so a document referenced from
    /// several places is read once.
    #[serde(default)]
    pub cache_lookups: bool,
}

type LookupKey = (String, String);

/// A single embed call. Holds the visited path and the optional lookup cache.
pub struct Embedder<'a> {
    registry: &'a SchemaRegistry,
    store: &'a dyn DocumentStore,
    cancel: Option<&'a CancelFlag>,
    cache: Option<HashMap<LookupKey, Option<Document>>>,
    path: Vec<LookupKey>,
}

impl<'a> Embedder<'a> {
    pub fn new(registry: &'a SchemaRegistry, store: &'a dyn DocumentStore) -> Self {
        Embedder {
            registry,
            store,
            cancel: None,
            cache: None,
            path: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: &EmbedOptions) -> Self {
        self.cache = options.cache_lookups.then(HashMap::new);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Embed every reference of `document`, which is of type `entity`.
    pub fn embed(mut self, document: Document, entity: &EntityType) -> Result<Document> {
        if let Some(id) = document.id() {
            self.path.push((entity.collection.clone(), id.to_string()));
        }
        self.embed_references(document, entity)
    }

    fn embed_references(&mut self, mut document: Document, entity: &EntityType) -> Result<Document> {
        let registry = self.registry;
        for reference in &entity.references {
            let value = ReferenceValue::parse(&reference.field, document.get(&reference.field))?;
            let target = registry.target_of(reference)?;

            let embedded = match value {
                ReferenceValue::None => continue,
                ReferenceValue::Single(id) => self.resolve(&id, target)?,
                ReferenceValue::Many(ids) => {
                    let mut docs = Vec::with_capacity(ids.len());
                    for id in &ids {
                        docs.push(self.resolve(id, target)?);
                    }
                    Value::Array(docs)
                }
            };
            document.insert(reference.field.clone(), embedded);
        }
        Ok(document)
    }

    /// Resolve one ID of `target` into its embedded document. A missing
    /// document resolves to the ID itself.
    fn resolve(&mut self, id: &str, target: &EntityType) -> Result<Value> {
        if self.cancel.is_some_and(CancelFlag::is_cancelled) {
            return Err(CatalogError::Cancelled);
        }

        let key = (target.collection.clone(), id.to_string());
        if self.path.contains(&key) {
            return Err(CatalogError::CyclicReferenceDetected {
                collection: key.0,
                id: key.1,
            });
        }

        match self.lookup(&key)? {
            Some(found) => {
                self.path.push(key);
                let embedded = self.embed_references(found, target)?;
                self.path.pop();
                Ok(embedded.into_value())
            }
            None => {
                log::warn!(
                    "Reference with ID {} not found in collection {}",
                    id,
                    target.collection
                );
                Ok(Value::String(id.to_string()))
            }
        }
    }

    fn lookup(&mut self, key: &LookupKey) -> Result<Option<Document>> {
        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(key)) {
            return Ok(hit.clone());
        }

        log::debug!("Looking up {}/{}", key.0, key.1);
        let found = self.store.find_one(&key.0, &key.1)?;
        if let Some(cache) = self.cache.as_mut() {
            cache.insert(key.clone(), found.clone());
        }
        Ok(found)
    }
}

/// Embed the references of `document` with default options.
pub fn embed(
    registry: &SchemaRegistry,
    store: &dyn DocumentStore,
    document: Document,
    entity: &EntityType,
) -> Result<Document> {
    Embedder::new(registry, store).embed(document, entity)
}
