use crate::document::Document;
use crate::error::Result;

/// The document store the catalog persists into. Collections are created
/// on first write; reads from an unknown collection see no documents.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by collection and ID
    fn find_one(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// All documents of a collection, ordered by ID
    fn find_all(&self, collection: &str) -> Result<Vec<Document>>;

    /// All IDs of a collection, ordered
    fn list_ids(&self, collection: &str) -> Result<Vec<String>>;

    /// Number of documents in a collection
    fn count(&self, collection: &str) -> Result<usize>;

    /// Insert a new document. Fails with `AlreadyExists` if the ID is taken.
    fn insert(&self, collection: &str, document: &Document) -> Result<()>;

    /// Replace an existing document. Fails with `NotFound` if it is absent.
    fn replace(&self, collection: &str, document: &Document) -> Result<()>;

    /// Advance the counter of `collection` and format the next ID as
    /// `PREFIX:NNNNNNN`.
    fn next_id(&self, collection: &str, prefix: &str) -> Result<String>;

    /// Delete every document of a collection and reset its counter.
    /// Returns the number of documents removed.
    fn clear(&self, collection: &str) -> Result<usize>;
}

/// Format a counter value as a catalog ID
pub fn format_id(prefix: &str, sequence: u64) -> String {
    format!("{prefix}:{sequence:07}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_id() {
        assert_eq!(format_id("STU", 1), "STU:0000001");
        assert_eq!(format_id("DAT", 1234567), "DAT:1234567");
        assert_eq!(format_id("DAC", 12345678), "DAC:12345678");
    }
}
