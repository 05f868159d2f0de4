use crate::document::Document;
use crate::error::{CatalogError, Result};
use crate::store::{format_id, DocumentStore};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed document store. Documents are kept as JSON text keyed by
/// (collection, id); ID counters live in their own table.
pub struct SystemDb {
    conn: Mutex<Connection>,
}

impl SystemDb {
    /// Open or create the system database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = SystemDb {
            conn: Mutex::new(conn),
        };
        db.initialize_tables()?;
        Ok(db)
    }

    /// Open an in-memory system database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = SystemDb {
            conn: Mutex::new(conn),
        };
        db.initialize_tables()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Other("system database lock poisoned".into()))
    }

    fn initialize_tables(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data_json TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                modified_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);

            CREATE TABLE IF NOT EXISTS counters (
                collection TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }
}

impl DocumentStore for SystemDb {
    fn find_one(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let data_json: Option<String> = self
            .conn()?
            .query_row(
                "SELECT data_json FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        match data_json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT data_json FROM documents WHERE collection = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![collection], |row| row.get::<_, String>(0))?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(serde_json::from_str(&row?)?);
        }
        Ok(docs)
    }

    fn list_ids(&self, collection: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id FROM documents WHERE collection = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![collection], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn count(&self, collection: &str) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn insert(&self, collection: &str, document: &Document) -> Result<()> {
        let id = document_id(document)?;
        let data_json = serde_json::to_string(document)?;
        let result = self.conn()?.execute(
            "INSERT INTO documents (collection, id, data_json) VALUES (?1, ?2, ?3)",
            params![collection, id, data_json],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(CatalogError::AlreadyExists {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn replace(&self, collection: &str, document: &Document) -> Result<()> {
        let id = document_id(document)?;
        let data_json = serde_json::to_string(document)?;
        let changed = self.conn()?.execute(
            "UPDATE documents SET data_json = ?3, modified_at = datetime('now')
             WHERE collection = ?1 AND id = ?2",
            params![collection, id, data_json],
        )?;

        if changed == 0 {
            return Err(CatalogError::NotFound {
                entity: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn next_id(&self, collection: &str, prefix: &str) -> Result<String> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO counters (collection, value) VALUES (?1, 1)
             ON CONFLICT(collection) DO UPDATE SET value = value + 1",
            params![collection],
        )?;
        let value: i64 = conn.query_row(
            "SELECT value FROM counters WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(format_id(prefix, value as u64))
    }

    fn clear(&self, collection: &str) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM documents WHERE collection = ?1",
            params![collection],
        )?;
        conn.execute(
            "DELETE FROM counters WHERE collection = ?1",
            params![collection],
        )?;
        Ok(removed)
    }
}

fn document_id(document: &Document) -> Result<&str> {
    document
        .id()
        .ok_or_else(|| CatalogError::Validation("document has no string 'id' field".into()))
}
