//! SQLite-backed vector store.

use crate::embeddings::EmbeddingConfig;
use crate::store::{content_hash, VectorStore};
use crate::types::{Document, OnConflict};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use vsearch_core::{AppError, AppResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The declaration an index is created with and must keep.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreMapping {
    pub embedding: EmbeddingConfig,
    pub on_conflict: OnConflict,
    pub created_at: Option<DateTime<Utc>>,
}

/// Durable vector store in a single SQLite file.
///
/// Every `put` is one statement in autocommit mode with `synchronous = FULL`,
/// so it is on disk when `put` returns. The connection sits behind a mutex:
/// writers and readers are serialized, which keeps each record atomic.
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
    mapping: StoreMapping,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Create or open the store at `db_path`.
    ///
    /// A new store records `embedding` and `on_conflict` as its mapping. An
    /// existing store must have been created with the same encoder and policy.
    ///
    /// # Errors
    /// * `AppError::DimensionMismatch` - the store holds vectors of another dimension
    /// * `AppError::Config` - provider, model or conflict policy differ
    /// * `AppError::StoreUnavailable` - the file cannot be opened
    pub fn open(
        db_path: &Path,
        embedding: &EmbeddingConfig,
        on_conflict: OnConflict,
    ) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::StoreUnavailable(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| store_error("Failed to open SQLite store", e))?;

        // WAL lets readers proceed while a commit is being synced
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(|e| store_error("Failed to enable WAL", e))?;

        let store = Self::init(conn, embedding, on_conflict, Some(db_path.to_path_buf()))?;
        tracing::debug!("Opened SQLite store at {:?}", db_path);
        Ok(store)
    }

    /// Create a store that lives only as long as this handle.
    pub fn open_in_memory(embedding: &EmbeddingConfig, on_conflict: OnConflict) -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| store_error("Failed to open in-memory store", e))?;
        Self::init(conn, embedding, on_conflict, None)
    }

    fn init(
        conn: Connection,
        embedding: &EmbeddingConfig,
        on_conflict: OnConflict,
        path: Option<PathBuf>,
    ) -> AppResult<Self> {
        conn.pragma_update(None, "synchronous", "FULL")
            .map_err(|e| store_error("Failed to set synchronous mode", e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| store_error("Failed to set busy timeout", e))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS mapping (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                storage_key TEXT NOT NULL UNIQUE,
                doc_id TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                content_hash TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_doc_id ON documents(doc_id);
            "#,
        )
        .map_err(|e| store_error("Failed to create tables", e))?;

        let mapping = establish_mapping(&conn, embedding, on_conflict)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            mapping,
            path,
        })
    }

    /// The mapping this store was created with.
    pub fn mapping(&self) -> &StoreMapping {
        &self.mapping
    }

    /// Path of the database file, if the store is on disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Size of the database file in bytes (0 for in-memory stores).
    pub fn size_bytes(&self) -> u64 {
        self.path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Close the connection. Later calls fail with `StoreUnavailable`.
    pub fn close(&self) -> AppResult<()> {
        let conn = self.lock()?.take();
        if let Some(conn) = conn {
            conn.close()
                .map_err(|(_, e)| store_error("Failed to close store", e))?;
            tracing::debug!("Closed SQLite store");
        }
        Ok(())
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| AppError::StoreUnavailable("Store lock poisoned".to_string()))
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let guard = self.lock()?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| AppError::StoreUnavailable("Store is closed".to_string()))?;
        f(conn)
    }
}

impl VectorStore for SqliteStore {
    fn dimensions(&self) -> usize {
        self.mapping.embedding.dimensions
    }

    fn put(&self, id: &str, text: &str, embedding: &[f32]) -> AppResult<()> {
        if id.is_empty() {
            return Err(AppError::InvalidRequest(
                "Document id must not be empty".to_string(),
            ));
        }

        if embedding.len() != self.dimensions() {
            return Err(AppError::DimensionMismatch {
                expected: self.dimensions(),
                actual: embedding.len(),
            });
        }

        let bytes = embedding_to_bytes(embedding);
        let hash = content_hash(text);

        self.with_conn(|conn| {
            let written = match self.mapping.on_conflict {
                OnConflict::Overwrite => conn.execute(
                    "INSERT INTO documents (storage_key, doc_id, text, embedding, content_hash)
                     VALUES (?1, ?1, ?2, ?3, ?4)
                     ON CONFLICT(storage_key) DO UPDATE SET
                         text = excluded.text,
                         embedding = excluded.embedding,
                         content_hash = excluded.content_hash",
                    params![id, text, bytes, hash],
                ),
                OnConflict::Duplicate => conn.execute(
                    "INSERT INTO documents (storage_key, doc_id, text, embedding, content_hash)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![uuid::Uuid::new_v4().to_string(), id, text, bytes, hash],
                ),
            };
            written.map_err(|e| store_error("Failed to insert document", e))?;
            Ok(())
        })
    }

    fn all(&self) -> AppResult<Vec<Document>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT seq, doc_id, text, embedding FROM documents ORDER BY seq")
                .map_err(|e| store_error("Failed to prepare scan", e))?;

            let rows = stmt
                .query_map([], |row| {
                    let seq: i64 = row.get(0)?;
                    let bytes: Vec<u8> = row.get(3)?;
                    Ok((seq, row.get::<_, String>(1)?, row.get::<_, String>(2)?, bytes))
                })
                .map_err(|e| store_error("Failed to scan documents", e))?;

            let mut documents = Vec::new();
            for row in rows {
                let (seq, id, text, bytes) =
                    row.map_err(|e| store_error("Failed to read document", e))?;

                // A corrupt blob becomes an empty embedding; the ranker skips and reports it
                let embedding = bytes_to_embedding(&bytes).unwrap_or_else(|e| {
                    tracing::warn!("Document '{}' (seq {}) has a corrupt embedding: {}", id, seq, e);
                    Vec::new()
                });

                documents.push(Document {
                    id,
                    text,
                    embedding,
                    seq: seq as u64,
                });
            }

            Ok(documents)
        })
    }

    fn exists(&self, id: &str) -> AppResult<bool> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE doc_id = ?1)",
                params![id],
                |row| row.get(0),
            )
            .map_err(|e| store_error("Failed to look up document", e))
        })
    }

    fn len(&self) -> AppResult<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| {
                row.get::<_, i64>(0).map(|v| v as usize)
            })
            .map_err(|e| store_error("Failed to count documents", e))
        })
    }

    fn content_hash(&self, id: &str) -> AppResult<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT content_hash FROM documents WHERE doc_id = ?1 ORDER BY seq DESC LIMIT 1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| store_error("Failed to look up content hash", e))
        })
    }
}

/// Record the mapping in a new store, or check it against an existing one.
fn establish_mapping(
    conn: &Connection,
    embedding: &EmbeddingConfig,
    on_conflict: OnConflict,
) -> AppResult<StoreMapping> {
    let read = |key: &str| -> AppResult<Option<String>> {
        conn.query_row(
            "SELECT value FROM mapping WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| store_error("Failed to read mapping", e))
    };

    let Some(dimensions) = read("dimensions")? else {
        let created_at = Utc::now();
        let entries = [
            ("dimensions", embedding.dimensions.to_string()),
            ("provider", embedding.provider.clone()),
            ("model", embedding.model.clone()),
            ("on_conflict", on_conflict.as_str().to_string()),
            ("created_at", created_at.to_rfc3339()),
        ];
        for (key, value) in entries {
            conn.execute(
                "INSERT INTO mapping (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| store_error("Failed to write mapping", e))?;
        }

        tracing::info!(
            "Created index mapping: {} dimensions, encoder {}/{}, on_conflict={}",
            embedding.dimensions,
            embedding.provider,
            embedding.model,
            on_conflict.as_str()
        );

        return Ok(StoreMapping {
            embedding: embedding.clone(),
            on_conflict,
            created_at: Some(created_at),
        });
    };

    let dimensions: usize = dimensions
        .parse()
        .map_err(|_| AppError::Index(format!("Corrupt mapping dimensions '{}'", dimensions)))?;

    let recorded = EmbeddingConfig {
        provider: read("provider")?.unwrap_or_default(),
        model: read("model")?.unwrap_or_default(),
        dimensions,
        provider_config: embedding.provider_config.clone(),
    };
    recorded.validate_consistency(embedding)?;

    let recorded_policy: OnConflict = read("on_conflict")?
        .as_deref()
        .unwrap_or("overwrite")
        .parse()?;
    if recorded_policy != on_conflict {
        return Err(AppError::Config(format!(
            "Conflict policy mismatch: index was created with '{}', configured '{}'",
            recorded_policy.as_str(),
            on_conflict.as_str()
        )));
    }

    let created_at = read("created_at")?
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(StoreMapping {
        embedding: recorded,
        on_conflict,
        created_at,
    })
}

/// Classify a SQLite error: I/O-like failures are retryable, the rest are not.
fn store_error(context: &str, err: rusqlite::Error) -> AppError {
    let transient = matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::CannotOpen
                | ErrorCode::DiskFull
                | ErrorCode::ReadOnly
        )
    );

    if transient {
        AppError::StoreUnavailable(format!("{}: {}", context, err))
    } else {
        AppError::Index(format!("{}: {}", context, err))
    }
}

/// Convert embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Index(format!(
            "Invalid embedding byte length {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
