//! SQLite Store Implementation
//!
//! Single-file storage layer for documents, chunks, and their embeddings,
//! optimized for write-then-read-many workloads on memory-constrained
//! offline devices. One writer, many readers (WAL); all methods take `&self`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, params_from_iter, types::Value, Connection, OpenFlags, OptionalExtension};

use crate::corpus::{ChunkRecord, DocumentRecord, EmbeddingRecord, StoreStats};
use crate::search::sanitize_fts5_query;
use crate::storage::stream::{StreamPlan, VectorStream};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Store error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Migration script missing or malformed; the store is unusable
    #[error("Schema error: {0}")]
    Schema(String),
    /// Store file could not be opened or created
    #[error("Storage open error: {0}")]
    Open(String),
    /// Foreign-key violation; the offending batch was rejected wholesale
    #[error("Integrity error: {0}")]
    Integrity(String),
    /// Vector byte length does not match its declared dims
    #[error(
        "Encoding error: chunk {chunk_id} declares dims={dims} but carries {actual} bytes \
         (expected {expected4} for f32 or {expected8} for f64)"
    )]
    Encoding {
        /// Chunk whose vector was rejected
        chunk_id: i64,
        /// Declared element count
        dims: i64,
        /// Actual blob length
        actual: usize,
        /// Expected length at 4 bytes per element
        expected4: usize,
        /// Expected length at 8 bytes per element
        expected8: usize,
    },
    /// Malformed query parameters, rejected before execution
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// Snapshot export failed; the canonical store is untouched
    #[error("Export error: {0}")]
    Export(String),
    /// A connection lock was poisoned by a panicking thread
    #[error("Lock poisoned: {0}")]
    Lock(&'static str),
}

/// Store result type
pub type Result<T> = std::result::Result<T, StoreError>;

/// Map SQLite constraint failures to `Integrity`, pass everything else through
fn map_constraint(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Integrity(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        _ => StoreError::Database(err),
    }
}

// ============================================================================
// OPTIONS
// ============================================================================

/// Explicit store configuration
///
/// Passed into [`Store::open`]; there is no process-wide mutable state.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Page cache budget in KiB, applied as a negative `cache_size` pragma
    pub cache_size_kib: u32,
    /// Rows fetched per round trip by streaming retrieval
    pub stream_page_size: usize,
    /// How long a connection waits on a busy writer before erroring
    pub busy_timeout_ms: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            // ~20 MiB keeps hot index pages resident on constrained devices
            cache_size_kib: 20_480,
            stream_page_size: 512,
            busy_timeout_ms: 5_000,
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Embedded store for documents, chunks, and embeddings
///
/// Uses separate reader/writer connections for interior mutability. All
/// methods take `&self` (not `&mut self`), making `Store` `Send + Sync` so
/// serving layers can share it behind an `Arc` without an outer mutex.
#[derive(Debug)]
pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    options: StoreOptions,
    path: PathBuf,
}

impl Store {
    /// Apply durability/performance pragmas to a connection
    ///
    /// WAL allows concurrent readers during a writer's transaction;
    /// `synchronous = NORMAL` trades some crash durability for write
    /// throughput, which fits the write-then-read-many workload.
    fn configure_connection(conn: &Connection, options: &StoreOptions) -> Result<()> {
        conn.execute_batch(&format!(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA cache_size = -{};
             PRAGMA busy_timeout = {};",
            options.cache_size_kib, options.busy_timeout_ms,
        ))?;
        Ok(())
    }

    /// Open (or create) a store file and apply pending migrations
    pub fn open<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let writer = Connection::open(&path)
            .map_err(|e| StoreError::Open(format!("{}: {}", path.display(), e)))?;
        Self::configure_connection(&writer, &options)?;

        super::migrations::apply_migrations(&writer)
            .map_err(|e| StoreError::Schema(e.to_string()))?;

        let reader = Connection::open(&path)
            .map_err(|e| StoreError::Open(format!("{}: {}", path.display(), e)))?;
        Self::configure_connection(&reader, &options)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            options,
            path,
        })
    }

    /// Open an in-memory store (for testing)
    ///
    /// Uses a uniquely named shared-cache memory database so the reader and
    /// writer connections see the same data.
    pub fn in_memory() -> Result<Self> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        let name = format!(
            "file:satchel-mem-{}?mode=memory&cache=shared",
            NEXT_ID.fetch_add(1, Ordering::Relaxed)
        );
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let options = StoreOptions::default();

        let writer = Connection::open_with_flags(&name, flags)
            .map_err(|e| StoreError::Open(format!("{name}: {e}")))?;
        Self::configure_connection(&writer, &options)?;
        super::migrations::apply_migrations(&writer)
            .map_err(|e| StoreError::Schema(e.to_string()))?;

        let reader = Connection::open_with_flags(&name, flags)
            .map_err(|e| StoreError::Open(format!("{name}: {e}")))?;
        Self::configure_connection(&reader, &options)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            options,
            path: PathBuf::from(name),
        })
    }

    /// Path this store was opened at
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured options
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub(crate) fn reader(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader.lock().map_err(|_| StoreError::Lock("reader"))
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer.lock().map_err(|_| StoreError::Lock("writer"))
    }

    // ========================================================================
    // META
    // ========================================================================

    /// Upsert a store-level metadata pair (last write wins)
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Read a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let reader = self.reader()?;
        let value = reader
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// All metadata pairs, sorted by key
    pub fn meta_pairs(&self) -> Result<Vec<(String, String)>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare("SELECT key, value FROM meta ORDER BY key")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs)
    }

    // ========================================================================
    // INGESTION
    // ========================================================================

    /// Upsert a document row
    ///
    /// Re-inserting the same `doc_id` replaces title/grade/subject wholesale;
    /// `created_at` from the first insert is preserved.
    pub fn insert_document(&self, doc: &DocumentRecord) -> Result<()> {
        let writer = self.writer()?;
        writer
            .execute(
                "INSERT INTO documents (doc_id, title, grade, subject, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(doc_id) DO UPDATE SET
                     title = excluded.title,
                     grade = excluded.grade,
                     subject = excluded.subject",
                params![doc.doc_id, doc.title, doc.grade, doc.subject, Utc::now()],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    /// Batch-upsert chunk rows in a single transaction
    ///
    /// Every row must reference an existing document; one violation rejects
    /// the whole batch with [`StoreError::Integrity`] and nothing commits.
    /// The full-text index is maintained by triggers inside the same
    /// transaction, so readers never see a chunk without its index entry.
    pub fn insert_chunks(&self, rows: &[ChunkRecord]) -> Result<()> {
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (chunk_id, doc_id, text, metadata)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(chunk_id) DO UPDATE SET
                     doc_id = excluded.doc_id,
                     text = excluded.text,
                     metadata = excluded.metadata",
            )?;
            for row in rows {
                stmt.execute(params![row.chunk_id, row.doc_id, row.text, row.metadata])
                    .map_err(map_constraint)?;
            }
        }
        tx.commit()?;

        tracing::debug!("Upserted {} chunks", rows.len());
        Ok(())
    }

    /// Batch-upsert embedding rows in a single transaction
    ///
    /// Byte lengths are validated against declared dims for the entire batch
    /// before any row is written; a mismatch fails with
    /// [`StoreError::Encoding`] and the store is untouched. Rows must
    /// reference existing chunks or the batch fails with
    /// [`StoreError::Integrity`].
    pub fn insert_embeddings(&self, rows: &[EmbeddingRecord]) -> Result<()> {
        // Validate before write, not row-by-row after a partial commit
        for row in rows {
            if row.element_width().is_none() {
                let dims = row.dims.max(0) as usize;
                return Err(StoreError::Encoding {
                    chunk_id: row.chunk_id,
                    dims: row.dims,
                    actual: row.vec.len(),
                    expected4: dims * 4,
                    expected8: dims * 8,
                });
            }
        }

        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO embeddings (chunk_id, dims, vec)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(chunk_id) DO UPDATE SET
                     dims = excluded.dims,
                     vec = excluded.vec",
            )?;
            for row in rows {
                stmt.execute(params![row.chunk_id, row.dims, row.vec])
                    .map_err(map_constraint)?;
            }
        }
        tx.commit()?;

        tracing::debug!("Upserted {} embeddings", rows.len());
        Ok(())
    }

    // ========================================================================
    // RETRIEVAL
    // ========================================================================

    /// Stream all vectors for a grade/subject scope, filtered by dims
    ///
    /// Returns up to `limit` rows ordered by `chunk_id` ascending, fetched
    /// lazily in pages of [`StoreOptions::stream_page_size`] rows. The
    /// ordering is deliberate: it makes scans deterministic for a given
    /// store state and enables keyset pagination between pages.
    pub fn stream_vectors_for_grade_subject(
        &self,
        grade: i64,
        subject: &str,
        dims: i64,
        limit: u64,
    ) -> Result<VectorStream<'_>> {
        if dims <= 0 {
            return Err(StoreError::InvalidQuery(format!(
                "dims must be positive, got {dims}"
            )));
        }
        if limit == 0 {
            return Err(StoreError::InvalidQuery("limit must be positive".into()));
        }
        Ok(VectorStream::new(
            self,
            StreamPlan::GradeSubject {
                grade,
                subject: subject.to_owned(),
                dims,
                last_chunk_id: i64::MIN,
            },
            limit,
        ))
    }

    /// Stream vectors for exactly the given chunk ids
    ///
    /// Batched and ordered the same way as the scoped scan. Chunks without
    /// an embedding are simply absent from the result. An empty id list
    /// yields an exhausted stream without touching the database.
    pub fn stream_vectors_by_chunk_ids(&self, chunk_ids: &[i64]) -> Result<VectorStream<'_>> {
        let mut ids = chunk_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let limit = ids.len() as u64;
        Ok(VectorStream::new(
            self,
            StreamPlan::ChunkIds { ids, pos: 0 },
            limit,
        ))
    }

    /// Resolve the document ids in a grade/subject scope
    pub fn doc_ids_for_grade_subject(&self, grade: i64, subject: &str) -> Result<Vec<i64>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT doc_id FROM documents WHERE grade = ?1 AND subject = ?2 ORDER BY doc_id",
        )?;
        let ids = stmt
            .query_map(params![grade, subject], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Resolve the document ids for an entire grade
    pub fn doc_ids_for_grade(&self, grade: i64) -> Result<Vec<i64>> {
        let reader = self.reader()?;
        let mut stmt =
            reader.prepare("SELECT doc_id FROM documents WHERE grade = ?1 ORDER BY doc_id")?;
        let ids = stmt
            .query_map(params![grade], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Resolve the document ids for a subject across all grades
    pub fn doc_ids_for_subject(&self, subject: &str) -> Result<Vec<i64>> {
        let reader = self.reader()?;
        let mut stmt =
            reader.prepare("SELECT doc_id FROM documents WHERE subject = ?1 ORDER BY doc_id")?;
        let ids = stmt
            .query_map(params![subject], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Run a keyword query against the full-text index, scoped to documents
    ///
    /// This is the cheap pre-filter of the hybrid path: it returns at most
    /// `limit` matching chunk ids without reading a single vector blob.
    /// Matching semantics (porter stemming, prefix `*`) belong to FTS5. An
    /// empty `doc_ids` scope short-circuits to an empty result; issuing the
    /// query anyway would drop the scope filter entirely.
    pub fn candidate_chunk_ids_from_fts(
        &self,
        doc_ids: &[i64],
        text_query: &str,
        limit: u64,
    ) -> Result<Vec<i64>> {
        if limit == 0 {
            return Err(StoreError::InvalidQuery("limit must be positive".into()));
        }
        if doc_ids.is_empty() {
            return Ok(Vec::new());
        }

        let match_expr = sanitize_fts5_query(text_query);
        if match_expr.is_empty() {
            return Err(StoreError::InvalidQuery(format!(
                "no searchable terms in {text_query:?}"
            )));
        }

        let placeholders = vec!["?"; doc_ids.len()].join(",");
        let sql = format!(
            "SELECT chunk_id FROM chunks_fts
             WHERE doc_id IN ({placeholders}) AND chunks_fts MATCH ?
             LIMIT ?"
        );

        let mut values: Vec<Value> = doc_ids.iter().map(|&id| Value::Integer(id)).collect();
        values.push(Value::Text(match_expr));
        values.push(Value::Integer(limit as i64));

        let reader = self.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(values), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    // ========================================================================
    // STATS
    // ========================================================================

    /// Row counts and file size
    pub fn stats(&self) -> Result<StoreStats> {
        let reader = self.reader()?;
        let count = |table: &str| -> Result<u64> {
            let n: i64 =
                reader.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
            Ok(n as u64)
        };

        let documents = count("documents")?;
        let chunks = count("chunks")?;
        let embeddings = count("embeddings")?;
        let file_size_bytes: i64 = reader.query_row(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
            [],
            |row| row.get(0),
        )?;

        Ok(StoreStats {
            documents,
            chunks,
            embeddings,
            file_size_bytes: file_size_bytes as u64,
        })
    }
}
