//! Snapshot Exporter
//!
//! Materializes a self-contained copy of every document, chunk, and
//! embedding inside a scope into a brand-new store file for offline
//! distribution. The snapshot is built at a `.tmp` sibling path and renamed
//! into place only once complete, so an interrupted export never leaves a
//! file that could be mistaken for a finished snapshot. The canonical store
//! is read, never written.
//!
//! A snapshot carries the same schema as the live store and is opened with
//! the ordinary [`Store::open`]; that is the compatibility contract with
//! disconnected consumers.

use std::path::{Path, PathBuf};

use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::corpus::{ChunkRecord, DocumentRecord, EmbeddingRecord, META_SCHEMA_VERSION};
use crate::storage::{Result, Store, StoreError, StoreOptions};

/// Which slice of the curriculum a snapshot bundles
///
/// A course is a grade+subject pairing (e.g. grade 10 science); subjects
/// belong to grades in the curriculum model, so `Course` is the narrowest
/// scope and `Subject` spans every grade teaching that subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportScope {
    /// Everything taught in one grade
    Grade(i64),
    /// One subject across all grades
    Subject(String),
    /// One subject within one grade
    Course {
        /// Grade level
        grade: i64,
        /// Subject name
        subject: String,
    },
}

impl std::fmt::Display for ExportScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportScope::Grade(grade) => write!(f, "grade {grade}"),
            ExportScope::Subject(subject) => write!(f, "subject {subject:?}"),
            ExportScope::Course { grade, subject } => {
                write!(f, "grade {grade} / subject {subject:?}")
            }
        }
    }
}

impl Store {
    /// Export a scope into a self-contained snapshot file at `dest`
    ///
    /// Fails with [`StoreError::Export`] when the scope matches no documents
    /// (nothing is created) or when the destination cannot be written. On
    /// success the returned path is `dest` itself, openable as a [`Store`].
    pub fn export_scope(&self, scope: &ExportScope, dest: &Path) -> Result<PathBuf> {
        let doc_ids = match scope {
            ExportScope::Grade(grade) => self.doc_ids_for_grade(*grade)?,
            ExportScope::Subject(subject) => self.doc_ids_for_subject(subject)?,
            ExportScope::Course { grade, subject } => {
                self.doc_ids_for_grade_subject(*grade, subject)?
            }
        };
        if doc_ids.is_empty() {
            return Err(StoreError::Export(format!("{scope} matches no documents")));
        }

        let tmp_path = tmp_sibling(dest);
        match build_snapshot(self, &doc_ids, &tmp_path) {
            Ok((chunks, embeddings)) => {
                std::fs::rename(&tmp_path, dest).map_err(|e| {
                    discard_partial(&tmp_path);
                    StoreError::Export(format!("cannot publish snapshot at {}: {e}", dest.display()))
                })?;
                tracing::info!(
                    "Exported {scope}: {} documents, {chunks} chunks, {embeddings} embeddings -> {}",
                    doc_ids.len(),
                    dest.display()
                );
                Ok(dest.to_path_buf())
            }
            Err(e) => {
                discard_partial(&tmp_path);
                Err(e)
            }
        }
    }
}

/// `dest` with `.tmp` appended, in the same directory so rename is atomic
fn tmp_sibling(dest: &Path) -> PathBuf {
    let mut os = dest.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Remove a temp snapshot and its WAL sidecars, ignoring absence
fn discard_partial(tmp_path: &Path) {
    let _ = std::fs::remove_file(tmp_path);
    for suffix in ["-wal", "-shm"] {
        let mut os = tmp_path.as_os_str().to_os_string();
        os.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(os));
    }
}

/// Build the snapshot at `tmp_path`, returning (chunks, embeddings) copied
///
/// Streams data from the source reader in bounded batches and writes through
/// the destination's ordinary ingestion upserts, so the snapshot obeys the
/// same invariants (FK enforcement, FTS sync) as any live store.
fn build_snapshot(source: &Store, doc_ids: &[i64], tmp_path: &Path) -> Result<(u64, u64)> {
    // A crashed earlier export may have left a staging file behind; its rows
    // must never ride along in this snapshot.
    discard_partial(tmp_path);

    let dest = Store::open(tmp_path, StoreOptions::default()).map_err(|e| {
        StoreError::Export(format!("destination not writable: {e}"))
    })?;

    // Store-level metadata travels with the snapshot; its schema version is
    // already set by the destination's own migrations.
    for (key, value) in source.meta_pairs()? {
        if key != META_SCHEMA_VERSION {
            dest.set_meta(&key, &value)?;
        }
    }

    let batch_size = source.options().stream_page_size.max(1);
    let mut chunks_copied = 0u64;
    let mut embeddings_copied = 0u64;

    for id_batch in doc_ids.chunks(batch_size) {
        for doc in select_documents(source, id_batch)? {
            dest.insert_document(&doc)?;
        }

        // Chunks, then embeddings, keyset-paginated so only one page of
        // either is ever in memory.
        let mut last = i64::MIN;
        loop {
            let page = select_chunks(source, id_batch, last, batch_size)?;
            let drained = page.len() < batch_size;
            if let Some(tail) = page.last() {
                last = tail.chunk_id;
            }
            chunks_copied += page.len() as u64;
            if !page.is_empty() {
                dest.insert_chunks(&page)?;
            }
            if drained {
                break;
            }
        }

        let mut last = i64::MIN;
        loop {
            let page = select_embeddings(source, id_batch, last, batch_size)?;
            let drained = page.len() < batch_size;
            if let Some(tail) = page.last() {
                last = tail.chunk_id;
            }
            embeddings_copied += page.len() as u64;
            if !page.is_empty() {
                dest.insert_embeddings(&page)?;
            }
            if drained {
                break;
            }
        }
    }

    // Connections close on drop, checkpointing the WAL so the file is
    // complete before it gets renamed into place.
    drop(dest);
    Ok((chunks_copied, embeddings_copied))
}

fn in_placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

fn select_documents(source: &Store, doc_ids: &[i64]) -> Result<Vec<DocumentRecord>> {
    let sql = format!(
        "SELECT doc_id, title, grade, subject FROM documents
         WHERE doc_id IN ({}) ORDER BY doc_id",
        in_placeholders(doc_ids.len())
    );
    let values: Vec<Value> = doc_ids.iter().map(|&id| Value::Integer(id)).collect();

    let reader = source.reader()?;
    let mut stmt = reader.prepare(&sql)?;
    let docs = stmt
        .query_map(params_from_iter(values), |row| {
            Ok(DocumentRecord {
                doc_id: row.get(0)?,
                title: row.get(1)?,
                grade: row.get(2)?,
                subject: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(docs)
}

fn select_chunks(
    source: &Store,
    doc_ids: &[i64],
    last_chunk_id: i64,
    limit: usize,
) -> Result<Vec<ChunkRecord>> {
    let sql = format!(
        "SELECT chunk_id, doc_id, text, metadata FROM chunks
         WHERE doc_id IN ({}) AND chunk_id > ?
         ORDER BY chunk_id LIMIT ?",
        in_placeholders(doc_ids.len())
    );
    let mut values: Vec<Value> = doc_ids.iter().map(|&id| Value::Integer(id)).collect();
    values.push(Value::Integer(last_chunk_id));
    values.push(Value::Integer(limit as i64));

    let reader = source.reader()?;
    let mut stmt = reader.prepare(&sql)?;
    let chunks = stmt
        .query_map(params_from_iter(values), |row| {
            Ok(ChunkRecord {
                chunk_id: row.get(0)?,
                doc_id: row.get(1)?,
                text: row.get(2)?,
                metadata: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(chunks)
}

fn select_embeddings(
    source: &Store,
    doc_ids: &[i64],
    last_chunk_id: i64,
    limit: usize,
) -> Result<Vec<EmbeddingRecord>> {
    let sql = format!(
        "SELECT e.chunk_id, e.dims, e.vec FROM embeddings e
         JOIN chunks c ON c.chunk_id = e.chunk_id
         WHERE c.doc_id IN ({}) AND e.chunk_id > ?
         ORDER BY e.chunk_id LIMIT ?",
        in_placeholders(doc_ids.len())
    );
    let mut values: Vec<Value> = doc_ids.iter().map(|&id| Value::Integer(id)).collect();
    values.push(Value::Integer(last_chunk_id));
    values.push(Value::Integer(limit as i64));

    let reader = source.reader()?;
    let mut stmt = reader.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            Ok(EmbeddingRecord {
                chunk_id: row.get(0)?,
                dims: row.get(1)?,
                vec: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
