//! Bounded-memory streaming retrieval
//!
//! [`VectorStream`] is a lazy, finite, single-pass producer of vector rows.
//! It never materializes a full result set: rows come back in pages of
//! [`StoreOptions::stream_page_size`](super::StoreOptions) via keyset
//! pagination (`chunk_id > last ... ORDER BY chunk_id LIMIT page`), so at
//! most one page is buffered at a time and the reader connection is held
//! only while a page is being fetched, never between pages.
//!
//! Rows are produced in `chunk_id` ascending order. That ordering is the
//! contract: stable for a given store state, identical across the scoped
//! scan and the by-ids fetch.

use std::collections::VecDeque;

use rusqlite::{params_from_iter, types::Value, Row};

use crate::corpus::VectorRow;
use crate::storage::sqlite::{Result, Store};

/// What a stream fetches and where its cursor stands
pub(crate) enum StreamPlan {
    /// All embeddings of a given dims under documents in (grade, subject)
    GradeSubject {
        grade: i64,
        subject: String,
        dims: i64,
        last_chunk_id: i64,
    },
    /// Exactly the embeddings for the given ids (sorted, deduped)
    ChunkIds { ids: Vec<i64>, pos: usize },
}

/// Lazy page-at-a-time stream of vector rows
///
/// Single-pass and non-restartable: once exhausted it stays exhausted.
/// Dropping the stream releases everything; there is no cursor held open
/// against the database between pages.
pub struct VectorStream<'a> {
    store: &'a Store,
    plan: StreamPlan,
    remaining: u64,
    buffer: VecDeque<VectorRow>,
    pages_fetched: u32,
    done: bool,
}

impl<'a> VectorStream<'a> {
    pub(crate) fn new(store: &'a Store, plan: StreamPlan, limit: u64) -> Self {
        Self {
            store,
            plan,
            remaining: limit,
            buffer: VecDeque::new(),
            pages_fetched: 0,
            done: false,
        }
    }

    /// How many fetch round trips have been issued so far
    ///
    /// Observable instrumentation for the bounded-memory property: a scan
    /// over many rows must show multiple pages, not one unbounded fetch.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    fn row_to_vector_row(row: &Row) -> rusqlite::Result<VectorRow> {
        Ok(VectorRow {
            chunk_id: row.get(0)?,
            vec: row.get(1)?,
            text: row.get(2)?,
            metadata: row.get(3)?,
            doc_id: row.get(4)?,
        })
    }

    /// Fetch the next page into the buffer, advancing the plan cursor
    fn fetch_page(&mut self) -> Result<()> {
        let page_size = self.store.options().stream_page_size.max(1);

        match &mut self.plan {
            StreamPlan::GradeSubject {
                grade,
                subject,
                dims,
                last_chunk_id,
            } => {
                let page = (self.remaining).min(page_size as u64) as i64;
                let reader = self.store.reader()?;
                let mut stmt = reader.prepare_cached(
                    "SELECT e.chunk_id, e.vec, c.text, c.metadata, d.doc_id
                     FROM documents d
                     JOIN chunks c ON c.doc_id = d.doc_id
                     JOIN embeddings e ON e.chunk_id = c.chunk_id
                     WHERE d.grade = ?1 AND d.subject = ?2 AND e.dims = ?3
                       AND e.chunk_id > ?4
                     ORDER BY e.chunk_id
                     LIMIT ?5",
                )?;
                let rows = stmt
                    .query_map(
                        rusqlite::params![*grade, &*subject, *dims, *last_chunk_id, page],
                        Self::row_to_vector_row,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                self.pages_fetched += 1;

                if (rows.len() as i64) < page {
                    // Short page: the scope is drained
                    self.done = true;
                }
                if let Some(last) = rows.last() {
                    *last_chunk_id = last.chunk_id;
                }
                self.remaining -= rows.len() as u64;
                self.buffer.extend(rows);
            }
            StreamPlan::ChunkIds { ids, pos } => {
                if *pos >= ids.len() {
                    self.done = true;
                    return Ok(());
                }
                let end = (*pos + page_size).min(ids.len());
                let batch = &ids[*pos..end];

                let placeholders = vec!["?"; batch.len()].join(",");
                let sql = format!(
                    "SELECT e.chunk_id, e.vec, c.text, c.metadata, d.doc_id
                     FROM embeddings e
                     JOIN chunks c ON c.chunk_id = e.chunk_id
                     JOIN documents d ON d.doc_id = c.doc_id
                     WHERE e.chunk_id IN ({placeholders})
                     ORDER BY e.chunk_id"
                );
                let values: Vec<Value> = batch.iter().map(|&id| Value::Integer(id)).collect();

                let reader = self.store.reader()?;
                let mut stmt = reader.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(values), Self::row_to_vector_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                self.pages_fetched += 1;

                *pos = end;
                if *pos >= ids.len() {
                    self.done = true;
                }
                self.remaining = self.remaining.saturating_sub(batch.len() as u64);
                self.buffer.extend(rows);
            }
        }

        Ok(())
    }
}

impl Iterator for VectorStream<'_> {
    type Item = Result<VectorRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Some(Ok(row));
            }
            if self.done || self.remaining == 0 {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
            if self.buffer.is_empty() && self.done {
                return None;
            }
        }
    }
}
