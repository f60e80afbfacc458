//! # Satchel Core
//!
//! Embedded hybrid retrieval and snapshot engine for curriculum knowledge
//! packs (grade → subject → document → chunk). Built for memory-constrained
//! offline devices:
//!
//! - **Single-file SQLite store**: documents, chunks, binary embeddings, and
//!   an FTS5 full-text index kept transactionally in sync with chunk text
//! - **Hybrid retrieval**: cheap FTS candidate narrowing first, heavy vector
//!   blob fetches second
//! - **Bounded-memory streaming**: lazy page-at-a-time scans, never a full
//!   result set in memory
//! - **Portable snapshots**: self-contained store files for a grade,
//!   subject, or course, openable by the same engine on a disconnected
//!   device
//!
//! The engine persists and serves raw candidate vectors; decoding bytes into
//! floats and computing similarity is the caller's job, as is producing the
//! vectors in the first place.
//!
//! ## Quick Start
//!
//! ```rust
//! use satchel_core::{ChunkRecord, DocumentRecord, EmbeddingRecord, Store};
//!
//! # fn main() -> satchel_core::Result<()> {
//! let store = Store::in_memory()?;
//!
//! store.insert_document(&DocumentRecord::new(1, Some("Fractions"), 7, "math"))?;
//! store.insert_chunks(&[ChunkRecord::new(10, 1, "Adding fractions needs a common denominator", None)])?;
//! store.insert_embeddings(&[EmbeddingRecord::from_f32(10, &[0.1, 0.2, 0.3, 0.4])])?;
//!
//! // Hybrid path: narrow by keyword, then fetch vectors for the survivors
//! let docs = store.doc_ids_for_grade_subject(7, "math")?;
//! let hits = store.candidate_chunk_ids_from_fts(&docs, "fraction", 10)?;
//! for row in store.stream_vectors_by_chunk_ids(&hits)? {
//!     let row = row?;
//!     assert_eq!(row.chunk_id, 10);
//! }
//! # Ok(())
//! # }
//! ```

// Only warn about missing docs for public items exported from the crate root
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod corpus;
pub mod export;
pub mod search;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use corpus::{
    decode_f32, ChunkRecord, DocumentRecord, EmbeddingRecord, StoreStats, VectorRow,
    META_EMBEDDING_DIMS, META_EMBEDDING_MODEL, META_SCHEMA_VERSION,
};
pub use export::ExportScope;
pub use search::sanitize_fts5_query;
pub use storage::{Result, Store, StoreError, StoreOptions, VectorStream, MIGRATIONS};
