//! Corpus module - Core types and data structures
//!
//! Record types for the curriculum-organized knowledge base:
//! - Documents carry grade/subject identity
//! - Chunks carry retrievable text spans
//! - Embeddings carry fixed-width binary vectors tagged with their dims

mod record;

pub use record::{
    decode_f32, ChunkRecord, DocumentRecord, EmbeddingRecord, StoreStats, VectorRow,
    META_EMBEDDING_DIMS, META_EMBEDDING_MODEL, META_SCHEMA_VERSION,
};
