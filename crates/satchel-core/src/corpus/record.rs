//! Record types - the rows the store persists and serves
//!
//! All identifiers are caller-supplied, stable natural keys. The store never
//! mints ids; the upstream ingestion pipeline owns identity.

use serde::{Deserialize, Serialize};

/// Well-known `meta` key: schema version of the store file.
pub const META_SCHEMA_VERSION: &str = "schema_version";

/// Well-known `meta` key: name of the embedding model that produced vectors.
pub const META_EMBEDDING_MODEL: &str = "embedding_model";

/// Well-known `meta` key: dimensionality advertised by the embedding model.
pub const META_EMBEDDING_DIMS: &str = "embedding_dims";

// ============================================================================
// DOCUMENT
// ============================================================================

/// A document row: the unit of curriculum organization (grade → subject → doc)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Caller-supplied stable document id
    pub doc_id: i64,
    /// Display title, if the pipeline extracted one
    pub title: Option<String>,
    /// Grade level the document belongs to
    pub grade: i64,
    /// Subject the document belongs to (e.g. "math", "science")
    pub subject: String,
}

impl DocumentRecord {
    /// Build a document row
    pub fn new(doc_id: i64, title: Option<&str>, grade: i64, subject: &str) -> Self {
        Self {
            doc_id,
            title: title.map(str::to_owned),
            grade,
            subject: subject.to_owned(),
        }
    }
}

// ============================================================================
// CHUNK
// ============================================================================

/// A chunk row: a contiguous span of a document's text, the unit of retrieval
///
/// `chunk_id` is unique across the whole store, not just within its document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    /// Caller-supplied stable chunk id, store-wide unique
    pub chunk_id: i64,
    /// Owning document; must exist before the chunk is inserted
    pub doc_id: i64,
    /// The chunk text, mirrored into the full-text index
    pub text: String,
    /// Opaque pipeline metadata (typically JSON), not interpreted here
    pub metadata: Option<String>,
}

impl ChunkRecord {
    /// Build a chunk row
    pub fn new(chunk_id: i64, doc_id: i64, text: &str, metadata: Option<&str>) -> Self {
        Self {
            chunk_id,
            doc_id,
            text: text.to_owned(),
            metadata: metadata.map(str::to_owned),
        }
    }
}

// ============================================================================
// EMBEDDING
// ============================================================================

/// An embedding row: a fixed-width binary vector for exactly one chunk
///
/// The blob holds `dims` little-endian IEEE-754 floats, either single
/// (4 bytes/element) or double (8 bytes/element) precision. `dims` is
/// authoritative; retrieval always filters by it so vectors from
/// incompatible models are never mixed in one result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRecord {
    /// Chunk this vector encodes; at most one embedding per chunk
    pub chunk_id: i64,
    /// Declared element count of the vector
    pub dims: i64,
    /// Raw vector bytes, `dims * element_width` long
    pub vec: Vec<u8>,
}

impl EmbeddingRecord {
    /// Encode an f32 vector as little-endian bytes
    pub fn from_f32(chunk_id: i64, vector: &[f32]) -> Self {
        let mut vec = Vec::with_capacity(vector.len() * 4);
        for &val in vector {
            vec.extend_from_slice(&val.to_le_bytes());
        }
        Self {
            chunk_id,
            dims: vector.len() as i64,
            vec,
        }
    }

    /// Encode an f64 vector as little-endian bytes
    pub fn from_f64(chunk_id: i64, vector: &[f64]) -> Self {
        let mut vec = Vec::with_capacity(vector.len() * 8);
        for &val in vector {
            vec.extend_from_slice(&val.to_le_bytes());
        }
        Self {
            chunk_id,
            dims: vector.len() as i64,
            vec,
        }
    }

    /// Element width in bytes, if the blob length is consistent with `dims`
    ///
    /// Returns `Some(4)` for single precision, `Some(8)` for double, `None`
    /// when the blob cannot be a `dims`-long float vector at all.
    pub fn element_width(&self) -> Option<usize> {
        if self.dims <= 0 {
            return None;
        }
        let dims = self.dims as usize;
        if self.vec.len() == dims * 4 {
            Some(4)
        } else if self.vec.len() == dims * 8 {
            Some(8)
        } else {
            None
        }
    }
}

/// Decode a little-endian f32 vector blob
///
/// Returns `None` if the blob length is not a multiple of 4. Provided for
/// consumers and tests; the store itself never interprets vector contents.
pub fn decode_f32(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

// ============================================================================
// RETRIEVAL ROW
// ============================================================================

/// One row of a retrieval result: the vector plus enough context to rank it
///
/// The store hands these back as candidates; decoding `vec` and computing
/// similarity is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRow {
    /// Chunk the vector belongs to
    pub chunk_id: i64,
    /// Raw vector bytes as stored
    pub vec: Vec<u8>,
    /// The chunk text
    pub text: String,
    /// Opaque chunk metadata, if any
    pub metadata: Option<String>,
    /// Owning document id
    pub doc_id: i64,
}

// ============================================================================
// STATS
// ============================================================================

/// Row counts and file size for a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Total document rows
    pub documents: u64,
    /// Total chunk rows
    pub chunks: u64,
    /// Total embedding rows
    pub embeddings: u64,
    /// Database file size in bytes (page_count * page_size)
    pub file_size_bytes: u64,
}
