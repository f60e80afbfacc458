//! Test Data Factory
//!
//! Deterministic curriculum fixtures: a small grade/subject/document/chunk
//! tree with embeddings whose bytes are reproducible from the chunk id, so
//! round-trip assertions can compare exact blobs.

use satchel_core::{
    ChunkRecord, DocumentRecord, EmbeddingRecord, Store, META_EMBEDDING_DIMS,
    META_EMBEDDING_MODEL,
};

/// Vector dimensionality used by all fixture embeddings
pub const DIMS: usize = 8;

/// Deterministic f32 vector derived from a seed
pub fn test_vector(seed: f32) -> Vec<f32> {
    (0..DIMS)
        .map(|i| ((i as f32 + seed) / DIMS as f32).sin())
        .collect()
}

/// Chunk ids the fixture assigns to a document (doc_id * 100 + index)
pub fn chunk_ids_for_doc(doc_id: i64, count: usize) -> Vec<i64> {
    (0..count as i64).map(|i| doc_id * 100 + i).collect()
}

/// What `seed_curriculum` created, for assertions
pub struct CurriculumFixture {
    /// Documents in grade 7 math
    pub math7_docs: Vec<i64>,
    /// Documents in grade 7 science
    pub science7_docs: Vec<i64>,
    /// Documents in grade 8 math
    pub math8_docs: Vec<i64>,
    /// Chunks per document
    pub chunks_per_doc: usize,
}

impl CurriculumFixture {
    /// All chunk ids under the given documents
    pub fn chunk_ids(&self, docs: &[i64]) -> Vec<i64> {
        docs.iter()
            .flat_map(|&d| chunk_ids_for_doc(d, self.chunks_per_doc))
            .collect()
    }
}

/// Seed a small curriculum:
///
/// - doc 1, grade 7 math, "Fractions and Decimals" — every chunk mentions
///   fractions
/// - doc 2, grade 7 science, "Cell Biology" — one chunk also says "fraction"
///   (bait for scope-leak bugs)
/// - doc 3, grade 8 math, "Algebra Basics"
/// - doc 4, grade 7 math, "Geometry Primer"
///
/// Every chunk gets a DIMS-dim f32 embedding seeded by its chunk id.
pub fn seed_curriculum(store: &Store) -> CurriculumFixture {
    let chunks_per_doc = 3;

    store
        .set_meta(
            META_EMBEDDING_MODEL,
            "exp-models/dragonkue-KoEn-E5-Tiny-ONNX",
        )
        .expect("set_meta failed");
    store
        .set_meta(META_EMBEDDING_DIMS, &DIMS.to_string())
        .expect("set_meta failed");

    let docs = [
        DocumentRecord::new(1, Some("Fractions and Decimals"), 7, "math"),
        DocumentRecord::new(2, Some("Cell Biology"), 7, "science"),
        DocumentRecord::new(3, Some("Algebra Basics"), 8, "math"),
        DocumentRecord::new(4, Some("Geometry Primer"), 7, "math"),
    ];
    for doc in &docs {
        store.insert_document(doc).expect("insert_document failed");
    }

    let texts: &[(i64, [&str; 3])] = &[
        (
            1,
            [
                "A fraction has a numerator above a denominator",
                "Equivalent fractions describe the same quantity",
                "To add fractions, find a common denominator first",
            ],
        ),
        (
            2,
            [
                "The nucleus occupies a fraction of the cell volume",
                "Mitochondria convert nutrients into usable energy",
                "Cell membranes control what enters and leaves",
            ],
        ),
        (
            3,
            [
                "Algebra replaces unknown numbers with letters",
                "An equation stays balanced when both sides change together",
                "Like terms can be collected before solving",
            ],
        ),
        (
            4,
            [
                "A triangle's angles always sum to 180 degrees",
                "Perimeter measures the distance around a shape",
                "Area measures the surface a shape covers",
            ],
        ),
    ];

    let mut chunks = Vec::new();
    let mut embeddings = Vec::new();
    for &(doc_id, ref body) in texts {
        for (i, text) in body.iter().enumerate() {
            let chunk_id = doc_id * 100 + i as i64;
            let metadata = serde_json::json!({ "chunkIndex": i }).to_string();
            chunks.push(ChunkRecord::new(chunk_id, doc_id, text, Some(&metadata)));
            embeddings.push(EmbeddingRecord::from_f32(
                chunk_id,
                &test_vector(chunk_id as f32),
            ));
        }
    }

    store.insert_chunks(&chunks).expect("insert_chunks failed");
    store
        .insert_embeddings(&embeddings)
        .expect("insert_embeddings failed");

    CurriculumFixture {
        math7_docs: vec![1, 4],
        science7_docs: vec![2],
        math8_docs: vec![3],
        chunks_per_doc,
    }
}
