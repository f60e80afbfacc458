//! Search module
//!
//! Keyword-side helpers for the hybrid retrieval path. The store uses FTS5
//! purely as a candidate-narrowing pre-filter; everything here is about
//! getting caller text safely into an FTS5 MATCH expression.

mod keyword;

pub use keyword::sanitize_fts5_query;
