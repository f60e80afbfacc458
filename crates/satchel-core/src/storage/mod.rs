//! Storage Module
//!
//! SQLite-based storage layer with:
//! - Versioned, additive schema migrations
//! - Transactional batch upserts with FK enforcement
//! - FTS5 full-text index kept in sync with chunk text by triggers
//! - Bounded-memory streaming retrieval

mod migrations;
mod sqlite;
mod stream;

pub use migrations::{apply_migrations, current_version, Migration, MIGRATIONS};
pub use sqlite::{Result, Store, StoreError, StoreOptions};
pub use stream::VectorStream;
