//! Database Migrations
//!
//! Ordered, versioned schema scripts for the store file. Scripts are additive
//! only; destructive changes require a new version recorded in `meta`, since
//! snapshot files in the field are opened by the same schema.

/// Migration definitions, applied in ascending version order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Base tables: meta, documents, chunks, embeddings",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Secondary indexes and chunks_fts full-text index",
        up: MIGRATION_V2_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Base tables
///
/// All identity columns are caller-supplied natural keys. `chunk_id` and
/// `doc_id` are INTEGER PRIMARY KEY, so they alias the rowid; the FTS index
/// added in V2 relies on that.
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    doc_id INTEGER PRIMARY KEY,
    title TEXT,
    grade INTEGER NOT NULL,
    subject TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    chunk_id INTEGER PRIMARY KEY,
    doc_id INTEGER NOT NULL REFERENCES documents(doc_id),
    text TEXT NOT NULL,
    metadata TEXT
);

-- Binary vectors, one per chunk at most. dims is authoritative; a store may
-- hold vectors from models with different dims side by side.
CREATE TABLE IF NOT EXISTS embeddings (
    chunk_id INTEGER PRIMARY KEY REFERENCES chunks(chunk_id),
    dims INTEGER NOT NULL,
    vec BLOB NOT NULL
);

INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', '1');
"#;

/// V2: Secondary indexes plus the full-text index over chunk text
///
/// `chunks_fts` is an external-content FTS5 table mirroring `chunks`; the
/// triggers keep it synchronized inside the same transaction as any chunk
/// write. Ingestion must use UPSERT rather than INSERT OR REPLACE: REPLACE
/// removes the conflicting row without firing the delete trigger, which
/// would leave a stale FTS entry behind.
const MIGRATION_V2_UP: &str = r#"
CREATE INDEX IF NOT EXISTS idx_documents_grade_subject ON documents(grade, subject);
CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id);
CREATE INDEX IF NOT EXISTS idx_embeddings_dims ON embeddings(dims);

CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    text,
    chunk_id UNINDEXED,
    doc_id UNINDEXED,
    content='chunks',
    content_rowid='chunk_id',
    tokenize='porter ascii'
);

CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, text, chunk_id, doc_id)
    VALUES (NEW.chunk_id, NEW.text, NEW.chunk_id, NEW.doc_id);
END;

CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, text, chunk_id, doc_id)
    VALUES ('delete', OLD.chunk_id, OLD.text, OLD.chunk_id, OLD.doc_id);
END;

CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, text, chunk_id, doc_id)
    VALUES ('delete', OLD.chunk_id, OLD.text, OLD.chunk_id, OLD.doc_id);
    INSERT INTO chunks_fts(rowid, text, chunk_id, doc_id)
    VALUES (NEW.chunk_id, NEW.text, NEW.chunk_id, NEW.doc_id);
END;

INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', '2');
"#;

/// Get current schema version from the `meta` table
///
/// Returns 0 for a fresh file (no `meta` table yet, or no version key).
pub fn current_version(conn: &rusqlite::Connection) -> u32 {
    conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0),
    )
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(0)
}

/// Run one `up` script inside its own transaction
///
/// A failure mid-script rolls the whole script back, so the store is always
/// at exactly some recorded version, never between two.
fn apply_script(conn: &rusqlite::Connection, up: &str) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(up)?;
    tx.commit()
}

/// Apply pending migrations, returning how many were applied
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current = current_version(conn);
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );
            apply_script(conn, migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
