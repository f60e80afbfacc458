//! Journey: export scope snapshots and reopen them as ordinary stores
//!
//! The compatibility contract under test: a snapshot is a structurally valid
//! store, yielding exactly the canonical store's rows for the same scope,
//! and a failed export leaves nothing behind.

use satchel_core::{
    DocumentRecord, ExportScope, Result, Store, StoreError, StoreOptions, VectorRow,
    META_EMBEDDING_MODEL,
};
use satchel_e2e_tests::harness::TestStoreManager;
use satchel_e2e_tests::mocks::{seed_curriculum, DIMS};

/// Collect (chunk_id, vec, text) triples for a grade/subject scope
fn scope_triples(store: &Store, grade: i64, subject: &str) -> Vec<(i64, Vec<u8>, String)> {
    store
        .stream_vectors_for_grade_subject(grade, subject, DIMS as i64, 10_000)
        .unwrap()
        .collect::<Result<Vec<VectorRow>>>()
        .unwrap()
        .into_iter()
        .map(|r| (r.chunk_id, r.vec, r.text))
        .collect()
}

#[test]
fn course_snapshot_matches_canonical_scope_exactly() {
    let mgr = TestStoreManager::new_temp();
    seed_curriculum(&mgr.store);
    let canonical_before = mgr.store.stats().unwrap();

    let dest = mgr.snapshot_path("math7_snapshot.db");
    let scope = ExportScope::Course {
        grade: 7,
        subject: "math".into(),
    };
    let produced = mgr.store.export_scope(&scope, &dest).unwrap();
    assert_eq!(produced, dest);

    let snapshot = Store::open(&dest, StoreOptions::default()).unwrap();

    // Same triples, no more, no fewer
    assert_eq!(
        scope_triples(&snapshot, 7, "math"),
        scope_triples(&mgr.store, 7, "math")
    );

    // Out-of-scope rows did not travel
    let stats = snapshot.stats().unwrap();
    assert_eq!(stats.documents, 2);
    assert!(snapshot.doc_ids_for_grade_subject(7, "science").unwrap().is_empty());
    assert!(snapshot.doc_ids_for_grade_subject(8, "math").unwrap().is_empty());

    // Store-level metadata travels with the snapshot
    assert_eq!(
        snapshot.get_meta(META_EMBEDDING_MODEL).unwrap(),
        mgr.store.get_meta(META_EMBEDDING_MODEL).unwrap()
    );

    // The snapshot's own FTS index works: hybrid path is fully usable offline
    let docs = snapshot.doc_ids_for_grade_subject(7, "math").unwrap();
    let hits = snapshot
        .candidate_chunk_ids_from_fts(&docs, "fraction", 10)
        .unwrap();
    assert!(!hits.is_empty());

    // Export is read-only against the canonical store
    assert_eq!(mgr.store.stats().unwrap(), canonical_before);
}

#[test]
fn grade_snapshot_spans_subjects() {
    let mgr = TestStoreManager::new_temp();
    let fixture = seed_curriculum(&mgr.store);

    let dest = mgr.snapshot_path("grade7_snapshot.db");
    mgr.store
        .export_scope(&ExportScope::Grade(7), &dest)
        .unwrap();

    let snapshot = Store::open(&dest, StoreOptions::default()).unwrap();
    assert_eq!(
        snapshot.stats().unwrap().documents as usize,
        fixture.math7_docs.len() + fixture.science7_docs.len()
    );
    assert_eq!(
        snapshot.doc_ids_for_grade_subject(7, "science").unwrap(),
        fixture.science7_docs
    );
}

#[test]
fn subject_snapshot_spans_grades() {
    let mgr = TestStoreManager::new_temp();
    let fixture = seed_curriculum(&mgr.store);

    let dest = mgr.snapshot_path("math_snapshot.db");
    mgr.store
        .export_scope(&ExportScope::Subject("math".into()), &dest)
        .unwrap();

    let snapshot = Store::open(&dest, StoreOptions::default()).unwrap();
    assert_eq!(
        snapshot.stats().unwrap().documents as usize,
        fixture.math7_docs.len() + fixture.math8_docs.len()
    );
    assert_eq!(
        snapshot.doc_ids_for_grade_subject(8, "math").unwrap(),
        fixture.math8_docs
    );
}

#[test]
fn empty_scope_export_fails_and_creates_nothing() {
    let mgr = TestStoreManager::new_temp();
    seed_curriculum(&mgr.store);

    let dest = mgr.snapshot_path("history9_snapshot.db");
    let scope = ExportScope::Course {
        grade: 9,
        subject: "history".into(),
    };
    let err = mgr.store.export_scope(&scope, &dest).unwrap_err();
    assert!(matches!(err, StoreError::Export(_)));

    assert!(!dest.exists(), "no snapshot file may be created");
    let tmp = dest.with_extension("db.tmp");
    assert!(!tmp.exists(), "no temp file may be left behind");
}

#[test]
fn stale_staging_file_does_not_leak_into_snapshot() {
    let mgr = TestStoreManager::new_temp();
    seed_curriculum(&mgr.store);

    // An interrupted earlier export left a staging file with foreign rows
    let dest = mgr.snapshot_path("math7_snapshot.db");
    let stale_tmp = mgr.snapshot_path("math7_snapshot.db.tmp");
    {
        let stale = Store::open(&stale_tmp, StoreOptions::default()).unwrap();
        stale
            .insert_document(&DocumentRecord::new(999, Some("Leftover"), 9, "history"))
            .unwrap();
    }

    mgr.store
        .export_scope(
            &ExportScope::Course {
                grade: 7,
                subject: "math".into(),
            },
            &dest,
        )
        .unwrap();

    let snapshot = Store::open(&dest, StoreOptions::default()).unwrap();
    assert!(
        snapshot.doc_ids_for_grade_subject(9, "history").unwrap().is_empty(),
        "leftover staging rows must not be published"
    );
    assert_eq!(snapshot.stats().unwrap().documents, 2);
}

#[test]
fn snapshot_is_itself_exportable() {
    // A snapshot is a full store; a device can carve a narrower pack from it
    let mgr = TestStoreManager::new_temp();
    seed_curriculum(&mgr.store);

    let first = mgr.snapshot_path("grade7.db");
    mgr.store
        .export_scope(&ExportScope::Grade(7), &first)
        .unwrap();

    let snapshot = Store::open(&first, StoreOptions::default()).unwrap();
    let second = mgr.snapshot_path("grade7_math.db");
    snapshot
        .export_scope(
            &ExportScope::Course {
                grade: 7,
                subject: "math".into(),
            },
            &second,
        )
        .unwrap();

    let narrowed = Store::open(&second, StoreOptions::default()).unwrap();
    assert_eq!(
        scope_triples(&narrowed, 7, "math"),
        scope_triples(&mgr.store, 7, "math")
    );
}
