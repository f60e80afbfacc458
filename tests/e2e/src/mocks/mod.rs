//! Mock data factories

mod fixtures;

pub use fixtures::{chunk_ids_for_doc, seed_curriculum, test_vector, CurriculumFixture, DIMS};
