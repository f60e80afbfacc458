//! Test harness utilities


pub use store_manager::TestStoreManager;
