//! Shared test infrastructure for satchel journey tests
//!
//! - `harness`: isolated on-disk store instances with automatic cleanup
//! - `mocks`: deterministic curriculum fixtures and vector factories

pub mod harness;
pub mod mocks;
