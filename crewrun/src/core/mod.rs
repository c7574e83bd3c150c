//! Deterministic, pure logic for the workflow engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod grammar;
pub mod placeholder;
pub mod references;
pub mod router;
pub mod sampling;
pub mod types;
pub mod verdict;
