//! Deterministic, pure logic shared by operators.
//!
//! Core modules must be free of I/O side effects so their behavior can be
//! pinned down by table tests.

pub mod protocol;
pub mod verdict;
