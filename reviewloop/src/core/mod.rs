//! Deterministic, pure logic shared by the controller.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod coerce;
pub mod invariants;
pub mod router;
pub mod state_update;
pub mod supervisor;
pub mod types;
