//! Scenario and property test suite for Repute.
//!
//! Integration tests under `tests/` drive the lifecycle service end to end
//! through the in-memory and RocksDB stores, including failure injection on
//! the store and on the authoritative reputation system.

pub mod helpers;
