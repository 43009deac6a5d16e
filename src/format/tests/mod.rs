//! Unit tests for CSV persistence and export projection.
//!
//! These tests verify recovery error reporting and that exports read back
//! into an identical store.

mod roundtrip_tests;
