//! Integration tests for the cache warmer
//!
//! These tests use wiremock for the origin and temporary SQLite files for
//! the queue, exercising enqueue, claim, fetch and status end-to-end.

mod claim_tests;
mod warm_tests;
