//! Integration tests for the mdo ontology core.
//!
//! These tests drive the public API end to end: candidate loading, bulk
//! import, the async store with persistence, and JSON-LD export.

#[path = "integration/test_export.rs"]
mod test_export;

#[path = "integration/test_import.rs"]
mod test_import;

#[path = "integration/test_pipeline.rs"]
mod test_pipeline;

#[path = "integration/test_store.rs"]
mod test_store;
