//! mdo: Medical-Device Service Ontology
//!
//! Turns AI-extracted facts from device service manuals into a validated,
//! hierarchical ontology (System → Subsystem → Component → SparePart plus
//! typed relationships), deduplicating records by content key and exporting
//! the result as JSON-LD.

pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod ontology;
pub mod processing;
pub mod utils;

pub use config::{ConfidencePolicy, Config, ImportMode};
pub use error::{ConfigError, OntologyError, RecordError, Result, StorageError};
pub use export::{export_json_ld, write_document, write_json_ld, ExportOptions};
pub use import::{ImportPreview, ImportRequest, ImportResponse, ImportStats};
pub use ontology::{
    ConsistencyReport, EmbeddedOntologyStore, Entity, EntityDetails, EntityFilter, EntityKind,
    EntityUpdate, LoadReport, NearDuplicate, OntologyDiff, OntologyGraph, OntologySession,
    OntologyStats, OntologyStore, RelationType, Relationship, RelationshipFilter,
    RelationshipSuggestion, ValidationStatus,
};
pub use processing::{content_key, deduplicate, CandidateRecord, MergedRecord, RecordSignature};
