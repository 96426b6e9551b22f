//! Ontology model, session state and storage.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  EmbeddedOntologyStore                  │
//! │        (RwLock<OntologySession>, JSON persistence)      │
//! │  ┌───────────────────────────────────────────────────┐  │
//! │  │                 OntologySession                   │  │
//! │  │   loaded ids / keys / aliases┌─────────────────┐  │  │
//! │  │                              │  OntologyGraph  │  │  │
//! │  │                              │ (typed entities,│  │  │
//! │  │                              │  relationships) │  │  │
//! │  │                              └─────────────────┘  │  │
//! │  └───────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Entities form a strict four-level tree:
//! System → Subsystem → Component → SparePart.

mod graph;
mod linked_data;
mod session;
mod stats;
mod store;
mod types;
pub mod validation;

pub use graph::{Admission, OntologyGraph, Upsert};
pub use linked_data::{
    entity_uri, relationship_to_linked_data, to_linked_data, to_linked_data_in, LinkedDataNode,
    DEFAULT_NAMESPACE,
};
pub use session::{
    entity_content_key, LoadReport, LoadedKey, OntologySession, SessionSnapshot, SNAPSHOT_VERSION,
};
pub use stats::{EntityCounts, OntologyDiff, OntologyStats};
pub use store::{EmbeddedOntologyStore, OntologyStore, PERSISTENCE_FILE};
pub use types::*;
pub use validation::{
    check_consistency, find_near_duplicates, infer_relationships, ConsistencyReport,
    NearDuplicate, RelationshipSuggestion,
};
