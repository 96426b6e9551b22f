//! Processing of extracted candidate records.
//!
//! - `candidate`: the record shape produced by extraction
//! - `content_key`: canonical identity keys
//! - `dedup`: grouping by key and merging duplicates

mod candidate;
mod content_key;
mod dedup;

pub use candidate::{CandidateRecord, ERROR_CODE_COMPONENT_TYPE};
pub use content_key::{content_key, RecordSignature, DESCRIPTION_KEY_CHARS};
pub use dedup::{deduplicate, deduplicate_records, MergeCandidate, MergedRecord};
