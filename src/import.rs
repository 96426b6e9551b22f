//! Bulk import of entities and relationships from a JSON payload.
//!
//! Payload shape:
//!
//! ```text
//! { "entities":      [ { "entity_type", "label" | "name", "description",
//!                        <kind fields>, "parent_*_id", "source_page(s)",
//!                        "metadata": { "confidence_score", "validation_status" } } ],
//!   "relationships": [ { "relationship_type", "source_entity_id",
//!                        "target_entity_id", "description", "confidence" } ] }
//! ```
//!
//! Records are parsed one by one; a bad record is reported with its index
//! and skipped. Duplicates inside the payload go through the same merge
//! engine as extraction output. Ids absorbed by a merge, here or in an
//! earlier load, resolve to the surviving entity through the session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{ConfidencePolicy, ImportConfig, ImportMode};
use crate::error::RecordError;
use crate::ontology::{
    entity_content_key, Admission, ComponentDetails, Entity, EntityDetails, EntityKind,
    OntologyDiff, OntologySession, RelationType, Relationship, SparePartDetails, SubsystemDetails,
    SubsystemType, SystemDetails, SystemType, Upsert, ValidationStatus,
};
use crate::processing::{deduplicate, MergeCandidate};

/// A bulk import request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportRequest {
    /// The payload object with `entities` and `relationships`.
    pub data: Value,
    /// Falls back to the configured default when absent.
    #[serde(default)]
    pub import_mode: Option<ImportMode>,
    /// Run the full pipeline and discard the result.
    #[serde(default)]
    pub validate_only: bool,
}

impl ImportRequest {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: ImportMode) -> Self {
        self.import_mode = Some(mode);
        self
    }

    pub fn validate_only(mut self) -> Self {
        self.validate_only = true;
        self
    }
}

/// Per-import counters and messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportStats {
    pub entities_processed: usize,
    pub entities_imported: usize,
    pub entities_skipped: usize,
    pub relationships_processed: usize,
    pub relationships_imported: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Result of a bulk import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub stats: ImportStats,
    pub validation_only: bool,
}

impl ImportResponse {
    pub(crate) fn completed(stats: ImportStats, validate_only: bool) -> Self {
        let success = stats.errors.is_empty();
        let mut message = if success {
            "Import completed successfully".to_string()
        } else {
            "Import completed with errors".to_string()
        };
        if validate_only {
            message = format!("Validation completed - {}", message);
        }
        Self {
            success,
            message,
            stats,
            validation_only: validate_only,
        }
    }

    pub(crate) fn failed(error: RecordError, validate_only: bool) -> Self {
        let message = format!("Import failed: {}", error);
        Self {
            success: false,
            message: message.clone(),
            stats: ImportStats {
                errors: vec![message],
                ..Default::default()
            },
            validation_only: validate_only,
        }
    }
}

/// Outcome of a dry-run import plus how the graph would change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportPreview {
    pub response: ImportResponse,
    pub diff: Option<OntologyDiff>,
}

/// Apply a payload to a staged session.
///
/// Only a payload that is not a JSON object fails as a whole; everything
/// else is reported per record in the returned stats.
pub(crate) fn apply_payload(
    session: &mut OntologySession,
    data: &Value,
) -> Result<ImportStats, RecordError> {
    let payload = data
        .as_object()
        .ok_or_else(|| RecordError::schema("Import data must be a JSON object"))?;

    let mut stats = ImportStats::default();

    // Entities
    let mut staged = Vec::new();
    match payload.get("entities") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                stats.entities_processed += 1;
                match StagedEntity::parse(index, item, &session.settings) {
                    Ok((entity, warnings)) => {
                        stats
                            .warnings
                            .extend(warnings.into_iter().map(|w| format!("Entity {}: {}", index, w)));
                        staged.push(entity);
                    }
                    Err(e) => stats.errors.push(format!("Entity {}: {}", index, e)),
                }
            }
        }
        Some(_) => stats
            .errors
            .push("'entities' field must be an array".to_string()),
    }

    let mut merged = deduplicate(staged);
    merged.sort_by_key(|m| m.record.entity.kind().level());

    for group in merged {
        let mut record = group.record;
        if group.group_size > 1 {
            stats.entities_skipped += group.group_size - 1;
            stats.warnings.push(format!(
                "Entity '{}': merged {} duplicate record(s) in payload",
                record.entity.label,
                group.group_size - 1
            ));
        }

        if let Some(target) = record
            .entity
            .parent_id()
            .and_then(|parent| session.aliases.get(parent))
            .cloned()
        {
            record.entity.set_parent_id(target);
        }

        let kind = record.entity.kind();
        let id = record.entity.id.clone();
        let label = record.entity.label.clone();

        let existing_key = session.graph.get_entity(&id).map(entity_content_key);
        match existing_key {
            None => {
                if let Some(owner) = session.key_owner(kind, &record.key).map(str::to_string) {
                    stats.entities_skipped += 1;
                    stats.warnings.push(format!(
                        "Entity '{}': Skipped duplicate of existing entity {}",
                        label, owner
                    ));
                    if record.explicit {
                        session.alias(id, &owner);
                    }
                    for absorbed in group.merged_ids {
                        session.alias(absorbed, &owner);
                    }
                    continue;
                }
                if record.explicit && session.is_loaded(&id) {
                    let owner = session.resolve(&id).to_string();
                    stats.entities_skipped += 1;
                    stats.warnings.push(format!(
                        "Entity '{}': id '{}' already loaded as {}, skipped",
                        label, id, owner
                    ));
                    if session.graph.contains(&owner) {
                        for absorbed in group.merged_ids {
                            session.alias(absorbed, &owner);
                        }
                    }
                    continue;
                }
            }
            Some(ref current) if *current != record.key => {
                if let Err(e) = session.check_key(kind, &record.key, &id) {
                    stats.errors.push(format!("Entity {}: {}", record.index, e));
                    continue;
                }
            }
            Some(_) => {}
        }
        let rekeyed = existing_key.is_some_and(|current| current != record.key);

        match session.graph.upsert_entity(record.entity) {
            Ok(outcome) => {
                if outcome == Upsert::Updated {
                    tracing::debug!("Updated entity {} from import", id);
                }
                if rekeyed {
                    session.rekey(kind, record.key, &id);
                } else {
                    session.register(kind, record.key, &id);
                }
                for absorbed in group.merged_ids {
                    session.alias(absorbed, &id);
                }
                stats.entities_imported += 1;
            }
            Err(e) => {
                tracing::warn!("Skipping imported entity '{}': {}", label, e);
                stats.errors.push(format!("Entity {}: {}", record.index, e));
            }
        }
    }

    // Relationships
    match payload.get("relationships") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                stats.relationships_processed += 1;
                let (mut rel, warnings) =
                    match parse_relationship(item, session.settings.confidence_policy) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            stats.errors.push(format!("Relationship {}: {}", index, e));
                            continue;
                        }
                    };
                stats.warnings.extend(
                    warnings
                        .into_iter()
                        .map(|w| format!("Relationship {}: {}", index, w)),
                );
                session.redirect(&mut rel.source_entity_id);
                session.redirect(&mut rel.target_entity_id);
                match session.graph.add_relationship(rel) {
                    Ok(Admission::Added { warnings }) => {
                        stats.relationships_imported += 1;
                        stats.warnings.extend(
                            warnings
                                .into_iter()
                                .map(|w| format!("Relationship {}: {}", index, w)),
                        );
                    }
                    Ok(Admission::Duplicate { existing_id }) => {
                        stats.warnings.push(format!(
                            "Relationship {}: duplicate of {}, skipped",
                            index, existing_id
                        ));
                    }
                    Err(e) => stats.errors.push(format!("Relationship {}: {}", index, e)),
                }
            }
        }
        Some(_) => stats
            .errors
            .push("'relationships' field must be an array".to_string()),
    }

    Ok(stats)
}

// ============================================================================
// Entity parsing
// ============================================================================

/// A parsed payload entity waiting to be committed.
#[derive(Debug, Clone)]
struct StagedEntity {
    /// Position in the payload, for error messages.
    index: usize,
    entity: Entity,
    key: String,
    /// Whether the payload supplied the id.
    explicit: bool,
}

impl MergeCandidate for StagedEntity {
    fn merge_key(&self) -> String {
        format!("{}|{}", self.entity.kind(), self.key)
    }

    fn rank_confidence(&self) -> f64 {
        f64::from(self.entity.confidence)
    }

    fn explicit_id(&self) -> Option<&str> {
        self.explicit.then_some(self.entity.id.as_str())
    }

    fn set_explicit_id(&mut self, id: String) {
        self.entity.id = id;
        self.explicit = true;
    }

    fn description(&self) -> Option<&str> {
        Some(&self.entity.description)
    }

    fn set_description(&mut self, description: String) {
        self.entity.description = description;
    }

    fn pages(&self) -> Vec<u32> {
        self.entity.source_pages.clone()
    }

    fn set_pages(&mut self, pages: Vec<u32>) {
        self.entity.source_pages = pages;
    }

    fn absorb(&mut self, other: &Self) {
        for (key, value) in &other.entity.metadata {
            self.entity
                .metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        if self.entity.image_url.is_none() {
            self.entity.image_url = other.entity.image_url.clone();
        }
    }
}

impl StagedEntity {
    fn parse(
        index: usize,
        value: &Value,
        settings: &ImportConfig,
    ) -> Result<(Self, Vec<String>), RecordError> {
        let object = value
            .as_object()
            .ok_or_else(|| RecordError::schema("Must be an object"))?;
        let mut fields = object.clone();
        let mut warnings = Vec::new();

        let kind = match fields.remove("entity_type") {
            None | Some(Value::Null) => {
                warnings.push("missing 'entity_type', defaulting to component".to_string());
                EntityKind::Component
            }
            Some(Value::String(s)) => s.parse::<EntityKind>().map_err(RecordError::Schema)?,
            Some(other) => {
                return Err(RecordError::schema(format!(
                    "entity_type must be a string, got {}",
                    other
                )))
            }
        };

        let label = string_field(&fields, "label")
            .or_else(|| string_field(&fields, "name"))
            .unwrap_or_default()
            .trim()
            .to_string();
        let id = string_field(&fields, "id")
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string);
        let explicit = id.is_some();

        let mut metadata = match fields.remove("metadata") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(RecordError::schema("metadata must be an object")),
        };

        let details = parse_details(kind, &mut fields, &mut warnings)?;
        let mut entity = match id {
            Some(id) => Entity::with_id(id, label, details)?,
            None => Entity::new(label, details)?,
        };

        if let Some(description) = string_field(&fields, "description") {
            entity.description = description.to_string();
        }
        if let Some(url) = string_field(&fields, "image_url").filter(|u| !u.is_empty()) {
            entity.image_url = Some(url.to_string());
        }
        entity = entity.with_source_pages(parse_pages(&fields)?);

        let raw_confidence = metadata
            .remove("confidence_score")
            .or_else(|| fields.get("confidence").cloned());
        entity.confidence = match raw_confidence {
            None | Some(Value::Null) => settings.default_confidence,
            Some(value) => {
                let raw = value
                    .as_f64()
                    .ok_or_else(|| RecordError::range("confidence_score must be a number"))?;
                apply_confidence(settings.confidence_policy, raw, &mut warnings)?
            }
        };

        let raw_status = metadata
            .remove("validation_status")
            .or_else(|| fields.get("validation_status").cloned());
        if let Some(Value::String(status)) = raw_status {
            entity.validation_status = lenient(&status, &mut warnings);
        }

        if let (Some(code), Some(message)) =
            (string_field(&fields, "code"), string_field(&fields, "message"))
        {
            if !code.trim().is_empty() {
                metadata.insert("error_code".into(), Value::from(code.trim()));
                metadata.insert("error_message".into(), Value::from(message.trim()));
            }
        }
        metadata
            .entry("extraction_method")
            .or_insert_with(|| Value::from("import"));
        entity.metadata = metadata.into_iter().collect();

        let key = entity_content_key(&entity);
        Ok((
            Self {
                index,
                entity,
                key,
                explicit,
            },
            warnings,
        ))
    }
}

/// Kind-specific fields, with enum values parsed leniently.
fn parse_details(
    kind: EntityKind,
    fields: &mut Map<String, Value>,
    warnings: &mut Vec<String>,
) -> Result<EntityDetails, RecordError> {
    let system_type = take_string(fields, "system_type");
    let subsystem_type = take_string(fields, "subsystem_type");
    let rest = Value::Object(fields.clone());

    let details = match kind {
        EntityKind::System => {
            let mut details: SystemDetails = from_fields(rest)?;
            if let Some(raw) = system_type {
                details.system_type = lenient::<SystemType>(&raw, warnings);
            }
            EntityDetails::System(details)
        }
        EntityKind::Subsystem => {
            let mut details: SubsystemDetails = from_fields(rest)?;
            if let Some(raw) = subsystem_type {
                details.subsystem_type = lenient::<SubsystemType>(&raw, warnings);
            }
            EntityDetails::Subsystem(details)
        }
        EntityKind::Component => EntityDetails::Component(from_fields::<ComponentDetails>(rest)?),
        EntityKind::SparePart => EntityDetails::SparePart(from_fields::<SparePartDetails>(rest)?),
    };
    Ok(details)
}

fn from_fields<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, RecordError> {
    serde_json::from_value(value).map_err(|e| RecordError::schema(e.to_string()))
}

/// Parse an enum value, falling back to its default with a warning.
fn lenient<T>(raw: &str, warnings: &mut Vec<String>) -> T
where
    T: std::str::FromStr<Err = String> + Default,
{
    raw.parse().unwrap_or_else(|e: String| {
        warnings.push(format!("{}; using default", e));
        T::default()
    })
}

fn apply_confidence(
    policy: ConfidencePolicy,
    raw: f64,
    warnings: &mut Vec<String>,
) -> Result<f32, RecordError> {
    let (value, clamped) = policy.apply(raw)?;
    if clamped {
        warnings.push(format!("confidence {} clamped to {}", raw, value));
    }
    Ok(value)
}

fn string_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn parse_pages(fields: &Map<String, Value>) -> Result<Vec<u32>, RecordError> {
    let mut pages = Vec::new();
    let single = fields.get("source_page").filter(|v| !v.is_null());
    let many = match fields.get("source_pages") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => return Err(RecordError::schema("source_pages must be an array")),
    };
    for value in single.into_iter().chain(many) {
        let page = value
            .as_u64()
            .and_then(|p| u32::try_from(p).ok())
            .ok_or_else(|| RecordError::range(format!("invalid page number {}", value)))?;
        pages.push(page);
    }
    Ok(pages)
}

// ============================================================================
// Relationship parsing
// ============================================================================

const REQUIRED_RELATIONSHIP_FIELDS: [&str; 3] =
    ["relationship_type", "source_entity_id", "target_entity_id"];

fn parse_relationship(
    value: &Value,
    policy: ConfidencePolicy,
) -> Result<(Relationship, Vec<String>), RecordError> {
    let fields = value
        .as_object()
        .ok_or_else(|| RecordError::schema("Must be an object"))?;

    let missing: Vec<&str> = REQUIRED_RELATIONSHIP_FIELDS
        .iter()
        .copied()
        .filter(|f| string_field(fields, f).map_or(true, |v| v.trim().is_empty()))
        .collect();
    if !missing.is_empty() {
        return Err(RecordError::schema(format!(
            "Missing fields: {}",
            missing.join(", ")
        )));
    }

    let mut warnings = Vec::new();
    let relationship_type: RelationType = string_field(fields, "relationship_type")
        .unwrap_or_default()
        .parse()
        .map_err(RecordError::Schema)?;
    let source = string_field(fields, "source_entity_id").unwrap_or_default();
    let target = string_field(fields, "target_entity_id").unwrap_or_default();

    let mut rel = match string_field(fields, "id").filter(|id| !id.trim().is_empty()) {
        Some(id) => Relationship::with_id(id, source, relationship_type, target),
        None => Relationship::new(source, relationship_type, target),
    };
    if let Some(description) = string_field(fields, "description") {
        rel.description = description.to_string();
    }
    match fields.get("confidence") {
        None | Some(Value::Null) => {}
        Some(value) => {
            let raw = value
                .as_f64()
                .ok_or_else(|| RecordError::range("confidence must be a number"))?;
            rel.confidence = apply_confidence(policy, raw, &mut warnings)?;
        }
    }
    if let Some(status) = string_field(fields, "validation_status") {
        rel.validation_status = lenient::<ValidationStatus>(status, &mut warnings);
    }
    if let Some(Value::Object(metadata)) = fields.get("metadata") {
        rel.metadata = metadata.clone().into_iter().collect();
    }

    Ok((rel, warnings))
}
