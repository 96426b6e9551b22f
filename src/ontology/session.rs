//! Owned ontology session.
//!
//! A session holds the graph plus the ids and content keys already loaded
//! into it, so reprocessing the same extraction output is idempotent. Create
//! one, load or import into it any number of times, then clear it.
//!
//! Ids of records folded into another entity stay addressable: the session
//! keeps an alias from each absorbed id to the entity that survived, and
//! later parent pointers and relationship endpoints are redirected through it.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ImportConfig, ImportMode};
use crate::error::{RecordError, Result, StorageError};
use crate::import::{self, ImportPreview, ImportRequest, ImportResponse, ImportStats};
use crate::ontology::validation::{
    self, ConsistencyReport, NearDuplicate, RelationshipSuggestion,
};
use crate::ontology::{
    Entity, EntityKind, EntityUpdate, OntologyGraph, OntologyStats, ValidationStatus,
};
use crate::processing::{content_key, deduplicate, CandidateRecord, RecordSignature};

/// Version written into persisted snapshots.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Outcome of [`OntologySession::load_candidates`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub records_received: usize,
    /// Records already present from an earlier load or repeated in the batch.
    pub records_skipped: usize,
    /// Records folded into another record of the same batch.
    pub records_merged: usize,
    pub entities_created: usize,
    pub created_ids: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Graph plus loaded-id and loaded-key state.
#[derive(Debug, Clone, Default)]
pub struct OntologySession {
    pub(crate) graph: OntologyGraph,
    pub(crate) loaded_ids: HashSet<String>,
    /// (kind, content key) -> id of the entity that owns the key.
    pub(crate) loaded_keys: HashMap<(EntityKind, String), String>,
    /// Absorbed or skipped id -> id of the stored entity it stands for.
    pub(crate) aliases: HashMap<String, String>,
    pub(crate) settings: ImportConfig,
}

impl OntologySession {
    pub fn new(settings: ImportConfig) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn graph(&self) -> &OntologyGraph {
        &self.graph
    }

    pub fn settings(&self) -> &ImportConfig {
        &self.settings
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded_ids.contains(id)
    }

    /// Id of the entity that owns a content key for a kind.
    pub fn key_owner(&self, kind: EntityKind, key: &str) -> Option<&str> {
        self.loaded_keys
            .get(&(kind, key.to_string()))
            .map(String::as_str)
    }

    /// Stored entity an id stands for: the alias target, or the id itself.
    pub fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        self.aliases.get(id).map_or(id, String::as_str)
    }

    /// Record an id and its content key. The first owner of a key keeps it.
    pub(crate) fn register(&mut self, kind: EntityKind, key: String, id: &str) {
        self.loaded_ids.insert(id.to_string());
        self.loaded_keys
            .entry((kind, key))
            .or_insert_with(|| id.to_string());
    }

    /// Fail when a different entity already owns `key`.
    pub(crate) fn check_key(
        &self,
        kind: EntityKind,
        key: &str,
        id: &str,
    ) -> std::result::Result<(), RecordError> {
        match self.key_owner(kind, key) {
            Some(owner) if owner != id => Err(RecordError::schema(format!(
                "content key '{}' already belongs to entity {}",
                key, owner
            ))),
            _ => Ok(()),
        }
    }

    /// Make `key` the only content key owned by `id`.
    pub(crate) fn rekey(&mut self, kind: EntityKind, key: String, id: &str) {
        self.loaded_keys.retain(|_, owner| owner != id);
        self.loaded_ids.insert(id.to_string());
        self.loaded_keys.insert((kind, key), id.to_string());
    }

    /// Point an absorbed id at the entity that survived.
    ///
    /// Ids of stored entities are never aliased.
    pub(crate) fn alias(&mut self, id: String, owner: &str) {
        if id == owner || self.graph.contains(&id) {
            return;
        }
        self.loaded_ids.insert(id.clone());
        self.aliases.insert(id, owner.to_string());
    }

    /// Rewrite an entity reference through the alias table.
    pub(crate) fn redirect(&self, id: &mut String) {
        if let Some(target) = self.aliases.get(id.as_str()) {
            *id = target.clone();
        }
    }

    // ========================================================================
    // Candidate loading
    // ========================================================================

    /// Load extracted candidate records.
    ///
    /// Records whose id or content key was loaded before are skipped. The
    /// rest are deduplicated per entity kind, converted to entities and
    /// committed parents first. Per-record failures are reported and do not
    /// stop the batch.
    pub fn load_candidates(&mut self, records: Vec<CandidateRecord>) -> LoadReport {
        let mut report = LoadReport {
            records_received: records.len(),
            ..Default::default()
        };
        let mut batch_ids: HashSet<String> = HashSet::new();
        let mut by_kind: BTreeMap<EntityKind, Vec<CandidateRecord>> = BTreeMap::new();

        for (i, record) in records.into_iter().enumerate() {
            let kind = match record.target_kind() {
                Ok(kind) => kind,
                Err(e) => {
                    report.errors.push(format!("Record {}: {}", i, e));
                    continue;
                }
            };

            if let Some(id) = record.id.as_deref() {
                if self.loaded_ids.contains(id) {
                    report
                        .warnings
                        .push(format!("Record {}: id '{}' already loaded, skipped", i, id));
                    report.records_skipped += 1;
                    continue;
                }
                if !batch_ids.insert(id.to_string()) {
                    report.warnings.push(format!(
                        "Record {}: id '{}' repeated in batch, keeping first occurrence",
                        i, id
                    ));
                    report.records_skipped += 1;
                    continue;
                }
            }

            let key = record.content_key();
            if let Some(owner) = self.key_owner(kind, &key).map(str::to_string) {
                report.warnings.push(format!(
                    "Record {}: '{}' already loaded as {}, skipped",
                    i, key, owner
                ));
                if let Some(id) = record.id {
                    self.alias(id, &owner);
                }
                report.records_skipped += 1;
                continue;
            }

            by_kind.entry(kind).or_default().push(record);
        }

        // BTreeMap order is hierarchy order, so parents land before children.
        for (kind, group) in by_kind {
            for merged in deduplicate(group) {
                report.records_merged += merged.group_size - 1;

                let mut record = merged.record;
                if let Some(parent) = record.parent_id.as_mut() {
                    self.redirect(parent);
                }

                let committed = record
                    .to_entity(self.settings.confidence_policy, self.settings.default_confidence)
                    .and_then(|(entity, warnings)| {
                        let id = entity.id.clone();
                        self.graph.insert_entity(entity)?;
                        Ok((id, warnings))
                    });

                match committed {
                    Ok((id, warnings)) => {
                        report.warnings.extend(
                            warnings
                                .into_iter()
                                .map(|w| format!("Candidate '{}': {}", merged.key, w)),
                        );
                        self.register(kind, merged.key, &id);
                        for absorbed in merged.merged_ids {
                            self.alias(absorbed, &id);
                        }
                        report.entities_created += 1;
                        report.created_ids.push(id);
                    }
                    Err(e) => {
                        tracing::warn!("Skipping candidate '{}': {}", merged.key, e);
                        report
                            .errors
                            .push(format!("Candidate '{}': {}", merged.key, e));
                    }
                }
            }
        }

        tracing::info!(
            "Loaded {} candidates: {} created, {} merged, {} skipped, {} errors",
            report.records_received,
            report.entities_created,
            report.records_merged,
            report.records_skipped,
            report.errors.len()
        );
        report
    }

    // ========================================================================
    // Bulk import
    // ========================================================================

    /// Run a bulk import.
    ///
    /// The payload is applied to a staged copy (an empty one in replace
    /// mode). The copy replaces this session unless the request is
    /// validate-only or the payload itself is malformed.
    pub fn import(&mut self, request: ImportRequest) -> ImportResponse {
        let mode = request.import_mode.unwrap_or(self.settings.default_mode);

        match self.stage(&request.data, mode) {
            Ok((staged, stats)) => {
                let response = ImportResponse::completed(stats, request.validate_only);
                if !request.validate_only {
                    *self = staged;
                }
                tracing::info!(
                    "Import ({}{}): {} entities, {} relationships imported, {} errors",
                    mode.as_str(),
                    if request.validate_only { ", validate only" } else { "" },
                    response.stats.entities_imported,
                    response.stats.relationships_imported,
                    response.stats.errors.len()
                );
                response
            }
            Err(e) => {
                tracing::warn!("Import failed: {}", e);
                ImportResponse::failed(e, request.validate_only)
            }
        }
    }

    /// Dry-run an import and compare its outcome with the current graph.
    ///
    /// The session is not modified. The diff is absent when the payload
    /// itself is malformed.
    pub fn preview_import(&self, request: &ImportRequest) -> ImportPreview {
        let mode = request.import_mode.unwrap_or(self.settings.default_mode);
        match self.stage(&request.data, mode) {
            Ok((staged, stats)) => ImportPreview {
                response: ImportResponse::completed(stats, true),
                diff: Some(self.graph.diff(&staged.graph)),
            },
            Err(e) => ImportPreview {
                response: ImportResponse::failed(e, true),
                diff: None,
            },
        }
    }

    /// Apply a payload to a copy of this session (an empty one in replace mode).
    fn stage(
        &self,
        data: &Value,
        mode: ImportMode,
    ) -> std::result::Result<(OntologySession, ImportStats), RecordError> {
        let mut staged = match mode {
            ImportMode::Merge => self.clone(),
            ImportMode::Replace => OntologySession::new(self.settings.clone()),
        };
        let stats = import::apply_payload(&mut staged, data)?;
        Ok((staged, stats))
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Drop all entities, relationships and loaded state. Idempotent.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.loaded_ids.clear();
        self.loaded_keys.clear();
        self.aliases.clear();
    }

    /// Replace the graph wholesale and rebuild loaded state from it.
    pub fn replace_all(&mut self, graph: OntologyGraph) {
        self.clear();
        let keyed: Vec<(EntityKind, String, String)> = graph
            .entities()
            .map(|e| (e.kind(), entity_content_key(e), e.id.clone()))
            .collect();
        self.graph = graph;
        for (kind, key, id) in keyed {
            self.register(kind, key, &id);
        }
    }

    /// Apply a partial update and move the entity's content key with it.
    ///
    /// Refused when the updated entity would take a key owned by another
    /// entity.
    pub fn update_entity(&mut self, id: &str, update: &EntityUpdate) -> Result<Entity> {
        update.validate()?;
        let current = self
            .graph
            .get_entity(id)
            .ok_or_else(|| StorageError::NotFound(format!("Entity not found: {}", id)))?;
        let old_key = entity_content_key(current);
        let mut preview = current.clone();
        update.apply_to(&mut preview);
        let new_key = entity_content_key(&preview);
        let kind = preview.kind();

        let rekeyed = new_key != old_key;
        if rekeyed {
            self.check_key(kind, &new_key, id)?;
        }
        let updated = self.graph.update_entity(id, update)?;
        if rekeyed {
            self.rekey(kind, new_key, id);
        }
        Ok(updated)
    }

    pub fn set_validation_status(&mut self, id: &str, status: ValidationStatus) -> Result<Entity> {
        self.graph.update_entity(id, &EntityUpdate::status(status))
    }

    /// Delete one entity and forget its id, its keys and the ids absorbed
    /// into it.
    pub fn delete_entity(&mut self, id: &str) -> Result<bool> {
        let deleted = self.graph.delete_entity(id)?;
        if deleted {
            self.loaded_ids.remove(id);
            self.loaded_keys.retain(|_, owner| owner != id);
            let absorbed: Vec<String> = self
                .aliases
                .iter()
                .filter(|(_, owner)| owner.as_str() == id)
                .map(|(alias, _)| alias.clone())
                .collect();
            for alias in absorbed {
                self.aliases.remove(&alias);
                self.loaded_ids.remove(&alias);
            }
        }
        Ok(deleted)
    }

    pub fn stats(&self) -> OntologyStats {
        self.graph.stats()
    }

    pub fn check_consistency(&self) -> ConsistencyReport {
        validation::check_consistency(&self.graph)
    }

    pub fn find_near_duplicates(&self, threshold: f32) -> Vec<NearDuplicate> {
        validation::find_near_duplicates(&self.graph, threshold)
    }

    pub fn suggest_relationships(&self) -> Vec<RelationshipSuggestion> {
        validation::infer_relationships(&self.graph)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut loaded_ids: Vec<String> = self.loaded_ids.iter().cloned().collect();
        loaded_ids.sort();
        let mut loaded_keys: Vec<LoadedKey> = self
            .loaded_keys
            .iter()
            .map(|((kind, key), id)| LoadedKey {
                kind: *kind,
                key: key.clone(),
                entity_id: id.clone(),
            })
            .collect();
        loaded_keys.sort_by(|a, b| (a.kind, &a.key).cmp(&(b.kind, &b.key)));

        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            graph: self.graph.clone(),
            loaded_ids,
            loaded_keys,
            aliases: self
                .aliases
                .iter()
                .map(|(alias, owner)| (alias.clone(), owner.clone()))
                .collect(),
        }
    }

    /// Rebuild a session. Keys and aliases pointing at entities missing
    /// from the graph are dropped.
    pub fn from_snapshot(snapshot: SessionSnapshot, settings: ImportConfig) -> Self {
        let graph = snapshot.graph;
        let loaded_keys = snapshot
            .loaded_keys
            .into_iter()
            .filter(|k| graph.contains(&k.entity_id))
            .map(|k| ((k.kind, k.key), k.entity_id))
            .collect();
        let aliases = snapshot
            .aliases
            .into_iter()
            .filter(|(alias, owner)| graph.contains(owner) && !graph.contains(alias))
            .collect();
        Self {
            loaded_ids: snapshot.loaded_ids.into_iter().collect(),
            loaded_keys,
            aliases,
            graph,
            settings,
        }
    }
}

/// Content key of an already-built entity.
///
/// Error-code components keep their code and message in metadata; every
/// other entity is keyed by label and component type.
pub fn entity_content_key(entity: &Entity) -> String {
    let code = entity.metadata.get("error_code").and_then(|v| v.as_str());
    let message = entity.metadata.get("error_message").and_then(|v| v.as_str());
    let signature = match (code, message) {
        (Some(code), Some(message)) if !code.trim().is_empty() => {
            RecordSignature::ErrorCode { code, message }
        }
        _ => RecordSignature::Named {
            name: &entity.label,
            component_type: entity.details.component_type(),
        },
    };
    content_key(&signature)
}

/// Persisted form of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    pub graph: OntologyGraph,
    #[serde(default)]
    pub loaded_ids: Vec<String>,
    #[serde(default)]
    pub loaded_keys: Vec<LoadedKey>,
    /// Absorbed id -> surviving entity id.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedKey {
    pub kind: EntityKind,
    pub key: String,
    pub entity_id: String,
}

impl SessionSnapshot {
    pub fn check_version(&self) -> std::result::Result<(), RecordError> {
        if self.version > SNAPSHOT_VERSION {
            return Err(RecordError::schema(format!(
                "snapshot version {} is newer than supported version {}",
                self.version, SNAPSHOT_VERSION
            )));
        }
        Ok(())
    }
}
