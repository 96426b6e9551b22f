//! Ontology storage trait and the embedded implementation.
//!
//! The store wraps one [`OntologySession`] behind a `tokio` `RwLock`.
//! Mutations hold the write lock for the whole pass; reads share the read
//! lock. When persistence is on, the session snapshot is written after the
//! write lock is released.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, RwLock};

use crate::config::{ImportConfig, OntologyConfig};
use crate::error::{RecordError, Result, StorageError};
use crate::export::{export_json_ld, ExportOptions};
use crate::import::{ImportPreview, ImportRequest, ImportResponse};
use crate::ontology::validation::{ConsistencyReport, NearDuplicate, RelationshipSuggestion};
use crate::ontology::{
    Admission, Entity, EntityFilter, EntityUpdate, LoadReport, OntologyGraph, OntologySession,
    OntologyStats, Relationship, RelationshipFilter, SessionSnapshot, ValidationStatus,
};
use crate::processing::CandidateRecord;

/// File name of the persisted session inside the data directory.
pub const PERSISTENCE_FILE: &str = "ontology.json";

// ============================================================================
// OntologyStore Trait
// ============================================================================

/// Trait for ontology storage backends.
#[async_trait]
pub trait OntologyStore: Send + Sync {
    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Run a bulk import.
    async fn import(&self, request: ImportRequest) -> Result<ImportResponse>;

    /// Dry-run an import and report how the graph would change.
    async fn preview_import(&self, request: ImportRequest) -> Result<ImportPreview>;

    /// Load extracted candidate records.
    async fn load_candidates(&self, records: Vec<CandidateRecord>) -> Result<LoadReport>;

    // ========================================================================
    // Entity Operations
    // ========================================================================

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>>;

    async fn list_entities(&self, filter: EntityFilter) -> Result<Vec<Entity>>;

    async fn update_entity(&self, id: &str, update: EntityUpdate) -> Result<Entity>;

    /// Record a review decision.
    async fn set_validation_status(&self, id: &str, status: ValidationStatus) -> Result<Entity>;

    /// Delete an entity and its relationships. Refuses while it has children.
    async fn delete_entity(&self, id: &str) -> Result<bool>;

    // ========================================================================
    // Relationship Operations
    // ========================================================================

    /// Endpoints that were merged into another entity are redirected to it.
    async fn add_relationship(&self, relationship: Relationship) -> Result<Admission>;

    async fn get_relationship(&self, id: &str) -> Result<Option<Relationship>>;

    async fn list_relationships(&self, filter: RelationshipFilter) -> Result<Vec<Relationship>>;

    async fn delete_relationship(&self, id: &str) -> Result<bool>;

    // ========================================================================
    // Reports
    // ========================================================================

    async fn stats(&self) -> Result<OntologyStats>;

    async fn check_consistency(&self) -> Result<ConsistencyReport>;

    /// Pairs of same-kind entities with similar labels.
    async fn find_duplicates(&self, similarity_threshold: f32) -> Result<Vec<NearDuplicate>>;

    /// Containment edges implied by stored relationships. Nothing is added.
    async fn suggest_relationships(&self) -> Result<Vec<RelationshipSuggestion>>;

    async fn export_json_ld(&self, ontology: &OntologyConfig, options: &ExportOptions)
        -> Result<Value>;

    // ========================================================================
    // Bulk Maintenance
    // ========================================================================

    /// Drop everything, including loaded ids and keys.
    async fn clear(&self) -> Result<()>;

    /// Swap in a whole graph.
    async fn replace_all(&self, graph: OntologyGraph) -> Result<()>;
}

// ============================================================================
// Embedded Implementation
// ============================================================================

/// In-process store with optional JSON persistence.
pub struct EmbeddedOntologyStore {
    session: RwLock<OntologySession>,
    /// Optional persistence file path.
    persistence_path: Option<PathBuf>,
    /// Serializes snapshot writes.
    persist_lock: AsyncMutex<()>,
}

impl EmbeddedOntologyStore {
    /// Create an in-memory store without persistence.
    pub fn new(settings: ImportConfig) -> Self {
        Self {
            session: RwLock::new(OntologySession::new(settings)),
            persistence_path: None,
            persist_lock: AsyncMutex::new(()),
        }
    }

    /// Create a store persisted to `<data_dir>/ontology.json`, loading it
    /// when present.
    pub async fn with_persistence(data_dir: &Path, settings: ImportConfig) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(StorageError::from)?;

        let persistence_path = data_dir.join(PERSISTENCE_FILE);
        let exists = tokio::fs::try_exists(&persistence_path)
            .await
            .map_err(StorageError::from)?;
        let session = if exists {
            Self::load_from_file(&persistence_path, settings).await?
        } else {
            OntologySession::new(settings)
        };

        Ok(Self {
            session: RwLock::new(session),
            persistence_path: Some(persistence_path),
            persist_lock: AsyncMutex::new(()),
        })
    }

    pub fn persistence_path(&self) -> Option<&Path> {
        self.persistence_path.as_deref()
    }

    /// A point-in-time copy of the session state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.read().await.snapshot()
    }

    async fn load_from_file(path: &Path, settings: ImportConfig) -> Result<OntologySession> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(StorageError::from)?;
        let snapshot: SessionSnapshot = serde_json::from_str(&content)?;
        snapshot.check_version()?;

        let session = OntologySession::from_snapshot(snapshot, settings);
        tracing::info!(
            "Loaded {} entities and {} relationships from {}",
            session.graph().entity_count(),
            session.graph().relationship_count(),
            path.display()
        );
        Ok(session)
    }

    /// Persist the session if persistence is enabled.
    async fn persist(&self) -> Result<()> {
        let Some(ref path) = self.persistence_path else {
            return Ok(());
        };

        let _lock = self.persist_lock.lock().await;

        let snapshot = self.session.read().await.snapshot();
        let content = serde_json::to_string_pretty(&snapshot)?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(StorageError::from)?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(StorageError::from)?;

        tracing::debug!("Persisted session to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl OntologyStore for EmbeddedOntologyStore {
    async fn import(&self, request: ImportRequest) -> Result<ImportResponse> {
        let validate_only = request.validate_only;
        let response = self.session.write().await.import(request);
        if !validate_only {
            self.persist().await?;
        }
        Ok(response)
    }

    async fn preview_import(&self, request: ImportRequest) -> Result<ImportPreview> {
        Ok(self.session.read().await.preview_import(&request))
    }

    async fn load_candidates(&self, records: Vec<CandidateRecord>) -> Result<LoadReport> {
        let report = self.session.write().await.load_candidates(records);
        self.persist().await?;
        Ok(report)
    }

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let session = self.session.read().await;
        Ok(session.graph().get_entity(id).cloned())
    }

    async fn list_entities(&self, filter: EntityFilter) -> Result<Vec<Entity>> {
        let session = self.session.read().await;
        Ok(session.graph().list_entities(&filter))
    }

    async fn update_entity(&self, id: &str, update: EntityUpdate) -> Result<Entity> {
        let updated = self.session.write().await.update_entity(id, &update)?;
        self.persist().await?;
        Ok(updated)
    }

    async fn set_validation_status(&self, id: &str, status: ValidationStatus) -> Result<Entity> {
        let updated = self.session.write().await.set_validation_status(id, status)?;
        self.persist().await?;
        Ok(updated)
    }

    async fn delete_entity(&self, id: &str) -> Result<bool> {
        let deleted = self.session.write().await.delete_entity(id)?;
        if deleted {
            self.persist().await?;
        }
        Ok(deleted)
    }

    async fn add_relationship(&self, mut relationship: Relationship) -> Result<Admission> {
        let admission = {
            let mut session = self.session.write().await;
            session.redirect(&mut relationship.source_entity_id);
            session.redirect(&mut relationship.target_entity_id);
            session.graph.add_relationship(relationship)?
        };
        if matches!(admission, Admission::Added { .. }) {
            self.persist().await?;
        }
        Ok(admission)
    }

    async fn get_relationship(&self, id: &str) -> Result<Option<Relationship>> {
        let session = self.session.read().await;
        Ok(session.graph().get_relationship(id).cloned())
    }

    async fn list_relationships(&self, filter: RelationshipFilter) -> Result<Vec<Relationship>> {
        let session = self.session.read().await;
        Ok(session.graph().list_relationships(&filter))
    }

    async fn delete_relationship(&self, id: &str) -> Result<bool> {
        let deleted = self.session.write().await.graph.delete_relationship(id);
        if deleted {
            self.persist().await?;
        }
        Ok(deleted)
    }

    async fn stats(&self) -> Result<OntologyStats> {
        Ok(self.session.read().await.stats())
    }

    async fn check_consistency(&self) -> Result<ConsistencyReport> {
        Ok(self.session.read().await.check_consistency())
    }

    async fn find_duplicates(&self, similarity_threshold: f32) -> Result<Vec<NearDuplicate>> {
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(RecordError::range(format!(
                "similarity threshold {} outside [0.0, 1.0]",
                similarity_threshold
            ))
            .into());
        }
        Ok(self
            .session
            .read()
            .await
            .find_near_duplicates(similarity_threshold))
    }

    async fn suggest_relationships(&self) -> Result<Vec<RelationshipSuggestion>> {
        Ok(self.session.read().await.suggest_relationships())
    }

    async fn export_json_ld(
        &self,
        ontology: &OntologyConfig,
        options: &ExportOptions,
    ) -> Result<Value> {
        let session = self.session.read().await;
        Ok(export_json_ld(session.graph(), ontology, options))
    }

    async fn clear(&self) -> Result<()> {
        self.session.write().await.clear();
        tracing::info!("Cleared ontology session");
        self.persist().await
    }

    async fn replace_all(&self, graph: OntologyGraph) -> Result<()> {
        self.session.write().await.replace_all(graph);
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::error::OntologyError;
    use crate::ontology::{EntityKind, RelationType};

    fn payload() -> Value {
        json!({
            "entities": [
                {"id": "sys", "entity_type": "system", "label": "LINAC_001"},
                {"id": "sub", "entity_type": "subsystem", "label": "Cooling",
                 "subsystem_type": "cooling", "parent_system_id": "sys"},
                {"id": "pump", "entity_type": "component", "label": "Water Pump",
                 "parent_subsystem_id": "sub"}
            ],
            "relationships": [
                {"relationship_type": "has_subsystem", "source_entity_id": "sys",
                 "target_entity_id": "sub"}
            ]
        })
    }

    async fn create_test_store() -> EmbeddedOntologyStore {
        let store = EmbeddedOntologyStore::new(ImportConfig::default());
        let response = store.import(ImportRequest::new(payload())).await.unwrap();
        assert!(response.success, "{:?}", response.stats.errors);
        store
    }

    #[tokio::test]
    async fn test_get_and_list_entities() {
        let store = create_test_store().await;

        let pump = store.get_entity("pump").await.unwrap().unwrap();
        assert_eq!(pump.label, "Water Pump");
        assert!(store.get_entity("missing").await.unwrap().is_none());

        let subsystems = store
            .list_entities(EntityFilter::by_kinds([EntityKind::Subsystem]))
            .await
            .unwrap();
        assert_eq!(subsystems.len(), 1);

        let children = store
            .list_entities(EntityFilter::children_of("sub"))
            .await
            .unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "pump");
    }

    #[tokio::test]
    async fn test_review_transition() {
        let store = create_test_store().await;
        let updated = store
            .set_validation_status("pump", ValidationStatus::PendingReview)
            .await
            .unwrap();
        assert_eq!(updated.validation_status, ValidationStatus::PendingReview);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.status_count("pending_review"), 1);
    }

    #[tokio::test]
    async fn test_update_missing_entity() {
        let store = create_test_store().await;
        let result = store
            .update_entity("ghost", EntityUpdate::label("Nothing"))
            .await;
        assert!(matches!(result, Err(OntologyError::Storage(_))));
    }

    #[tokio::test]
    async fn test_delete_refuses_parent() {
        let store = create_test_store().await;
        assert!(store.delete_entity("sub").await.is_err());

        assert!(store.delete_entity("pump").await.unwrap());
        assert!(!store.delete_entity("pump").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_cascades_relationships() {
        let store = create_test_store().await;
        store
            .add_relationship(Relationship::new("sub", RelationType::HasComponent, "pump"))
            .await
            .unwrap();
        assert_eq!(store.stats().await.unwrap().total_relationships, 2);

        store.delete_entity("pump").await.unwrap();
        let remaining = store
            .list_relationships(RelationshipFilter::involving("pump"))
            .await
            .unwrap();
        assert!(remaining.is_empty());
        assert_eq!(store.stats().await.unwrap().total_relationships, 1);
    }

    #[tokio::test]
    async fn test_duplicate_relationship_admission() {
        let store = create_test_store().await;
        let admission = store
            .add_relationship(Relationship::new("sys", RelationType::HasSubsystem, "sub"))
            .await
            .unwrap();
        assert!(matches!(admission, Admission::Duplicate { .. }));

        let dangling = store
            .add_relationship(Relationship::new("sys", RelationType::Monitors, "ghost"))
            .await;
        assert!(matches!(dangling, Err(OntologyError::Record(_))));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = create_test_store().await;
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.stats().await.unwrap().total_entities, 0);
    }

    #[tokio::test]
    async fn test_duplicate_threshold_checked() {
        let store = create_test_store().await;
        assert!(store.find_duplicates(1.5).await.is_err());
        assert!(store.find_duplicates(0.9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        {
            let store = EmbeddedOntologyStore::with_persistence(dir.path(), ImportConfig::default())
                .await
                .unwrap();
            store.import(ImportRequest::new(payload())).await.unwrap();
        }
        assert!(dir.path().join(PERSISTENCE_FILE).exists());

        let store = EmbeddedOntologyStore::with_persistence(dir.path(), ImportConfig::default())
            .await
            .unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.total_relationships, 1);

        // loaded keys survive the restart
        let response = store.import(ImportRequest::new(payload())).await.unwrap();
        assert!(response.success);
        assert_eq!(store.stats().await.unwrap().total_entities, 3);
        assert!(store.snapshot().await.loaded_ids.contains(&"pump".to_string()));
    }

    #[tokio::test]
    async fn test_validate_only_does_not_persist() {
        let dir = TempDir::new().unwrap();
        let store = EmbeddedOntologyStore::with_persistence(dir.path(), ImportConfig::default())
            .await
            .unwrap();
        store
            .import(ImportRequest::new(payload()).validate_only())
            .await
            .unwrap();
        assert!(!dir.path().join(PERSISTENCE_FILE).exists());
        assert_eq!(store.stats().await.unwrap().total_entities, 0);
    }

    #[tokio::test]
    async fn test_persistence_io_error_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("occupied");
        std::fs::write(&not_a_dir, "plain file").unwrap();

        let result =
            EmbeddedOntologyStore::with_persistence(&not_a_dir, ImportConfig::default()).await;
        assert!(matches!(
            result,
            Err(OntologyError::Storage(StorageError::Io(_)))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_refused() {
        let dir = TempDir::new().unwrap();
        {
            let store = EmbeddedOntologyStore::with_persistence(dir.path(), ImportConfig::default())
                .await
                .unwrap();
            store.import(ImportRequest::new(payload())).await.unwrap();
        }
        let path = dir.path().join(PERSISTENCE_FILE);
        let mut snapshot: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        snapshot["graph"]["entities"][2]["parent_subsystem_id"] = json!("sys");
        std::fs::write(&path, snapshot.to_string()).unwrap();

        let result =
            EmbeddedOntologyStore::with_persistence(dir.path(), ImportConfig::default()).await;
        assert!(matches!(result, Err(OntologyError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_preview_import_leaves_store_untouched() {
        let store = create_test_store().await;
        let preview = store
            .preview_import(ImportRequest::new(json!({
                "entities": [{"id": "ct", "entity_type": "system", "label": "CT"}]
            })))
            .await
            .unwrap();
        let diff = preview.diff.unwrap();
        assert_eq!(diff.added_entities, vec!["ct"]);
        assert_eq!(diff.after.total_entities, 4);
        assert_eq!(store.stats().await.unwrap().total_entities, 3);
    }

    #[tokio::test]
    async fn test_suggest_relationships() {
        let store = create_test_store().await;
        assert!(store.suggest_relationships().await.unwrap().is_empty());

        store
            .add_relationship(Relationship::new("sub", RelationType::HasComponent, "pump"))
            .await
            .unwrap();
        let suggestions = store.suggest_relationships().await.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].source_entity_id, "sys");
        assert_eq!(suggestions[0].target_entity_id, "pump");
        assert_eq!(store.stats().await.unwrap().total_relationships, 2);
    }

    #[tokio::test]
    async fn test_relationship_to_merged_id_redirected() {
        let store = create_test_store().await;
        store
            .import(ImportRequest::new(json!({
                "entities": [{"id": "pump-2", "entity_type": "component",
                              "label": "water pump", "parent_subsystem_id": "sub"}]
            })))
            .await
            .unwrap();

        store
            .add_relationship(Relationship::new("sub", RelationType::HasComponent, "pump-2"))
            .await
            .unwrap();
        let incoming = store
            .list_relationships(RelationshipFilter::involving("pump"))
            .await
            .unwrap();
        assert_eq!(incoming.len(), 1);
    }
}
