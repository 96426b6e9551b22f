//! Async store: locking, persistence and reports.

use std::sync::Arc;

use mdo::config::ImportConfig;
use mdo::{
    CandidateRecord, EmbeddedOntologyStore, EntityFilter, EntityKind, EntityUpdate,
    ImportRequest, OntologyStore, ValidationStatus,
};
use serde_json::json;
use tempfile::TempDir;

fn skeleton() -> serde_json::Value {
    json!({
        "entities": [
            {"id": "linac", "entity_type": "system", "label": "Halcyon", "system_type": "linac"},
            {"id": "couch", "entity_type": "subsystem", "label": "Patient Couch",
             "subsystem_type": "patient_positioning", "parent_system_id": "linac"}
        ],
        "relationships": [
            {"relationship_type": "has_subsystem", "source_entity_id": "linac",
             "target_entity_id": "couch"}
        ]
    })
}

#[tokio::test]
async fn test_empty_store_stats() {
    let store = EmbeddedOntologyStore::new(ImportConfig::default());
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_entities, 0);
    assert_eq!(stats.average_confidence, 0.0);

    let report = store.check_consistency().await.unwrap();
    assert!(!report.is_consistent);
    assert_eq!(report.general_errors, vec!["No systems found in ontology"]);
}

#[tokio::test]
async fn test_concurrent_loads() {
    let store = Arc::new(EmbeddedOntologyStore::new(ImportConfig::default()));
    store.import(ImportRequest::new(skeleton())).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let records = vec![
                CandidateRecord::named(format!("Couch Motor {}", i % 4))
                    .with_component_type("Motor")
                    .with_parent("couch"),
                CandidateRecord::error_code("4001", "COUCH LIMIT").with_parent("couch"),
            ];
            store.load_candidates(records).await.unwrap()
        }));
    }
    for handle in handles {
        let report = handle.await.unwrap();
        assert!(report.errors.is_empty(), "{:?}", report.errors);
    }

    // four distinct motors plus one error code, however the loads interleave
    let components = store
        .list_entities(EntityFilter::by_kinds([EntityKind::Component]))
        .await
        .unwrap();
    assert_eq!(components.len(), 5);
}

#[tokio::test]
async fn test_persisted_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let store = EmbeddedOntologyStore::with_persistence(dir.path(), ImportConfig::default())
            .await
            .unwrap();
        store.import(ImportRequest::new(skeleton())).await.unwrap();
        store
            .load_candidates(vec![
                CandidateRecord::error_code("4001", "COUCH LIMIT").with_parent("couch")
            ])
            .await
            .unwrap();
        store
            .set_validation_status("couch", ValidationStatus::Validated)
            .await
            .unwrap();
    }

    let store = EmbeddedOntologyStore::with_persistence(dir.path(), ImportConfig::default())
        .await
        .unwrap();
    let couch = store.get_entity("couch").await.unwrap().unwrap();
    assert_eq!(couch.validation_status, ValidationStatus::Validated);

    // the error code key was persisted with the graph
    let report = store
        .load_candidates(vec![
            CandidateRecord::error_code("4001", "couch limit").with_parent("couch")
        ])
        .await
        .unwrap();
    assert_eq!(report.records_skipped, 1);
    assert_eq!(store.stats().await.unwrap().total_entities, 3);
}

#[tokio::test]
async fn test_near_duplicates_reported() {
    let store = EmbeddedOntologyStore::new(ImportConfig::default());
    store.import(ImportRequest::new(skeleton())).await.unwrap();
    store
        .load_candidates(vec![
            CandidateRecord::named("Couch Drive Motor").with_parent("couch"),
            CandidateRecord::named("Couch Drive Motors").with_parent("couch"),
            CandidateRecord::named("Laser Alignment").with_parent("couch"),
        ])
        .await
        .unwrap();

    let pairs = store.find_duplicates(0.9).await.unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].kind, EntityKind::Component);
    assert!(pairs[0].similarity >= 0.9);
}

#[tokio::test]
async fn test_renamed_entity_reloads_by_new_name() {
    let dir = TempDir::new().unwrap();
    {
        let store = EmbeddedOntologyStore::with_persistence(dir.path(), ImportConfig::default())
            .await
            .unwrap();
        store.import(ImportRequest::new(skeleton())).await.unwrap();
        store
            .load_candidates(vec![CandidateRecord::named("Pump")
                .with_id("pump")
                .with_parent("couch")])
            .await
            .unwrap();
        store
            .update_entity("pump", EntityUpdate::label("Valve"))
            .await
            .unwrap();
    }

    let store = EmbeddedOntologyStore::with_persistence(dir.path(), ImportConfig::default())
        .await
        .unwrap();
    let valve = store
        .load_candidates(vec![CandidateRecord::named("Valve").with_parent("couch")])
        .await
        .unwrap();
    assert_eq!(valve.entities_created, 0);
    assert_eq!(valve.records_skipped, 1);

    let pump = store
        .load_candidates(vec![CandidateRecord::named("Pump").with_parent("couch")])
        .await
        .unwrap();
    assert_eq!(pump.entities_created, 1);
    assert_eq!(store.stats().await.unwrap().total_entities, 4);
}

#[tokio::test]
async fn test_aliases_survive_restart() {
    let dir = TempDir::new().unwrap();
    {
        let store = EmbeddedOntologyStore::with_persistence(dir.path(), ImportConfig::default())
            .await
            .unwrap();
        store.import(ImportRequest::new(skeleton())).await.unwrap();
        store
            .load_candidates(vec![
                CandidateRecord::named("Couch Motor").with_id("m1").with_parent("couch"),
                CandidateRecord::named("couch motor").with_id("m2").with_parent("couch"),
            ])
            .await
            .unwrap();
    }

    let store = EmbeddedOntologyStore::with_persistence(dir.path(), ImportConfig::default())
        .await
        .unwrap();
    assert_eq!(store.snapshot().await.aliases.get("m2").map(String::as_str), Some("m1"));
    let report = store
        .load_candidates(vec![CandidateRecord::named("Motor Encoder")
            .with_entity_type("spare_part")
            .with_parent("m2")])
        .await
        .unwrap();
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    let parts = store
        .list_entities(EntityFilter::children_of("m1"))
        .await
        .unwrap();
    assert_eq!(parts.len(), 1);
}
