//! Extraction output through the session: keys, merging, reloads.

use mdo::ontology::EntityDetails;
use mdo::{CandidateRecord, EntityKind, OntologySession};

fn seeded() -> OntologySession {
    let mut session = OntologySession::default();
    let report = session.load_candidates(vec![
        CandidateRecord::named("TrueBeam")
            .with_id("linac")
            .with_entity_type("system"),
        CandidateRecord::named("Multi-Leaf Collimator")
            .with_id("mlc")
            .with_entity_type("subsystem")
            .with_parent("linac"),
    ]);
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    session
}

fn fault_records() -> Vec<CandidateRecord> {
    vec![
        CandidateRecord::error_code("7002", "MOVEMENT")
            .with_parent("mlc")
            .with_confidence(0.8)
            .with_description("Leaf moved")
            .with_source_page(3),
        CandidateRecord::error_code("7002", "movement ")
            .with_parent("mlc")
            .with_confidence(0.9)
            .with_description("Leaf position deviates from plan")
            .with_source_page(7),
        CandidateRecord::named("Leaf Drive Motor")
            .with_component_type("Motor")
            .with_parent("mlc")
            .with_confidence(0.7),
    ]
}

#[test]
fn test_error_code_records_merge() {
    let mut session = seeded();
    let report = session.load_candidates(fault_records());

    assert_eq!(report.records_received, 3);
    assert_eq!(report.entities_created, 2);
    assert_eq!(report.records_merged, 1);

    let fault = session
        .graph()
        .entities()
        .find(|e| e.label == "Error Code: 7002")
        .expect("merged error code entity");
    assert!((fault.confidence - 0.9).abs() < 1e-6);
    assert_eq!(fault.description, "Leaf position deviates from plan");
    assert_eq!(fault.source_pages, vec![3, 7]);
    match &fault.details {
        EntityDetails::Component(d) => {
            assert_eq!(d.component_type, "Error Code");
            assert_eq!(d.parent_subsystem_id, "mlc");
        }
        other => panic!("expected a component, got {:?}", other),
    }
    assert_eq!(
        session.key_owner(EntityKind::Component, "error_code:7002:movement"),
        Some(fault.id.as_str())
    );
}

#[test]
fn test_reprocessing_is_idempotent() {
    let mut session = seeded();
    session.load_candidates(fault_records());
    let entities = session.graph().entity_count();
    let stats = session.stats();

    let again = session.load_candidates(fault_records());
    assert_eq!(again.entities_created, 0);
    assert_eq!(again.records_skipped, 3);
    assert_eq!(session.graph().entity_count(), entities);
    assert_eq!(session.stats(), stats);
}

#[test]
fn test_load_is_deterministic() {
    let labels = |session: &OntologySession| -> Vec<(String, Vec<u32>, String)> {
        session
            .graph()
            .entities()
            .map(|e| (e.label.clone(), e.source_pages.clone(), e.description.clone()))
            .collect()
    };

    let mut first = seeded();
    first.load_candidates(fault_records());
    let mut second = seeded();
    second.load_candidates(fault_records());

    assert_eq!(labels(&first), labels(&second));
}

#[test]
fn test_description_keyed_records() {
    let mut session = seeded();
    let text = "Check the coolant flow sensor when the interlock trips repeatedly during warm-up";
    let report = session.load_candidates(vec![
        CandidateRecord {
            description: Some(text.to_string()),
            parent_id: Some("mlc".to_string()),
            ..Default::default()
        },
        CandidateRecord {
            description: Some(text.to_uppercase()),
            parent_id: Some("mlc".to_string()),
            ..Default::default()
        },
    ]);

    assert_eq!(report.entities_created, 1);
    assert_eq!(report.records_merged, 1);
    let entity = session.graph().get_entity(&report.created_ids[0]).unwrap();
    assert!(entity.label.ends_with("..."));
}

#[test]
fn test_consistency_after_load() {
    let mut session = seeded();
    session.load_candidates(fault_records());

    let report = session.check_consistency();
    assert!(report.is_consistent, "{:?}", report);
    assert!(report
        .warnings
        .contains(&"No relationships defined in ontology".to_string()));
    assert!(report.warnings.iter().any(|w| w.ends_with("entities not validated")));
}

#[test]
fn test_clear_then_reload() {
    let mut session = seeded();
    session.load_candidates(fault_records());
    session.clear();

    assert!(session.graph().is_empty());
    let report = session.load_candidates(fault_records());
    // parents were cleared too
    assert_eq!(report.entities_created, 0);
    assert_eq!(report.errors.len(), 2);
}
