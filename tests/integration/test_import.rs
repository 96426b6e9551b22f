//! Bulk import through the session.

use mdo::{ImportMode, ImportRequest, OntologySession, ValidationStatus};
use serde_json::{json, Value};

fn service_manual_payload() -> Value {
    json!({
        "entities": [
            {"id": "ct-1", "entity_type": "system", "label": "Revolution CT",
             "system_type": "ct_scanner", "manufacturer": "Acme Imaging",
             "metadata": {"confidence_score": 0.9, "validation_status": "pending_review"}},
            {"id": "gantry", "entity_type": "subsystem", "label": "Gantry",
             "subsystem_type": "mechanical", "parent_system_id": "ct-1"},
            {"id": "tube", "entity_type": "component", "label": "X-ray Tube",
             "component_type": "Tube", "part_number": "XT-200",
             "parent_subsystem_id": "gantry", "source_page": 44},
            {"id": "bearing", "entity_type": "spare_part", "label": "Anode Bearing",
             "part_number": "AB-7", "supplier": "Parts Co", "stock_level": 2,
             "reorder_point": 3, "parent_component_id": "tube"}
        ],
        "relationships": [
            {"id": "r1", "relationship_type": "has_subsystem",
             "source_entity_id": "ct-1", "target_entity_id": "gantry"},
            {"id": "r2", "relationship_type": "has_component",
             "source_entity_id": "gantry", "target_entity_id": "tube"},
            {"id": "r3", "relationship_type": "has_spare_part",
             "source_entity_id": "tube", "target_entity_id": "bearing"}
        ]
    })
}

#[test]
fn test_full_hierarchy_import() {
    let mut session = OntologySession::default();
    let response = session.import(ImportRequest::new(service_manual_payload()));

    assert!(response.success, "{:?}", response.stats.errors);
    assert_eq!(response.stats.entities_processed, 4);
    assert_eq!(response.stats.entities_imported, 4);
    assert_eq!(response.stats.relationships_imported, 3);

    let stats = session.stats();
    assert_eq!(stats.entity_counts.systems, 1);
    assert_eq!(stats.entity_counts.spare_parts, 1);
    assert_eq!(stats.status_count("pending_review"), 1);

    let report = session.check_consistency();
    assert!(report.is_consistent, "{:?}", report);
}

#[test]
fn test_same_id_twice_in_merge_mode() {
    let mut session = OntologySession::default();
    session.import(ImportRequest::new(service_manual_payload()));

    let response = session.import(
        ImportRequest::new(json!({
            "entities": [
                {"id": "tube", "entity_type": "component", "label": "X-ray Tube",
                 "component_type": "Tube", "parent_subsystem_id": "gantry",
                 "metadata": {"validation_status": "expert_approved"}}
            ]
        }))
        .with_mode(ImportMode::Merge),
    );

    assert!(response.success, "{:?}", response.stats.errors);
    assert_eq!(session.graph().entity_count(), 4);
    let tube = session.graph().get_entity("tube").unwrap();
    assert_eq!(tube.validation_status, ValidationStatus::Validated);
}

#[test]
fn test_dangling_target_rejected_rest_imported() {
    let mut session = OntologySession::default();
    let mut payload = service_manual_payload();
    payload["relationships"] = json!([
        {"relationship_type": "monitors", "source_entity_id": "gantry",
         "target_entity_id": "does-not-exist"},
        {"relationship_type": "has_component", "source_entity_id": "gantry",
         "target_entity_id": "tube"}
    ]);

    let response = session.import(ImportRequest::new(payload));
    assert!(!response.success);
    assert_eq!(response.stats.entities_imported, 4);
    assert_eq!(response.stats.relationships_imported, 1);
    assert_eq!(response.stats.errors.len(), 1);
    assert!(response.stats.errors[0].contains("does-not-exist"));
}

#[test]
fn test_self_reference_and_duplicate_edges() {
    let mut session = OntologySession::default();
    let mut payload = service_manual_payload();
    payload["relationships"] = json!([
        {"relationship_type": "connected_to", "source_entity_id": "tube",
         "target_entity_id": "tube"},
        {"relationship_type": "has_component", "source_entity_id": "gantry",
         "target_entity_id": "tube"},
        {"relationship_type": "has_component", "source_entity_id": "gantry",
         "target_entity_id": "tube"}
    ]);

    let response = session.import(ImportRequest::new(payload));
    assert_eq!(response.stats.relationships_imported, 1);
    assert_eq!(response.stats.errors.len(), 1);
    assert!(response.stats.errors[0].starts_with("Relationship 0: Reference error"));
    assert!(response
        .stats
        .warnings
        .iter()
        .any(|w| w.starts_with("Relationship 2: duplicate of")));
}

#[test]
fn test_domain_range_mismatch_warns() {
    let mut session = OntologySession::default();
    let mut payload = service_manual_payload();
    payload["relationships"] = json!([
        {"relationship_type": "has_component", "source_entity_id": "ct-1",
         "target_entity_id": "tube"}
    ]);

    let response = session.import(ImportRequest::new(payload));
    assert!(response.success);
    assert_eq!(response.stats.relationships_imported, 1);
    assert!(response
        .stats
        .warnings
        .iter()
        .any(|w| w.contains("has_component expects subsystem -> component")));
}

#[test]
fn test_validate_only_leaves_session_untouched() {
    let mut session = OntologySession::default();
    session.import(ImportRequest::new(service_manual_payload()));
    let before = session.stats();

    let response = session.import(
        ImportRequest::new(json!({"entities": [{"entity_type": "system", "label": "MRI"}]}))
            .with_mode(ImportMode::Replace)
            .validate_only(),
    );
    assert!(response.success);
    assert!(response.validation_only);
    assert_eq!(response.stats.entities_imported, 1);
    assert_eq!(session.stats(), before);
}

#[test]
fn test_request_deserializes_from_json() {
    let request: ImportRequest = serde_json::from_value(json!({
        "data": {"entities": []},
        "import_mode": "replace"
    }))
    .unwrap();
    assert_eq!(request.import_mode, Some(ImportMode::Replace));
    assert!(!request.validate_only);
}

#[test]
fn test_merged_id_usable_in_later_import() {
    let mut session = OntologySession::default();
    let mut payload = service_manual_payload();
    payload["entities"].as_array_mut().unwrap().extend([
        json!({"id": "a", "entity_type": "component", "label": "Slip Ring",
               "parent_subsystem_id": "gantry", "metadata": {"confidence_score": 0.4}}),
        json!({"id": "b", "entity_type": "component", "label": "slip ring",
               "parent_subsystem_id": "gantry", "metadata": {"confidence_score": 0.9}}),
    ]);
    let first = session.import(ImportRequest::new(payload));
    assert!(first.success, "{:?}", first.stats.errors);
    assert_eq!(session.resolve("a"), "b");

    let second = session.import(ImportRequest::new(json!({
        "entities": [
            {"id": "brush", "entity_type": "spare_part", "label": "Carbon Brush",
             "part_number": "CB-3", "parent_component_id": "a"}
        ],
        "relationships": [
            {"relationship_type": "has_spare_part", "source_entity_id": "a",
             "target_entity_id": "brush"}
        ]
    })));
    assert!(second.success, "{:?}", second.stats.errors);
    assert_eq!(second.stats.relationships_imported, 1);
    assert_eq!(
        session.graph().get_entity("brush").unwrap().parent_id(),
        Some("b")
    );
    assert_eq!(session.graph().relationships_from("b").len(), 1);
}

#[test]
fn test_diff_of_replace_import() {
    let mut session = OntologySession::default();
    session.import(ImportRequest::new(service_manual_payload()));

    let preview = session.preview_import(
        &ImportRequest::new(json!({
            "entities": [{"id": "ct-1", "entity_type": "system", "label": "Revolution CT"}]
        }))
        .with_mode(ImportMode::Replace),
    );
    let diff = preview.diff.unwrap();
    assert_eq!(diff.common_entities, vec!["ct-1"]);
    assert_eq!(diff.removed_entities, vec!["gantry", "tube", "bearing"]);
    assert_eq!(diff.before.total_relationships, 3);
    assert_eq!(diff.after.total_relationships, 0);
    assert_eq!(session.graph().entity_count(), 4);
}
