//! JSON-LD export of imported ontologies.

use mdo::config::OntologyConfig;
use mdo::ontology::{to_linked_data, LinkedDataNode};
use mdo::{export_json_ld, write_json_ld, ExportOptions, ImportRequest, OntologySession};
use serde_json::json;
use tempfile::TempDir;

fn session() -> OntologySession {
    let mut session = OntologySession::default();
    let response = session.import(ImportRequest::new(json!({
        "entities": [
            {"id": "mri", "entity_type": "system", "label": "Signa", "system_type": "mri"},
            {"id": "coil", "entity_type": "subsystem", "label": "RF Coil",
             "subsystem_type": "imaging", "parent_system_id": "mri"},
            {"id": "preamp", "entity_type": "component", "label": "Preamplifier",
             "component_type": "Amplifier", "parent_subsystem_id": "coil",
             "source_pages": [17, 5]}
        ],
        "relationships": [
            {"id": "link", "relationship_type": "has_component",
             "source_entity_id": "coil", "target_entity_id": "preamp"}
        ]
    })));
    assert!(response.success, "{:?}", response.stats.errors);
    session
}

#[test]
fn test_projection_round_trip() {
    let session = session();
    for entity in session.graph().entities() {
        let node = LinkedDataNode::parse(&to_linked_data(entity)).unwrap();
        assert_eq!(node.kind, entity.kind());
        assert_eq!(node.id, entity.id);
        assert_eq!(node.label, entity.label);
    }
}

#[test]
fn test_parent_links_and_pages() {
    let session = session();
    let doc = export_json_ld(
        session.graph(),
        &OntologyConfig::default(),
        &ExportOptions::default(),
    );
    let nodes = doc["@graph"].as_array().unwrap();

    let preamp = &nodes[2];
    assert_eq!(preamp["@type"], "Component");
    assert_eq!(
        preamp["partOfSubsystem"]["@id"],
        "http://medical-device-ontology.org/Subsystem#coil"
    );
    assert_eq!(preamp["mdo:sourcePages"], json!([5, 17]));
    assert!(nodes[0].get("mdo:sourcePages").is_none());

    let link = &nodes[3];
    assert_eq!(link["@id"], "http://medical-device-ontology.org/Relationship#link");
    assert_eq!(
        link["mdo:target"]["@id"],
        "http://medical-device-ontology.org/Component#preamp"
    );
}

#[test]
fn test_custom_namespace() {
    let session = session();
    let ontology = OntologyConfig {
        id: "mri_service".to_string(),
        namespace: "https://example.org/onto#".to_string(),
        ..Default::default()
    };
    let doc = export_json_ld(session.graph(), &ontology, &ExportOptions::default());

    assert_eq!(doc["@id"], "https://example.org/onto#mri_service");
    assert_eq!(doc["@context"]["mdo"], "https://example.org/onto#");
    assert_eq!(
        doc["@graph"][0]["@id"],
        "https://example.org/onto#MechatronicSystem#mri"
    );
}

#[test]
fn test_write_export_file() {
    let session = session();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("signa.jsonld");

    let nodes = write_json_ld(
        session.graph(),
        &OntologyConfig::default(),
        &ExportOptions::default().without_relationships(),
        &path,
    )
    .unwrap();
    assert_eq!(nodes, 3);

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc["rdfs:label"], "Medical Device Service Ontology");
    assert_eq!(doc["@graph"].as_array().unwrap().len(), 3);
}
