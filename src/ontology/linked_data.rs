//! OWL/JSON-LD projection of entities and relationships.

use serde_json::{json, Map, Value};

use crate::error::RecordError;
use crate::ontology::{Entity, EntityDetails, EntityKind, Relationship};

/// Namespace used when no configuration is supplied.
pub const DEFAULT_NAMESPACE: &str = "http://medical-device-ontology.org/";

/// URI of an entity of `kind` with `id` under `namespace`.
pub fn entity_uri(namespace: &str, kind: EntityKind, id: &str) -> String {
    format!("{}{}#{}", namespace, kind.owl_class(), id)
}

/// Project an entity under the default namespace.
pub fn to_linked_data(entity: &Entity) -> Value {
    to_linked_data_in(entity, DEFAULT_NAMESPACE)
}

/// Project an entity to a JSON-LD node under `namespace`.
///
/// The output depends only on the entity and the namespace.
pub fn to_linked_data_in(entity: &Entity, namespace: &str) -> Value {
    let kind = entity.kind();
    let mut node = Map::new();
    node.insert("@type".into(), json!(kind.owl_class()));
    node.insert("@id".into(), json!(entity_uri(namespace, kind, &entity.id)));
    node.insert("rdfs:label".into(), json!(entity.label));
    node.insert("rdfs:comment".into(), json!(entity.description));

    let parent_link = |field: &str, parent_kind: EntityKind, parent_id: &str| {
        (
            field.to_string(),
            json!({ "@id": entity_uri(namespace, parent_kind, parent_id) }),
        )
    };

    match &entity.details {
        EntityDetails::System(d) => {
            node.insert("systemType".into(), json!(d.system_type.as_str()));
            node.insert("modelNumber".into(), json!(d.model_number));
            node.insert("manufacturer".into(), json!(d.manufacturer));
            node.insert("serialNumber".into(), json!(d.serial_number));
            node.insert("softwareVersion".into(), json!(d.software_version));
            node.insert("hardwareVersion".into(), json!(d.hardware_version));
        }
        EntityDetails::Subsystem(d) => {
            node.insert("subsystemType".into(), json!(d.subsystem_type.as_str()));
            let (k, v) = parent_link("partOfSystem", EntityKind::System, &d.parent_system_id);
            node.insert(k, v);
            if !d.model_number.is_empty() {
                node.insert("modelNumber".into(), json!(d.model_number));
            }
            if !d.manufacturer.is_empty() {
                node.insert("manufacturer".into(), json!(d.manufacturer));
            }
        }
        EntityDetails::Component(d) => {
            node.insert("componentType".into(), json!(d.component_type));
            let (k, v) = parent_link(
                "partOfSubsystem",
                EntityKind::Subsystem,
                &d.parent_subsystem_id,
            );
            node.insert(k, v);
            node.insert("partNumber".into(), json!(d.part_number));
            node.insert("manufacturer".into(), json!(d.manufacturer));
            node.insert("model".into(), json!(d.model));
            node.insert("lifecycleStatus".into(), json!(d.lifecycle_status));
        }
        EntityDetails::SparePart(d) => {
            let (k, v) = parent_link(
                "usedByComponent",
                EntityKind::Component,
                &d.parent_component_id,
            );
            node.insert(k, v);
            node.insert("partNumber".into(), json!(d.part_number));
            node.insert("manufacturer".into(), json!(d.manufacturer));
            node.insert("supplier".into(), json!(d.supplier));
            node.insert("lifecycleStatus".into(), json!(d.lifecycle_status));
            if let Some(ref cycle) = d.maintenance_cycle {
                node.insert("maintenanceCycle".into(), json!(cycle));
            }
            if let Some(ref freq) = d.replacement_frequency {
                node.insert("replacementFrequency".into(), json!(freq));
            }
            if let Some(stock) = d.stock_level {
                node.insert("stockLevel".into(), json!(stock));
            }
            if let Some(point) = d.reorder_point {
                node.insert("reorderPoint".into(), json!(point));
            }
            if let Some(ref lead) = d.lead_time {
                node.insert("leadTime".into(), json!(lead));
            }
        }
    }

    node.insert("mdo:confidence".into(), json!(entity.confidence));
    node.insert(
        "mdo:validationStatus".into(),
        json!(entity.validation_status.as_str()),
    );
    if !entity.source_pages.is_empty() {
        node.insert("mdo:sourcePages".into(), json!(entity.source_pages));
    }
    if let Some(ref url) = entity.image_url {
        node.insert("mdo:image".into(), json!(url));
    }

    Value::Object(node)
}

/// Project a relationship to a JSON-LD node.
pub fn relationship_to_linked_data(
    rel: &Relationship,
    namespace: &str,
    source_kind: EntityKind,
    target_kind: EntityKind,
) -> Value {
    json!({
        "@type": "mdo:Relationship",
        "@id": format!("{}Relationship#{}", namespace, rel.id),
        "mdo:relationshipType": rel.relationship_type.as_str(),
        "mdo:source": { "@id": entity_uri(namespace, source_kind, &rel.source_entity_id) },
        "mdo:target": { "@id": entity_uri(namespace, target_kind, &rel.target_entity_id) },
        "rdfs:comment": rel.description,
        "mdo:confidence": rel.confidence,
        "mdo:validationStatus": rel.validation_status.as_str(),
    })
}

/// Identity recovered from a projected entity node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedDataNode {
    pub kind: EntityKind,
    pub id: String,
    pub label: String,
}

impl LinkedDataNode {
    /// Read kind, id and label back out of a node produced by [`to_linked_data`].
    pub fn parse(node: &Value) -> Result<Self, RecordError> {
        let class = node
            .get("@type")
            .and_then(Value::as_str)
            .ok_or_else(|| RecordError::schema("linked-data node has no '@type'"))?;
        let kind = EntityKind::from_owl_class(class)
            .ok_or_else(|| RecordError::schema(format!("unknown '@type': {}", class)))?;

        let uri = node
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| RecordError::schema("linked-data node has no '@id'"))?;
        let marker = format!("{}#", kind.owl_class());
        let id = uri
            .find(&marker)
            .map(|pos| &uri[pos + marker.len()..])
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RecordError::schema(format!("malformed '@id': {}", uri)))?;

        let label = node
            .get("rdfs:label")
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(Self {
            kind,
            id: id.to_string(),
            label: label.to_string(),
        })
    }
}
