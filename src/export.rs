//! JSON-LD export of an ontology graph.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::OntologyConfig;
use crate::error::{OntologyError, Result};
use crate::ontology::{
    relationship_to_linked_data, to_linked_data_in, EntityKind, OntologyGraph,
};

/// Export options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Only export these kinds; empty means all.
    pub kinds: Vec<EntityKind>,
    /// Only export these entity ids; empty means all.
    pub ids: Vec<String>,
    /// Append relationship nodes whose endpoints are both exported.
    pub include_relationships: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            kinds: Vec::new(),
            ids: Vec::new(),
            include_relationships: true,
        }
    }
}

impl ExportOptions {
    pub fn by_kinds(kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn by_ids(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn without_relationships(mut self) -> Self {
        self.include_relationships = false;
        self
    }

    fn selects(&self, kind: EntityKind, id: &str) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&kind))
            && (self.ids.is_empty() || self.ids.iter().any(|i| i == id))
    }
}

/// Fixed prefix map of the exported document.
pub fn json_ld_context(namespace: &str) -> Value {
    json!({
        "owl": "http://www.w3.org/2002/07/owl#",
        "rdf": "http://www.w3.org/1999/02/22-rdf-syntax-ns#",
        "rdfs": "http://www.w3.org/2000/01/rdf-schema#",
        "xsd": "http://www.w3.org/2001/XMLSchema#",
        "mdo": namespace,
        "linac": format!("{}linac#", namespace),
    })
}

/// Build the JSON-LD document.
///
/// Entities appear in insertion order, followed by relationships when
/// requested. Read-only.
pub fn export_json_ld(graph: &OntologyGraph, ontology: &OntologyConfig, options: &ExportOptions) -> Value {
    let namespace = ontology.namespace.as_str();
    let mut nodes = Vec::new();
    let mut exported = std::collections::HashSet::new();

    for entity in graph.entities() {
        if !options.selects(entity.kind(), &entity.id) {
            continue;
        }
        exported.insert(entity.id.as_str());
        nodes.push(to_linked_data_in(entity, namespace));
    }

    if options.include_relationships {
        for rel in graph.relationships() {
            if !exported.contains(rel.source_entity_id.as_str())
                || !exported.contains(rel.target_entity_id.as_str())
            {
                continue;
            }
            let (Some(source), Some(target)) = (
                graph.get_entity(&rel.source_entity_id),
                graph.get_entity(&rel.target_entity_id),
            ) else {
                continue;
            };
            nodes.push(relationship_to_linked_data(rel, namespace, source.kind(), target.kind()));
        }
    }

    let mut document = Map::new();
    document.insert("@context".into(), json_ld_context(namespace));
    document.insert("@id".into(), json!(format!("{}{}", namespace, ontology.id)));
    document.insert("@type".into(), json!("owl:Ontology"));
    document.insert("rdfs:label".into(), json!(ontology.label));
    document.insert("rdfs:comment".into(), json!(ontology.description));
    document.insert("owl:versionInfo".into(), json!(ontology.version));
    document.insert("created".into(), json!(Utc::now().to_rfc3339()));
    document.insert("@graph".into(), Value::Array(nodes));
    Value::Object(document)
}

/// Build the JSON-LD document and write it to `path`.
///
/// Returns the number of `@graph` nodes written.
pub fn write_json_ld(
    graph: &OntologyGraph,
    ontology: &OntologyConfig,
    options: &ExportOptions,
    path: impl AsRef<Path>,
) -> Result<usize> {
    let document = export_json_ld(graph, ontology, options);
    write_document(&document, path)
}

/// Write an exported document as pretty JSON.
///
/// The file is written next to its destination and renamed into place.
pub fn write_document(document: &Value, path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let node_count = document["@graph"].as_array().map_or(0, Vec::len);
    let content = serde_json::to_string_pretty(document)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| OntologyError::Export(format!("not a file path: {}", path.display())))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    tracing::info!("Exported {} nodes to {}", node_count, path.display());
    Ok(node_count)
}
