//! Whole-graph consistency checks and relationship suggestions.
//!
//! The graph refuses structural violations on insert and on load; these
//! checks re-derive them from the stored state and add semantic warnings
//! (generic labels, missing required properties). Everything here is
//! read-only and reports instead of repairing.

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::ontology::{
    EntityDetails, EntityKind, OntologyGraph, RelationType, Relationship, ValidationStatus,
};

/// Labels that carry no information about the part they name.
const GENERIC_LABELS: [&str; 4] = ["unknown", "unnamed", "untitled", "default"];

/// Confidence given to inferred containment edges.
const INFERRED_CONFIDENCE: f32 = 0.9;

/// Findings of [`check_consistency`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub is_consistent: bool,
    pub hierarchy_errors: Vec<String>,
    pub relationship_errors: Vec<String>,
    /// Entity ids forming each cycle among hierarchical links.
    pub cycles: Vec<Vec<String>>,
    pub duplicate_relationships: Vec<String>,
    pub general_errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConsistencyReport {
    pub fn error_count(&self) -> usize {
        self.hierarchy_errors.len()
            + self.relationship_errors.len()
            + self.cycles.len()
            + self.duplicate_relationships.len()
            + self.general_errors.len()
    }
}

/// Run every consistency check over a graph.
pub fn check_consistency(graph: &OntologyGraph) -> ConsistencyReport {
    let mut report = ConsistencyReport {
        hierarchy_errors: check_hierarchy(graph),
        relationship_errors: check_relationship_endpoints(graph),
        cycles: find_hierarchy_cycles(graph),
        duplicate_relationships: find_duplicate_relationships(graph),
        ..Default::default()
    };

    let stats = graph.stats();
    if stats.entity_counts.systems == 0 {
        report
            .general_errors
            .push("No systems found in ontology".to_string());
    }
    if stats.entity_counts.subsystems == 0 {
        report
            .warnings
            .push("No subsystems found in ontology".to_string());
    }
    if stats.total_relationships == 0 {
        report
            .warnings
            .push("No relationships defined in ontology".to_string());
    }
    report.warnings.extend(check_domain_range(graph));
    report.warnings.extend(check_labels(graph));
    report.warnings.extend(check_required_properties(graph));

    let pending = stats.status_count(ValidationStatus::PendingReview.as_str());
    if pending > 0 {
        report
            .warnings
            .push(format!("{} entities pending review", pending));
    }
    let unvalidated = stats.status_count(ValidationStatus::NotValidated.as_str());
    if unvalidated > 0 {
        report
            .warnings
            .push(format!("{} entities not validated", unvalidated));
    }

    report.is_consistent = report.error_count() == 0;
    report
}

/// Parent pointers that are dangling or skip a level.
pub fn check_hierarchy(graph: &OntologyGraph) -> Vec<String> {
    graph
        .entities()
        .filter_map(|entity| graph.check_parent(entity).err())
        .map(|e| e.to_string())
        .collect()
}

/// Entities labelled with a placeholder such as "Unknown".
pub fn check_labels(graph: &OntologyGraph) -> Vec<String> {
    graph
        .entities()
        .filter_map(|entity| {
            let label = entity.label.trim();
            if label.is_empty() {
                Some(format!("{} {} has an empty label", entity.kind(), entity.id))
            } else if GENERIC_LABELS.contains(&label.to_lowercase().as_str()) {
                Some(format!(
                    "{} {} has generic label '{}'",
                    entity.kind(),
                    entity.id,
                    entity.label
                ))
            } else {
                None
            }
        })
        .collect()
}

/// Properties a service engineer needs that extraction left blank.
pub fn check_required_properties(graph: &OntologyGraph) -> Vec<String> {
    graph
        .entities()
        .filter_map(|entity| match &entity.details {
            EntityDetails::System(d) if d.manufacturer.trim().is_empty() => Some(format!(
                "System '{}' missing manufacturer information",
                entity.label
            )),
            EntityDetails::Component(d) if d.component_type.trim().is_empty() => Some(format!(
                "Component '{}' missing component type",
                entity.label
            )),
            EntityDetails::SparePart(d) if d.part_number.trim().is_empty() => {
                Some(format!("Spare part '{}' missing part number", entity.label))
            }
            _ => None,
        })
        .collect()
}

/// Relationships with missing or identical endpoints.
pub fn check_relationship_endpoints(graph: &OntologyGraph) -> Vec<String> {
    let mut errors = Vec::new();
    for rel in graph.relationships() {
        if rel.source_entity_id == rel.target_entity_id {
            errors.push(format!(
                "Relationship {} references itself: {}",
                rel.id, rel.source_entity_id
            ));
        }
        if !graph.contains(&rel.source_entity_id) {
            errors.push(format!(
                "Relationship {} has unknown source entity {}",
                rel.id, rel.source_entity_id
            ));
        }
        if !graph.contains(&rel.target_entity_id) {
            errors.push(format!(
                "Relationship {} has unknown target entity {}",
                rel.id, rel.target_entity_id
            ));
        }
    }
    errors
}

/// Structural relationships whose endpoint kinds do not fit the type.
pub fn check_domain_range(graph: &OntologyGraph) -> Vec<String> {
    let mut warnings = Vec::new();
    for rel in graph.relationships() {
        let Some((domain, range)) = rel.relationship_type.domain_range() else {
            continue;
        };
        let (Some(source), Some(target)) = (
            graph.get_entity(&rel.source_entity_id),
            graph.get_entity(&rel.target_entity_id),
        ) else {
            continue;
        };
        if source.kind() != domain || target.kind() != range {
            warnings.push(format!(
                "Relationship {} ({}) expects {} -> {}, got {} -> {}",
                rel.id,
                rel.relationship_type,
                domain,
                range,
                source.kind(),
                target.kind()
            ));
        }
    }
    warnings
}

/// Edges sharing source, type and target with an earlier edge.
pub fn find_duplicate_relationships(graph: &OntologyGraph) -> Vec<String> {
    let mut seen: HashSet<(&str, RelationType, &str)> = HashSet::new();
    let mut duplicates = Vec::new();
    for rel in graph.relationships() {
        let edge = (
            rel.source_entity_id.as_str(),
            rel.relationship_type,
            rel.target_entity_id.as_str(),
        );
        if !seen.insert(edge) {
            duplicates.push(format!(
                "Duplicate relationship: {} {} {}",
                rel.source_entity_id, rel.relationship_type, rel.target_entity_id
            ));
        }
    }
    duplicates
}

/// Cycles among containment links.
///
/// Parent pointers and `has_*` edges run parent to child; `part_of` edges
/// are reversed so every link points the same way before strongly connected
/// components are computed.
pub fn find_hierarchy_cycles(graph: &OntologyGraph) -> Vec<Vec<String>> {
    let mut digraph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    let mut self_loops = Vec::new();
    for entity in graph.entities() {
        let child = node_for(&mut digraph, &mut nodes, entity.id.as_str());
        if let Some(parent_id) = entity.parent_id() {
            if graph.contains(parent_id) {
                let parent = node_for(&mut digraph, &mut nodes, parent_id);
                digraph.add_edge(parent, child, ());
            }
        }
    }
    for rel in graph.relationships() {
        if !rel.relationship_type.is_hierarchical() {
            continue;
        }
        let (from, to) = match rel.relationship_type {
            RelationType::PartOf => (&rel.target_entity_id, &rel.source_entity_id),
            _ => (&rel.source_entity_id, &rel.target_entity_id),
        };
        if from == to {
            self_loops.push(vec![from.clone()]);
            continue;
        }
        let from = node_for(&mut digraph, &mut nodes, from.as_str());
        let to = node_for(&mut digraph, &mut nodes, to.as_str());
        digraph.add_edge(from, to, ());
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&digraph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let mut ids: Vec<String> = component
                .into_iter()
                .map(|idx| digraph[idx].to_string())
                .collect();
            ids.sort();
            ids
        })
        .collect();
    cycles.extend(self_loops);
    cycles.sort();
    cycles
}

fn node_for<'a>(
    digraph: &mut DiGraph<&'a str, ()>,
    nodes: &mut HashMap<&'a str, NodeIndex>,
    id: &'a str,
) -> NodeIndex {
    *nodes.entry(id).or_insert_with(|| digraph.add_node(id))
}

/// A relationship the graph implies but does not store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSuggestion {
    pub source_entity_id: String,
    pub relationship_type: RelationType,
    pub target_entity_id: String,
    pub confidence: f32,
    pub reasoning: String,
    /// Ids of the stored relationships the suggestion is derived from.
    pub evidence: Vec<String>,
}

impl RelationshipSuggestion {
    /// A fresh relationship ready for [`OntologyGraph::add_relationship`].
    pub fn to_relationship(&self) -> Relationship {
        let mut rel = Relationship::new(
            &self.source_entity_id,
            self.relationship_type,
            &self.target_entity_id,
        )
        .with_confidence(self.confidence)
        .with_description(self.reasoning.clone());
        rel.metadata
            .insert("inferred".to_string(), serde_json::Value::Bool(true));
        rel
    }
}

/// Containment implied by two-step `has_subsystem`/`has_component` chains.
///
/// For X -> Y -> Z the suggestion is `X contains Z`. Nothing is added to
/// the graph. Edges already stored as `contains` are not suggested again.
pub fn infer_relationships(graph: &OntologyGraph) -> Vec<RelationshipSuggestion> {
    let structural = |rel: &Relationship| {
        matches!(
            rel.relationship_type,
            RelationType::HasSubsystem | RelationType::HasComponent
        )
    };

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut suggestions = Vec::new();
    for first in graph.relationships().filter(|r| structural(*r)) {
        for second in graph
            .relationships_from(&first.target_entity_id)
            .into_iter()
            .filter(|r| structural(*r))
        {
            let (source, target) = (
                first.source_entity_id.as_str(),
                second.target_entity_id.as_str(),
            );
            if source == target || !seen.insert((source, target)) {
                continue;
            }
            let stored = graph.relationships_from(source).into_iter().any(|r| {
                r.relationship_type == RelationType::Contains && r.target_entity_id == target
            });
            if stored {
                continue;
            }
            let label = |id: &str| graph.get_entity(id).map_or(id.to_string(), |e| e.label.clone());
            suggestions.push(RelationshipSuggestion {
                source_entity_id: source.to_string(),
                relationship_type: RelationType::Contains,
                target_entity_id: target.to_string(),
                confidence: INFERRED_CONFIDENCE,
                reasoning: format!(
                    "{} {} {}, which {} {}",
                    label(source),
                    first.relationship_type.display_name(),
                    label(&first.target_entity_id),
                    second.relationship_type.display_name(),
                    label(target)
                ),
                evidence: vec![first.id.clone(), second.id.clone()],
            });
        }
    }
    suggestions
}

/// Two entities of one kind with similar labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearDuplicate {
    pub kind: EntityKind,
    pub first_id: String,
    pub first_label: String,
    pub second_id: String,
    pub second_label: String,
    pub similarity: f32,
}

/// Pairs of same-kind entities whose labels reach `threshold` Jaro-Winkler
/// similarity, most similar first.
pub fn find_near_duplicates(graph: &OntologyGraph, threshold: f32) -> Vec<NearDuplicate> {
    let mut duplicates = Vec::new();

    for kind in EntityKind::ALL {
        let entities: Vec<_> = graph.entities_of_kind(kind).collect();
        let labels: Vec<String> = entities.iter().map(|e| e.label.to_lowercase()).collect();

        for i in 0..entities.len() {
            for j in (i + 1)..entities.len() {
                let similarity = strsim::jaro_winkler(&labels[i], &labels[j]) as f32;
                if similarity >= threshold {
                    duplicates.push(NearDuplicate {
                        kind,
                        first_id: entities[i].id.clone(),
                        first_label: entities[i].label.clone(),
                        second_id: entities[j].id.clone(),
                        second_label: entities[j].label.clone(),
                        similarity,
                    });
                }
            }
        }
    }

    duplicates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    duplicates
}
