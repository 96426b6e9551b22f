//! Aggregate counts over an ontology graph, and the difference between two.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ontology::{EntityKind, OntologyGraph};

/// Entity counts per hierarchy level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub systems: usize,
    pub subsystems: usize,
    pub components: usize,
    pub spare_parts: usize,
}

impl EntityCounts {
    pub fn get(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::System => self.systems,
            EntityKind::Subsystem => self.subsystems,
            EntityKind::Component => self.components,
            EntityKind::SparePart => self.spare_parts,
        }
    }

    fn bump(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::System => self.systems += 1,
            EntityKind::Subsystem => self.subsystems += 1,
            EntityKind::Component => self.components += 1,
            EntityKind::SparePart => self.spare_parts += 1,
        }
    }
}

/// Statistics about the ontology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OntologyStats {
    pub total_entities: usize,
    pub entity_counts: EntityCounts,
    pub total_relationships: usize,
    /// Relationship count per type name.
    pub relationship_counts: BTreeMap<String, usize>,
    /// Entity count per validation status name.
    pub validation_status_counts: BTreeMap<String, usize>,
    /// Mean entity confidence, 0.0 for an empty graph.
    pub average_confidence: f32,
    pub average_relationship_confidence: f32,
}

impl OntologyStats {
    /// Compute statistics for a graph.
    pub fn compute(graph: &OntologyGraph) -> Self {
        let mut stats = OntologyStats::default();
        let mut total_confidence: f64 = 0.0;

        for entity in graph.entities() {
            stats.total_entities += 1;
            stats.entity_counts.bump(entity.kind());
            *stats
                .validation_status_counts
                .entry(entity.validation_status.as_str().to_string())
                .or_default() += 1;
            total_confidence += f64::from(entity.confidence);
        }

        let mut total_rel_confidence: f64 = 0.0;
        for rel in graph.relationships() {
            stats.total_relationships += 1;
            *stats
                .relationship_counts
                .entry(rel.relationship_type.as_str().to_string())
                .or_default() += 1;
            total_rel_confidence += f64::from(rel.confidence);
        }

        stats.average_confidence = if stats.total_entities > 0 {
            (total_confidence / stats.total_entities as f64) as f32
        } else {
            0.0
        };
        stats.average_relationship_confidence = if stats.total_relationships > 0 {
            (total_rel_confidence / stats.total_relationships as f64) as f32
        } else {
            0.0
        };

        stats
    }

    pub fn relationship_count(&self, type_name: &str) -> usize {
        self.relationship_counts.get(type_name).copied().unwrap_or(0)
    }

    pub fn status_count(&self, status_name: &str) -> usize {
        self.validation_status_counts
            .get(status_name)
            .copied()
            .unwrap_or(0)
    }
}

/// How one graph differs from another, by entity id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OntologyDiff {
    /// Only in the other graph.
    pub added_entities: Vec<String>,
    /// Only in this graph.
    pub removed_entities: Vec<String>,
    pub common_entities: Vec<String>,
    pub before: OntologyStats,
    pub after: OntologyStats,
}

impl OntologyDiff {
    pub fn is_empty(&self) -> bool {
        self.added_entities.is_empty() && self.removed_entities.is_empty()
    }
}

impl OntologyGraph {
    pub fn stats(&self) -> OntologyStats {
        OntologyStats::compute(self)
    }

    /// Compare this graph (before) with `other` (after).
    ///
    /// Id lists follow the insertion order of the graph they come from.
    pub fn diff(&self, other: &OntologyGraph) -> OntologyDiff {
        let mut diff = OntologyDiff {
            before: self.stats(),
            after: other.stats(),
            ..Default::default()
        };
        for entity in self.entities() {
            if other.contains(&entity.id) {
                diff.common_entities.push(entity.id.clone());
            } else {
                diff.removed_entities.push(entity.id.clone());
            }
        }
        diff.added_entities = other
            .entities()
            .filter(|e| !self.contains(&e.id))
            .map(|e| e.id.clone())
            .collect();
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::{
        create_component, create_subsystem, create_system, ComponentDetails, RelationType,
        Relationship, SubsystemDetails, SubsystemType, SystemDetails, ValidationStatus,
    };

    #[test]
    fn test_empty_graph() {
        let stats = OntologyGraph::new().stats();
        assert_eq!(stats.total_entities, 0);
        assert_eq!(stats.total_relationships, 0);
        assert_eq!(stats.average_confidence, 0.0);
        assert_eq!(stats.average_relationship_confidence, 0.0);
    }

    #[test]
    fn test_counts_and_averages() {
        let mut graph = OntologyGraph::new();
        let system = create_system("LINAC_001", SystemDetails::default())
            .unwrap()
            .with_confidence(1.0);
        let sub = create_subsystem(
            "Cooling",
            SubsystemDetails::new(SubsystemType::Cooling, &system.id),
        )
        .unwrap()
        .with_confidence(0.8)
        .with_validation_status(ValidationStatus::Validated);
        let comp = create_component("Pump", ComponentDetails::new("Pump", &sub.id))
            .unwrap()
            .with_confidence(0.6);

        let rel = Relationship::new(&sub.id, RelationType::HasComponent, &comp.id)
            .with_confidence(0.5);
        graph.insert_entity(system).unwrap();
        graph.insert_entity(sub).unwrap();
        graph.insert_entity(comp).unwrap();
        graph.add_relationship(rel).unwrap();

        let stats = graph.stats();
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.entity_counts.systems, 1);
        assert_eq!(stats.entity_counts.get(EntityKind::Component), 1);
        assert_eq!(stats.entity_counts.spare_parts, 0);
        assert_eq!(stats.relationship_count("has_component"), 1);
        assert_eq!(stats.status_count("validated"), 1);
        assert_eq!(stats.status_count("not_validated"), 2);
        assert!((stats.average_confidence - 0.8).abs() < 1e-6);
        assert!((stats.average_relationship_confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_diff_by_id() {
        let mut before = OntologyGraph::new();
        let ct = create_system("CT", SystemDetails::default()).unwrap();
        let mr = create_system("MR", SystemDetails::default()).unwrap();
        let (ct_id, mr_id) = (ct.id.clone(), mr.id.clone());
        before.insert_entity(ct.clone()).unwrap();
        before.insert_entity(mr).unwrap();

        let mut after = OntologyGraph::new();
        after.insert_entity(ct).unwrap();
        let pet = create_system("PET", SystemDetails::default()).unwrap();
        let pet_id = pet.id.clone();
        after.insert_entity(pet).unwrap();

        let diff = before.diff(&after);
        assert_eq!(diff.added_entities, vec![pet_id]);
        assert_eq!(diff.removed_entities, vec![mr_id]);
        assert_eq!(diff.common_entities, vec![ct_id]);
        assert_eq!(diff.before.total_entities, 2);
        assert_eq!(diff.after.total_entities, 2);
        assert!(!diff.is_empty());
        assert!(before.diff(&before).is_empty());
    }
}
