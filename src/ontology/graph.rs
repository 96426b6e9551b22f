//! In-memory entity graph.
//!
//! Entities and relationships are kept in insertion order with id indices.
//! Every mutation goes through a check that keeps the parent hierarchy
//! intact: a child can only be inserted under an existing parent of the
//! right kind, and an entity with children cannot be deleted. A graph read
//! back from storage goes through the same checks and fails to load when
//! they do not hold.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{RecordError, Result, StorageError};
use crate::ontology::{
    Entity, EntityFilter, EntityKind, EntityUpdate, Relationship, RelationshipFilter,
};

/// Outcome of admitting a relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Stored, possibly with warnings (domain/range mismatch).
    Added { warnings: Vec<String> },
    /// An identical edge already exists; nothing stored.
    Duplicate { existing_id: String },
}

/// Whether an upsert created or replaced an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// Entities and relationships of one ontology.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "GraphData", into = "GraphData")]
pub struct OntologyGraph {
    entities: HashMap<String, Entity>,
    entity_order: Vec<String>,
    relationships: HashMap<String, Relationship>,
    relationship_order: Vec<String>,
    /// Index: parent id -> child entity ids.
    children: HashMap<String, Vec<String>>,
    /// Index: source_entity_id -> relationship ids.
    rel_by_source: HashMap<String, Vec<String>>,
    /// Index: target_entity_id -> relationship ids.
    rel_by_target: HashMap<String, Vec<String>>,
}

/// Serialized form; indices are rebuilt on load.
#[derive(Debug, Default, Serialize, Deserialize)]
struct GraphData {
    entities: Vec<Entity>,
    relationships: Vec<Relationship>,
}

impl TryFrom<GraphData> for OntologyGraph {
    type Error = RecordError;

    fn try_from(data: GraphData) -> std::result::Result<Self, Self::Error> {
        let mut graph = OntologyGraph::default();
        for entity in data.entities {
            entity.validate()?;
            if graph.entities.contains_key(&entity.id) {
                return Err(RecordError::schema(format!(
                    "entity id '{}' stored twice",
                    entity.id
                )));
            }
            graph.index_entity(&entity);
            graph.entity_order.push(entity.id.clone());
            graph.entities.insert(entity.id.clone(), entity);
        }
        // Parents may be stored after a child that was re-pointed later.
        for entity in graph.entities() {
            graph.check_parent(entity)?;
        }
        for rel in data.relationships {
            if let Admission::Duplicate { existing_id } = graph.add_relationship(rel)? {
                return Err(RecordError::schema(format!(
                    "relationship duplicates stored edge '{}'",
                    existing_id
                )));
            }
        }
        Ok(graph)
    }
}

impl From<OntologyGraph> for GraphData {
    fn from(mut graph: OntologyGraph) -> Self {
        let entities = graph
            .entity_order
            .iter()
            .filter_map(|id| graph.entities.remove(id))
            .collect();
        let relationships = graph
            .relationship_order
            .iter()
            .filter_map(|id| graph.relationships.remove(id))
            .collect();
        GraphData {
            entities,
            relationships,
        }
    }
}

impl OntologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Index maintenance
    // ========================================================================

    fn index_entity(&mut self, entity: &Entity) {
        if let Some(parent) = entity.parent_id() {
            self.children
                .entry(parent.to_string())
                .or_default()
                .push(entity.id.clone());
        }
    }

    fn unindex_entity(&mut self, entity: &Entity) {
        if let Some(parent) = entity.parent_id() {
            if let Some(ids) = self.children.get_mut(parent) {
                ids.retain(|id| id != &entity.id);
            }
        }
    }

    fn index_relationship(&mut self, rel: &Relationship) {
        self.rel_by_source
            .entry(rel.source_entity_id.clone())
            .or_default()
            .push(rel.id.clone());
        self.rel_by_target
            .entry(rel.target_entity_id.clone())
            .or_default()
            .push(rel.id.clone());
    }

    fn unindex_relationship(&mut self, rel: &Relationship) {
        if let Some(ids) = self.rel_by_source.get_mut(&rel.source_entity_id) {
            ids.retain(|id| id != &rel.id);
        }
        if let Some(ids) = self.rel_by_target.get_mut(&rel.target_entity_id) {
            ids.retain(|id| id != &rel.id);
        }
    }

    // ========================================================================
    // Entity access
    // ========================================================================

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get_entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entity_order
            .iter()
            .filter_map(move |id| self.entities.get(id))
    }

    pub fn entities_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> + '_ {
        self.entities().filter(move |e| e.kind() == kind)
    }

    /// Direct children of an entity, in insertion order.
    pub fn children_of(&self, id: &str) -> Vec<&Entity> {
        self.children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.entities.get(c)).collect())
            .unwrap_or_default()
    }

    pub fn list_entities(&self, filter: &EntityFilter) -> Vec<Entity> {
        self.entities()
            .filter(|e| filter.matches(e))
            .skip(filter.offset)
            .take(filter.limit)
            .cloned()
            .collect()
    }

    // ========================================================================
    // Entity mutation
    // ========================================================================

    /// Check that a non-root entity points at an existing parent of the right kind.
    pub fn check_parent(&self, entity: &Entity) -> std::result::Result<(), RecordError> {
        let (Some(parent_id), Some(parent_kind)) = (entity.parent_id(), entity.kind().parent_kind())
        else {
            return Ok(());
        };
        match self.entities.get(parent_id) {
            None => Err(RecordError::reference(format!(
                "{} '{}' references missing {} '{}'",
                entity.kind(),
                entity.label,
                parent_kind,
                parent_id
            ))),
            Some(parent) if parent.kind() != parent_kind => Err(RecordError::reference(format!(
                "{} '{}' must belong to a {}, but '{}' is a {}",
                entity.kind(),
                entity.label,
                parent_kind,
                parent_id,
                parent.kind()
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Insert a new entity or replace the one with the same id.
    ///
    /// A replacement keeps the original `created_at` and may not change
    /// the entity kind.
    pub fn upsert_entity(&mut self, mut entity: Entity) -> std::result::Result<Upsert, RecordError> {
        entity.validate()?;
        self.check_parent(&entity)?;

        match self.entities.get(&entity.id) {
            Some(existing) => {
                if existing.kind() != entity.kind() {
                    return Err(RecordError::schema(format!(
                        "entity '{}' is a {} and cannot become a {}",
                        entity.id,
                        existing.kind(),
                        entity.kind()
                    )));
                }
                entity.created_at = existing.created_at;
                entity.updated_at = Utc::now();
                let previous = existing.clone();
                self.unindex_entity(&previous);
                self.index_entity(&entity);
                self.entities.insert(entity.id.clone(), entity);
                Ok(Upsert::Updated)
            }
            None => {
                self.index_entity(&entity);
                self.entity_order.push(entity.id.clone());
                self.entities.insert(entity.id.clone(), entity);
                Ok(Upsert::Inserted)
            }
        }
    }

    /// Insert an entity whose id must not exist yet.
    pub fn insert_entity(&mut self, entity: Entity) -> std::result::Result<(), RecordError> {
        if self.entities.contains_key(&entity.id) {
            return Err(RecordError::schema(format!(
                "entity id '{}' already exists",
                entity.id
            )));
        }
        self.upsert_entity(entity).map(|_| ())
    }

    /// Apply a partial update.
    pub fn update_entity(&mut self, id: &str, update: &EntityUpdate) -> Result<Entity> {
        update.validate()?;
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("Entity not found: {}", id)))?;
        update.apply_to(entity);
        Ok(entity.clone())
    }

    /// Delete an entity and every relationship touching it.
    ///
    /// Refuses while the entity still has children. Returns `false` when
    /// the id is unknown.
    pub fn delete_entity(&mut self, id: &str) -> Result<bool> {
        if !self.entities.contains_key(id) {
            return Ok(false);
        }
        let child_count = self.children.get(id).map_or(0, Vec::len);
        if child_count > 0 {
            return Err(StorageError::InvalidOperation(format!(
                "Entity {} still has {} child entities",
                id, child_count
            ))
            .into());
        }

        if let Some(entity) = self.entities.remove(id) {
            self.unindex_entity(&entity);
        }
        self.entity_order.retain(|e| e != id);
        self.children.remove(id);

        let source_rels = self.rel_by_source.get(id).cloned().unwrap_or_default();
        let target_rels = self.rel_by_target.get(id).cloned().unwrap_or_default();
        for rel_id in source_rels.into_iter().chain(target_rels) {
            self.delete_relationship(&rel_id);
        }
        Ok(true)
    }

    // ========================================================================
    // Relationships
    // ========================================================================

    pub fn get_relationship(&self, id: &str) -> Option<&Relationship> {
        self.relationships.get(id)
    }

    /// Relationships in insertion order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> + '_ {
        self.relationship_order
            .iter()
            .filter_map(move |id| self.relationships.get(id))
    }

    pub fn relationships_from(&self, entity_id: &str) -> Vec<&Relationship> {
        self.rel_by_source
            .get(entity_id)
            .map(|ids| ids.iter().filter_map(|r| self.relationships.get(r)).collect())
            .unwrap_or_default()
    }

    pub fn relationships_to(&self, entity_id: &str) -> Vec<&Relationship> {
        self.rel_by_target
            .get(entity_id)
            .map(|ids| ids.iter().filter_map(|r| self.relationships.get(r)).collect())
            .unwrap_or_default()
    }

    pub fn list_relationships(&self, filter: &RelationshipFilter) -> Vec<Relationship> {
        self.relationships()
            .filter(|r| filter.matches(r))
            .skip(filter.offset)
            .take(filter.limit)
            .cloned()
            .collect()
    }

    /// An existing relationship with the same source, type and target.
    pub fn find_edge(&self, rel: &Relationship) -> Option<&Relationship> {
        self.relationships_from(&rel.source_entity_id)
            .into_iter()
            .find(|existing| existing.is_same_edge(rel))
    }

    /// Validate and store a relationship.
    ///
    /// Endpoints must exist and differ. Identical edges are not stored twice.
    /// Structural types whose endpoint kinds do not match their domain and
    /// range are stored with a warning.
    pub fn add_relationship(&mut self, rel: Relationship) -> std::result::Result<Admission, RecordError> {
        rel.validate()?;
        if rel.source_entity_id == rel.target_entity_id {
            return Err(RecordError::reference(format!(
                "self-referencing {} on '{}'",
                rel.relationship_type, rel.source_entity_id
            )));
        }
        let source = self.entities.get(&rel.source_entity_id).ok_or_else(|| {
            RecordError::reference(format!(
                "source entity '{}' not found",
                rel.source_entity_id
            ))
        })?;
        let target = self.entities.get(&rel.target_entity_id).ok_or_else(|| {
            RecordError::reference(format!(
                "target entity '{}' not found",
                rel.target_entity_id
            ))
        })?;
        if let Some(existing) = self.find_edge(&rel) {
            return Ok(Admission::Duplicate {
                existing_id: existing.id.clone(),
            });
        }

        if self.relationships.contains_key(&rel.id) {
            return Err(RecordError::schema(format!(
                "relationship id '{}' already exists",
                rel.id
            )));
        }

        let mut warnings = Vec::new();
        if let Some((domain, range)) = rel.relationship_type.domain_range() {
            if source.kind() != domain || target.kind() != range {
                warnings.push(format!(
                    "{} expects {} -> {}, got {} -> {}",
                    rel.relationship_type,
                    domain,
                    range,
                    source.kind(),
                    target.kind()
                ));
            }
        }

        self.index_relationship(&rel);
        self.relationship_order.push(rel.id.clone());
        self.relationships.insert(rel.id.clone(), rel);
        Ok(Admission::Added { warnings })
    }

    /// Remove a relationship. Returns `false` when the id is unknown.
    pub fn delete_relationship(&mut self, id: &str) -> bool {
        match self.relationships.remove(id) {
            Some(rel) => {
                self.unindex_relationship(&rel);
                self.relationship_order.retain(|r| r != id);
                true
            }
            None => false,
        }
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        *self = OntologyGraph::default();
    }
}
