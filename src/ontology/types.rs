//! Core types for the service ontology.
//!
//! An [`Entity`] carries the fields common to every level of the device
//! hierarchy and a tagged [`EntityDetails`] variant holding the
//! kind-specific attributes and the parent pointer. Relationships are typed,
//! directed edges between entity ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::RecordError;

// ============================================================================
// Entity Kinds
// ============================================================================

/// The four levels of the device hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    System,
    Subsystem,
    Component,
    SparePart,
}

impl EntityKind {
    /// All kinds, root first.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::System,
        EntityKind::Subsystem,
        EntityKind::Component,
        EntityKind::SparePart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::System => "system",
            EntityKind::Subsystem => "subsystem",
            EntityKind::Component => "component",
            EntityKind::SparePart => "spare_part",
        }
    }

    /// OWL class name used in `@type` and in entity URIs.
    pub fn owl_class(&self) -> &'static str {
        match self {
            EntityKind::System => "MechatronicSystem",
            EntityKind::Subsystem => "Subsystem",
            EntityKind::Component => "Component",
            EntityKind::SparePart => "SparePart",
        }
    }

    /// Inverse of [`EntityKind::owl_class`].
    pub fn from_owl_class(class: &str) -> Option<Self> {
        EntityKind::ALL.into_iter().find(|k| k.owl_class() == class)
    }

    /// Depth in the hierarchy, 0 for systems.
    pub fn level(&self) -> usize {
        match self {
            EntityKind::System => 0,
            EntityKind::Subsystem => 1,
            EntityKind::Component => 2,
            EntityKind::SparePart => 3,
        }
    }

    /// The kind a parent pointer of this kind must reference.
    pub fn parent_kind(&self) -> Option<EntityKind> {
        match self {
            EntityKind::System => None,
            EntityKind::Subsystem => Some(EntityKind::System),
            EntityKind::Component => Some(EntityKind::Subsystem),
            EntityKind::SparePart => Some(EntityKind::Component),
        }
    }

    /// Name of the parent-pointer field for this kind.
    pub fn parent_field(&self) -> Option<&'static str> {
        match self {
            EntityKind::System => None,
            EntityKind::Subsystem => Some("parent_system_id"),
            EntityKind::Component => Some("parent_subsystem_id"),
            EntityKind::SparePart => Some("parent_component_id"),
        }
    }

    /// Plural used for collection counts.
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::System => "systems",
            EntityKind::Subsystem => "subsystems",
            EntityKind::Component => "components",
            EntityKind::SparePart => "spare_parts",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "system" | "mechatronic_system" => Ok(EntityKind::System),
            "subsystem" => Ok(EntityKind::Subsystem),
            "component" => Ok(EntityKind::Component),
            "spare_part" | "sparepart" => Ok(EntityKind::SparePart),
            _ => Err(format!(
                "Unknown entity_type: '{}'. Valid options: system, subsystem, component, spare_part",
                s
            )),
        }
    }
}

// ============================================================================
// Closed enumerations
// ============================================================================

/// Types of medical device systems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemType {
    Linac,
    CtScanner,
    Mri,
    Ultrasound,
    Xray,
    /// Fallback for unknown or missing values.
    #[default]
    Generic,
}

impl SystemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemType::Linac => "linac",
            SystemType::CtScanner => "ct_scanner",
            SystemType::Mri => "mri",
            SystemType::Ultrasound => "ultrasound",
            SystemType::Xray => "xray",
            SystemType::Generic => "generic",
        }
    }
}

impl std::str::FromStr for SystemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linac" => Ok(SystemType::Linac),
            "ct_scanner" => Ok(SystemType::CtScanner),
            "mri" => Ok(SystemType::Mri),
            "ultrasound" => Ok(SystemType::Ultrasound),
            "xray" => Ok(SystemType::Xray),
            "generic" => Ok(SystemType::Generic),
            _ => Err(format!("Unknown system_type: '{}'", s)),
        }
    }
}

/// Types of subsystems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsystemType {
    BeamDelivery,
    PatientPositioning,
    Imaging,
    TreatmentControl,
    SafetyInterlock,
    Cooling,
    PowerSupply,
    Mechanical,
    Electrical,
    Software,
    Hydraulic,
    Pneumatic,
    /// Fallback for unknown or missing values.
    #[default]
    Other,
}

impl SubsystemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubsystemType::BeamDelivery => "beam_delivery",
            SubsystemType::PatientPositioning => "patient_positioning",
            SubsystemType::Imaging => "imaging",
            SubsystemType::TreatmentControl => "treatment_control",
            SubsystemType::SafetyInterlock => "safety_interlock",
            SubsystemType::Cooling => "cooling",
            SubsystemType::PowerSupply => "power_supply",
            SubsystemType::Mechanical => "mechanical",
            SubsystemType::Electrical => "electrical",
            SubsystemType::Software => "software",
            SubsystemType::Hydraulic => "hydraulic",
            SubsystemType::Pneumatic => "pneumatic",
            SubsystemType::Other => "other",
        }
    }
}

impl std::str::FromStr for SubsystemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beam_delivery" => Ok(SubsystemType::BeamDelivery),
            "patient_positioning" => Ok(SubsystemType::PatientPositioning),
            "imaging" => Ok(SubsystemType::Imaging),
            "treatment_control" => Ok(SubsystemType::TreatmentControl),
            "safety_interlock" => Ok(SubsystemType::SafetyInterlock),
            "cooling" => Ok(SubsystemType::Cooling),
            "power_supply" => Ok(SubsystemType::PowerSupply),
            "mechanical" => Ok(SubsystemType::Mechanical),
            "electrical" => Ok(SubsystemType::Electrical),
            "software" => Ok(SubsystemType::Software),
            "hydraulic" => Ok(SubsystemType::Hydraulic),
            "pneumatic" => Ok(SubsystemType::Pneumatic),
            "other" => Ok(SubsystemType::Other),
            _ => Err(format!("Unknown subsystem_type: '{}'", s)),
        }
    }
}

/// Review state of an entity or relationship.
///
/// The core stores and exposes this field; transitions are driven by the
/// review tooling around it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    #[default]
    NotValidated,
    PendingReview,
    Validated,
    Rejected,
    NeedsRevision,
    ConflictingReviews,
}

impl ValidationStatus {
    pub const ALL: [ValidationStatus; 6] = [
        ValidationStatus::NotValidated,
        ValidationStatus::PendingReview,
        ValidationStatus::Validated,
        ValidationStatus::Rejected,
        ValidationStatus::NeedsRevision,
        ValidationStatus::ConflictingReviews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::NotValidated => "not_validated",
            ValidationStatus::PendingReview => "pending_review",
            ValidationStatus::Validated => "validated",
            ValidationStatus::Rejected => "rejected",
            ValidationStatus::NeedsRevision => "needs_revision",
            ValidationStatus::ConflictingReviews => "conflicting_reviews",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ValidationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "not_validated" => Ok(ValidationStatus::NotValidated),
            "pending_review" => Ok(ValidationStatus::PendingReview),
            "validated" | "expert_approved" => Ok(ValidationStatus::Validated),
            "rejected" | "expert_rejected" => Ok(ValidationStatus::Rejected),
            "needs_revision" => Ok(ValidationStatus::NeedsRevision),
            "conflicting_reviews" => Ok(ValidationStatus::ConflictingReviews),
            _ => Err(format!("Unknown validation_status: '{}'", s)),
        }
    }
}

// ============================================================================
// Kind-specific details
// ============================================================================

/// Attributes of a top-level device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemDetails {
    pub system_type: SystemType,
    pub model_number: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub software_version: String,
    pub hardware_version: String,
}

impl SystemDetails {
    pub fn new(system_type: SystemType) -> Self {
        Self {
            system_type,
            ..Default::default()
        }
    }
}

/// Attributes of a functional subsystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsystemDetails {
    pub subsystem_type: SubsystemType,
    pub parent_system_id: String,
    pub model_number: String,
    pub manufacturer: String,
}

impl SubsystemDetails {
    pub fn new(subsystem_type: SubsystemType, parent_system_id: impl Into<String>) -> Self {
        Self {
            subsystem_type,
            parent_system_id: parent_system_id.into(),
            ..Default::default()
        }
    }
}

/// Attributes of an individual component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentDetails {
    /// Free-form; component vocabularies vary too much across manuals for an enum.
    pub component_type: String,
    pub parent_subsystem_id: String,
    pub part_number: String,
    pub manufacturer: String,
    pub model: String,
    pub lifecycle_status: String,
}

impl Default for ComponentDetails {
    fn default() -> Self {
        Self {
            component_type: String::new(),
            parent_subsystem_id: String::new(),
            part_number: String::new(),
            manufacturer: String::new(),
            model: String::new(),
            lifecycle_status: "active".to_string(),
        }
    }
}

impl ComponentDetails {
    pub fn new(component_type: impl Into<String>, parent_subsystem_id: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            parent_subsystem_id: parent_subsystem_id.into(),
            ..Default::default()
        }
    }
}

/// Attributes of a replaceable part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparePartDetails {
    pub parent_component_id: String,
    pub part_number: String,
    pub manufacturer: String,
    pub supplier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_cycle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_frequency: Option<String>,
    pub lifecycle_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_point: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_time: Option<String>,
}

impl Default for SparePartDetails {
    fn default() -> Self {
        Self {
            parent_component_id: String::new(),
            part_number: String::new(),
            manufacturer: String::new(),
            supplier: String::new(),
            maintenance_cycle: None,
            replacement_frequency: None,
            lifecycle_status: "available".to_string(),
            stock_level: None,
            reorder_point: None,
            lead_time: None,
        }
    }
}

impl SparePartDetails {
    pub fn new(parent_component_id: impl Into<String>, part_number: impl Into<String>) -> Self {
        Self {
            parent_component_id: parent_component_id.into(),
            part_number: part_number.into(),
            ..Default::default()
        }
    }

    /// True when stock is known and at or below the reorder point.
    pub fn needs_reorder(&self) -> bool {
        matches!((self.stock_level, self.reorder_point), (Some(stock), Some(point)) if stock <= point)
    }
}

/// Kind-specific half of an [`Entity`], tagged by `entity_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum EntityDetails {
    System(SystemDetails),
    Subsystem(SubsystemDetails),
    Component(ComponentDetails),
    SparePart(SparePartDetails),
}

impl EntityDetails {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityDetails::System(_) => EntityKind::System,
            EntityDetails::Subsystem(_) => EntityKind::Subsystem,
            EntityDetails::Component(_) => EntityKind::Component,
            EntityDetails::SparePart(_) => EntityKind::SparePart,
        }
    }

    /// The parent pointer, `None` for systems.
    pub fn parent_id(&self) -> Option<&str> {
        match self {
            EntityDetails::System(_) => None,
            EntityDetails::Subsystem(d) => Some(d.parent_system_id.as_str()),
            EntityDetails::Component(d) => Some(d.parent_subsystem_id.as_str()),
            EntityDetails::SparePart(d) => Some(d.parent_component_id.as_str()),
        }
    }

    fn parent_id_mut(&mut self) -> Option<&mut String> {
        match self {
            EntityDetails::System(_) => None,
            EntityDetails::Subsystem(d) => Some(&mut d.parent_system_id),
            EntityDetails::Component(d) => Some(&mut d.parent_subsystem_id),
            EntityDetails::SparePart(d) => Some(&mut d.parent_component_id),
        }
    }

    /// Component type for components, empty otherwise.
    pub fn component_type(&self) -> &str {
        match self {
            EntityDetails::Component(d) => &d.component_type,
            _ => "",
        }
    }
}

// ============================================================================
// Entity
// ============================================================================

/// A node of the service ontology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Globally unique identifier.
    pub id: String,
    /// Display label.
    pub label: String,
    #[serde(default)]
    pub description: String,
    /// Extraction certainty in [0.0, 1.0].
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub validation_status: ValidationStatus,
    /// Manual pages the entity was extracted from, sorted and unique.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_pages: Vec<u32>,
    /// Opaque reference to an image held by the asset store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Free-form provenance and review data.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: EntityDetails,
}

impl Entity {
    /// Create an entity with a fresh id.
    ///
    /// Fails when the label is blank or a non-root entity has no parent.
    pub fn new(label: impl Into<String>, details: EntityDetails) -> Result<Self, RecordError> {
        Self::with_id(uuid::Uuid::new_v4().to_string(), label, details)
    }

    /// Create an entity with a specific id.
    pub fn with_id(
        id: impl Into<String>,
        label: impl Into<String>,
        details: EntityDetails,
    ) -> Result<Self, RecordError> {
        let now = Utc::now();
        let entity = Self {
            id: id.into(),
            label: label.into(),
            description: String::new(),
            confidence: 0.0,
            validation_status: ValidationStatus::NotValidated,
            source_pages: Vec::new(),
            image_url: None,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            details,
        };
        entity.validate()?;
        Ok(entity)
    }

    /// Field-level checks shared by construction and graph admission.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.id.trim().is_empty() {
            return Err(RecordError::schema("entity id must not be empty"));
        }
        if self.label.trim().is_empty() {
            return Err(RecordError::schema("missing required 'label' or 'name' field"));
        }
        if let (Some(parent), Some(field)) = (self.parent_id(), self.kind().parent_field()) {
            if parent.trim().is_empty() {
                return Err(RecordError::schema(format!(
                    "{} '{}' is missing required '{}'",
                    self.kind(),
                    self.label,
                    field
                )));
            }
        }
        check_confidence(self.confidence)
    }

    pub fn kind(&self) -> EntityKind {
        self.details.kind()
    }

    /// The parent pointer, `None` for systems.
    pub fn parent_id(&self) -> Option<&str> {
        self.details.parent_id()
    }

    /// Point the entity at a different parent. No-op for systems.
    pub fn set_parent_id(&mut self, parent_id: impl Into<String>) {
        if let Some(slot) = self.details.parent_id_mut() {
            *slot = parent_id.into();
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the confidence score, clamped into [0.0, 1.0].
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_validation_status(mut self, status: ValidationStatus) -> Self {
        self.validation_status = status;
        self
    }

    /// Set the source pages; stored sorted with duplicates removed.
    pub fn with_source_pages(mut self, pages: impl IntoIterator<Item = u32>) -> Self {
        let mut pages: Vec<u32> = pages.into_iter().collect();
        pages.sort_unstable();
        pages.dedup();
        self.source_pages = pages;
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Case-insensitive substring match on the label.
    pub fn matches_query(&self, query: &str) -> bool {
        self.label.to_lowercase().contains(&query.to_lowercase())
    }
}

/// Create a top-level system.
pub fn create_system(label: impl Into<String>, details: SystemDetails) -> Result<Entity, RecordError> {
    Entity::new(label, EntityDetails::System(details))
}

/// Create a subsystem; `details.parent_system_id` is required.
pub fn create_subsystem(
    label: impl Into<String>,
    details: SubsystemDetails,
) -> Result<Entity, RecordError> {
    Entity::new(label, EntityDetails::Subsystem(details))
}

/// Create a component; `details.parent_subsystem_id` is required.
pub fn create_component(
    label: impl Into<String>,
    details: ComponentDetails,
) -> Result<Entity, RecordError> {
    Entity::new(label, EntityDetails::Component(details))
}

/// Create a spare part; `details.parent_component_id` is required.
pub fn create_spare_part(
    label: impl Into<String>,
    details: SparePartDetails,
) -> Result<Entity, RecordError> {
    Entity::new(label, EntityDetails::SparePart(details))
}

// ============================================================================
// Relationship Types
// ============================================================================

/// A directed, typed edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub source_entity_id: String,
    pub relationship_type: RelationType,
    pub target_entity_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_relationship_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub validation_status: ValidationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

fn default_relationship_confidence() -> f32 {
    1.0
}

impl Relationship {
    /// Create a new relationship between two entities.
    pub fn new(
        source_entity_id: impl Into<String>,
        relationship_type: RelationType,
        target_entity_id: impl Into<String>,
    ) -> Self {
        Self::with_id(
            uuid::Uuid::new_v4().to_string(),
            source_entity_id,
            relationship_type,
            target_entity_id,
        )
    }

    /// Create a new relationship with a specific ID.
    pub fn with_id(
        id: impl Into<String>,
        source_entity_id: impl Into<String>,
        relationship_type: RelationType,
        target_entity_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_entity_id: source_entity_id.into(),
            relationship_type,
            target_entity_id: target_entity_id.into(),
            description: String::new(),
            confidence: 1.0,
            validation_status: ValidationStatus::NotValidated,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the confidence score, clamped into [0.0, 1.0].
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        check_confidence(self.confidence)
    }

    /// Same source, type and target.
    pub fn is_same_edge(&self, other: &Relationship) -> bool {
        self.source_entity_id == other.source_entity_id
            && self.target_entity_id == other.target_entity_id
            && self.relationship_type == other.relationship_type
    }

    pub fn involves(&self, entity_id: &str) -> bool {
        self.source_entity_id == entity_id || self.target_entity_id == entity_id
    }
}

fn check_confidence(confidence: f32) -> Result<(), RecordError> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(RecordError::range(format!(
            "confidence {} outside [0.0, 1.0]",
            confidence
        )))
    }
}

/// Grouping of relationship types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationCategory {
    Causal,
    Spatial,
    Functional,
    Structural,
}

/// The closed set of relationship types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    // Causal
    Causes,
    Triggers,
    ResultsIn,
    LeadsTo,
    Prevents,

    // Spatial
    PartOf,
    Contains,
    AdjacentTo,
    ConnectedTo,
    LocatedIn,

    // Functional
    Controls,
    Monitors,
    Regulates,
    Operates,
    InterfacesWith,

    // Structural
    HasSubsystem,
    HasComponent,
    HasSparePart,
}

impl RelationType {
    pub const ALL: [RelationType; 18] = [
        RelationType::Causes,
        RelationType::Triggers,
        RelationType::ResultsIn,
        RelationType::LeadsTo,
        RelationType::Prevents,
        RelationType::PartOf,
        RelationType::Contains,
        RelationType::AdjacentTo,
        RelationType::ConnectedTo,
        RelationType::LocatedIn,
        RelationType::Controls,
        RelationType::Monitors,
        RelationType::Regulates,
        RelationType::Operates,
        RelationType::InterfacesWith,
        RelationType::HasSubsystem,
        RelationType::HasComponent,
        RelationType::HasSparePart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Causes => "causes",
            RelationType::Triggers => "triggers",
            RelationType::ResultsIn => "results_in",
            RelationType::LeadsTo => "leads_to",
            RelationType::Prevents => "prevents",
            RelationType::PartOf => "part_of",
            RelationType::Contains => "contains",
            RelationType::AdjacentTo => "adjacent_to",
            RelationType::ConnectedTo => "connected_to",
            RelationType::LocatedIn => "located_in",
            RelationType::Controls => "controls",
            RelationType::Monitors => "monitors",
            RelationType::Regulates => "regulates",
            RelationType::Operates => "operates",
            RelationType::InterfacesWith => "interfaces_with",
            RelationType::HasSubsystem => "has_subsystem",
            RelationType::HasComponent => "has_component",
            RelationType::HasSparePart => "has_spare_part",
        }
    }

    pub fn category(&self) -> RelationCategory {
        match self {
            RelationType::Causes
            | RelationType::Triggers
            | RelationType::ResultsIn
            | RelationType::LeadsTo
            | RelationType::Prevents => RelationCategory::Causal,
            RelationType::PartOf
            | RelationType::Contains
            | RelationType::AdjacentTo
            | RelationType::ConnectedTo
            | RelationType::LocatedIn => RelationCategory::Spatial,
            RelationType::Controls
            | RelationType::Monitors
            | RelationType::Regulates
            | RelationType::Operates
            | RelationType::InterfacesWith => RelationCategory::Functional,
            RelationType::HasSubsystem
            | RelationType::HasComponent
            | RelationType::HasSparePart => RelationCategory::Structural,
        }
    }

    /// Get the inverse relationship type, if applicable.
    pub fn inverse(&self) -> Option<RelationType> {
        match self {
            RelationType::PartOf => Some(RelationType::Contains),
            RelationType::Contains => Some(RelationType::PartOf),
            RelationType::AdjacentTo => Some(RelationType::AdjacentTo),
            RelationType::ConnectedTo => Some(RelationType::ConnectedTo),
            RelationType::InterfacesWith => Some(RelationType::InterfacesWith),
            RelationType::HasSubsystem | RelationType::HasComponent | RelationType::HasSparePart => {
                Some(RelationType::PartOf)
            }
            _ => None,
        }
    }

    pub fn is_symmetric(&self) -> bool {
        matches!(
            self,
            RelationType::AdjacentTo | RelationType::ConnectedTo | RelationType::InterfacesWith
        )
    }

    pub fn is_transitive(&self) -> bool {
        matches!(
            self,
            RelationType::PartOf
                | RelationType::Contains
                | RelationType::LocatedIn
                | RelationType::LeadsTo
        )
    }

    /// Edges that encode containment in the device hierarchy.
    pub fn is_hierarchical(&self) -> bool {
        matches!(
            self,
            RelationType::HasSubsystem
                | RelationType::HasComponent
                | RelationType::HasSparePart
                | RelationType::PartOf
        )
    }

    /// Required (source, target) kinds for structural types.
    pub fn domain_range(&self) -> Option<(EntityKind, EntityKind)> {
        match self {
            RelationType::HasSubsystem => Some((EntityKind::System, EntityKind::Subsystem)),
            RelationType::HasComponent => Some((EntityKind::Subsystem, EntityKind::Component)),
            RelationType::HasSparePart => Some((EntityKind::Component, EntityKind::SparePart)),
            _ => None,
        }
    }

    /// Human-readable label, e.g. "has spare part".
    pub fn display_name(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        RelationType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Unknown relationship_type: '{}'", s))
    }
}

// ============================================================================
// Query and Filter Types
// ============================================================================

/// Filter criteria for listing entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFilter {
    #[serde(default)]
    pub kinds: Vec<EntityKind>,
    /// Case-insensitive label substring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_status: Option<ValidationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    100
}

impl Default for EntityFilter {
    fn default() -> Self {
        Self {
            kinds: Vec::new(),
            label_pattern: None,
            min_confidence: None,
            validation_status: None,
            parent_id: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl EntityFilter {
    pub fn by_kinds(kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn by_label(pattern: impl Into<String>) -> Self {
        Self {
            label_pattern: Some(pattern.into()),
            ..Default::default()
        }
    }

    pub fn children_of(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: ValidationStatus) -> Self {
        self.validation_status = Some(status);
        self
    }

    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.min_confidence = Some(confidence);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Check if an entity matches this filter (ignores paging).
    pub fn matches(&self, entity: &Entity) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&entity.kind()) {
            return false;
        }
        if let Some(ref pattern) = self.label_pattern {
            if !entity.matches_query(pattern) {
                return false;
            }
        }
        if let Some(min_conf) = self.min_confidence {
            if entity.confidence < min_conf {
                return false;
            }
        }
        if let Some(status) = self.validation_status {
            if entity.validation_status != status {
                return false;
            }
        }
        if let Some(ref parent) = self.parent_id {
            if entity.parent_id() != Some(parent.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Filter criteria for listing relationships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipFilter {
    #[serde(default)]
    pub relationship_types: Vec<RelationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_entity_id: Option<String>,
    /// Either endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub involves_entity_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for RelationshipFilter {
    fn default() -> Self {
        Self {
            relationship_types: Vec::new(),
            source_entity_id: None,
            target_entity_id: None,
            involves_entity_id: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl RelationshipFilter {
    pub fn from_entity(entity_id: impl Into<String>) -> Self {
        Self {
            source_entity_id: Some(entity_id.into()),
            ..Default::default()
        }
    }

    pub fn to_entity(entity_id: impl Into<String>) -> Self {
        Self {
            target_entity_id: Some(entity_id.into()),
            ..Default::default()
        }
    }

    pub fn involving(entity_id: impl Into<String>) -> Self {
        Self {
            involves_entity_id: Some(entity_id.into()),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, relation_type: RelationType) -> Self {
        self.relationship_types.push(relation_type);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, rel: &Relationship) -> bool {
        if !self.relationship_types.is_empty()
            && !self.relationship_types.contains(&rel.relationship_type)
        {
            return false;
        }
        if let Some(ref src_id) = self.source_entity_id {
            if &rel.source_entity_id != src_id {
                return false;
            }
        }
        if let Some(ref tgt_id) = self.target_entity_id {
            if &rel.target_entity_id != tgt_id {
                return false;
            }
        }
        if let Some(ref inv_id) = self.involves_entity_id {
            if !rel.involves(inv_id) {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Update Types
// ============================================================================

/// Partial update applied by review tooling.
///
/// Parent pointers and the entity kind are not updatable here; moving an
/// entity in the hierarchy is a delete plus import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_status: Option<ValidationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub clear_image: bool,
    #[serde(default)]
    pub add_source_pages: Vec<u32>,
    #[serde(default)]
    pub set_metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub remove_metadata_keys: Vec<String>,
}

impl EntityUpdate {
    pub fn status(status: ValidationStatus) -> Self {
        Self {
            validation_status: Some(status),
            ..Default::default()
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn set_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.set_metadata.insert(key.into(), value);
        self
    }

    /// Check the update before applying it.
    pub fn validate(&self) -> Result<(), RecordError> {
        if let Some(ref label) = self.label {
            if label.trim().is_empty() {
                return Err(RecordError::schema("label must not be empty"));
            }
        }
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(RecordError::range(format!(
                    "confidence {} outside [0.0, 1.0]",
                    confidence
                )));
            }
        }
        Ok(())
    }

    /// Apply this update to an entity.
    pub fn apply_to(&self, entity: &mut Entity) {
        if let Some(ref label) = self.label {
            entity.label = label.clone();
        }
        if let Some(ref description) = self.description {
            entity.description = description.clone();
        }
        if let Some(confidence) = self.confidence {
            entity.confidence = confidence.clamp(0.0, 1.0);
        }
        if let Some(status) = self.validation_status {
            entity.validation_status = status;
        }
        if self.clear_image {
            entity.image_url = None;
        }
        if let Some(ref url) = self.image_url {
            entity.image_url = Some(url.clone());
        }
        if !self.add_source_pages.is_empty() {
            entity.source_pages.extend(self.add_source_pages.iter().copied());
            entity.source_pages.sort_unstable();
            entity.source_pages.dedup();
        }
        for (key, value) in &self.set_metadata {
            entity.metadata.insert(key.clone(), value.clone());
        }
        for key in &self.remove_metadata_keys {
            entity.metadata.remove(key);
        }
        entity.updated_at = Utc::now();
    }
}
