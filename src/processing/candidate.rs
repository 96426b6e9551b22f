//! Candidate records produced by extraction.
//!
//! A candidate is an unreviewed fact about one entity. Every field is
//! optional; the identity-bearing subset is exposed as a [`RecordSignature`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ConfidencePolicy;
use crate::error::RecordError;
use crate::ontology::{
    ComponentDetails, Entity, EntityDetails, EntityKind, SparePartDetails, SubsystemDetails,
    SubsystemType, SystemDetails, SystemType,
};
use crate::processing::content_key::{content_key, RecordSignature};
use crate::utils::preview;

/// Component type given to entities built from error-code records.
pub const ERROR_CODE_COMPONENT_TYPE: &str = "Error Code";

/// Label length used when a record has only a description.
const DESCRIPTION_LABEL_CHARS: usize = 60;

/// One extracted record awaiting deduplication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Target entity kind; components when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(alias = "label", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Recommended action for error codes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(
        alias = "parent_system_id",
        alias = "parent_subsystem_id",
        alias = "parent_component_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsystem_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(alias = "confidence_score", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_page: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_pages: Vec<u32>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CandidateRecord {
    /// An error-code record.
    pub fn error_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// A named record.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_component_type(mut self, component_type: impl Into<String>) -> Self {
        self.component_type = Some(component_type.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_source_page(mut self, page: u32) -> Self {
        self.source_page = Some(page);
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Identity-bearing fields, in key precedence order.
    pub fn signature(&self) -> RecordSignature<'_> {
        match (self.code.as_deref(), self.message.as_deref()) {
            (Some(code), Some(message)) if !code.trim().is_empty() => {
                return RecordSignature::ErrorCode { code, message };
            }
            _ => {}
        }
        if let Some(name) = self.name.as_deref() {
            return RecordSignature::Named {
                name,
                component_type: self.component_type.as_deref().unwrap_or_default(),
            };
        }
        RecordSignature::Other {
            description: self.description.as_deref().unwrap_or_default(),
        }
    }

    /// Content key of this record.
    pub fn content_key(&self) -> String {
        content_key(&self.signature())
    }

    /// Every page mentioned by the record, sorted and unique.
    pub fn all_pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self
            .source_pages
            .iter()
            .copied()
            .chain(self.source_page)
            .collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    /// Entity kind this record converts to.
    ///
    /// Error codes are always components.
    pub fn target_kind(&self) -> Result<EntityKind, RecordError> {
        if matches!(self.signature(), RecordSignature::ErrorCode { .. }) {
            return Ok(EntityKind::Component);
        }
        match self.entity_type.as_deref() {
            None => Ok(EntityKind::Component),
            Some(s) => s.parse().map_err(RecordError::Schema),
        }
    }

    /// Convert to an entity.
    ///
    /// Returns the entity and any non-fatal warnings (enum fallbacks,
    /// clamped confidence).
    pub fn to_entity(
        &self,
        policy: ConfidencePolicy,
        default_confidence: f32,
    ) -> Result<(Entity, Vec<String>), RecordError> {
        let mut warnings = Vec::new();
        let kind = self.target_kind()?;
        let parent = self.parent_id.clone().unwrap_or_default();

        let (label, description) = match self.signature() {
            RecordSignature::ErrorCode { code, message } => {
                let description = self
                    .description
                    .clone()
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| message.trim().to_string());
                (format!("Error Code: {}", code.trim()), description)
            }
            RecordSignature::Named { name, .. } => {
                (name.trim().to_string(), self.description.clone().unwrap_or_default())
            }
            RecordSignature::Other { description } => (
                preview(description.trim(), DESCRIPTION_LABEL_CHARS),
                description.to_string(),
            ),
        };

        let details = match kind {
            EntityKind::System => {
                let mut details = SystemDetails::new(
                    self.parse_enum::<SystemType>(self.system_type.as_deref(), &mut warnings),
                );
                details.manufacturer = self.manufacturer.clone().unwrap_or_default();
                EntityDetails::System(details)
            }
            EntityKind::Subsystem => {
                let mut details = SubsystemDetails::new(
                    self.parse_enum::<SubsystemType>(self.subsystem_type.as_deref(), &mut warnings),
                    parent,
                );
                details.manufacturer = self.manufacturer.clone().unwrap_or_default();
                EntityDetails::Subsystem(details)
            }
            EntityKind::Component => {
                let component_type = if matches!(self.signature(), RecordSignature::ErrorCode { .. })
                {
                    ERROR_CODE_COMPONENT_TYPE.to_string()
                } else {
                    self.component_type.clone().unwrap_or_default()
                };
                let mut details = ComponentDetails::new(component_type, parent);
                details.part_number = self.part_number.clone().unwrap_or_default();
                details.manufacturer = self.manufacturer.clone().unwrap_or_default();
                EntityDetails::Component(details)
            }
            EntityKind::SparePart => {
                let mut details =
                    SparePartDetails::new(parent, self.part_number.clone().unwrap_or_default());
                details.manufacturer = self.manufacturer.clone().unwrap_or_default();
                EntityDetails::SparePart(details)
            }
        };

        let confidence = match self.confidence {
            Some(raw) => {
                let (value, clamped) = policy.apply(raw)?;
                if clamped {
                    warnings.push(format!("confidence {} clamped to {}", raw, value));
                }
                value
            }
            None => default_confidence,
        };

        let mut entity = match self.id.as_deref().filter(|id| !id.trim().is_empty()) {
            Some(id) => Entity::with_id(id, label, details)?,
            None => Entity::new(label, details)?,
        };
        entity = entity
            .with_description(description)
            .with_confidence(confidence)
            .with_source_pages(self.all_pages());
        entity.metadata = self.metadata.clone();
        if let Some(ref response) = self.response {
            entity
                .metadata
                .insert("response".into(), serde_json::json!(response));
        }
        if let RecordSignature::ErrorCode { code, message } = self.signature() {
            entity
                .metadata
                .insert("error_code".into(), serde_json::json!(code.trim()));
            entity
                .metadata
                .insert("error_message".into(), serde_json::json!(message.trim()));
        }

        Ok((entity, warnings))
    }

    fn parse_enum<T>(&self, raw: Option<&str>, warnings: &mut Vec<String>) -> T
    where
        T: std::str::FromStr<Err = String> + Default,
    {
        match raw {
            None => T::default(),
            Some(s) => s.parse().unwrap_or_else(|e: String| {
                warnings.push(format!("{}; using default", e));
                T::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_precedence() {
        let record = CandidateRecord::error_code("7002", "MOVEMENT").with_description("leaf");
        assert!(matches!(record.signature(), RecordSignature::ErrorCode { .. }));

        // blank code falls through to the name
        let record = CandidateRecord {
            code: Some("  ".into()),
            message: Some("MOVEMENT".into()),
            name: Some("MLC".into()),
            ..Default::default()
        };
        assert!(matches!(record.signature(), RecordSignature::Named { .. }));

        // code without message is not an error-code signature
        let record = CandidateRecord {
            code: Some("7002".into()),
            description: Some("Leaf stalled".into()),
            ..Default::default()
        };
        assert_eq!(record.content_key(), "other:leaf stalled");
    }

    #[test]
    fn test_serde_aliases() {
        let record: CandidateRecord = serde_json::from_str(
            r#"{"label": "MLC", "confidence_score": 0.8, "parent_subsystem_id": "sub-1"}"#,
        )
        .unwrap();
        assert_eq!(record.name.as_deref(), Some("MLC"));
        assert_eq!(record.confidence, Some(0.8));
        assert_eq!(record.parent_id.as_deref(), Some("sub-1"));
    }

    #[test]
    fn test_all_pages() {
        let record = CandidateRecord {
            source_page: Some(7),
            source_pages: vec![9, 3, 7],
            ..Default::default()
        };
        assert_eq!(record.all_pages(), vec![3, 7, 9]);
    }

    #[test]
    fn test_error_code_to_entity() {
        let record = CandidateRecord::error_code("7002", "MOVEMENT")
            .with_parent("sub-mlc")
            .with_confidence(0.9)
            .with_source_page(3);
        let (entity, warnings) = record.to_entity(ConfidencePolicy::Reject, 0.0).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(entity.kind(), EntityKind::Component);
        assert_eq!(entity.label, "Error Code: 7002");
        assert_eq!(entity.details.component_type(), ERROR_CODE_COMPONENT_TYPE);
        assert_eq!(entity.description, "MOVEMENT");
        assert_eq!(entity.parent_id(), Some("sub-mlc"));
        assert_eq!(entity.source_pages, vec![3]);
        assert_eq!(entity.metadata["error_code"], "7002");
    }

    #[test]
    fn test_to_entity_requires_parent() {
        let record = CandidateRecord::named("Leaf Drive Motor");
        assert!(matches!(
            record.to_entity(ConfidencePolicy::Reject, 0.0),
            Err(RecordError::Schema(_))
        ));
    }

    #[test]
    fn test_to_entity_enum_fallback_warns() {
        let record = CandidateRecord {
            name: Some("TrueBeam".into()),
            entity_type: Some("system".into()),
            system_type: Some("cyclotron".into()),
            ..Default::default()
        };
        let (entity, warnings) = record.to_entity(ConfidencePolicy::Reject, 0.5).unwrap();
        assert_eq!(
            entity.details,
            EntityDetails::System(SystemDetails::new(SystemType::Generic))
        );
        assert_eq!(entity.confidence, 0.5);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("cyclotron"));
    }

    #[test]
    fn test_to_entity_confidence_policy() {
        let record = CandidateRecord::named("MLC")
            .with_parent("sub-1")
            .with_confidence(1.4);
        assert!(matches!(
            record.to_entity(ConfidencePolicy::Reject, 0.0),
            Err(RecordError::Range(_))
        ));

        let (entity, warnings) = record.to_entity(ConfidencePolicy::Clamp, 0.0).unwrap();
        assert_eq!(entity.confidence, 1.0);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_unknown_entity_type_is_schema_error() {
        let record = CandidateRecord::named("Calibrate")
            .with_parent("x")
            .with_entity_type("procedure");
        assert!(matches!(record.target_kind(), Err(RecordError::Schema(_))));
    }
}
