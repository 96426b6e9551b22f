//! Configuration settings for the ontology core.

use crate::error::{ConfigError, RecordError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ontology: OntologyConfig,
    pub import: ImportConfig,
    pub storage: StorageConfig,
    pub dedup: DedupConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("mdo.toml"),
            PathBuf::from("config.toml"),
            dirs::config_dir()
                .map(|p| p.join("mdo/config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".mdo/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.as_os_str().is_empty() {
                continue;
            }
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let namespace = &self.ontology.namespace;
        if namespace.is_empty() {
            return Err(ConfigError::MissingField("ontology.namespace".to_string()).into());
        }
        if !(namespace.ends_with('/') || namespace.ends_with('#')) {
            return Err(ConfigError::Invalid(format!(
                "ontology.namespace must end with '/' or '#': {}",
                namespace
            ))
            .into());
        }
        if self.ontology.id.trim().is_empty() {
            return Err(ConfigError::MissingField("ontology.id".to_string()).into());
        }

        if !(0.0..=1.0).contains(&self.import.default_confidence) {
            return Err(ConfigError::Invalid(
                "import.default_confidence must be within [0.0, 1.0]".to_string(),
            )
            .into());
        }

        if !(0.0..=1.0).contains(&self.dedup.similarity_threshold) {
            return Err(ConfigError::Invalid(
                "dedup.similarity_threshold must be within [0.0, 1.0]".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Expand the data directory path.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let expanded = shellexpand::tilde(&self.storage.data_dir);
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

/// Identity of the exported ontology document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologyConfig {
    /// Ontology identifier, appended to the namespace for the root node.
    pub id: String,
    /// Human-readable label of the ontology.
    pub label: String,
    /// Free-form description.
    pub description: String,
    /// Value written to `owl:versionInfo`.
    pub version: String,
    /// Base URI for entity identifiers.
    pub namespace: String,
}

impl Default for OntologyConfig {
    fn default() -> Self {
        Self {
            id: "service_ontology".to_string(),
            label: "Medical Device Service Ontology".to_string(),
            description: String::new(),
            version: "1.0".to_string(),
            namespace: "http://medical-device-ontology.org/".to_string(),
        }
    }
}

/// Import behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Mode used when a request does not name one.
    pub default_mode: ImportMode,
    /// What to do with confidence values outside [0.0, 1.0].
    pub confidence_policy: ConfidencePolicy,
    /// Confidence given to records that carry none.
    pub default_confidence: f32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_mode: ImportMode::Merge,
            confidence_policy: ConfidencePolicy::Reject,
            default_confidence: 0.0,
        }
    }
}

/// How an import treats existing data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Update matching entities in place and add the rest.
    #[default]
    Merge,
    /// Discard everything and import from scratch.
    Replace,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Merge => "merge",
            ImportMode::Replace => "replace",
        }
    }
}

impl std::str::FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "merge" => Ok(ImportMode::Merge),
            "replace" => Ok(ImportMode::Replace),
            _ => Err(format!("Unknown import mode: '{}'. Valid options: merge, replace", s)),
        }
    }
}

/// Handling of confidence values outside [0.0, 1.0] at the import boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidencePolicy {
    /// Skip the record with a range error.
    #[default]
    Reject,
    /// Clamp into range and report a warning.
    Clamp,
}

impl ConfidencePolicy {
    /// Bring a raw confidence value into [0.0, 1.0].
    ///
    /// Returns the value and whether it was clamped. NaN is rejected under
    /// every policy.
    pub fn apply(&self, value: f64) -> std::result::Result<(f32, bool), RecordError> {
        if value.is_nan() {
            return Err(RecordError::range("confidence is NaN"));
        }
        if (0.0..=1.0).contains(&value) {
            return Ok((value as f32, false));
        }
        match self {
            ConfidencePolicy::Reject => Err(RecordError::range(format!(
                "confidence {} outside [0.0, 1.0]",
                value
            ))),
            ConfidencePolicy::Clamp => Ok((value.clamp(0.0, 1.0) as f32, true)),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `ontology.json` when persistence is on.
    pub data_dir: String,
    /// Persist the session after every mutation.
    pub persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.local/share/mdo".to_string(),
            persist: true,
        }
    }
}

/// Near-duplicate detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Minimum Jaro-Winkler label similarity reported as a possible duplicate.
    pub similarity_threshold: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.92,
        }
    }
}
