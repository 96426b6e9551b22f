//! CLI command handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mdo::{
    export::write_document, CandidateRecord, Config, EmbeddedOntologyStore, EntityKind,
    ExportOptions, ImportMode, ImportRequest, OntologyStore,
};
use serde::Deserialize;

use super::output;

/// Open the store described by the configuration.
async fn open_store(config: &Config) -> Result<EmbeddedOntologyStore> {
    let store = if config.storage.persist {
        let data_dir = config.data_dir()?;
        EmbeddedOntologyStore::with_persistence(&data_dir, config.import.clone()).await?
    } else {
        EmbeddedOntologyStore::new(config.import.clone())
    };
    Ok(store)
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Run the import command.
pub async fn run_import(
    config: Config,
    input: PathBuf,
    mode: Option<ImportMode>,
    validate_only: bool,
    json_output: bool,
) -> Result<()> {
    let store = open_store(&config).await?;
    let request = ImportRequest {
        data: read_json(&input)?,
        import_mode: mode,
        validate_only,
    };
    let response = store.import(request).await?;
    output::print_import_response(&response, json_output)
}

/// Run the diff command.
pub async fn run_diff(
    config: Config,
    input: PathBuf,
    mode: Option<ImportMode>,
    json_output: bool,
) -> Result<()> {
    let store = open_store(&config).await?;
    let request = ImportRequest {
        data: read_json(&input)?,
        import_mode: mode,
        validate_only: true,
    };
    let preview = store.preview_import(request).await?;
    output::print_import_preview(&preview, json_output)
}

/// Candidate files are either a bare array or `{"records": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateFile {
    Records(Vec<CandidateRecord>),
    Wrapped { records: Vec<CandidateRecord> },
}

/// Run the load command.
pub async fn run_load(config: Config, input: PathBuf, json_output: bool) -> Result<()> {
    let records = match serde_json::from_value(read_json(&input)?)
        .with_context(|| format!("{} is not a list of candidate records", input.display()))?
    {
        CandidateFile::Records(records) | CandidateFile::Wrapped { records } => records,
    };

    let store = open_store(&config).await?;
    let report = store.load_candidates(records).await?;
    output::print_load_report(&report, json_output)
}

/// Run the export command.
pub async fn run_export(
    config: Config,
    output_path: PathBuf,
    kinds: Vec<EntityKind>,
    no_relationships: bool,
    json_output: bool,
) -> Result<()> {
    let store = open_store(&config).await?;
    let mut options = ExportOptions::by_kinds(kinds);
    options.include_relationships = !no_relationships;

    let document = store.export_json_ld(&config.ontology, &options).await?;
    let nodes = write_document(&document, &output_path)?;
    output::print_export_result(&output_path, nodes, json_output)
}

/// Run the stats command.
pub async fn run_stats(config: Config, json_output: bool) -> Result<()> {
    let store = open_store(&config).await?;
    let stats = store.stats().await?;
    output::print_stats(&stats, json_output)
}

/// Run the validate command.
pub async fn run_validate(config: Config, json_output: bool) -> Result<()> {
    let store = open_store(&config).await?;
    let report = store.check_consistency().await?;
    output::print_consistency_report(&report, json_output)
}

/// Run the duplicates command.
pub async fn run_duplicates(config: Config, threshold: Option<f32>, json_output: bool) -> Result<()> {
    let store = open_store(&config).await?;
    let threshold = threshold.unwrap_or(config.dedup.similarity_threshold);
    let duplicates = store.find_duplicates(threshold).await?;
    output::print_duplicates(&duplicates, threshold, json_output)
}

/// Run the suggest command.
pub async fn run_suggest(config: Config, json_output: bool) -> Result<()> {
    let store = open_store(&config).await?;
    let suggestions = store.suggest_relationships().await?;
    output::print_suggestions(&suggestions, json_output)
}

/// Run the clear command.
pub async fn run_clear(config: Config, json_output: bool) -> Result<()> {
    let store = open_store(&config).await?;
    store.clear().await?;
    output::print_cleared(json_output)
}
