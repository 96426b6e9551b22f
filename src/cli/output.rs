//! Output formatting for CLI commands.
//!
//! This module handles formatting output as either JSON or human-readable text.

use std::path::Path;

use anyhow::Result;
use mdo::{
    utils::preview, ConsistencyReport, EntityKind, ImportPreview, ImportResponse, LoadReport,
    NearDuplicate, OntologyStats, RelationshipSuggestion,
};
use serde::Serialize;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_messages(title: &str, messages: &[String]) {
    if messages.is_empty() {
        return;
    }
    println!("\n{} ({}):", title, messages.len());
    for message in messages {
        println!("  - {}", message);
    }
}

/// Print an import response.
pub fn print_import_response(response: &ImportResponse, json: bool) -> Result<()> {
    if json {
        return print_json(response);
    }

    let stats = &response.stats;
    println!("{}", response.message);
    println!(
        "Entities:      {} processed, {} imported, {} skipped",
        stats.entities_processed, stats.entities_imported, stats.entities_skipped
    );
    println!(
        "Relationships: {} processed, {} imported",
        stats.relationships_processed, stats.relationships_imported
    );
    print_messages("Errors", &stats.errors);
    print_messages("Warnings", &stats.warnings);
    Ok(())
}

/// Print a dry-run import and the entity-level diff.
pub fn print_import_preview(preview: &ImportPreview, json: bool) -> Result<()> {
    if json {
        return print_json(preview);
    }

    print_import_response(&preview.response, false)?;
    let Some(diff) = &preview.diff else {
        return Ok(());
    };
    println!(
        "
Entities: {} -> {} ({} added, {} removed, {} kept)",
        diff.before.total_entities,
        diff.after.total_entities,
        diff.added_entities.len(),
        diff.removed_entities.len(),
        diff.common_entities.len()
    );
    println!(
        "Relationships: {} -> {}",
        diff.before.total_relationships, diff.after.total_relationships
    );
    print_messages("Added", &diff.added_entities);
    print_messages("Removed", &diff.removed_entities);
    Ok(())
}

/// Print a candidate load report.
pub fn print_load_report(report: &LoadReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    println!(
        "Loaded {} records: {} created, {} merged, {} skipped",
        report.records_received,
        report.entities_created,
        report.records_merged,
        report.records_skipped
    );
    print_messages("Errors", &report.errors);
    print_messages("Warnings", &report.warnings);
    Ok(())
}

/// Print an export result.
pub fn print_export_result(path: &Path, nodes: usize, json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "path": path.display().to_string(),
            "nodes": nodes,
        }));
    }
    println!("Exported {} nodes to {}", nodes, path.display());
    Ok(())
}

/// Print ontology statistics.
pub fn print_stats(stats: &OntologyStats, json: bool) -> Result<()> {
    if json {
        return print_json(stats);
    }

    println!("Ontology Statistics");
    println!("{}", "=".repeat(40));
    println!("Entities:            {}", stats.total_entities);
    for kind in EntityKind::ALL {
        println!("  {:<18} {}", kind.plural(), stats.entity_counts.get(kind));
    }
    println!("Relationships:       {}", stats.total_relationships);
    for (name, count) in &stats.relationship_counts {
        println!("  {:<18} {}", name, count);
    }
    println!("Validation status:");
    for (name, count) in &stats.validation_status_counts {
        println!("  {:<18} {}", name, count);
    }
    println!("Avg confidence:      {:.3}", stats.average_confidence);
    println!(
        "Avg rel. confidence: {:.3}",
        stats.average_relationship_confidence
    );
    Ok(())
}

/// Print a consistency report.
pub fn print_consistency_report(report: &ConsistencyReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    if report.is_consistent {
        println!("Ontology is consistent");
    } else {
        println!("Ontology has {} problem(s)", report.error_count());
    }
    print_messages("Hierarchy errors", &report.hierarchy_errors);
    print_messages("Relationship errors", &report.relationship_errors);
    let cycles: Vec<String> = report.cycles.iter().map(|c| c.join(" -> ")).collect();
    print_messages("Cycles", &cycles);
    print_messages("Duplicate relationships", &report.duplicate_relationships);
    print_messages("General errors", &report.general_errors);
    print_messages("Warnings", &report.warnings);
    Ok(())
}

/// Print near-duplicate pairs.
pub fn print_duplicates(duplicates: &[NearDuplicate], threshold: f32, json: bool) -> Result<()> {
    if json {
        return print_json(duplicates);
    }

    if duplicates.is_empty() {
        println!("No possible duplicates at threshold {:.2}", threshold);
        return Ok(());
    }

    println!("{:<8} {:<12} {:<32} {:<32}", "SCORE", "KIND", "FIRST", "SECOND");
    println!("{}", "-".repeat(86));
    for dup in duplicates {
        println!(
            "{:<8.3} {:<12} {:<32} {:<32}",
            dup.similarity,
            dup.kind.as_str(),
            preview(&dup.first_label, 29),
            preview(&dup.second_label, 29)
        );
    }
    println!("\nTotal: {} pairs", duplicates.len());
    Ok(())
}

/// Print inferred relationships.
pub fn print_suggestions(suggestions: &[RelationshipSuggestion], json: bool) -> Result<()> {
    if json {
        return print_json(suggestions);
    }

    if suggestions.is_empty() {
        println!("No relationships to suggest");
        return Ok(());
    }
    for suggestion in suggestions {
        println!(
            "{} {} {} ({:.2})",
            suggestion.source_entity_id,
            suggestion.relationship_type,
            suggestion.target_entity_id,
            suggestion.confidence
        );
        println!("    {}", suggestion.reasoning);
    }
    println!("
Total: {} suggestions", suggestions.len());
    Ok(())
}

pub fn print_cleared(json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({ "cleared": true }));
    }
    println!("Ontology cleared");
    Ok(())
}
