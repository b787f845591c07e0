use clap::ValueEnum;
use serde_json::json;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use termtree::Tree;

use crate::batch::BatchOutcome;
use crate::error::DriftError;
use crate::report::{DriftKind, DriftReport};
use crate::terraform::StateEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "RESOURCE")]
    resource: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "ADDED")]
    added: usize,
    #[tabled(rename = "REMOVED")]
    removed: usize,
    #[tabled(rename = "MODIFIED")]
    modified: usize,
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "ADDRESS")]
    address: String,
    #[tabled(rename = "TYPE")]
    resource_type: String,
    #[tabled(rename = "ID")]
    id: String,
}

/// Renders batch results. Every resource appears once, either with its
/// report or with the error that prevented one.
pub fn render(outcome: &BatchOutcome, format: OutputFormat) -> Result<String, DriftError> {
    match format {
        OutputFormat::Text => Ok(render_text(outcome)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&document(outcome)?)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(&document(outcome)?)?),
    }
}

pub fn render_entries(entries: &[StateEntry]) -> String {
    if entries.is_empty() {
        return "No managed resources found.".to_string();
    }
    let rows = entries.iter().map(|e| EntryRow {
        address: e.address.clone(),
        resource_type: e.resource_type.clone(),
        id: e.id.clone(),
    });
    Table::new(rows).with(Style::sharp()).to_string()
}

/// Structured form shared by the JSON and YAML outputs, keyed by resource id.
fn document(outcome: &BatchOutcome) -> Result<serde_json::Value, DriftError> {
    let mut map = serde_json::Map::new();
    for (resource_id, result) in outcome {
        let value = match result {
            Ok(report) => serde_json::to_value(report)?,
            Err(error) => json!({
                "resource_id": resource_id,
                "error": error.to_string(),
            }),
        };
        map.insert(resource_id.clone(), value);
    }
    Ok(serde_json::Value::Object(map))
}

fn render_text(outcome: &BatchOutcome) -> String {
    if outcome.is_empty() {
        return "No resources to compare.".to_string();
    }

    let rows = outcome.iter().map(|(resource_id, result)| match result {
        Ok(report) => SummaryRow {
            resource: resource_id.clone(),
            status: (if report.has_drift() { "drifted" } else { "in sync" }).to_string(),
            added: report.count(DriftKind::Added),
            removed: report.count(DriftKind::Removed),
            modified: report.count(DriftKind::Modified),
        },
        Err(_) => SummaryRow {
            resource: resource_id.clone(),
            status: "error".to_string(),
            added: 0,
            removed: 0,
            modified: 0,
        },
    });

    let mut out = Table::new(rows).with(Style::sharp()).to_string();

    for (resource_id, result) in outcome {
        let tree = match result {
            Ok(report) if report.has_drift() => drift_tree(report),
            Ok(_) => continue,
            Err(error) => {
                Tree::new(resource_id.clone()).with_leaves([format!("error: {}", error)])
            }
        };
        out.push_str("\n\n");
        out.push_str(tree.to_string().trim_end());
    }

    out
}

fn drift_tree(report: &DriftReport) -> Tree<String> {
    let leaves = report.drifts().iter().map(|drift| {
        let location = if drift.path().is_root() {
            "(resource)".to_string()
        } else {
            drift.path().to_string()
        };
        Tree::new(format!("{} {}", drift.kind(), location))
            .with_leaves([drift.description().to_string()])
    });
    Tree::new(report.resource_id().to_string()).with_leaves(leaves)
}
