//! Report rendering and persistence for finished runs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::ValueEnum;
use serde_json::Value;
use tracing::info;

use research_core::RunReport;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Render a report in the requested format.
pub fn render(report: &RunReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).context("failed to render report as JSON")
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(report).context("failed to render report as YAML")
        }
        OutputFormat::Human => Ok(render_human(report)),
    }
}

fn render_human(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Research task: {}\n", report.plan.task_name));
    out.push_str(&format!("Query: {}\n", report.query));
    out.push_str(&format!(
        "Status: {} ({})\n",
        report.result.status.as_str(),
        report.result.rationale
    ));

    if report.result.records.is_empty() {
        out.push_str("\nNo records extracted.\n");
    } else {
        out.push_str(&format!("\nRecords ({}):\n", report.result.records.len()));
        for (index, record) in report.result.records.iter().enumerate() {
            let mut first = true;
            for name in report.plan.field_names() {
                let Some(value) = record.get(name) else {
                    continue;
                };
                if first {
                    out.push_str(&format!(
                        "{:>3}. {}: {}\n",
                        index + 1,
                        name,
                        display_value(value)
                    ));
                    first = false;
                } else {
                    out.push_str(&format!("     {}: {}\n", name, display_value(value)));
                }
            }
        }
    }

    if let Some(summary) = &report.search_summary {
        out.push_str(&format!("\nSearch summary: {summary}\n"));
    }
    if let Some(complete) = report.search_complete {
        out.push_str(&format!("Search complete: {complete}\n"));
    }
    let elapsed = report.finished_at - report.started_at;
    out.push_str(&format!(
        "Elapsed: {:.1}s\n",
        elapsed.num_milliseconds() as f64 / 1000.0
    ));
    out
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Derive a filesystem-safe stem from a task name.
fn sanitize_task_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let stem: String = cleaned.trim().replace(' ', "_").chars().take(30).collect();
    if stem.is_empty() {
        "research".to_string()
    } else {
        stem
    }
}

/// Persist the full report as JSON under `dir`.
///
/// File names follow `research_<task>_<YYYYmmdd_HHMMSS>.json`.
pub fn save_report(report: &RunReport, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create results directory {}", dir.display()))?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!(
        "research_{}_{stamp}.json",
        sanitize_task_name(&report.plan.task_name)
    );
    let path = dir.join(filename);
    let payload = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    fs::write(&path, payload)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    info!(path = %path.display(), "report saved");
    Ok(path)
}
