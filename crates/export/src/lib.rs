//! Writes collected run data to timestamped CSV and JSON files.

pub mod csv_exporter;
pub mod error;
pub mod json_exporter;

use std::path::{Path, PathBuf};

use {chrono::Local, serde_json::Value, wayfarer_executor::CollectedItem};

pub use {
    csv_exporter::CsvExporter,
    error::{ExportError, Result},
    json_exporter::JsonExporter,
};

const BASE_NAME_CHARS: usize = 30;

/// Files written by [`export_collected`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub csv: Option<PathBuf>,
    pub json: PathBuf,
}

/// Flattens collected items into one record list. List data is spliced in,
/// anything else is pushed as one record.
pub fn flatten_collected(items: &[CollectedItem]) -> Vec<Value> {
    let mut out = Vec::new();
    for item in items {
        match &item.data {
            Value::Array(values) => out.extend(values.iter().cloned()),
            Value::Null => {},
            other => out.push(other.clone()),
        }
    }
    out
}

/// File stem derived from a goal.
pub fn export_base_name(goal: &str) -> String {
    let name: String = goal
        .chars()
        .take(BASE_NAME_CHARS)
        .map(|c| if c == ' ' { '_' } else { c })
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        "export".into()
    } else {
        name
    }
}

/// Exports everything a run collected under `output_dir`. `Ok(None)` when
/// there is nothing to write.
pub fn export_collected(
    output_dir: &Path,
    items: &[CollectedItem],
    goal: &str,
) -> Result<Option<ExportPaths>> {
    let records = flatten_collected(items);
    if records.is_empty() {
        tracing::debug!("no collected data to export");
        return Ok(None);
    }
    let base = export_base_name(goal);
    let csv = CsvExporter::new(output_dir).export(&records, &base)?;
    let json = JsonExporter::new(output_dir).export(&records, &base)?;
    Ok(Some(ExportPaths { csv, json }))
}

fn timestamped(dir: &Path, base: &str, ext: &str) -> PathBuf {
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{base}_{ts}.{ext}"))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })
}
