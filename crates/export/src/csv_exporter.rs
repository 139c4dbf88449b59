use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::{ExportError, Result, ensure_dir, timestamped};

const SCALAR_COLUMN: &str = "value";

/// Writes records as one CSV row each.
pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `<output_dir>/<base>_<timestamp>.csv`. The header is the sorted
    /// union of object keys, or `value` when no record is an object. Scalar
    /// records fill the first column. Returns `None` for empty input.
    pub fn export(&self, records: &[Value], base: &str) -> Result<Option<PathBuf>> {
        if records.is_empty() {
            tracing::warn!("no data to export");
            return Ok(None);
        }
        ensure_dir(&self.output_dir)?;
        let path = timestamped(&self.output_dir, base, "csv");

        let headers = headers(records);
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(&headers)?;
        for record in records {
            let row: Vec<String> = match record {
                Value::Object(map) => headers
                    .iter()
                    .map(|h| map.get(h).map(cell).unwrap_or_default())
                    .collect(),
                scalar => {
                    let mut row = vec![String::new(); headers.len()];
                    row[0] = cell(scalar);
                    row
                },
            };
            writer.write_record(&row)?;
        }
        writer.flush().map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!(rows = records.len(), path = %path.display(), "exported csv");
        Ok(Some(path))
    }
}

fn headers(records: &[Value]) -> Vec<String> {
    let keys: BTreeSet<&String> = records
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|map| map.keys())
        .collect();
    if keys.is_empty() {
        vec![SCALAR_COLUMN.to_string()]
    } else {
        keys.into_iter().cloned().collect()
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, serde_json::json};

    fn read(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn header_is_sorted_key_union() {
        let dir = tempfile::tempdir().unwrap();
        let path = CsvExporter::new(dir.path())
            .export(
                &[
                    json!({"title": "Lamp", "price": 20}),
                    json!({"title": "Desk, oak", "link": "https://shop.test/desk"}),
                    json!("stray"),
                ],
                "products",
            )
            .unwrap()
            .unwrap();

        assert_eq!(read(&path), vec![
            vec!["link", "price", "title"],
            vec!["", "20", "Lamp"],
            vec!["https://shop.test/desk", "", "Desk, oak"],
            vec!["stray", "", ""],
        ]);
    }

    #[test]
    fn scalars_use_value_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = CsvExporter::new(dir.path())
            .export(&[json!("a"), json!(2), json!(true)], "values")
            .unwrap()
            .unwrap();
        assert_eq!(read(&path), vec![
            vec!["value"],
            vec!["a"],
            vec!["2"],
            vec!["true"],
        ]);
    }

    #[test]
    fn empty_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path().join("out"));
        assert!(exporter.export(&[], "empty").unwrap().is_none());
        assert!(!exporter.output_dir().exists());
    }
}
