use std::path::{Path, PathBuf};

use {
    chrono::Local,
    serde_json::{Value, json},
};

use crate::{ExportError, Result, ensure_dir, timestamped};

/// Writes records as `{exported_at, count, data}`.
pub struct JsonExporter {
    output_dir: PathBuf,
}

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn export(&self, records: &[Value], base: &str) -> Result<PathBuf> {
        ensure_dir(&self.output_dir)?;
        let path = timestamped(&self.output_dir, base, "json");
        let document = json!({
            "exported_at": Local::now().to_rfc3339(),
            "count": records.len(),
            "data": records,
        });
        let body = serde_json::to_string_pretty(&document)?;
        std::fs::write(&path, body).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(count = records.len(), path = %path.display(), "exported json");
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn document_carries_count_and_data() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![json!({"title": "Lamp"}), json!("Desk")];
        let path = JsonExporter::new(dir.path()).export(&records, "products").unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["count"], 2);
        assert_eq!(written["data"], json!(records));
        assert!(written["exported_at"].as_str().is_some_and(|s| !s.is_empty()));
    }
}
