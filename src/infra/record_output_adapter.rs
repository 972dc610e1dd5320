use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::app::ports::RecordOutputPort;
use crate::error::{Result, SeederError};
use crate::types::NutritionRecord;

/// File-based implementation of RecordOutputPort.
/// The format follows the extension: `.csv`, or `.ndjson`/`.jsonl` for one JSON object per line.
pub enum FileRecordOutputAdapter {
    Csv(csv::Writer<File>),
    Ndjson(BufWriter<File>),
}

impl FileRecordOutputAdapter {
    pub fn create(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let adapter = match ext.as_str() {
            "csv" => FileRecordOutputAdapter::Csv(csv::Writer::from_path(path)?),
            "ndjson" | "jsonl" => FileRecordOutputAdapter::Ndjson(BufWriter::new(File::create(path)?)),
            other => {
                return Err(SeederError::Config(format!(
                    "unsupported output extension '{}', use .csv, .ndjson or .jsonl",
                    other
                )))
            }
        };
        info!("Writing extracted records to {}", path.display());
        Ok(adapter)
    }
}

impl RecordOutputPort for FileRecordOutputAdapter {
    fn write_record(&mut self, record: &NutritionRecord) -> Result<()> {
        match self {
            FileRecordOutputAdapter::Csv(writer) => writer.serialize(record)?,
            FileRecordOutputAdapter::Ndjson(writer) => {
                serde_json::to_writer(&mut *writer, record)?;
                writer.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self {
            FileRecordOutputAdapter::Csv(writer) => writer.flush()?,
            FileRecordOutputAdapter::Ndjson(writer) => writer.flush()?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use tempfile::tempdir;

    fn record() -> NutritionRecord {
        NutritionRecord {
            name: "Rice".to_string(),
            localized_name: Some("चावल".to_string()),
            category: Category::Indian,
            serving_size_g: 100.0,
            calories_per_serving: 130,
            protein_g: 2.7,
            carbs_g: 28.0,
            fats_g: 0.3,
            fiber_g: 0.4,
            source: "IFCT2017".to_string(),
            is_custom: false,
            user_id: None,
        }
    }

    #[test]
    fn test_csv_output_has_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("foods.csv");
        let mut out = FileRecordOutputAdapter::create(&path).unwrap();
        out.write_record(&record()).unwrap();
        out.finish().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("name,localized_name,category"));
        assert!(lines.next().unwrap().starts_with("Rice,चावल,indian,100.0,130"));
    }

    #[test]
    fn test_ndjson_output_one_object_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("foods.ndjson");
        let mut out = FileRecordOutputAdapter::create(&path).unwrap();
        out.write_record(&record()).unwrap();
        out.write_record(&record()).unwrap();
        out.finish().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let first: NutritionRecord = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first, record());
    }

    #[test]
    fn test_unknown_extension_is_config_error() {
        let dir = tempdir().unwrap();
        let err = FileRecordOutputAdapter::create(&dir.path().join("foods.xlsx")).err().unwrap();
        assert!(matches!(err, SeederError::Config(_)));
    }
}
