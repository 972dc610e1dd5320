use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{Extraction, NoiseFilter, SkipReason};
use crate::error::{Result, SeederError};
use crate::types::SourceRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    Tab,
    Comma,
}

impl Delimiter {
    pub fn as_byte(&self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Comma => b',',
        }
    }

    /// Pick a delimiter from the file extension, falling back to the header line.
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if ext.as_deref() == Some("tsv") {
            return Ok(Delimiter::Tab);
        }

        let mut first_line = Vec::new();
        BufReader::new(File::open(path)?).read_until(b'\n', &mut first_line)?;
        Ok(Self::sniff(&first_line))
    }

    /// The OpenFoodFacts export is tab separated despite its `.csv` name,
    /// so the header line decides.
    pub fn sniff(header_line: &[u8]) -> Self {
        let tabs = header_line.iter().filter(|b| **b == b'\t').count();
        let commas = header_line.iter().filter(|b| **b == b',').count();
        if tabs > 0 && tabs >= commas {
            Delimiter::Tab
        } else {
            Delimiter::Comma
        }
    }
}

impl FromStr for Delimiter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tab" | "\\t" | "tsv" => Ok(Delimiter::Tab),
            "comma" | "," | "csv" => Ok(Delimiter::Comma),
            other => Err(format!("unknown delimiter '{}', expected 'tab' or 'comma'", other)),
        }
    }
}

/// How a delimited file is read and which column identifies a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelimitedOptions {
    /// `None` means detect from the file
    pub delimiter: Option<Delimiter>,
    /// Honour double-quote quoting. The product export is unquoted.
    pub quoting: bool,
    /// Columns checked against the noise denylist
    pub name_columns: Vec<String>,
    pub noise: NoiseFilter,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            quoting: true,
            name_columns: vec!["name".to_string()],
            noise: NoiseFilter::default(),
        }
    }
}

/// Forward-only reader over a delimited file with a header row.
///
/// Consumed once per run; re-open the file to read it again.
pub struct DelimitedSource<R: Read> {
    reader: csv::Reader<R>,
    header: Arc<[String]>,
    name_columns: Vec<String>,
    noise: NoiseFilter,
    record: csv::ByteRecord,
    position: u64,
    finished: bool,
}

impl DelimitedSource<File> {
    /// Open a file for extraction. A missing or unreadable file is fatal.
    pub fn open(path: &Path, options: &DelimitedOptions) -> Result<Self> {
        if !path.exists() {
            return Err(SeederError::InputNotFound(path.display().to_string()));
        }
        let delimiter = match options.delimiter {
            Some(d) => d,
            None => Delimiter::detect(path)?,
        };
        debug!("Opening {} with {:?} delimiter", path.display(), delimiter);
        let file = File::open(path)?;
        Self::from_reader(file, delimiter, options)
    }
}

impl<R: Read> DelimitedSource<R> {
    pub fn from_reader(reader: R, delimiter: Delimiter, options: &DelimitedOptions) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter.as_byte())
            .has_headers(true)
            .flexible(true)
            .quoting(options.quoting)
            .from_reader(reader);

        let header: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();

        Ok(Self {
            reader,
            header: header.into(),
            name_columns: options.name_columns.clone(),
            noise: options.noise.clone(),
            record: csv::ByteRecord::new(),
            position: 0,
            finished: false,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    fn extract_current(&self) -> Extraction {
        let values: Vec<String> = self
            .record
            .iter()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .collect();
        let row = SourceRow::new(self.position, Arc::clone(&self.header), values);

        if row.is_blank() {
            return Extraction::Skip(SkipReason::EmptyRow);
        }

        if let Some(name) = row.first_present(&self.name_columns) {
            if self.noise.is_noise(name) {
                return Extraction::Skip(SkipReason::Noise);
            }
        }

        Extraction::Row(row)
    }
}

impl<R: Read> Iterator for DelimitedSource<R> {
    type Item = Extraction;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.reader.read_byte_record(&mut self.record) {
            Ok(true) => {
                self.position += 1;
                Some(self.extract_current())
            }
            Ok(false) => {
                self.finished = true;
                None
            }
            Err(e) if e.is_io_error() => {
                error!("Input read failed after {} rows: {}", self.position, e);
                self.finished = true;
                None
            }
            Err(e) => {
                self.position += 1;
                warn!("Malformed record at row {}: {}", self.position, e);
                Some(Extraction::Skip(SkipReason::Malformed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn options() -> DelimitedOptions {
        DelimitedOptions {
            delimiter: None,
            quoting: false,
            name_columns: vec!["product_name".to_string()],
            noise: NoiseFilter::export_defaults(),
        }
    }

    #[test]
    fn test_sniff_prefers_tabs_in_header() {
        assert_eq!(Delimiter::sniff(b"code\tproduct_name\tenergy-kcal_100g\n"), Delimiter::Tab);
        assert_eq!(Delimiter::sniff(b"name,calories,protein_g\n"), Delimiter::Comma);
    }

    #[test]
    fn test_reads_rows_with_shared_header() {
        let data = "product_name\tenergy-kcal_100g\tproteins_100g\nRice\t130\t2.7\nOil\t884\t0\n";
        let source = DelimitedSource::from_reader(data.as_bytes(), Delimiter::Tab, &options()).unwrap();
        assert_eq!(source.header(), &["product_name", "energy-kcal_100g", "proteins_100g"]);

        let units: Vec<Extraction> = source.collect();
        assert_eq!(units.len(), 2);
        match &units[0] {
            Extraction::Row(row) => {
                assert_eq!(row.position(), 1);
                assert_eq!(row.get("product_name"), Some("Rice"));
                assert_eq!(row.get("proteins_100g"), Some("2.7"));
            }
            other => panic!("expected row, got {:?}", other),
        }
    }

    #[test]
    fn test_skips_blank_rows_and_repeated_headers() {
        let data = "product_name\tenergy-kcal_100g\n\t\nproduct_name\tenergy-kcal_100g\nOats\t389\n";
        let source = DelimitedSource::from_reader(data.as_bytes(), Delimiter::Tab, &options()).unwrap();
        let units: Vec<Extraction> = source.collect();
        assert_eq!(
            units[..2],
            [Extraction::Skip(SkipReason::EmptyRow), Extraction::Skip(SkipReason::Noise)]
        );
        assert!(units[2].is_row());
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let data = "product_name\tenergy-kcal_100g\tproteins_100g\nBread\t265\n";
        let source = DelimitedSource::from_reader(data.as_bytes(), Delimiter::Tab, &options()).unwrap();
        let units: Vec<Extraction> = source.collect();
        let Extraction::Row(row) = &units[0] else {
            panic!("expected row");
        };
        assert_eq!(row.get("energy-kcal_100g"), Some("265"));
        assert_eq!(row.get("proteins_100g"), None);
    }

    #[test]
    fn test_invalid_utf8_is_replaced_not_rejected() {
        let mut data = b"product_name,energy-kcal_100g\n".to_vec();
        data.extend_from_slice(b"Caf\xe9 latte,42\n");
        let source = DelimitedSource::from_reader(&data[..], Delimiter::Comma, &options()).unwrap();
        let units: Vec<Extraction> = source.collect();
        let Extraction::Row(row) = &units[0] else {
            panic!("expected row");
        };
        assert_eq!(row.get("product_name"), Some("Caf\u{FFFD} latte"));
    }

    #[test]
    fn test_large_fields_are_read_whole() {
        let long_text = "x".repeat(200_000);
        let data = format!("product_name\tingredients_text\nSoup\t{}\n", long_text);
        let source = DelimitedSource::from_reader(data.as_bytes(), Delimiter::Tab, &options()).unwrap();
        let units: Vec<Extraction> = source.collect();
        let Extraction::Row(row) = &units[0] else {
            panic!("expected row");
        };
        assert_eq!(row.get("ingredients_text").map(|s| s.len()), Some(200_000));
    }

    #[test]
    fn test_open_detects_delimiter_from_header() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "product_name\tenergy-kcal_100g").unwrap();
        writeln!(file, "Rice\t130").unwrap();
        let source = DelimitedSource::open(file.path(), &options()).unwrap();
        assert_eq!(source.header().len(), 2);
    }

    #[test]
    fn test_open_missing_file_is_fatal() {
        let err = DelimitedSource::open(Path::new("/definitely/not/here.csv"), &options())
            .err()
            .expect("missing file must fail");
        assert!(matches!(err, SeederError::InputNotFound(_)));
    }
}
