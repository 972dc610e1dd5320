use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use super::{Extraction, NoiseFilter, SkipReason};
use crate::error::{Result, SeederError};
use crate::types::SourceRow;

/// Leading food code ("A001", "C028") followed by the rest of the line.
pub const DEFAULT_RECORD_PATTERN: &str = r"^(?P<code>[A-Z]?\d{2,4})[.\s_-]+(?P<rest>.+)$";

/// Column placeholder meaning "this numeric position is not mapped".
pub const SKIP_COLUMN: &str = "_";

static NUMBER_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").expect("valid number regex"));
static TRAILING_PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\).*$").expect("valid parenthetical regex"));
static LONG_DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4,}").expect("valid digit-run regex"));

/// Matching rules for one OCR'd composition table.
///
/// `columns` names the numeric values that follow the food name, in order.
/// The IFCT layout is not reliable across pages, so the mapping is configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrRules {
    pub record_pattern: String,
    pub min_line_len: usize,
    pub min_values: usize,
    pub min_name_chars: usize,
    pub columns: Vec<String>,
    pub noise: NoiseFilter,
}

impl Default for OcrRules {
    fn default() -> Self {
        Self {
            record_pattern: DEFAULT_RECORD_PATTERN.to_string(),
            min_line_len: 15,
            min_values: 5,
            min_name_chars: 3,
            columns: ["water", "protein", "ash", "fat", "carbs", "fiber"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            noise: NoiseFilter::ifct_defaults(),
        }
    }
}

/// Turns OCR text lines into named fields: `code`, `name`, then one field per mapped column.
pub struct OcrLineExtractor {
    pattern: Regex,
    rules: OcrRules,
}

impl OcrLineExtractor {
    pub fn new(rules: OcrRules) -> Result<Self> {
        let pattern = Regex::new(&rules.record_pattern)?;
        let names: Vec<&str> = pattern.capture_names().flatten().collect();
        if !names.contains(&"code") || !names.contains(&"rest") {
            return Err(SeederError::Config(format!(
                "OCR record pattern must define named groups 'code' and 'rest': {}",
                rules.record_pattern
            )));
        }
        Ok(Self { pattern, rules })
    }

    pub fn extract(&self, position: u64, line: &str) -> Extraction {
        let line = line.trim();
        if line.chars().count() < self.rules.min_line_len {
            return Extraction::Skip(SkipReason::TooShort);
        }
        if self.rules.noise.is_noise(line) {
            return Extraction::Skip(SkipReason::Noise);
        }

        let Some(caps) = self.pattern.captures(line) else {
            return Extraction::Skip(SkipReason::NoIdentifier);
        };
        let code = caps.name("code").map(|m| m.as_str()).unwrap_or_default();
        let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or_default();

        let (raw_name, numeric_part) = split_name(rest);
        let name = clean_name(raw_name);
        if name.chars().count() < self.rules.min_name_chars || !name.chars().any(|c| c.is_ascii_alphabetic()) {
            return Extraction::Skip(SkipReason::InvalidName);
        }

        let values: Vec<&str> = NUMBER_TOKEN.find_iter(numeric_part).map(|m| m.as_str()).collect();
        if values.len() < self.rules.min_values {
            return Extraction::Skip(SkipReason::TooFewValues);
        }

        let mut pairs: Vec<(String, String)> = vec![
            ("code".to_string(), code.to_string()),
            ("name".to_string(), name),
        ];
        for (column, value) in self.rules.columns.iter().zip(values.iter()) {
            if column != SKIP_COLUMN {
                pairs.push((column.clone(), value.to_string()));
            }
        }

        Extraction::Row(SourceRow::from_pairs(position, pairs))
    }

    /// Extract every line of an iterator, numbering lines from 1.
    pub fn extract_lines<I>(self, lines: I) -> impl Iterator<Item = Extraction>
    where
        I: IntoIterator<Item = String>,
    {
        lines
            .into_iter()
            .enumerate()
            .map(move |(i, line)| self.extract(i as u64 + 1, &line))
    }
}

/// The name runs until the first token that starts a number ("82.1", "-", "-0.4").
fn split_name(rest: &str) -> (&str, &str) {
    let mut offset = 0;
    for token in rest.split_whitespace() {
        let start = rest[offset..].find(token).map(|i| i + offset).unwrap_or(offset);
        let first = token.chars().next().unwrap_or(' ');
        if first.is_ascii_digit() || first == '-' {
            return (&rest[..start], &rest[start..]);
        }
        offset = start + token.len();
    }
    (rest, "")
}

/// Drop the scientific name, long digit runs from OCR bleed, and extra whitespace.
fn clean_name(raw: &str) -> String {
    let without_parens = TRAILING_PARENTHETICAL.replace(raw, "");
    let without_digits = LONG_DIGIT_RUN.replace_all(&without_parens, "");
    without_digits
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == ',' || c == '.' || c == '-')
        .to_string()
}

/// Line source over an OCR text file. Undecodable bytes are replaced, form feeds
/// between pages are treated as whitespace.
pub struct OcrTextSource {
    reader: BufReader<File>,
    buf: Vec<u8>,
}

impl OcrTextSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SeederError::InputNotFound(path.display().to_string()));
        }
        debug!("Opening OCR text {}", path.display());
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            buf: Vec::new(),
        })
    }
}

impl Iterator for OcrTextSource {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => Some(String::from_utf8_lossy(&self.buf).trim().to_string()),
            Err(e) => {
                tracing::error!("OCR text read failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn extractor() -> OcrLineExtractor {
        OcrLineExtractor::new(OcrRules::default()).unwrap()
    }

    #[test]
    fn test_extracts_code_name_and_mapped_columns() {
        let line = "C028 Parsley (Petroselinum crispum) 82.12 5.18 2.49 0.98 8.01 4.34";
        let Extraction::Row(row) = extractor().extract(7, line) else {
            panic!("expected a row");
        };
        assert_eq!(row.position(), 7);
        assert_eq!(row.get("code"), Some("C028"));
        assert_eq!(row.get("name"), Some("Parsley"));
        assert_eq!(row.get("water"), Some("82.12"));
        assert_eq!(row.get("protein"), Some("5.18"));
        assert_eq!(row.get("fat"), Some("0.98"));
        assert_eq!(row.get("carbs"), Some("8.01"));
        assert_eq!(row.get("fiber"), Some("4.34"));
    }

    #[test]
    fn test_skip_column_placeholder_is_not_emitted() {
        let rules = OcrRules {
            columns: vec!["_".into(), "protein".into(), "_".into(), "fat".into()],
            ..OcrRules::default()
        };
        let extractor = OcrLineExtractor::new(rules).unwrap();
        let Extraction::Row(row) = extractor.extract(1, "A001 Amaranth seed 9.89 14.59 2.78 5.74 61.46") else {
            panic!("expected a row");
        };
        assert_eq!(row.get("protein"), Some("14.59"));
        assert_eq!(row.get("fat"), Some("5.74"));
        assert_eq!(row.get("_"), None);
    }

    #[test]
    fn test_header_lines_are_noise() {
        let line = "Code Food Name          WATER  PROTCNT  ASH  FATCE";
        assert_eq!(extractor().extract(1, line), Extraction::Skip(SkipReason::Noise));
    }

    #[test]
    fn test_short_and_unidentified_lines_are_skipped() {
        assert_eq!(extractor().extract(1, "A001 Rice"), Extraction::Skip(SkipReason::TooShort));
        assert_eq!(
            extractor().extract(2, "Indian Food Composition Tables 2017"),
            Extraction::Skip(SkipReason::NoIdentifier)
        );
    }

    #[test]
    fn test_name_without_letters_is_invalid() {
        assert_eq!(
            extractor().extract(1, "B012 -- 11.2 3.4 5.6 7.8 9.0 1.2"),
            Extraction::Skip(SkipReason::InvalidName)
        );
    }

    #[test]
    fn test_too_few_values() {
        assert_eq!(
            extractor().extract(1, "D001 Ash gourd pulp 96.0 0.4"),
            Extraction::Skip(SkipReason::TooFewValues)
        );
    }

    #[test]
    fn test_long_digit_runs_are_removed_from_names() {
        assert_eq!(clean_name("Bajra 20170  whole"), "Bajra whole");
    }

    #[test]
    fn test_pattern_without_named_groups_is_rejected() {
        let rules = OcrRules {
            record_pattern: r"^(\d+)\s+(.+)$".to_string(),
            ..OcrRules::default()
        };
        assert!(matches!(OcrLineExtractor::new(rules), Err(SeederError::Config(_))));
    }

    #[test]
    fn test_text_source_numbers_lines_in_order() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Page 1 header").unwrap();
        write!(file, "\x0cA001 Amaranth seed 9.89 14.59 2.78 5.74 61.46\n").unwrap();
        let source = OcrTextSource::open(file.path()).unwrap();
        let units: Vec<Extraction> = extractor().extract_lines(source).collect();
        assert_eq!(units.len(), 2);
        assert!(!units[0].is_row());
        let Extraction::Row(row) = &units[1] else {
            panic!("expected a row");
        };
        assert_eq!(row.position(), 2);
        assert_eq!(row.get("name"), Some("Amaranth seed"));
    }
}
