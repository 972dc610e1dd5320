// Pipeline ingestion: turning raw source units into named fields

pub mod delimited;
pub mod fields;
pub mod noise;
pub mod ocr;

use std::fmt;

use crate::types::SourceRow;

pub use delimited::{Delimiter, DelimitedOptions, DelimitedSource};
pub use fields::{coerce_number, parse_number};
pub use noise::NoiseFilter;
pub use ocr::{OcrLineExtractor, OcrRules, OcrTextSource};

/// Outcome of extracting one source unit.
///
/// Structurally unusable units are an expected part of every input, so they are
/// reported as a value rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Row(SourceRow),
    Skip(SkipReason),
}

impl Extraction {
    pub fn is_row(&self) -> bool {
        matches!(self, Extraction::Row(_))
    }
}

/// Why a source unit produced no row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    /// Every field was blank
    EmptyRow,
    /// Matched the noise denylist (repeated headers, scanner artifacts)
    Noise,
    /// The reader could not decode the record
    Malformed,
    /// OCR line below the minimum length
    TooShort,
    /// OCR line without a leading record identifier
    NoIdentifier,
    /// OCR name missing letters or too short
    InvalidName,
    /// OCR line without enough numeric columns
    TooFewValues,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::EmptyRow => "empty_row",
            SkipReason::Noise => "noise",
            SkipReason::Malformed => "malformed",
            SkipReason::TooShort => "too_short",
            SkipReason::NoIdentifier => "no_identifier",
            SkipReason::InvalidName => "invalid_name",
            SkipReason::TooFewValues => "too_few_values",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
