// Built-in source profiles: how each known input is extracted and mapped

pub mod ifct;
pub mod openfoodfacts;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::NormalizerConfig;
use crate::constants::{get_supported_profiles, PROFILE_IFCT_CSV, PROFILE_IFCT_OCR, PROFILE_OPENFOODFACTS};
use crate::pipeline::ingestion::{DelimitedOptions, OcrRules};

/// Shape of the raw input a profile reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Tab or comma separated file with a header row
    Delimited,
    /// One OCR'd table line per source unit
    OcrText,
}

/// Everything needed to turn one kind of input into records.
///
/// Only the extractor settings matching `input` are used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDefinition {
    pub input: InputKind,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub delimited: DelimitedOptions,
    #[serde(default)]
    pub ocr: OcrRules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    OpenFoodFacts,
    IfctCsv,
    IfctOcr,
}

impl Profile {
    pub fn all() -> [Profile; 3] {
        [Profile::OpenFoodFacts, Profile::IfctCsv, Profile::IfctOcr]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Profile::OpenFoodFacts => PROFILE_OPENFOODFACTS,
            Profile::IfctCsv => PROFILE_IFCT_CSV,
            Profile::IfctOcr => PROFILE_IFCT_OCR,
        }
    }

    pub fn definition(&self) -> ProfileDefinition {
        match self {
            Profile::OpenFoodFacts => openfoodfacts::definition(),
            Profile::IfctCsv => ifct::csv_definition(),
            Profile::IfctOcr => ifct::ocr_definition(),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Profile::all()
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown profile '{}', expected one of: {}",
                    s,
                    get_supported_profiles().join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_names_round_trip() {
        for profile in Profile::all() {
            assert_eq!(profile.name().parse::<Profile>().unwrap(), profile);
        }
        assert!("usda".parse::<Profile>().is_err());
    }

    #[test]
    fn test_builtin_definitions_are_valid() {
        for profile in Profile::all() {
            let definition = profile.definition();
            assert!(definition.normalizer.validate().is_ok(), "{} invalid", profile);
        }
        assert_eq!(Profile::IfctOcr.definition().input, InputKind::OcrText);
        assert_eq!(Profile::OpenFoodFacts.definition().input, InputKind::Delimited);
    }
}
