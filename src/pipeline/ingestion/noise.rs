use serde::{Deserialize, Serialize};

/// Case-insensitive substring denylist for non-data units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct NoiseFilter {
    patterns: Vec<String>,
}

impl NoiseFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    /// Repeated table headers and scanner artifacts seen in the IFCT 2017 OCR output.
    pub fn ifct_defaults() -> Self {
        Self::new([
            "water",
            "protcnt",
            "fatce",
            "food nam",
            "fibre",
            "energy",
            "pause",
            "cag to aru",
            "heredoc",
        ])
    }

    /// Header rows repeated inside concatenated product exports.
    pub fn export_defaults() -> Self {
        Self::new(["product_name"])
    }

    pub fn is_noise(&self, text: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        self.patterns.iter().any(|p| lowered.contains(p.as_str()))
    }
}

impl From<Vec<String>> for NoiseFilter {
    fn from(patterns: Vec<String>) -> Self {
        Self::new(patterns)
    }
}

impl From<NoiseFilter> for Vec<String> {
    fn from(filter: NoiseFilter) -> Self {
        filter.patterns
    }
}
