use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{MAX_NAME_BYTES, MIN_NAME_CHARS};

/// Why a candidate record was discarded during normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RejectReason {
    /// Name column absent, empty or whitespace
    MissingName,
    /// Name shorter than the configured minimum
    NameTooShort,
    /// Nothing in the row says this is food (policy per source)
    NoNutritionSignal,
    /// A value that clamping cannot make sensible (non-positive energy or serving)
    OutOfRange { field: &'static str },
}

impl RejectReason {
    /// Stable reason code used in logs and run summaries
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MissingName => "MISSING_NAME",
            RejectReason::NameTooShort => "NAME_TOO_SHORT",
            RejectReason::NoNutritionSignal => "NO_NUTRITION_SIGNAL",
            RejectReason::OutOfRange { .. } => "OUT_OF_RANGE",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::OutOfRange { field } => write!(f, "OUT_OF_RANGE({})", field),
            other => f.write_str(other.code()),
        }
    }
}

/// What counts as "this row carries nutrition data".
///
/// Each source picks one explicitly; the product export and the IFCT table
/// disagree on what a usable row looks like.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPolicy {
    /// Protein, carbs or fat is non-zero
    AnyMacro,
    /// Energy meets the threshold (kcal)
    MinEnergy(f64),
    AnyMacroOrMinEnergy(f64),
    AnyMacroAndMinEnergy(f64),
}

/// Macro and energy values a signal policy is evaluated against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NutritionSignal {
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
    pub energy_kcal: f64,
}

impl NutritionSignal {
    fn any_macro(&self) -> bool {
        self.protein_g > 0.0 || self.carbs_g > 0.0 || self.fats_g > 0.0
    }
}

/// Configuration for the record invariants enforced before a record exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGateConfig {
    pub min_name_chars: usize,
    pub max_name_bytes: usize,
    pub signal: SignalPolicy,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            min_name_chars: MIN_NAME_CHARS,
            max_name_bytes: MAX_NAME_BYTES,
            signal: SignalPolicy::AnyMacro,
        }
    }
}

/// Default gate: name rules plus the configured signal policy
#[derive(Debug, Clone, Default)]
pub struct DefaultQualityGate {
    pub config: QualityGateConfig,
}

impl DefaultQualityGate {
    pub fn with_config(config: QualityGateConfig) -> Self {
        Self { config }
    }

    /// Trim, check and truncate a raw name.
    pub fn validate_name(&self, raw: Option<&str>) -> Result<String, RejectReason> {
        let name = raw.map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(RejectReason::MissingName);
        }
        if name.chars().count() < self.config.min_name_chars {
            return Err(RejectReason::NameTooShort);
        }
        Ok(truncate_bytes(name, self.config.max_name_bytes).trim_end().to_string())
    }

    pub fn check_signal(&self, signal: &NutritionSignal) -> Result<(), RejectReason> {
        let ok = match self.config.signal {
            SignalPolicy::AnyMacro => signal.any_macro(),
            SignalPolicy::MinEnergy(t) => signal.energy_kcal >= t,
            SignalPolicy::AnyMacroOrMinEnergy(t) => signal.any_macro() || signal.energy_kcal >= t,
            SignalPolicy::AnyMacroAndMinEnergy(t) => signal.any_macro() && signal.energy_kcal >= t,
        };
        if ok {
            Ok(())
        } else {
            Err(RejectReason::NoNutritionSignal)
        }
    }
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary.
pub fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
