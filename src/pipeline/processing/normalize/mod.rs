//! Mapping extracted rows onto the `foods` schema.
//!
//! A [`RecordNormalizer`] is driven entirely by a [`NormalizerConfig`]: which
//! columns feed which fields, per-field defaults and clamp ranges, the category
//! rules and the quality gate policy. The same row and config always produce the
//! same record or the same rejection.

pub mod normalizers;
pub mod registry;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_SERVING_SIZE_G, MAX_CALORIES, MIN_CALORIES};
use crate::pipeline::ingestion::{coerce_number, parse_number};
use crate::pipeline::processing::quality_gate::{
    DefaultQualityGate, NutritionSignal, QualityGateConfig, RejectReason,
};
use crate::types::{Category, NutritionRecord, SourceRow};

pub use registry::NormalizationRegistry;

/// Trait for turning an extracted row into a record, or a reason it is not one
pub trait Normalizer: Send + Sync {
    fn normalize(&self, row: &SourceRow) -> Result<NutritionRecord, RejectReason>;
}

/// Candidate source columns per target field. The first present, non-blank column wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub name: Vec<String>,
    pub localized_name: Vec<String>,
    pub classification: Vec<String>,
    pub serving_size: Vec<String>,
    pub energy: Vec<String>,
    pub protein: Vec<String>,
    pub carbs: Vec<String>,
    pub fat: Vec<String>,
    pub fiber: Vec<String>,
}

/// Default and clamp range for one numeric field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRule {
    pub default: f64,
    pub min: f64,
    pub max: f64,
    /// Reject the row instead of clamping when the coerced value is <= 0
    #[serde(default)]
    pub reject_non_positive: bool,
}

impl NumericRule {
    pub const fn new(default: f64, min: f64, max: f64) -> Self {
        Self {
            default,
            min,
            max,
            reject_non_positive: false,
        }
    }

    pub const fn rejecting_non_positive(mut self) -> Self {
        self.reject_non_positive = true;
        self
    }

    /// Snap into `[min, max]`. Idempotent.
    pub fn clamp(&self, value: f64) -> f64 {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    fn check_positive(&self, value: f64, field: &'static str) -> Result<(), RejectReason> {
        if self.reject_non_positive && value <= 0.0 {
            Err(RejectReason::OutOfRange { field })
        } else {
            Ok(())
        }
    }
}

/// One classification rule: any substring match selects the category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub contains: Vec<String>,
    pub category: Category,
}

/// Prioritized substring rules over the classification field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRules {
    pub rules: Vec<CategoryRule>,
    pub default: Category,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default: Category::Global,
        }
    }
}

impl CategoryRules {
    /// First matching rule wins; matching is case-insensitive.
    pub fn classify(&self, text: &str) -> Category {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| {
                rule.contains
                    .iter()
                    .any(|needle| !needle.is_empty() && lowered.contains(&needle.to_lowercase()))
            })
            .map(|rule| rule.category)
            .unwrap_or(self.default)
    }
}

/// Everything a [`RecordNormalizer`] needs to know about one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Provenance tag written to `foods.source`
    pub source: String,
    pub fields: FieldMap,
    pub serving_size: NumericRule,
    pub calories: NumericRule,
    pub protein: NumericRule,
    pub carbs: NumericRule,
    pub fat: NumericRule,
    pub fiber: NumericRule,
    /// Compute energy from macros when the energy column is absent or unparseable
    pub derive_energy: bool,
    pub categories: CategoryRules,
    pub quality: QualityGateConfig,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            fields: FieldMap::default(),
            serving_size: NumericRule::new(DEFAULT_SERVING_SIZE_G, 1.0, 1000.0).rejecting_non_positive(),
            calories: NumericRule::new(0.0, MIN_CALORIES, MAX_CALORIES).rejecting_non_positive(),
            protein: NumericRule::new(0.0, 0.0, 100.0),
            carbs: NumericRule::new(0.0, 0.0, 100.0),
            fat: NumericRule::new(0.0, 0.0, 100.0),
            fiber: NumericRule::new(0.0, 0.0, 50.0),
            derive_energy: true,
            categories: CategoryRules::default(),
            quality: QualityGateConfig::default(),
        }
    }
}

impl NormalizerConfig {
    /// Check clamp ranges are usable; returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        let rules = [
            ("serving_size", &self.serving_size),
            ("calories", &self.calories),
            ("protein", &self.protein),
            ("carbs", &self.carbs),
            ("fat", &self.fat),
            ("fiber", &self.fiber),
        ];
        for (field, rule) in rules {
            if !(rule.min.is_finite() && rule.max.is_finite() && rule.default.is_finite()) {
                return Err(format!("{} range must be finite", field));
            }
            if rule.min > rule.max {
                return Err(format!("{} min {} exceeds max {}", field, rule.min, rule.max));
            }
        }
        if self.fields.name.is_empty() {
            return Err("at least one name column is required".to_string());
        }
        if self.source.trim().is_empty() {
            return Err("source tag must not be empty".to_string());
        }
        Ok(())
    }
}

/// `protein*4 + carbs*4 + fat*9`, rounded to one decimal place.
pub fn derive_energy(protein_g: f64, carbs_g: f64, fats_g: f64) -> f64 {
    let kcal = protein_g * 4.0 + carbs_g * 4.0 + fats_g * 9.0;
    (kcal * 10.0).round() / 10.0
}

/// Config-driven normalizer shared by every source profile
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    config: NormalizerConfig,
    gate: DefaultQualityGate,
}

impl RecordNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        let gate = DefaultQualityGate::with_config(config.quality.clone());
        Self { config, gate }
    }

    fn number(&self, row: &SourceRow, columns: &[String]) -> Option<f64> {
        row.first_present(columns).and_then(parse_number)
    }

    fn clamped(&self, row: &SourceRow, columns: &[String], rule: &NumericRule) -> f64 {
        rule.clamp(coerce_number(row.first_present(columns), rule.default))
    }
}

impl Normalizer for RecordNormalizer {
    fn normalize(&self, row: &SourceRow) -> Result<NutritionRecord, RejectReason> {
        let cfg = &self.config;
        let fields = &cfg.fields;

        let name = self.gate.validate_name(row.first_present(&fields.name))?;

        let serving_size = self.number(row, &fields.serving_size).unwrap_or(cfg.serving_size.default);
        cfg.serving_size.check_positive(serving_size, "serving_size")?;

        let protein_g = self.clamped(row, &fields.protein, &cfg.protein);
        let carbs_g = self.clamped(row, &fields.carbs, &cfg.carbs);
        let fats_g = self.clamped(row, &fields.fat, &cfg.fat);
        let fiber_g = self.clamped(row, &fields.fiber, &cfg.fiber);

        let energy = match self.number(row, &fields.energy) {
            Some(kcal) => kcal,
            None if cfg.derive_energy => derive_energy(protein_g, carbs_g, fats_g),
            None => cfg.calories.default,
        };
        cfg.calories.check_positive(energy, "calories")?;

        self.gate.check_signal(&NutritionSignal {
            protein_g,
            carbs_g,
            fats_g,
            energy_kcal: energy,
        })?;

        let localized_name = row
            .first_present(&fields.localized_name)
            .map(|s| s.trim().to_string());
        let category = cfg
            .categories
            .classify(row.first_present(&fields.classification).unwrap_or_default());

        Ok(NutritionRecord {
            name,
            localized_name,
            category,
            serving_size_g: cfg.serving_size.clamp(serving_size),
            calories_per_serving: cfg.calories.clamp(energy).round() as i32,
            protein_g,
            carbs_g,
            fats_g,
            fiber_g,
            source: cfg.source.clone(),
            is_custom: false,
            user_id: None,
        })
    }
}
