use super::{InputKind, ProfileDefinition};
use crate::constants::{SOURCE_IFCT_CSV, SOURCE_IFCT_OCR};
use crate::pipeline::ingestion::{DelimitedOptions, NoiseFilter, OcrRules};
use crate::pipeline::processing::normalize::{CategoryRule, CategoryRules, FieldMap, NormalizerConfig};
use crate::types::Category;

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Cleaned IFCT 2017 CSV (one food per row, column names in `foods` style)
pub fn csv_config() -> NormalizerConfig {
    NormalizerConfig {
        source: SOURCE_IFCT_CSV.to_string(),
        fields: FieldMap {
            name: columns(&["name", "food_name"]),
            localized_name: columns(&["name_hindi", "localized_name"]),
            classification: columns(&["category"]),
            serving_size: columns(&["serving_size_g"]),
            energy: columns(&["calories", "calories_per_serving", "energy_kcal"]),
            protein: columns(&["protein_g", "protein"]),
            carbs: columns(&["carbs_g", "carbohydrates_g", "carbs"]),
            fat: columns(&["fats_g", "fat_g", "fat"]),
            fiber: columns(&["fiber_g", "fibre_g", "fiber"]),
        },
        categories: CategoryRules {
            rules: vec![
                CategoryRule {
                    contains: columns(&["packaged", "packed"]),
                    category: Category::Packaged,
                },
                CategoryRule {
                    contains: columns(&["global"]),
                    category: Category::Global,
                },
            ],
            default: Category::Indian,
        },
        ..NormalizerConfig::default()
    }
}

/// Lines extracted from the OCR'd IFCT table. Energy is never read reliably,
/// so it is derived from the macros.
pub fn ocr_config() -> NormalizerConfig {
    NormalizerConfig {
        source: SOURCE_IFCT_OCR.to_string(),
        fields: FieldMap {
            name: columns(&["name"]),
            energy: columns(&["energy"]),
            protein: columns(&["protein"]),
            carbs: columns(&["carbs"]),
            fat: columns(&["fat"]),
            fiber: columns(&["fiber"]),
            ..FieldMap::default()
        },
        derive_energy: true,
        categories: CategoryRules {
            rules: Vec::new(),
            default: Category::Indian,
        },
        ..NormalizerConfig::default()
    }
}

pub fn csv_definition() -> ProfileDefinition {
    ProfileDefinition {
        input: InputKind::Delimited,
        normalizer: csv_config(),
        delimited: DelimitedOptions {
            delimiter: None,
            quoting: true,
            name_columns: columns(&["name", "food_name"]),
            noise: NoiseFilter::new(["food name"]),
        },
        ocr: OcrRules::default(),
    }
}

pub fn ocr_definition() -> ProfileDefinition {
    ProfileDefinition {
        input: InputKind::OcrText,
        normalizer: ocr_config(),
        delimited: DelimitedOptions::default(),
        ocr: OcrRules::default(),
    }
}
