use super::{InputKind, ProfileDefinition};
use crate::constants::SOURCE_OPENFOODFACTS;
use crate::pipeline::ingestion::{DelimitedOptions, NoiseFilter, OcrRules};
use crate::pipeline::processing::normalize::{CategoryRule, CategoryRules, FieldMap, NormalizerConfig};
use crate::types::Category;

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// OpenFoodFacts product export.
///
/// Nutrient columns are per 100 g; the export's `serving_size` is free text
/// ("30 g") and usually falls back to 100.
pub fn config() -> NormalizerConfig {
    NormalizerConfig {
        source: SOURCE_OPENFOODFACTS.to_string(),
        fields: FieldMap {
            name: columns(&["product_name"]),
            localized_name: Vec::new(),
            classification: columns(&["categories_en", "categories"]),
            serving_size: columns(&["serving_size"]),
            energy: columns(&["energy-kcal_100g"]),
            protein: columns(&["proteins_100g"]),
            carbs: columns(&["carbohydrates_100g"]),
            fat: columns(&["fat_100g"]),
            fiber: columns(&["fiber_100g"]),
        },
        categories: CategoryRules {
            rules: vec![
                CategoryRule {
                    contains: columns(&["indian", "asia"]),
                    category: Category::Indian,
                },
                CategoryRule {
                    contains: columns(&["packaged"]),
                    category: Category::Packaged,
                },
            ],
            default: Category::Global,
        },
        ..NormalizerConfig::default()
    }
}

pub fn definition() -> ProfileDefinition {
    ProfileDefinition {
        input: InputKind::Delimited,
        normalizer: config(),
        delimited: DelimitedOptions {
            delimiter: None,
            // The export does not quote fields and contains stray quote characters
            quoting: false,
            name_columns: columns(&["product_name"]),
            noise: NoiseFilter::export_defaults(),
        },
        ocr: OcrRules::default(),
    }
}
