use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::error::{Result, SeederError};
use crate::types::NutritionRecord;

/// Every field a `NutritionRecord` serializes
pub const RECORD_FIELDS: [&str; 12] = [
    "name",
    "localized_name",
    "category",
    "serving_size_g",
    "calories_per_serving",
    "protein_g",
    "carbs_g",
    "fats_g",
    "fiber_g",
    "source",
    "is_custom",
    "user_id",
];

/// Columns of the app's `foods` table
const FOODS_COLUMNS: [&str; 9] = [
    "name",
    "calories_per_serving",
    "protein_g",
    "carbs_g",
    "fats_g",
    "serving_size_g",
    "category",
    "is_custom",
    "user_id",
];

/// Which record fields go to the remote table, and under what column names.
///
/// Every projected row carries the same keys; PostgREST bulk inserts require it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    /// Record fields to send, in order
    pub fields: Vec<String>,
    /// Record field -> remote column, for fields whose names differ
    pub rename: BTreeMap<String, String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            fields: FOODS_COLUMNS.iter().map(|s| s.to_string()).collect(),
            rename: BTreeMap::new(),
        }
    }
}

impl ColumnMapping {
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(SeederError::Config("supabase.columns.fields must not be empty".to_string()));
        }
        for field in self.fields.iter().chain(self.rename.keys()) {
            if !RECORD_FIELDS.contains(&field.as_str()) {
                return Err(SeederError::Config(format!(
                    "unknown record field '{}' in supabase.columns, expected one of: {}",
                    field,
                    RECORD_FIELDS.join(", ")
                )));
            }
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            let column = self.column(field);
            if column.trim().is_empty() {
                return Err(SeederError::Config(format!("empty column name for field '{}'", field)));
            }
            if !seen.insert(column) {
                return Err(SeederError::Config(format!("column '{}' is mapped twice", column)));
            }
        }
        Ok(())
    }

    /// Remote column name for a record field
    pub fn column<'a>(&'a self, field: &'a str) -> &'a str {
        self.rename.get(field).map(String::as_str).unwrap_or(field)
    }

    /// One JSON object per record holding only the mapped columns
    pub fn project(&self, records: &[NutritionRecord]) -> Result<Vec<Map<String, Value>>> {
        records
            .iter()
            .map(|record| -> Result<Map<String, Value>> {
                let Value::Object(mut full) = serde_json::to_value(record)? else {
                    return Err(SeederError::Config("record did not serialize to an object".to_string()));
                };
                Ok(self
                    .fields
                    .iter()
                    .map(|field| (self.column(field).to_string(), full.remove(field).unwrap_or(Value::Null)))
                    .collect())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    fn record(name: &str, localized: Option<&str>) -> NutritionRecord {
        NutritionRecord {
            name: name.to_string(),
            localized_name: localized.map(str::to_string),
            category: Category::Indian,
            serving_size_g: 100.0,
            calories_per_serving: 347,
            protein_g: 22.0,
            carbs_g: 60.0,
            fats_g: 1.5,
            fiber_g: 15.0,
            source: "IFCT2017".to_string(),
            is_custom: false,
            user_id: None,
        }
    }

    #[test]
    fn test_default_mapping_sends_foods_columns_only() {
        let rows = ColumnMapping::default().project(&[record("Moong dal", None)]).unwrap();
        let mut keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "calories_per_serving",
                "carbs_g",
                "category",
                "fats_g",
                "is_custom",
                "name",
                "protein_g",
                "serving_size_g",
                "user_id"
            ]
        );
        assert_eq!(rows[0]["category"], "indian");
        assert!(rows[0]["user_id"].is_null());
    }

    #[test]
    fn test_renamed_columns_keep_the_same_keys_on_every_row() {
        let mapping = ColumnMapping {
            fields: ["name", "localized_name", "fats_g", "fiber_g", "source"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rename: BTreeMap::from([
                ("localized_name".to_string(), "name_hindi".to_string()),
                ("fats_g".to_string(), "fat_g".to_string()),
            ]),
        };
        mapping.validate().unwrap();

        let rows = mapping
            .project(&[record("Moong dal", Some("मूंग दाल")), record("Rajma", None)])
            .unwrap();
        assert_eq!(rows[0]["name_hindi"], "मूंग दाल");
        assert!(rows[1]["name_hindi"].is_null());
        assert_eq!(rows[0]["fat_g"], 1.5);
        let keys: Vec<_> = rows.iter().map(|r| r.keys().cloned().collect::<Vec<_>>()).collect();
        assert_eq!(keys[0], keys[1]);
        assert!(!rows[0].contains_key("localized_name"));
    }

    #[test]
    fn test_validate_rejects_unknown_and_colliding_fields() {
        let unknown = ColumnMapping {
            fields: vec!["name".to_string(), "water_g".to_string()],
            ..ColumnMapping::default()
        };
        assert!(matches!(unknown.validate(), Err(SeederError::Config(_))));

        let colliding = ColumnMapping {
            fields: vec!["name".to_string(), "localized_name".to_string()],
            rename: BTreeMap::from([("localized_name".to_string(), "name".to_string())]),
        };
        assert!(colliding.validate().is_err());
        assert!(ColumnMapping::default().validate().is_ok());
    }
}
