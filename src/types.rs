use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// One raw source unit after extraction: field names paired with their raw text,
/// in source column order.
///
/// Rows from the same delimited file share one header allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    position: u64,
    header: Arc<[String]>,
    values: Vec<String>,
}

impl SourceRow {
    pub fn new(position: u64, header: Arc<[String]>, values: Vec<String>) -> Self {
        Self {
            position,
            header,
            values,
        }
    }

    /// Build a row from explicit name/value pairs (OCR lines, tests).
    pub fn from_pairs<K, V, I>(position: u64, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let (names, values): (Vec<String>, Vec<String>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(position, names.into(), values)
    }

    /// 1-based position of the unit in its source (data row or text line).
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Raw value for a column, if the column exists in this row.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.header
            .iter()
            .position(|h| h == name)
            .and_then(|i| self.values.get(i))
            .map(|s| s.as_str())
    }

    /// First column in `candidates` holding non-blank text.
    pub fn first_present<'a>(&'a self, candidates: &[String]) -> Option<&'a str> {
        candidates
            .iter()
            .filter_map(|c| self.get(c))
            .find(|v| !v.trim().is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| v.trim().is_empty())
    }
}

/// Food category tag stored in the `foods.category` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Indian,
    Packaged,
    Global,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Indian => "indian",
            Category::Packaged => "packaged",
            Category::Global => "global",
        }
    }

    pub fn all() -> [Category; 3] {
        [Category::Indian, Category::Packaged, Category::Global]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "indian" => Ok(Category::Indian),
            "packaged" | "packed" => Ok(Category::Packaged),
            "global" => Ok(Category::Global),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

/// Canonical imported food. Field names match the remote `foods` columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionRecord {
    pub name: String,
    pub localized_name: Option<String>,
    pub category: Category,
    pub serving_size_g: f64,
    pub calories_per_serving: i32,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
    pub fiber_g: f64,
    pub source: String,
    pub is_custom: bool,
    pub user_id: Option<String>,
}

impl NutritionRecord {
    /// Value of a column used as a conflict key, rendered as text.
    pub fn key_value(&self, column: &str) -> Option<String> {
        match column {
            "name" => Some(self.name.clone()),
            "localized_name" => self.localized_name.clone(),
            "category" => Some(self.category.to_string()),
            "source" => Some(self.source.clone()),
            "calories_per_serving" => Some(self.calories_per_serving.to_string()),
            _ => None,
        }
    }
}
