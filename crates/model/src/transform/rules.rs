use crate::core::category::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_MIN_SCORE: f64 = 0.8;
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;
pub const DEFAULT_SAMPLE_WINDOW: usize = 20;

/// Trimmed, lowercased form used for every header and key comparison.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// How a category is recognised from a file's header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: Category,
    #[serde(default = "default_header_row")]
    pub header_row: usize,
    #[serde(default = "default_data_row")]
    pub data_row: usize,
    /// Lowercase substring a file name must contain; narrows filename ties.
    #[serde(default)]
    pub filename_pattern: Option<String>,
    pub required_keys: Vec<String>,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

impl CategoryRule {
    /// Returns a copy with keys and pattern normalised and duplicate keys removed.
    pub fn normalized(&self) -> Self {
        let mut keys: Vec<String> = Vec::with_capacity(self.required_keys.len());
        for key in self.required_keys.iter().map(|k| normalize_key(k)) {
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }

        Self {
            required_keys: keys,
            filename_pattern: self
                .filename_pattern
                .as_deref()
                .map(normalize_key)
                .filter(|p| !p.is_empty()),
            ..self.clone()
        }
    }
}

/// Reference data for content-sampled routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub category: Category,
    /// Lowercased identifier -> bucket (brand) name.
    pub reference: HashMap<String, String>,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    #[serde(default = "default_sample_window")]
    pub sample_window: usize,
    #[serde(default)]
    pub sample_column: usize,
}

impl ValidationRule {
    pub fn lookup(&self, raw: &str) -> Option<&str> {
        self.reference.get(&normalize_key(raw)).map(String::as_str)
    }

    pub fn knows_bucket(&self, bucket: &str) -> bool {
        self.reference
            .values()
            .any(|b| b.eq_ignore_ascii_case(bucket.trim()))
    }
}

/// Ordered output columns of a category's canonical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardSchema {
    pub category: Category,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnAction {
    /// Sum every source column whose header starts with the prefix.
    SumPrefix,
    /// Take the first source column (file order) whose header starts with the prefix.
    CoalescePrefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialColumnRule {
    pub category: Category,
    pub target_column: String,
    pub action: ColumnAction,
    pub prefix: String,
}

/// Optional per-category overrides of engine defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTuning {
    pub category: Category,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
}

fn default_header_row() -> usize {
    1
}

fn default_data_row() -> usize {
    2
}

fn default_min_score() -> f64 {
    DEFAULT_MIN_SCORE
}

fn default_match_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}

fn default_sample_window() -> usize {
    DEFAULT_SAMPLE_WINDOW
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::category::{Marketplace, ReportKind};

    #[test]
    fn normalized_rule_dedups_keys() {
        let rule = CategoryRule {
            category: Category::new(ReportKind::ProductInfo, Marketplace::Lazada),
            header_row: 1,
            data_row: 2,
            filename_pattern: Some("  Info ".into()),
            required_keys: vec!["SKU".into(), " sku".into(), "Nama Produk".into(), "".into()],
            min_score: 0.8,
        };
        let n = rule.normalized();
        assert_eq!(n.required_keys, vec!["sku", "nama produk"]);
        assert_eq!(n.filename_pattern.as_deref(), Some("info"));
    }

    #[test]
    fn rule_defaults_fill_from_json() {
        let rule: CategoryRule = serde_json::from_str(
            r#"{ "category": "ba dash sho", "required_keys": ["Pengunjung"] }"#,
        )
        .unwrap();
        assert_eq!(rule.header_row, 1);
        assert_eq!(rule.data_row, 2);
        assert_eq!(rule.min_score, DEFAULT_MIN_SCORE);

        let action: ColumnAction = serde_json::from_str("\"SUM_PREFIX\"").unwrap();
        assert_eq!(action, ColumnAction::SumPrefix);
    }
}
