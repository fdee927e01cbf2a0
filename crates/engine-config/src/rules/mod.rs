use crate::{error::RuleStoreError, validation::validator::RuleValidator};
use model::{
    core::category::Category,
    transform::rules::{
        CategoryRule, CategoryTuning, SpecialColumnRule, StandardSchema, ValidationRule,
        normalize_key,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod source;

/// On-disk layout of the rule store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDocument {
    #[serde(default)]
    pub categories: Vec<CategoryRule>,
    #[serde(default)]
    pub validation: Vec<ValidationRule>,
    #[serde(default)]
    pub schemas: Vec<StandardSchema>,
    #[serde(default)]
    pub special_columns: Vec<SpecialColumnRule>,
    #[serde(default)]
    pub tuning: Vec<CategoryTuning>,
}

/// Immutable, validated view of the rule store taken at one point in time.
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    version: String,
    /// Normalised category rules in declaration order.
    rules: Vec<CategoryRule>,
    validation: HashMap<Category, ValidationRule>,
    schemas: HashMap<Category, StandardSchema>,
    special: HashMap<Category, Vec<SpecialColumnRule>>,
    tuning: HashMap<Category, CategoryTuning>,
}

impl RuleSnapshot {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RuleStoreError> {
        let doc: RuleDocument = serde_json::from_slice(bytes)?;
        let version = format!("{:x}", md5::compute(bytes));
        Self::from_document(doc, version)
    }

    pub fn from_document(doc: RuleDocument, version: String) -> Result<Self, RuleStoreError> {
        let findings = RuleValidator::new(&doc).validate();
        if !findings.is_empty() {
            return Err(RuleStoreError::Invalid(findings));
        }

        let rules = doc.categories.iter().map(CategoryRule::normalized).collect();

        let validation = doc
            .validation
            .into_iter()
            .map(|mut rule| {
                rule.reference = rule
                    .reference
                    .into_iter()
                    .map(|(id, bucket)| (normalize_key(&id), bucket.trim().to_string()))
                    .collect();
                (rule.category, rule)
            })
            .collect();

        let schemas = doc
            .schemas
            .into_iter()
            .map(|s| (s.category, s))
            .collect();

        let mut special: HashMap<Category, Vec<SpecialColumnRule>> = HashMap::new();
        for mut rule in doc.special_columns {
            rule.prefix = normalize_key(&rule.prefix);
            special.entry(rule.category).or_default().push(rule);
        }

        let tuning = doc.tuning.into_iter().map(|t| (t.category, t)).collect();

        Ok(Self {
            version,
            rules,
            validation,
            schemas,
            special,
            tuning,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn rule(&self, category: Category) -> Option<&CategoryRule> {
        self.rules.iter().find(|r| r.category == category)
    }

    pub fn validation(&self, category: Category) -> Option<&ValidationRule> {
        self.validation.get(&category)
    }

    pub fn schema(&self, category: Category) -> Result<&StandardSchema, RuleStoreError> {
        self.schemas
            .get(&category)
            .ok_or(RuleStoreError::MissingSchema(category))
    }

    pub fn special_columns(&self, category: Category) -> &[SpecialColumnRule] {
        self.special
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn tuning(&self, category: Category) -> Option<&CategoryTuning> {
        self.tuning.get(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::finding::{CODE_EMPTY_KEYS, CODE_MISSING_SCHEMA, CODE_UNKNOWN_COLUMN};

    const DOC: &str = r#"{
        "categories": [
            { "category": "ba produk sho", "required_keys": ["Kode Produk", "Produk"], "header_row": 1, "data_row": 2 }
        ],
        "validation": [
            { "category": "BA Produk SHO", "reference": { " 123 ": "GS" }, "match_threshold": 0.5 }
        ],
        "schemas": [
            { "category": "BA Produk SHO", "columns": ["Kode Produk", "Produk", "Total Qty"] }
        ],
        "special_columns": [
            { "category": "BA Produk SHO", "target_column": "total qty", "action": "SUM_PREFIX", "prefix": "Qty" }
        ]
    }"#;

    #[test]
    fn loads_and_normalises() {
        let snap = RuleSnapshot::from_bytes(DOC.as_bytes()).unwrap();
        let cat: Category = "BA Produk SHO".parse().unwrap();

        assert_eq!(snap.version().len(), 32);
        assert_eq!(snap.rule(cat).unwrap().required_keys, vec!["kode produk", "produk"]);
        assert_eq!(snap.validation(cat).unwrap().lookup("123"), Some("GS"));
        assert_eq!(snap.special_columns(cat)[0].prefix, "qty");
        assert_eq!(snap.schema(cat).unwrap().columns.len(), 3);
        assert!(snap.tuning(cat).is_none());
    }

    #[test]
    fn version_changes_with_content() {
        let a = RuleSnapshot::from_bytes(DOC.as_bytes()).unwrap();
        let edited = DOC.replace("\"GS\"", "\"HYDR-M\"");
        let b = RuleSnapshot::from_bytes(edited.as_bytes()).unwrap();
        assert_ne!(a.version(), b.version());
    }

    #[test]
    fn rejects_configuration_faults() {
        let broken = r#"{
            "categories": [
                { "category": "BA Dash TIK", "required_keys": [" "] }
            ],
            "schemas": [
                { "category": "BA Produk SHO", "columns": ["A"] }
            ],
            "special_columns": [
                { "category": "BA Produk SHO", "target_column": "B", "action": "COALESCE_PREFIX", "prefix": "b" }
            ]
        }"#;

        let Err(RuleStoreError::Invalid(findings)) = RuleSnapshot::from_bytes(broken.as_bytes())
        else {
            panic!("expected invalid rule store");
        };
        let codes: Vec<_> = findings.iter().map(|f| f.code).collect();
        assert!(codes.contains(&CODE_EMPTY_KEYS));
        assert!(codes.contains(&CODE_MISSING_SCHEMA));
        assert!(codes.contains(&CODE_UNKNOWN_COLUMN));
    }

    #[test]
    fn unknown_category_is_a_parse_fault() {
        let doc = r#"{ "schemas": [ { "category": "Laporan XYZ", "columns": ["A"] } ] }"#;
        assert!(matches!(
            RuleSnapshot::from_bytes(doc.as_bytes()),
            Err(RuleStoreError::Parse(_))
        ));
    }
}
