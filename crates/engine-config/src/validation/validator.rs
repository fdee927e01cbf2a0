use crate::{
    rules::RuleDocument,
    validation::finding::{
        CODE_BAD_ROWS, CODE_BAD_THRESHOLD, CODE_DUPLICATE, CODE_EMPTY_KEYS, CODE_EMPTY_SCHEMA,
        CODE_MISSING_SCHEMA, CODE_UNKNOWN_COLUMN, RuleFinding,
    },
};
use model::{core::category::Category, transform::rules::normalize_key};
use std::collections::HashSet;
use tracing::warn;

/// Checks a parsed rule document for configuration faults.
///
/// All problems are collected rather than stopping at the first, so a
/// broken document is reported in one go.
pub struct RuleValidator<'a> {
    doc: &'a RuleDocument,
}

impl<'a> RuleValidator<'a> {
    pub fn new(doc: &'a RuleDocument) -> Self {
        Self { doc }
    }

    pub fn validate(&self) -> Vec<RuleFinding> {
        let mut findings = Vec::new();

        self.check_category_rules(&mut findings);
        self.check_validation_rules(&mut findings);
        self.check_schemas(&mut findings);
        self.check_special_columns(&mut findings);

        for finding in &findings {
            warn!(code = finding.code, category = %finding.category, "{}", finding.message);
        }
        findings
    }

    fn check_category_rules(&self, findings: &mut Vec<RuleFinding>) {
        let mut seen = HashSet::new();
        for rule in &self.doc.categories {
            let cat = rule.category;
            if !seen.insert(cat) {
                findings.push(RuleFinding::new(
                    CODE_DUPLICATE,
                    cat,
                    "category rule declared more than once",
                ));
            }
            if rule.normalized().required_keys.is_empty() {
                findings.push(RuleFinding::new(
                    CODE_EMPTY_KEYS,
                    cat,
                    "category rule needs at least one required header key",
                ));
            }
            if !in_unit_range(rule.min_score) {
                findings.push(RuleFinding::new(
                    CODE_BAD_THRESHOLD,
                    cat,
                    format!("min_score {} is outside (0, 1]", rule.min_score),
                ));
            }
            if rule.header_row == 0 || rule.data_row <= rule.header_row {
                findings.push(RuleFinding::new(
                    CODE_BAD_ROWS,
                    cat,
                    format!(
                        "header_row {} / data_row {} must be 1-based with data below header",
                        rule.header_row, rule.data_row
                    ),
                ));
            }
            if !self.has_schema(cat) {
                findings.push(RuleFinding::new(
                    CODE_MISSING_SCHEMA,
                    cat,
                    "category rule has no standard schema",
                ));
            }
        }
    }

    fn check_validation_rules(&self, findings: &mut Vec<RuleFinding>) {
        let mut seen = HashSet::new();
        for rule in &self.doc.validation {
            if !seen.insert(rule.category) {
                findings.push(RuleFinding::new(
                    CODE_DUPLICATE,
                    rule.category,
                    "validation rule declared more than once",
                ));
            }
            if !in_unit_range(rule.match_threshold) {
                findings.push(RuleFinding::new(
                    CODE_BAD_THRESHOLD,
                    rule.category,
                    format!("match_threshold {} is outside (0, 1]", rule.match_threshold),
                ));
            }
        }
    }

    fn check_schemas(&self, findings: &mut Vec<RuleFinding>) {
        let mut seen = HashSet::new();
        for schema in &self.doc.schemas {
            if !seen.insert(schema.category) {
                findings.push(RuleFinding::new(
                    CODE_DUPLICATE,
                    schema.category,
                    "standard schema declared more than once",
                ));
            }
            if schema.columns.is_empty() {
                findings.push(RuleFinding::new(
                    CODE_EMPTY_SCHEMA,
                    schema.category,
                    "standard schema has no columns",
                ));
            }
        }
    }

    fn check_special_columns(&self, findings: &mut Vec<RuleFinding>) {
        for rule in &self.doc.special_columns {
            let target = normalize_key(&rule.target_column);
            let known = self
                .doc
                .schemas
                .iter()
                .filter(|s| s.category == rule.category)
                .flat_map(|s| s.columns.iter())
                .any(|c| normalize_key(c) == target);

            if !known {
                findings.push(RuleFinding::new(
                    CODE_UNKNOWN_COLUMN,
                    rule.category,
                    format!(
                        "special column '{}' is not part of the standard schema",
                        rule.target_column
                    ),
                ));
            }
        }
    }

    fn has_schema(&self, category: Category) -> bool {
        self.doc.schemas.iter().any(|s| s.category == category)
    }
}

fn in_unit_range(value: f64) -> bool {
    value > 0.0 && value <= 1.0
}
