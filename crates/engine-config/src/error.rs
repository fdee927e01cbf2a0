use crate::validation::finding::RuleFinding;
use model::core::category::Category;
use thiserror::Error;

/// Errors raised while loading or querying the rule store.
#[derive(Debug, Error)]
pub enum RuleStoreError {
    #[error("Failed to read rule store '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed rule store: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rule store rejected with {} fault(s): {}", .0.len(), join_findings(.0))]
    Invalid(Vec<RuleFinding>),

    #[error("No standard schema for category {0}")]
    MissingSchema(Category),

    #[error("No validation rule for category {0}")]
    MissingValidation(Category),
}

fn join_findings(findings: &[RuleFinding]) -> String {
    findings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
