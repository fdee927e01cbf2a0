use model::core::category::Category;
use serde::Serialize;
use std::fmt;

/// Constants for finding codes.
pub const CODE_EMPTY_KEYS: &str = "EMPTY_REQUIRED_KEYS";
pub const CODE_BAD_THRESHOLD: &str = "THRESHOLD_OUT_OF_RANGE";
pub const CODE_BAD_ROWS: &str = "ROW_INDEX_INVALID";
pub const CODE_DUPLICATE: &str = "DUPLICATE_ENTRY";
pub const CODE_MISSING_SCHEMA: &str = "MISSING_SCHEMA";
pub const CODE_UNKNOWN_COLUMN: &str = "UNKNOWN_TARGET_COLUMN";
pub const CODE_EMPTY_SCHEMA: &str = "EMPTY_SCHEMA";

/// One problem found in a rule document. Every finding is a configuration fault.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleFinding {
    pub code: &'static str,
    pub category: Category,
    pub message: String,
}

impl RuleFinding {
    pub fn new(code: &'static str, category: Category, message: impl Into<String>) -> Self {
        Self {
            code,
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for RuleFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.category, self.message)
    }
}
