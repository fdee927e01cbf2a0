use crate::core::category::Category;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// `None` when no rule reached its minimum score.
    pub category: Option<Category>,
    pub header_row: usize,
    pub data_row: usize,
    pub score: f64,
}

impl ClassificationResult {
    pub fn unknown() -> Self {
        Self {
            category: None,
            header_row: 1,
            data_row: 2,
            score: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.category.is_none()
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.category {
            Some(cat) => write!(
                f,
                "{cat} (score={:.2}, header_row={}, data_row={})",
                self.score, self.header_row, self.data_row
            ),
            None => f.write_str("Unknown"),
        }
    }
}
