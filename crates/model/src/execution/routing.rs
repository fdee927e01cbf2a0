use serde::{Deserialize, Serialize};
use std::fmt;

/// Destination sub-folder of a processed file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bucket {
    Validated,
    Failed,
    Brand(String),
}

impl Bucket {
    pub fn folder(&self) -> &str {
        match self {
            Bucket::Validated => "Validated",
            Bucket::Failed => "Failed",
            Bucket::Brand(name) => name,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Bucket::Failed)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub bucket: Bucket,
    /// Share of sampled values that matched, for content routing.
    pub score: Option<f64>,
    /// Why a file ended up in `Failed`.
    pub reason: Option<String>,
}

impl RoutingDecision {
    pub fn to(bucket: Bucket) -> Self {
        Self {
            bucket,
            score: None,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            bucket: Bucket::Failed,
            score: None,
            reason: Some(reason.into()),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}
