use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CategoryParseError {
    #[error("Empty category name")]
    Empty,

    #[error("Unknown marketplace code in category '{0}'")]
    UnknownMarketplace(String),

    #[error("Unknown report kind in category '{0}'")]
    UnknownKind(String),
}

/// Marketplace a report was exported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Marketplace {
    Shopee,
    Lazada,
    TikTok,
    Tokopedia,
    Blibli,
}

impl Marketplace {
    pub const ALL: [Marketplace; 5] = [
        Marketplace::Shopee,
        Marketplace::Lazada,
        Marketplace::TikTok,
        Marketplace::Tokopedia,
        Marketplace::Blibli,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Marketplace::Shopee => "SHO",
            Marketplace::Lazada => "LAZ",
            Marketplace::TikTok => "TIK",
            Marketplace::Tokopedia => "TOK",
            Marketplace::Blibli => "BSL",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.code().eq_ignore_ascii_case(code.trim()))
    }
}

/// How rows of a finished run land in the canonical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeMode {
    Replace,
    Append,
}

/// How a file's data rows are picked before mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowExtraction {
    /// Only the data row is taken (dashboard summaries).
    SingleRow,
    /// Every non-blank row from the data row to the end.
    MultiRow,
}

/// Which sub-folder a validated file is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingMode {
    /// Bucket is the n-th `_`-separated word of the file name (0-based).
    FilenameToken { word: usize },
    /// Bucket is decided by sampling a column against a reference table.
    ContentSample,
    /// Every file goes to the validated bucket.
    Accept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReportKind {
    ProductPerformance,
    DashboardOverview,
    ProductInfo,
    SkuExport,
    Demographics,
    Projection,
}

impl ReportKind {
    pub const ALL: [ReportKind; 6] = [
        ReportKind::ProductPerformance,
        ReportKind::DashboardOverview,
        ReportKind::ProductInfo,
        ReportKind::SkuExport,
        ReportKind::Demographics,
        ReportKind::Projection,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ReportKind::ProductPerformance => "BA Produk",
            ReportKind::DashboardOverview => "BA Dash",
            ReportKind::ProductInfo => "Informasi",
            ReportKind::SkuExport => "Export SKU",
            ReportKind::Demographics => "Demografis",
            ReportKind::Projection => "Proyeksi",
        }
    }

    pub fn merge_mode(&self) -> MergeMode {
        match self {
            ReportKind::DashboardOverview => MergeMode::Append,
            _ => MergeMode::Replace,
        }
    }

    pub fn row_extraction(&self) -> RowExtraction {
        match self {
            ReportKind::DashboardOverview => RowExtraction::SingleRow,
            _ => RowExtraction::MultiRow,
        }
    }

    pub fn routing_mode(&self) -> RoutingMode {
        match self {
            ReportKind::DashboardOverview => RoutingMode::FilenameToken { word: 1 },
            ReportKind::Demographics => RoutingMode::FilenameToken { word: 0 },
            ReportKind::ProductPerformance | ReportKind::ProductInfo | ReportKind::SkuExport => {
                RoutingMode::ContentSample
            }
            ReportKind::Projection => RoutingMode::Accept,
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        let wanted = collapse_whitespace(label);
        Self::ALL
            .into_iter()
            .find(|k| k.label().eq_ignore_ascii_case(&wanted))
    }
}

/// A report category such as `BA Dash TIK`: a report kind paired with a marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category {
    pub kind: ReportKind,
    pub marketplace: Marketplace,
}

impl Category {
    pub fn new(kind: ReportKind, marketplace: Marketplace) -> Self {
        Self { kind, marketplace }
    }

    pub fn all() -> impl Iterator<Item = Category> {
        ReportKind::ALL.into_iter().flat_map(|kind| {
            Marketplace::ALL
                .into_iter()
                .map(move |marketplace| Category::new(kind, marketplace))
        })
    }

    /// Lowercase identifier usable in table and key names, e.g. `ba_dash_tik`.
    pub fn slug(&self) -> String {
        self.to_string()
            .to_ascii_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn merge_mode(&self) -> MergeMode {
        self.kind.merge_mode()
    }

    pub fn routing_mode(&self) -> RoutingMode {
        self.kind.routing_mode()
    }

    pub fn row_extraction(&self) -> RowExtraction {
        self.kind.row_extraction()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.label(), self.marketplace.code())
    }
}

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (kind, code) = trimmed
            .rsplit_once(char::is_whitespace)
            .ok_or(if trimmed.is_empty() {
                CategoryParseError::Empty
            } else {
                CategoryParseError::UnknownKind(trimmed.to_string())
            })?;

        let marketplace = Marketplace::from_code(code)
            .ok_or_else(|| CategoryParseError::UnknownMarketplace(trimmed.to_string()))?;
        let kind = ReportKind::from_label(kind)
            .ok_or_else(|| CategoryParseError::UnknownKind(trimmed.to_string()))?;

        Ok(Category::new(kind, marketplace))
    }
}

impl TryFrom<String> for Category {
    type Error = CategoryParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.to_string()
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
