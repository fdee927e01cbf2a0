pub mod extract;
pub mod number;
pub mod plan;

pub use extract::{Extracted, extract_rows};
pub use plan::{ColumnPlan, ColumnSource};
