/// A parsed worksheet: rows of trimmed display strings.
///
/// Row indices used by the accessors are 1-based, matching how header and
/// data rows are configured in category rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[String]> {
        index
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
            .map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.row(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
    }

    /// Rows from `index` (1-based, inclusive) to the end.
    pub fn rows_from(&self, index: usize) -> impl Iterator<Item = &[String]> {
        self.rows
            .iter()
            .skip(index.saturating_sub(1))
            .map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}
