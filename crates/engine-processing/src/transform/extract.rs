use model::{
    core::category::RowExtraction,
    records::sheet::{Sheet, is_blank_row},
};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Extracted<'a> {
    pub rows: Vec<&'a [String]>,
    /// Blank rows dropped inside the data range.
    pub skipped: usize,
}

/// Picks the data rows of a sheet, starting at the 1-based `data_row`.
pub fn extract_rows(sheet: &Sheet, mode: RowExtraction, data_row: usize) -> Extracted<'_> {
    let mut out = Extracted::default();
    for row in sheet.rows_from(data_row) {
        if is_blank_row(row) {
            out.skipped += 1;
            continue;
        }
        out.rows.push(row);
        if mode == RowExtraction::SingleRow {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Sheet {
        let row = |cells: &[&str]| cells.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        Sheet::new(vec![
            row(&["h1", "h2"]),
            row(&["", " "]),
            row(&["a", "1"]),
            row(&[""]),
            row(&["b", "2"]),
        ])
    }

    #[test]
    fn multi_row_skips_blanks() {
        let sheet = sheet();
        let out = extract_rows(&sheet, RowExtraction::MultiRow, 2);
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.skipped, 2);
        assert_eq!(out.rows[1][0], "b");
    }

    #[test]
    fn single_row_takes_first_non_blank() {
        let sheet = sheet();
        let out = extract_rows(&sheet, RowExtraction::SingleRow, 2);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0][0], "a");
    }

    #[test]
    fn data_row_past_end_is_empty() {
        assert!(extract_rows(&sheet(), RowExtraction::MultiRow, 9).rows.is_empty());
    }
}
