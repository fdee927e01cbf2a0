use crate::error::FileError;
use model::records::sheet::Sheet;
use tracing::debug;

pub mod workbook;

pub mod csv {
    pub mod source;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Workbook,
    /// Unknown extension: workbook first, then CSV.
    Sniff,
}

impl SheetFormat {
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        match lower.rsplit_once('.').map(|(_, ext)| ext) {
            Some("csv") => SheetFormat::Csv,
            Some("xlsx" | "xlsm" | "xls" | "ods") => SheetFormat::Workbook,
            _ => SheetFormat::Sniff,
        }
    }
}

/// Converts raw file bytes into a [`Sheet`], picking the reader from the name.
pub fn read_sheet(name: &str, bytes: &[u8]) -> Result<Sheet, FileError> {
    match SheetFormat::from_name(name) {
        SheetFormat::Csv => csv::source::read_csv(name, bytes),
        SheetFormat::Workbook => workbook::read_workbook(name, bytes),
        SheetFormat::Sniff => workbook::read_workbook(name, bytes).or_else(|err| {
            debug!(file = name, error = %err, "Not a workbook, trying CSV");
            csv::source::read_csv(name, bytes)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(SheetFormat::from_name("A.CSV"), SheetFormat::Csv);
        assert_eq!(SheetFormat::from_name("dash.xlsm"), SheetFormat::Workbook);
        assert_eq!(SheetFormat::from_name("export"), SheetFormat::Sniff);
    }

    #[test]
    fn sniff_falls_back_to_csv() {
        let sheet = read_sheet("export.txt", b"a,b\n1,2\n").unwrap();
        assert_eq!(sheet.len(), 2);
    }
}
