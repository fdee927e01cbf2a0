use crate::error::FileError;
use csv::ReaderBuilder;
use encoding_rs::{UTF_8, WINDOWS_1252};
use model::records::sheet::Sheet;
use std::borrow::Cow;
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decodes CSV bytes as UTF-8 (BOM stripped), falling back to Windows-1252,
/// the superset of Latin-1 spreadsheet tools emit.
pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match UTF_8.decode_without_bom_handling_and_without_replacement(body) {
        Some(text) => text,
        None => {
            debug!("CSV is not valid UTF-8, decoding as Latin-1");
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(body);
            text
        }
    }
}

/// Parses CSV bytes into a [`Sheet`] of trimmed cells.
pub fn read_csv(name: &str, bytes: &[u8]) -> Result<Sheet, FileError> {
    let text = decode(bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }

    if rows.is_empty() {
        return Err(FileError::InvalidFormat {
            name: name.to_string(),
            reason: "no rows".to_string(),
        });
    }
    Ok(Sheet::new(rows))
}
