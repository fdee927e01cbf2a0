use crate::error::RoutingError;
use engine_config::rules::RuleSnapshot;
use model::{
    core::category::{Category, RoutingMode},
    execution::routing::{Bucket, RoutingDecision},
    records::sheet::Sheet,
};

pub mod content;
pub mod filename;

/// Decides the destination bucket of a classified file.
///
/// Reads the snapshot only; the same inputs always give the same decision.
pub struct Router<'a> {
    rules: &'a RuleSnapshot,
}

impl<'a> Router<'a> {
    pub fn new(rules: &'a RuleSnapshot) -> Self {
        Self { rules }
    }

    pub fn route(
        &self,
        category: Category,
        filename: &str,
        sheet: &Sheet,
        header_row: usize,
        data_row: usize,
    ) -> Result<RoutingDecision, RoutingError> {
        match category.routing_mode() {
            RoutingMode::Accept => Ok(RoutingDecision::to(Bucket::Validated)),
            RoutingMode::FilenameToken { word } => Ok(filename::route_by_filename(
                filename,
                word,
                self.rules.validation(category),
            )),
            RoutingMode::ContentSample => {
                let rule = self
                    .rules
                    .validation(category)
                    .ok_or(RoutingError::MissingReference(category))?;
                let width = sheet.row(header_row).map(<[String]>::len).unwrap_or(0);
                content::route_by_content(filename, sheet, width, data_row, rule)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"{
        "categories": [
            { "category": "Proyeksi SHO", "required_keys": ["Bulan"] },
            { "category": "BA Produk SHO", "required_keys": ["ID"] }
        ],
        "schemas": [
            { "category": "Proyeksi SHO", "columns": ["Bulan"] },
            { "category": "BA Produk SHO", "columns": ["ID"] }
        ]
    }"#;

    #[test]
    fn accept_and_missing_reference() {
        let snap = RuleSnapshot::from_bytes(RULES.as_bytes()).unwrap();
        let router = Router::new(&snap);
        let sheet = Sheet::new(vec![vec!["ID".into()], vec!["1".into()]]);

        let d = router
            .route("Proyeksi SHO".parse().unwrap(), "p.xlsx", &sheet, 1, 2)
            .unwrap();
        assert_eq!(d.bucket, Bucket::Validated);

        let produk: Category = "BA Produk SHO".parse().unwrap();
        assert!(matches!(
            router.route(produk, "p.xlsx", &sheet, 1, 2),
            Err(RoutingError::MissingReference(c)) if c == produk
        ));
    }
}
