use crate::transform::number::{format_number, parse_number};
use model::transform::rules::{ColumnAction, SpecialColumnRule, StandardSchema, normalize_key};
use std::collections::VecDeque;
use tracing::debug;

/// Where one standard column takes its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    Direct(usize),
    /// Sum of every numeric cell under these source columns.
    Sum(Vec<usize>),
    Empty,
}

/// Per-file resolution of a standard schema against a source header row.
///
/// Built once per file, then applied to every data row; output position
/// always follows the schema, never the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    sources: Vec<ColumnSource>,
}

/// Unclaimed source columns grouped by normalised header, in file order.
struct HeaderQueue {
    entries: Vec<(String, VecDeque<usize>)>,
}

impl HeaderQueue {
    fn new(header: &[String]) -> Self {
        let mut entries: Vec<(String, VecDeque<usize>)> = Vec::new();
        for (idx, cell) in header.iter().enumerate() {
            let key = normalize_key(cell);
            if key.is_empty() {
                continue;
            }
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, queue)) => queue.push_back(idx),
                None => entries.push((key, VecDeque::from([idx]))),
            }
        }
        Self { entries }
    }

    fn claim(&mut self, key: &str) -> Option<usize> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .and_then(|(_, queue)| queue.pop_front())
    }

    fn claim_prefix(&mut self, prefix: &str) -> Option<usize> {
        self.entries
            .iter_mut()
            .filter(|(k, _)| k.starts_with(prefix))
            .find_map(|(_, queue)| queue.pop_front())
    }
}

impl ColumnPlan {
    pub fn build(
        schema: &StandardSchema,
        special: &[SpecialColumnRule],
        header: &[String],
    ) -> Self {
        let mut queue = HeaderQueue::new(header);
        let normalized_header: Vec<String> = header.iter().map(|h| normalize_key(h)).collect();

        let sources = schema
            .columns
            .iter()
            .map(|column| {
                if let Some(idx) = queue.claim(&normalize_key(column)) {
                    return ColumnSource::Direct(idx);
                }

                let Some(rule) = special
                    .iter()
                    .find(|r| normalize_key(&r.target_column) == normalize_key(column))
                else {
                    return ColumnSource::Empty;
                };

                match rule.action {
                    ColumnAction::CoalescePrefix => queue
                        .claim_prefix(&rule.prefix)
                        .map(ColumnSource::Direct)
                        .unwrap_or(ColumnSource::Empty),
                    ColumnAction::SumPrefix => {
                        let indices: Vec<usize> = normalized_header
                            .iter()
                            .enumerate()
                            .filter(|(_, h)| !h.is_empty() && h.starts_with(&rule.prefix))
                            .map(|(i, _)| i)
                            .collect();
                        if indices.is_empty() {
                            ColumnSource::Empty
                        } else {
                            ColumnSource::Sum(indices)
                        }
                    }
                }
            })
            .collect::<Vec<_>>();

        let mapped = sources
            .iter()
            .filter(|s| !matches!(s, ColumnSource::Empty))
            .count();
        debug!(mapped, total = sources.len(), "Built column plan");

        Self { sources }
    }

    pub fn width(&self) -> usize {
        self.sources.len()
    }

    pub fn sources(&self) -> &[ColumnSource] {
        &self.sources
    }

    /// Produces exactly [`width`](Self::width) cells in schema order.
    pub fn apply(&self, row: &[String]) -> Vec<String> {
        self.sources
            .iter()
            .map(|source| match source {
                ColumnSource::Direct(idx) => {
                    row.get(*idx).map(|v| v.trim().to_string()).unwrap_or_default()
                }
                ColumnSource::Sum(indices) => {
                    let values: Vec<f64> = indices
                        .iter()
                        .filter_map(|i| row.get(*i))
                        .filter_map(|v| parse_number(v))
                        .collect();
                    if values.is_empty() {
                        String::new()
                    } else {
                        format_number(values.iter().sum())
                    }
                }
                ColumnSource::Empty => String::new(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::category::Category;

    fn cat() -> Category {
        "BA Produk SHO".parse().unwrap()
    }

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn schema(columns: &[&str]) -> StandardSchema {
        StandardSchema {
            category: cat(),
            columns: strings(columns),
        }
    }

    fn special(target: &str, action: ColumnAction, prefix: &str) -> SpecialColumnRule {
        SpecialColumnRule {
            category: cat(),
            target_column: target.into(),
            action,
            prefix: prefix.into(),
        }
    }

    #[test]
    fn output_follows_schema_order() {
        let plan = ColumnPlan::build(&schema(&["A", "B", "C"]), &[], &strings(&["C", "A"]));
        assert_eq!(plan.apply(&strings(&["c1", "a1"])), strings(&["a1", "", "c1"]));
    }

    #[test]
    fn prefix_sum() {
        let plan = ColumnPlan::build(
            &schema(&["Total Qty"]),
            &[special("Total Qty", ColumnAction::SumPrefix, "qty")],
            &strings(&["Qty Jan", "Qty Feb"]),
        );
        assert_eq!(plan.apply(&strings(&["3", "4"])), strings(&["7"]));
        assert_eq!(plan.apply(&strings(&["-", ""])), strings(&[""]));
    }

    #[test]
    fn duplicate_headers_are_claimed_in_file_order() {
        let plan = ColumnPlan::build(
            &schema(&["Nama", "Harga", "Nama"]),
            &[],
            &strings(&["nama", "Harga", "NAMA"]),
        );
        assert_eq!(
            plan.sources(),
            &[
                ColumnSource::Direct(0),
                ColumnSource::Direct(1),
                ColumnSource::Direct(2)
            ]
        );
    }

    #[test]
    fn direct_match_wins_over_special_rule() {
        let plan = ColumnPlan::build(
            &schema(&["Stok"]),
            &[special("Stok", ColumnAction::SumPrefix, "stok")],
            &strings(&["Stok Gudang", "Stok"]),
        );
        assert_eq!(plan.sources(), &[ColumnSource::Direct(1)]);
    }

    #[test]
    fn coalesce_takes_first_unclaimed_prefix_column() {
        let plan = ColumnPlan::build(
            &schema(&["Foto 1", "Gambar"]),
            &[special("Gambar", ColumnAction::CoalescePrefix, "foto")],
            &strings(&["Foto 1", "Foto Produk", "Foto Lain"]),
        );
        assert_eq!(
            plan.apply(&strings(&["f1", "fp", "fl"])),
            strings(&["f1", "fp"])
        );
    }

    #[test]
    fn short_rows_pad_with_empty() {
        let plan = ColumnPlan::build(&schema(&["A", "B"]), &[], &strings(&["A", "B"]));
        assert_eq!(plan.apply(&strings(&["x"])), strings(&["x", ""]));
        assert_eq!(plan.width(), 2);
    }
}
