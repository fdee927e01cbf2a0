use crate::error::RoutingError;
use model::{
    execution::routing::{Bucket, RoutingDecision},
    records::sheet::Sheet,
    transform::rules::ValidationRule,
};
use tracing::{info, warn};

/// Sample ids from the rule's column, starting at `data_row`.
///
/// Looks at up to `sample_window` rows; blank cells are not sampled and a
/// trailing `.0` left by spreadsheet number rendering is dropped.
pub fn sample_values(sheet: &Sheet, rule: &ValidationRule, data_row: usize) -> Vec<String> {
    sheet
        .rows_from(data_row)
        .take(rule.sample_window)
        .filter_map(|row| row.get(rule.sample_column))
        .map(|cell| {
            let value = cell.trim();
            value.strip_suffix(".0").unwrap_or(value).to_string()
        })
        .filter(|value| !value.is_empty())
        .collect()
}

/// Tally of matched sample values per bucket, in first-seen order.
#[derive(Debug, Default, PartialEq)]
pub struct SampleTally {
    pub sampled: usize,
    pub matched: usize,
    pub buckets: Vec<(String, usize)>,
}

impl SampleTally {
    pub fn count(rule: &ValidationRule, values: &[String]) -> Self {
        let mut tally = SampleTally {
            sampled: values.len(),
            ..Default::default()
        };
        for bucket in values.iter().filter_map(|v| rule.lookup(v)) {
            tally.matched += 1;
            match tally.buckets.iter_mut().find(|(b, _)| b == bucket) {
                Some((_, n)) => *n += 1,
                None => tally.buckets.push((bucket.to_string(), 1)),
            }
        }
        tally
    }

    pub fn score(&self) -> f64 {
        if self.sampled == 0 {
            0.0
        } else {
            self.matched as f64 / self.sampled as f64
        }
    }

    /// Most matched bucket; the first seen wins a tie.
    pub fn leader(&self) -> Option<&str> {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.buckets {
            if best.is_none_or(|b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(b, _)| b.as_str())
    }
}

/// Routes by looking sampled ids up in the reference table.
pub fn route_by_content(
    filename: &str,
    sheet: &Sheet,
    header_width: usize,
    data_row: usize,
    rule: &ValidationRule,
) -> Result<RoutingDecision, RoutingError> {
    if header_width > 0 && rule.sample_column >= header_width {
        return Err(RoutingError::SampleColumnOutOfRange {
            file: filename.to_string(),
            column: rule.sample_column,
            width: header_width,
        });
    }

    let values = sample_values(sheet, rule, data_row);
    let tally = SampleTally::count(rule, &values);
    let score = tally.score();
    let required = rule.match_threshold * tally.sampled as f64;

    if tally.matched == 0 || (tally.matched as f64) < required {
        warn!(
            file = filename,
            category = %rule.category,
            matched = tally.matched,
            sampled = tally.sampled,
            score,
            threshold = rule.match_threshold,
            "Not enough reference matches to route file"
        );
        return Ok(RoutingDecision::failed(format!(
            "{}/{} sampled ids matched (need {required:.1})",
            tally.matched, tally.sampled
        ))
        .with_score(score));
    }

    match tally.leader() {
        Some(bucket) => {
            info!(
                file = filename,
                category = %rule.category,
                bucket,
                matched = tally.matched,
                sampled = tally.sampled,
                "Routed file by content"
            );
            Ok(RoutingDecision::to(Bucket::Brand(bucket.to_string())).with_score(score))
        }
        None => Ok(RoutingDecision::failed("no bucket matched").with_score(score)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn rule(threshold: f64) -> ValidationRule {
        ValidationRule {
            category: "BA Produk LAZ".parse().unwrap(),
            reference: HashMap::from([
                ("100".to_string(), "GS".to_string()),
                ("101".to_string(), "GS".to_string()),
                ("200".to_string(), "HYDR".to_string()),
                ("201".to_string(), "HYDR".to_string()),
            ]),
            match_threshold: threshold,
            sample_window: 20,
            sample_column: 0,
        }
    }

    fn sheet(ids: &[&str]) -> Sheet {
        let mut rows = vec![vec!["ID".to_string(), "Nama".to_string()]];
        rows.extend(ids.iter().map(|id| vec![id.to_string(), "x".to_string()]));
        Sheet::new(rows)
    }

    #[test]
    fn sampling_normalises_spreadsheet_ids() {
        let s = sheet(&["100.0", " ", "200", ""]);
        assert_eq!(sample_values(&s, &rule(0.5), 2), vec!["100", "200"]);
    }

    #[test]
    fn majority_bucket_wins() {
        let s = sheet(&["100", "200", "201", "999"]);
        let d = route_by_content("f.xlsx", &s, 2, 2, &rule(0.5)).unwrap();
        assert_eq!(d.bucket, Bucket::Brand("HYDR".into()));
        assert_eq!(d.score, Some(0.75));
    }

    #[test]
    fn tie_goes_to_first_seen() {
        let s = sheet(&["200", "100", "101", "201"]);
        let d = route_by_content("f.xlsx", &s, 2, 2, &rule(0.5)).unwrap();
        assert_eq!(d.bucket, Bucket::Brand("HYDR".into()));
    }

    #[test]
    fn below_threshold_fails_with_reason() {
        let s = sheet(&["100", "x", "y", "z"]);
        let d = route_by_content("f.xlsx", &s, 2, 2, &rule(0.5)).unwrap();
        assert!(d.bucket.is_failed());
        assert_eq!(d.score, Some(0.25));
        assert!(d.reason.unwrap().contains("1/4"));
    }

    #[test]
    fn no_samples_fails() {
        let s = sheet(&[]);
        let d = route_by_content("f.xlsx", &s, 2, 2, &rule(0.5)).unwrap();
        assert!(d.bucket.is_failed());
    }

    #[test]
    fn out_of_range_column_is_a_fault() {
        let mut r = rule(0.5);
        r.sample_column = 5;
        assert!(matches!(
            route_by_content("f.xlsx", &sheet(&["100"]), 2, 2, &r),
            Err(RoutingError::SampleColumnOutOfRange { .. })
        ));
    }
}
