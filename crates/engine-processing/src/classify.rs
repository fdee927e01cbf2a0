use model::{
    core::category::Category,
    execution::classification::ClassificationResult,
    records::sheet::Sheet,
    transform::rules::{CategoryRule, normalize_key},
};
use std::collections::HashSet;

/// Scores header rows against the category rules of one snapshot.
///
/// Rules are expected in declaration order and already normalised
/// (see [`CategoryRule::normalized`]); ties keep that order.
pub struct Classifier<'a> {
    rules: &'a [CategoryRule],
}

struct Candidate<'a> {
    rule: &'a CategoryRule,
    score: f64,
}

impl<'a> Classifier<'a> {
    pub fn new(rules: &'a [CategoryRule]) -> Self {
        Self { rules }
    }

    /// Classifies a single header row using each rule's configured row offsets.
    pub fn classify(&self, header: &[String], filename: &str) -> ClassificationResult {
        let cells = header_set(header);
        let candidates = self
            .rules
            .iter()
            .filter_map(|rule| score(rule, &cells).map(|score| Candidate { rule, score }))
            .collect();

        match pick(candidates, filename) {
            Some(c) => ClassificationResult {
                category: Some(c.rule.category),
                header_row: c.rule.header_row,
                data_row: c.rule.data_row,
                score: c.score,
            },
            None => ClassificationResult::unknown(),
        }
    }

    /// Classifies a parsed sheet.
    ///
    /// The first row is tried against every rule; a match there means the
    /// file has its header on top, so the data row keeps the rule's distance
    /// from the header. Only when that finds nothing is each rule checked
    /// against its own header row.
    pub fn classify_sheet(&self, sheet: &Sheet, filename: &str) -> ClassificationResult {
        let Some(first) = sheet.row(1) else {
            return ClassificationResult::unknown();
        };

        let cells = header_set(first);
        let candidates = self
            .rules
            .iter()
            .filter_map(|rule| score(rule, &cells).map(|score| Candidate { rule, score }))
            .collect();

        if let Some(c) = pick(candidates, filename) {
            let gap = c.rule.data_row.saturating_sub(c.rule.header_row).max(1);
            return ClassificationResult {
                category: Some(c.rule.category),
                header_row: 1,
                data_row: 1 + gap,
                score: c.score,
            };
        }

        let candidates = self
            .rules
            .iter()
            .filter(|rule| rule.header_row > 1)
            .filter_map(|rule| {
                let row = sheet.row(rule.header_row)?;
                score(rule, &header_set(row)).map(|score| Candidate { rule, score })
            })
            .collect();

        match pick(candidates, filename) {
            Some(c) => ClassificationResult {
                category: Some(c.rule.category),
                header_row: c.rule.header_row,
                data_row: c.rule.data_row,
                score: c.score,
            },
            None => ClassificationResult::unknown(),
        }
    }

    pub fn rule_for(&self, category: Category) -> Option<&'a CategoryRule> {
        self.rules.iter().find(|r| r.category == category)
    }
}

fn header_set(header: &[String]) -> HashSet<String> {
    header
        .iter()
        .map(|cell| normalize_key(cell))
        .filter(|cell| !cell.is_empty())
        .collect()
}

/// Keys a rule must match: `floor(min_score * k)`, never less than one.
pub fn required_matches(rule: &CategoryRule) -> usize {
    let k = rule.required_keys.len() as f64;
    ((rule.min_score * k + 1e-9).floor() as usize).max(1)
}

fn score(rule: &CategoryRule, cells: &HashSet<String>) -> Option<f64> {
    if rule.required_keys.is_empty() {
        return None;
    }
    let matched = rule
        .required_keys
        .iter()
        .filter(|key| cells.contains(key.as_str()))
        .count();

    (matched >= required_matches(rule)).then(|| matched as f64 / rule.required_keys.len() as f64)
}

fn pick<'a>(mut candidates: Vec<Candidate<'a>>, filename: &str) -> Option<Candidate<'a>> {
    // stable: equal scores keep declaration order
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let name = filename.to_lowercase();
    candidates
        .into_iter()
        .find(|c| match c.rule.filename_pattern.as_deref() {
            Some(pattern) => name.contains(pattern),
            None => true,
        })
}
