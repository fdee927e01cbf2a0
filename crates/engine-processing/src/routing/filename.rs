use model::{
    execution::routing::{Bucket, RoutingDecision},
    transform::rules::ValidationRule,
};
use tracing::warn;

/// The `word`-th token of the file name, without extension.
///
/// Tokens are separated by whitespace or `_`, so both
/// `TIK GS Overview_2024.xlsx` and `TIK_GS_Overview.xlsx` yield `GS` at 1.
pub fn filename_token(filename: &str, word: usize) -> Option<&str> {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    };
    stem.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|t| !t.is_empty())
        .nth(word)
}

/// Brand codes in exports are written upper case (`GS`, `HYDR-M`).
pub fn plausible_brand(token: &str) -> bool {
    token.chars().any(char::is_alphabetic) && !token.chars().any(char::is_lowercase)
}

/// Routes by a token embedded in the file name.
///
/// A token that does not look like a brand code is only accepted when the
/// reference table, if there is one, already knows it as a bucket.
pub fn route_by_filename(
    filename: &str,
    word: usize,
    reference: Option<&ValidationRule>,
) -> RoutingDecision {
    let Some(token) = filename_token(filename, word) else {
        warn!(file = filename, word, "No brand token in file name");
        return RoutingDecision::failed(format!("no token at position {word} in file name"));
    };

    if plausible_brand(token) {
        return RoutingDecision::to(Bucket::Brand(token.to_string()));
    }

    if let Some(rule) = reference
        && rule.knows_bucket(token)
    {
        let bucket = rule
            .reference
            .values()
            .find(|b| b.eq_ignore_ascii_case(token))
            .cloned()
            .unwrap_or_else(|| token.to_string());
        return RoutingDecision::to(Bucket::Brand(bucket));
    }

    warn!(file = filename, token, "File name token is not a known brand code");
    RoutingDecision::failed(format!("'{token}' is not a brand code"))
}
