/// Cells that mean "no value" in marketplace exports.
const MISSING: [&str; 6] = ["-", "—", "–", "N/A", "n/a", "#N/A"];

/// Parses a display string in either Indonesian (`1.234.567,89`) or
/// standard (`1,234,567.89`) notation.
///
/// Currency markers and whitespace are ignored, a `%` divides by 100.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || MISSING.contains(&trimmed) {
        return None;
    }

    let mut text: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, 'R' | 'p' | '$' | '€' | '£' | '¥'))
        .collect();

    let percent = text.contains('%');
    if percent {
        text.retain(|c| c != '%');
    }

    let dots = text.matches('.').count();
    let commas = text.matches(',').count();

    let normalized = if dots > 1 || (dots == 1 && commas == 1 && text.find('.') < text.find(',')) {
        text.replace('.', "").replace(',', ".")
    } else if commas > 0 && dots == 0 {
        if thousands_grouped(&text) {
            text.replace(',', "")
        } else if commas == 1 {
            text.replace(',', ".")
        } else {
            return None;
        }
    } else if commas > 0 {
        // comma before the decimal dot
        text.replace(',', "")
    } else {
        text
    };

    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if percent { value / 100.0 } else { value })
}

/// `1,234` or `12,345,678`: every group after the first has three digits.
fn thousands_grouped(text: &str) -> bool {
    let mut groups = text.split(',');
    let head_ok = groups
        .next()
        .map(|g| !g.is_empty() && g.trim_start_matches('-').chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    head_ok && groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

/// Whole numbers render without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
