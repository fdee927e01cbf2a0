use crate::error::CliError;
use engine_config::settings::env::EnvSource;
use std::path::Path;

/// Reads `KEY=VALUE` lines from an env file. Blank lines and `#` comments
/// are skipped; one level of matching quotes is stripped from values.
pub fn parse_env_file(content: &str) -> Result<Vec<(String, String)>, CliError> {
    let mut pairs = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            return Err(CliError::EnvFile(format!(
                "line {} is not KEY=VALUE",
                index + 1
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::EnvFile(format!("empty key at line {}", index + 1)));
        }
        pairs.push((key.to_string(), unquote(value.trim()).to_string()));
    }
    Ok(pairs)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Process environment layered over an optional env file; the process wins.
pub fn load_env(file: Option<&Path>) -> Result<EnvSource, CliError> {
    let mut pairs = match file {
        Some(path) => parse_env_file(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };
    pairs.extend(std::env::vars());
    Ok(EnvSource::from_pairs(pairs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_quotes_and_exports() {
        let content = r#"
# shared store
SHEETFLOW_ROOT="/srv/reports"
export SHEETFLOW_WORKERS=4
WEBHOOK_URL='https://chat.example/hook?a=b'
        "#;

        let pairs = parse_env_file(content).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("SHEETFLOW_ROOT".to_string(), "/srv/reports".to_string()),
                ("SHEETFLOW_WORKERS".to_string(), "4".to_string()),
                ("WEBHOOK_URL".to_string(), "https://chat.example/hook?a=b".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_lines_without_equals() {
        let err = parse_env_file("WORKERS 3").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
