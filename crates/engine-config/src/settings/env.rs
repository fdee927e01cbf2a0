use std::collections::HashMap;

pub const ENV_PREFIX: &str = "SHEETFLOW_";

/// Snapshot of `SHEETFLOW_*` variables, keyed without the prefix.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars())
    }

    /// Accepts either prefixed (`SHEETFLOW_WORKERS`) or bare (`WORKERS`) keys.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars = HashMap::new();
        for (key, value) in pairs {
            let key: String = key.into();
            let bare = key.strip_prefix(ENV_PREFIX).unwrap_or(&key).to_string();
            vars.insert(bare, value.into());
        }
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}
