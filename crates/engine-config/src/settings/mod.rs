use crate::settings::{env::EnvSource, error::SettingsError};
use model::transform::rules::CategoryTuning;
use std::{fmt::Display, path::PathBuf, str::FromStr, time::Duration};
use tracing::{info, warn};

pub mod env;
pub mod error;

/// Engine-wide settings. Category-specific overrides come from the rule
/// store's `tuning` table, see [`Settings::limits_for`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub rules_path: PathBuf,
    pub status_dir: PathBuf,
    pub export_dir: Option<PathBuf>,
    pub workers: u32,
    pub batch_size: usize,
    pub max_retries: usize,
    pub retry_delay: Duration,
    pub retry_max_delay: Duration,
    pub lock_timeout: Duration,
    pub lock_ttl: Duration,
    pub time_budget: Duration,
    pub safety_margin: Duration,
    pub reschedule_delay: Duration,
    pub breaker_cooldown: Duration,
    pub split_attempts: usize,
    pub split_cooldown: Duration,
    pub webhook_url: Option<String>,
    pub notify_enabled: bool,
}

/// Batch and retry limits after applying a category's tuning row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub batch_size: usize,
    pub max_retries: usize,
    pub retry_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Settings {
    /// Defaults rooted at `root`, with no environment applied.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            state_dir: root.join(".state"),
            rules_path: root.join("rules.json"),
            status_dir: root.join("status"),
            export_dir: None,
            workers: 3,
            batch_size: 10,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_millis(5000),
            lock_timeout: Duration::from_millis(2000),
            lock_ttl: Duration::from_secs(600),
            time_budget: Duration::from_secs(300),
            safety_margin: Duration::from_secs(30),
            reschedule_delay: Duration::from_millis(1000),
            breaker_cooldown: Duration::from_secs(60),
            split_attempts: 5,
            split_cooldown: Duration::from_millis(1000),
            webhook_url: None,
            notify_enabled: true,
            root,
        }
    }

    pub fn from_env(env: &EnvSource) -> Result<Self, SettingsError> {
        let root = env.get("ROOT").map(PathBuf::from).unwrap_or_else(|| "./data".into());
        let mut settings = Self::with_root(root);

        if let Some(dir) = env.get("STATE_DIR") {
            settings.state_dir = dir.into();
        }
        if let Some(path) = env.get("RULES") {
            settings.rules_path = path.into();
        }
        if let Some(dir) = env.get("STATUS_DIR") {
            settings.status_dir = dir.into();
        }
        settings.export_dir = env.get("EXPORT_DIR").map(PathBuf::from);
        settings.webhook_url = env.get("WEBHOOK_URL").map(str::to_string);

        settings.workers = parse_or(env, "WORKERS", settings.workers)?;
        settings.batch_size = parse_or(env, "BATCH_SIZE", settings.batch_size)?;
        settings.max_retries = parse_or(env, "MAX_RETRIES", settings.max_retries)?;
        settings.retry_delay = millis_or(env, "RETRY_DELAY_MS", settings.retry_delay)?;
        settings.retry_max_delay = millis_or(env, "RETRY_MAX_DELAY_MS", settings.retry_max_delay)?;
        settings.lock_timeout = millis_or(env, "LOCK_TIMEOUT_MS", settings.lock_timeout)?;
        settings.lock_ttl = secs_or(env, "LOCK_TTL_SECS", settings.lock_ttl)?;
        settings.time_budget = secs_or(env, "TIME_BUDGET_SECS", settings.time_budget)?;
        settings.safety_margin = secs_or(env, "SAFETY_MARGIN_SECS", settings.safety_margin)?;
        settings.reschedule_delay =
            millis_or(env, "RESCHEDULE_DELAY_MS", settings.reschedule_delay)?;
        settings.breaker_cooldown =
            secs_or(env, "BREAKER_COOLDOWN_SECS", settings.breaker_cooldown)?;
        settings.split_attempts = parse_or(env, "SPLIT_ATTEMPTS", settings.split_attempts)?;
        settings.split_cooldown = millis_or(env, "SPLIT_COOLDOWN_MS", settings.split_cooldown)?;
        settings.notify_enabled = parse_or(env, "NOTIFY_ENABLED", settings.notify_enabled)?;

        settings.validate()?;
        info!(
            root = %settings.root.display(),
            workers = settings.workers,
            batch_size = settings.batch_size,
            "Loaded settings"
        );
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut errors = Vec::new();

        if self.workers == 0 {
            errors.push("WORKERS must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            errors.push("BATCH_SIZE must be at least 1".to_string());
        }
        if self.max_retries == 0 {
            errors.push("MAX_RETRIES must be at least 1".to_string());
        }
        if self.split_attempts == 0 {
            errors.push("SPLIT_ATTEMPTS must be at least 1".to_string());
        }
        if self.safety_margin >= self.time_budget {
            errors.push(format!(
                "SAFETY_MARGIN_SECS ({}) must be below TIME_BUDGET_SECS ({})",
                self.safety_margin.as_secs(),
                self.time_budget.as_secs()
            ));
        }
        if self.retry_max_delay < self.retry_delay {
            warn!("RETRY_MAX_DELAY_MS is below RETRY_DELAY_MS, every retry waits the cap");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SettingsError::ValidationFailed(errors))
        }
    }

    /// Working time of one wake once the safety margin is reserved.
    pub fn usable_budget(&self) -> Duration {
        self.time_budget.saturating_sub(self.safety_margin)
    }

    pub fn limits_for(&self, tuning: Option<&CategoryTuning>) -> RunLimits {
        RunLimits {
            batch_size: tuning
                .and_then(|t| t.batch_size)
                .filter(|n| *n > 0)
                .unwrap_or(self.batch_size),
            max_retries: tuning
                .and_then(|t| t.max_retries)
                .filter(|n| *n > 0)
                .unwrap_or(self.max_retries),
            retry_delay: tuning
                .and_then(|t| t.retry_delay_ms)
                .map(Duration::from_millis)
                .unwrap_or(self.retry_delay),
            retry_max_delay: self.retry_max_delay,
        }
    }
}

fn parse_or<T>(env: &EnvSource, key: &str, default: T) -> Result<T, SettingsError>
where
    T: FromStr,
    T::Err: Display,
{
    match env.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| SettingsError::Invalid {
            key: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn millis_or(env: &EnvSource, key: &str, default: Duration) -> Result<Duration, SettingsError> {
    parse_or(env, key, default.as_millis() as u64).map(Duration::from_millis)
}

fn secs_or(env: &EnvSource, key: &str, default: Duration) -> Result<Duration, SettingsError> {
    parse_or(env, key, default.as_secs()).map(Duration::from_secs)
}
