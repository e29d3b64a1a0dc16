use std::time::Duration;

use chrono::NaiveDate;
use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::semester::{self, SemesterError, Term};

#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub term: TermConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub recovery: RecoveryAction,
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1200,
            timeout_secs: 20,
            recovery: RecoveryAction::None,
        }
    }
}

/// What to do with the fetcher session after a failed iteration. After a
/// timeout the session is reset regardless of this setting.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryAction {
    None,
    ResetSession,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetcherConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl FetcherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub state_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: "~/.local/share/gradewatch".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    pub backend: NotifyBackend,
    pub ntfy_server: String,
    pub ntfy_topic: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            backend: NotifyBackend::Log,
            ntfy_server: "https://ntfy.sh".to_string(),
            ntfy_topic: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifyBackend {
    Log,
    Ntfy,
}

/// Which term to watch. An explicit `id` wins over `start_year` + `term`;
/// with neither, the term is inferred from today's date.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TermConfig {
    pub id: Option<i32>,
    pub start_year: Option<i32>,
    pub term: Option<Term>,
}

impl TermConfig {
    pub fn resolve(&self, today: NaiveDate) -> Result<i32, SemesterError> {
        if let Some(id) = self.id {
            return Ok(id);
        }
        if let (Some(start_year), Some(term)) = (self.start_year, self.term) {
            return semester::term_id(start_year, term);
        }
        semester::current_term_id(today)
    }
}

impl WatchConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> WatchConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(
            r#"
            [fetcher]
            base_url = "https://eams.example.edu"
            request_timeout_secs = 15
            retries = 2
            retry_delay_ms = 300
            "#,
        );
        assert_eq!(config.monitor.interval_secs, 1200);
        assert_eq!(config.monitor.timeout_secs, 20);
        assert_eq!(config.monitor.recovery, RecoveryAction::None);
        assert_eq!(config.notify.backend, NotifyBackend::Log);
        assert_eq!(config.service.log_level, "info");
        assert!(config.term.id.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let config = parse(
            r#"
            [service]
            log_level = "debug"

            [monitor]
            interval_secs = 600
            timeout_secs = 30
            recovery = "reset-session"

            [fetcher]
            base_url = "https://eams.example.edu"
            request_timeout_secs = 10
            retries = 1
            retry_delay_ms = 200

            [storage]
            state_dir = "/var/lib/gradewatch"

            [notify]
            backend = "ntfy"
            ntfy_server = "https://ntfy.example.com"
            ntfy_topic = "grades-abc"

            [term]
            start_year = 2024
            term = "second"
            "#,
        );
        assert_eq!(config.monitor.recovery, RecoveryAction::ResetSession);
        assert_eq!(config.monitor.interval(), Duration::from_secs(600));
        assert_eq!(config.notify.backend, NotifyBackend::Ntfy);
        let today = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        assert_eq!(config.term.resolve(today).unwrap(), 463);
    }

    #[test]
    fn test_term_resolution_order() {
        let today = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();

        let explicit = TermConfig {
            id: Some(999),
            start_year: Some(2024),
            term: Some(Term::First),
        };
        assert_eq!(explicit.resolve(today).unwrap(), 999);

        let by_year = TermConfig {
            id: None,
            start_year: Some(2023),
            term: Some(Term::Second),
        };
        assert_eq!(by_year.resolve(today).unwrap(), 423);

        let inferred = TermConfig::default();
        assert_eq!(inferred.resolve(today).unwrap(), 443);
    }
}
