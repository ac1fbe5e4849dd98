use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "https://api.hh.ru";

/// hh.ru caps `per_page` at 100.
const MAX_PER_PAGE: u32 = 100;

/// How to normalize salary data the upstream record leaves out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MissingSalary {
    /// Absent salary object or bound is stored as NULL ("not disclosed").
    #[default]
    Keep,
    /// Absent salary object or bound is stored as 0 (legacy behaviour).
    Zero,
}

/// Settings shared by every subcommand, read from flags, then the
/// environment (after `.env` has been loaded).
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// SQLite database file
    #[arg(long, global = true, env = "DATABASE_PATH", value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Comma-separated company names to ingest
    #[arg(long, global = true, env = "COMPANY_NAMES", value_name = "NAMES")]
    pub companies: Option<String>,

    /// Base URL of the hh.ru API
    #[arg(long, global = true, env = "HH_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// User-Agent sent to the API (hh.ru rejects anonymous clients)
    #[arg(long, global = true, env = "HH_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Per-request timeout for API calls, in seconds
    #[arg(long, global = true, env = "HH_TIMEOUT_SECS", default_value = "15")]
    pub timeout_secs: u64,

    /// Vacancies requested per company (1-100)
    #[arg(long, global = true, env = "HH_PER_PAGE", default_value = "100")]
    pub per_page: u32,

    /// Retries for timeouts, connection errors, 429 and 5xx responses
    #[arg(long, global = true, env = "HH_MAX_RETRIES", default_value = "2")]
    pub max_retries: u32,

    /// What to store when a listing has no salary data
    #[arg(long, global = true, env = "MISSING_SALARY", value_enum, default_value = "keep")]
    pub missing_salary: MissingSalary,

    /// Log filter used when RUST_LOG is not set (e.g. info, hhdb=debug)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct HhConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub per_page: u32,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for HhConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            user_agent: default_user_agent(),
            timeout: Duration::from_secs(15),
            per_page: MAX_PER_PAGE,
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestConfig {
    pub companies: Vec<String>,
    pub missing_salary: MissingSalary,
}

impl IngestConfig {
    pub fn require_companies(&self) -> Result<&[String], ConfigError> {
        if self.companies.is_empty() {
            return Err(ConfigError::NoCompanies);
        }
        Ok(&self.companies)
    }
}

/// Fully resolved configuration, built once at startup and handed to the
/// components that need it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db: DbConfig,
    pub hh: HhConfig,
    pub ingest: IngestConfig,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        if settings.per_page == 0 || settings.per_page > MAX_PER_PAGE {
            return Err(ConfigError::Invalid {
                setting: "HH_PER_PAGE",
                value: settings.per_page.to_string(),
                reason: format!("must be between 1 and {}", MAX_PER_PAGE),
            });
        }
        if settings.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                setting: "HH_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }
        let base_url = settings.api_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ConfigError::Invalid {
                setting: "HH_API_URL",
                value: settings.api_url,
                reason: "must not be empty".to_string(),
            });
        }

        let path = settings.database.unwrap_or_else(default_db_path);
        let companies = settings
            .companies
            .as_deref()
            .map(parse_company_names)
            .unwrap_or_default();

        Ok(Self {
            db: DbConfig { path },
            hh: HhConfig {
                base_url,
                user_agent: settings
                    .user_agent
                    .filter(|ua| !ua.trim().is_empty())
                    .unwrap_or_else(default_user_agent),
                timeout: Duration::from_secs(settings.timeout_secs),
                per_page: settings.per_page,
                max_retries: settings.max_retries,
                ..HhConfig::default()
            },
            ingest: IngestConfig {
                companies,
                missing_salary: settings.missing_salary,
            },
            log_level: settings.log_level,
        })
    }
}

/// Splits a comma-separated list, trimming names and dropping empty and
/// repeated entries while keeping the original order.
pub fn parse_company_names(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn default_db_path() -> PathBuf {
    // XDG data directory, or the working directory when there is none
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "hhdb") {
        proj_dirs.data_dir().join("hhdb.db")
    } else {
        PathBuf::from("hhdb.db")
    }
}

fn default_user_agent() -> String {
    format!("hhdb/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            database: Some(PathBuf::from("/tmp/test.db")),
            companies: None,
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: None,
            timeout_secs: 15,
            per_page: 100,
            max_retries: 2,
            missing_salary: MissingSalary::Keep,
            log_level: "warn".to_string(),
        }
    }

    #[test]
    fn test_parse_company_names() {
        assert_eq!(
            parse_company_names("Yandex, Ozon,, Tinkoff ,Yandex"),
            vec!["Yandex", "Ozon", "Tinkoff"]
        );
        assert!(parse_company_names(" , ").is_empty());
    }

    #[test]
    fn test_missing_companies_is_config_error() {
        let config = AppConfig::from_settings(settings()).unwrap();
        assert_eq!(
            config.ingest.require_companies().unwrap_err(),
            ConfigError::NoCompanies
        );
    }

    #[test]
    fn test_from_settings_resolves_values() {
        let mut s = settings();
        s.companies = Some("Acme, Globex".to_string());
        s.api_url = "https://api.example.com/".to_string();
        s.missing_salary = MissingSalary::Zero;

        let config = AppConfig::from_settings(s).unwrap();
        assert_eq!(config.ingest.require_companies().unwrap(), ["Acme", "Globex"]);
        assert_eq!(config.hh.base_url, "https://api.example.com");
        assert!(config.hh.user_agent.starts_with("hhdb/"));
        assert_eq!(config.ingest.missing_salary, MissingSalary::Zero);
        assert_eq!(config.db.path, PathBuf::from("/tmp/test.db"));
    }

    #[test]
    fn test_rejects_out_of_range_per_page() {
        let mut s = settings();
        s.per_page = 0;
        assert!(matches!(
            AppConfig::from_settings(s),
            Err(ConfigError::Invalid { setting: "HH_PER_PAGE", .. })
        ));

        let mut s = settings();
        s.per_page = 500;
        assert!(AppConfig::from_settings(s).is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut s = settings();
        s.timeout_secs = 0;
        assert!(AppConfig::from_settings(s).is_err());
    }
}
