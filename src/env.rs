use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

/// Health used for combatants whose hero has no usable durability stat.
pub const DEFAULT_MAX_HEALTH: i64 = 100;
/// Number of log lines kept by a replay session.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub api: ApiSettings,
    pub replay: ReplaySettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        println!("Loading configuration for RUN_MODE: {}", &run_mode);

        let s = Self::defaults()?
            // Load environment-specific file (e.g., development.toml, production.toml)
            .add_source(
                File::with_name(&format!("config/{}", run_mode))
                    .format(FileFormat::Toml)
                    .required(false),
            )
            // Add environment variables (e.g., APP__API__BASE_URL=http://host:8080)
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// TOML 문자열에서 설정 로드 (기본값 위에 덮어씀)
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>, ConfigError>
    {
        Config::builder()
            .set_default("logging.directory", "logs")?
            .set_default("logging.filename", "battle_replay.log")?
            .set_default("logging.level", "info")?
            .set_default("api.base_url", "http://127.0.0.1:8080")?
            .set_default("api.request_timeout_seconds", 10)?
            .set_default("replay.default_max_health", DEFAULT_MAX_HEALTH)?
            .set_default("replay.log_capacity", DEFAULT_LOG_CAPACITY as i64)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub directory: String,
    pub filename: String,
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    /// REST/SSE 서버 주소 (e.g. http://127.0.0.1:8080)
    pub base_url: String,
    /// Timeout applied to bootstrap fetches only; the event stream has none.
    pub request_timeout_seconds: u64,
}

impl ApiSettings {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplaySettings {
    pub default_max_health: i64,
    pub log_capacity: usize,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            default_max_health: DEFAULT_MAX_HEALTH,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_without_file() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.api.base_url, "http://127.0.0.1:8080");
        assert_eq!(settings.replay.default_max_health, DEFAULT_MAX_HEALTH);
        assert_eq!(settings.replay.log_capacity, DEFAULT_LOG_CAPACITY);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [api]
            base_url = "http://arena.local:9000/"

            [replay]
            default_max_health = 250
            "#,
        )
        .unwrap();

        assert_eq!(settings.replay.default_max_health, 250);
        assert_eq!(settings.replay.log_capacity, DEFAULT_LOG_CAPACITY);
        assert_eq!(
            settings.api.url("/api/teams"),
            "http://arena.local:9000/api/teams"
        );
    }
}
