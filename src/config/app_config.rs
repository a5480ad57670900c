use serde::Deserialize;

/// Legacy environment variables honoured on top of `APP__*` settings
const LEGACY_ENV: &[(&str, &str)] = &[
    ("MAFIA_DASH_PORT", "server.port"),
    ("MAFIA_DB", "database.file"),
    ("MAFIA_DB_FILE", "database.file"),
    ("MAFIA_DASH_TOKEN", "dashboard.token"),
    ("TELEGRAM_TOKEN", "telegram.token"),
    ("MAFIABOT_LOGFILE", "logging.file"),
];

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub dashboard: DashboardConfig,
    pub game: GameConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub file: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: Option<String>,
    pub api_url: String,
    pub poll_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub token: Option<String>,
}

/// Timings and thresholds of a game
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub night_seconds: i64,
    pub day_seconds: i64,
    pub reminder_seconds: i64,
    pub voting_seconds: i64,
    pub mafia_confirm_seconds: i64,
    pub reminder_first_delay_secs: u64,
    pub min_players: usize,
    pub pending_action_ttl_secs: i64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub calls: u32,
    pub per_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8006,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file: "mafia_complete.db".to_string(),
            max_connections: 5,
            busy_timeout_secs: 30,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
            request_timeout_secs: 45,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            night_seconds: 300,
            day_seconds: 600,
            reminder_seconds: 120,
            voting_seconds: 60,
            mafia_confirm_seconds: 60,
            reminder_first_delay_secs: 30,
            min_players: 4,
            pending_action_ttl_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            calls: 3,
            per_seconds: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(|name| std::env::var(name).ok())
    }

    /// Load with a custom lookup for the legacy variables
    pub fn load_from(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in LEGACY_ENV {
            let value = lookup(var).filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        builder.build()?.try_deserialize()
    }
}
