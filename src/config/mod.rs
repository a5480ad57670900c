//! Layered configuration: defaults, optional files, `APP__*` and legacy variables

mod app_config;

pub use app_config::{
    AppConfig, DashboardConfig, DatabaseConfig, GameConfig, LogFormat, LoggingConfig,
    RateLimitConfig, ServerConfig, TelegramConfig,
};
