use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LogFormat;

const MAX_LOG_FILES: usize = 5;

pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Optional log file, rotated daily
    pub file: Option<String>,
}

impl From<&crate::config::LoggingConfig> for LoggingConfig {
    fn from(config: &crate::config::LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: config.format.clone(),
            file: config.file.clone(),
        }
    }
}

/// Install the global subscriber. Keep the returned guard alive so the
/// file writer flushes on shutdown.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let mut layers = Vec::new();

    match config.format {
        LogFormat::Json => {
            layers.push(fmt::layer().json().with_span_events(FmtSpan::CLOSE).boxed());
        }
        LogFormat::Pretty => {
            layers.push(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .boxed(),
            );
        }
    }

    let guard = match config.file.as_deref().map(file_appender) {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
            layers.push(match config.format {
                LogFormat::Json => file_layer.json().boxed(),
                LogFormat::Pretty => file_layer.boxed(),
            });
            Some(guard)
        }
        Some(Err(e)) => {
            eprintln!("Could not open log file: {}", e);
            None
        }
        None => None,
    };

    tracing_subscriber::registry().with(filter).with(layers).init();

    tracing::info!("Logging initialized with level: {}", config.level);
    guard
}

fn file_appender(
    path: &str,
) -> Result<RollingFileAppender, tracing_appender::rolling::InitError> {
    let path = Path::new(path);
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("mafiabot.log");

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(MAX_LOG_FILES)
        .build(directory)
}
