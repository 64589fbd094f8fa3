//! Tracing subscriber setup for the binary. Logs go to stderr so the terminal viewer and
//! JSON output on stdout stay clean.

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::GamestatError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::WARN,
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Maps repeated `-v` flags onto a level: none is WARN, then INFO, DEBUG, TRACE.
    pub fn from_verbosity(verbosity: u8, format: LogFormat) -> Self {
        let level = match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        LoggingConfig { level, format }
    }

    pub fn env_filter(&self) -> String {
        format!("gamestat={}", self.level.as_str().to_lowercase())
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `config`.
pub fn init_logging(config: &LoggingConfig) -> Result<(), GamestatError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| GamestatError::Logging(e.to_string()))
}
