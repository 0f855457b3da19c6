//! tracing subscriber setup.

use color_eyre::{eyre::eyre, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

const LOG_FILE: &str = "taskflow.log";

/// Install the global subscriber.
///
/// Logs go to stderr so that command output on stdout stays parseable. When
/// `config.directory` is set a daily rolling file is written too; the returned
/// guard flushes it and must be held until exit. `RUST_LOG` overrides the
/// configured level.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
  let level: LevelFilter = config
    .level
    .parse()
    .map_err(|e| eyre!("Invalid log level '{}': {}", config.level, e))?;

  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_writer(std::io::stderr)
    .with_target(false)
    .with_filter(filter(level));

  match &config.directory {
    Some(dir) => {
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      let (writer, guard) = tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE));
      let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(filter(level));

      tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(stderr_layer)
        .try_init()
        .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;
      Ok(None)
    }
  }
}

fn filter(level: LevelFilter) -> EnvFilter {
  EnvFilter::builder()
    .with_default_directive(level.into())
    .from_env_lossy()
}
