//! Logging system initialization
//!
//! Console output by default; with `logging.file` set, logs go to that file,
//! rotated daily when `enable_rotation` is on.

use std::io::Write;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;

use crate::config::LoggingConfig;
use crate::errors::{LinkShortenerError, Result};

const DEFAULT_LOG_NAME: &str = "linkshortener.log";

/// Install the global subscriber.
///
/// The returned guard must live until the program exits, otherwise buffered
/// lines are lost. Calling this twice fails because the subscriber is global.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let log_file = config.file.as_deref().filter(|f| !f.is_empty());
    let writer = make_writer(config, log_file)?;

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(writer);
    let filter = tracing_subscriber::EnvFilter::try_new(&config.level).map_err(|e| {
        LinkShortenerError::configuration(format!(
            "invalid logging.level '{}': {}",
            config.level, e
        ))
    })?;

    let builder = tracing_subscriber::fmt()
        .with_writer(non_blocking_writer)
        .with_env_filter(filter)
        .with_level(true)
        .with_ansi(log_file.is_none());

    let installed = if config.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| {
        LinkShortenerError::configuration(format!("failed to install logger: {}", e))
    })?;

    Ok(guard)
}

fn make_writer(
    config: &LoggingConfig,
    log_file: Option<&str>,
) -> Result<Box<dyn Write + Send + Sync>> {
    let Some(log_file) = log_file else {
        return Ok(Box::new(std::io::stdout()));
    };

    let path = Path::new(log_file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    if config.enable_rotation {
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(DEFAULT_LOG_NAME);
        let appender = rolling::Builder::new()
            .rotation(rolling::Rotation::DAILY)
            .filename_prefix(filename.trim_end_matches(".log"))
            .filename_suffix("log")
            .max_log_files(config.max_backups.max(1) as usize)
            .build(dir)
            .map_err(|e| {
                LinkShortenerError::configuration(format!(
                    "failed to create rolling log appender in {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        Ok(Box::new(appender))
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_writer_without_file() {
        let config = LoggingConfig::default();
        assert!(make_writer(&config, None).is_ok());
    }

    #[test]
    fn test_plain_file_writer_creates_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("app.log");
        let config = LoggingConfig {
            enable_rotation: false,
            ..LoggingConfig::default()
        };
        let mut writer = make_writer(&config, path.to_str()).unwrap();
        writer.write_all(b"hello\n").unwrap();
        writer.flush().unwrap();
        assert!(path.exists());
    }
}
