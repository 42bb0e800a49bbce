//! Logging utilities for dbstore
//!
//! This module provides logging setup and configuration.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Parse a level name, defaulting to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn env_filter(level: Level) -> Result<EnvFilter> {
    let directive = format!("dbstore={}", level)
        .parse()
        .map_err(|e| Error::ConfigError(format!("Invalid log directive: {}", e)))?;
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

/// Initialize logging based on configuration
///
/// Without a configuration nothing is installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<()> {
    let Some(config) = config else {
        return Ok(());
    };

    let filter = env_filter(parse_level(&config.level))?;
    let json = config.format.eq_ignore_ascii_case("json");

    // File output wins over stdout
    let result = if let Some(file_path) = &config.file {
        if let Some(parent) = Path::new(file_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(file_path)?;
        let builder = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false);
        match (json, config.include_timestamps) {
            (true, true) => tracing::subscriber::set_global_default(builder.json().finish()),
            (true, false) => tracing::subscriber::set_global_default(builder.json().without_time().finish()),
            (false, true) => tracing::subscriber::set_global_default(builder.finish()),
            (false, false) => tracing::subscriber::set_global_default(builder.without_time().finish()),
        }
    } else if config.stdout {
        let builder = fmt::Subscriber::builder().with_env_filter(filter);
        match (json, config.include_timestamps) {
            (true, true) => tracing::subscriber::set_global_default(builder.json().finish()),
            (true, false) => tracing::subscriber::set_global_default(builder.json().without_time().finish()),
            (false, true) => tracing::subscriber::set_global_default(builder.finish()),
            (false, false) => tracing::subscriber::set_global_default(builder.without_time().finish()),
        }
    } else {
        return Ok(());
    };

    result.map_err(|e| Error::Unknown(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_fall_back_to_info() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn no_config_is_a_no_op() {
        assert!(init_logging(None).is_ok());
    }
}
