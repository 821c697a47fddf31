//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from `program_settings`
//! - Route every event to stdout and, when configured, a log file
//!
//! # Design Decisions
//! - Enable flags select a maximum level; `RUST_LOG` wins when set
//! - File output has ANSI colouring disabled
//! - Settings are read once at startup

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::schema::{LoggingConfig, ProgramSettings};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    OpenLogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Most verbose level enabled by the flags.
pub fn level_for(flags: &LoggingConfig) -> LevelFilter {
    if flags.debug {
        LevelFilter::DEBUG
    } else if flags.info {
        LevelFilter::INFO
    } else if flags.error {
        LevelFilter::WARN
    } else {
        LevelFilter::OFF
    }
}

fn env_filter(flags: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level_for(flags).into()))
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::OpenLogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Install the global subscriber. Call once, after the first config load.
pub fn init_logging(settings: &ProgramSettings) -> Result<(), LoggingError> {
    let file_layer = match &settings.log_file_path {
        Some(path) => {
            let file = Arc::new(open_log_file(path)?);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_filter(env_filter(&settings.logging)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter(&settings.logging)))
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))
}
