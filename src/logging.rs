//! Logging setup
//!
//! Console output goes to stderr; stdout is reserved for action results.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{ActionError, NetResult};

/// Parse a log level name (trace, debug, info, warn, error)
pub fn parse_level(level: &str) -> NetResult<LevelFilter> {
    level
        .parse::<LevelFilter>()
        .map_err(|_| ActionError::Config(format!("Invalid log level: {}", level)))
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `level`. A log file, when given, is
/// appended to and its parent directories created.
pub fn init_logging(level: &str, log_file: Option<&Path>, console: bool) -> NetResult<()> {
    let level = parse_level(level)?.to_string().to_lowercase();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            EnvFilter::new(format!("netaction={},libnetaction={}", level, level))
        });

    let console_layer = console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ActionError::Config(format!("Failed to create log directory {:?}: {}", parent, e)))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ActionError::Config(format!("Failed to open log file {:?}: {}", path, e)))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_line_number(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ActionError::Config(format!("Failed to initialize logging: {}", e)))
}
