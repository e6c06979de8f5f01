//! Logging system configuration and initialization
//!
//! - Console output with local timestamps
//! - Optional file output under the data directory (previous log renamed with a timestamp)
//! - Optional JSON formatting for the file layer
//! - `RUST_LOG` overrides the configured level

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;
use crate::infrastructure::config::ConfigManager;

const LOG_FILE_NAME: &str = "ingredient-harvest.log";
const APP_TARGET: &str = "ingredient_harvest_lib";

/// Dependencies that flood the output below trace level
const NOISY_TARGETS: &[(&str, &str)] = &[
    ("sqlx", "warn"),
    ("reqwest", "info"),
    ("hyper", "warn"),
    ("hyper_util", "warn"),
    ("h2", "warn"),
    ("html5ever", "warn"),
    ("selectors", "warn"),
];

// Keeps the non-blocking file writer alive for the life of the process
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Log directory from the configuration, or `<data dir>/logs`
pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    config
        .log_dir
        .clone()
        .unwrap_or_else(|| ConfigManager::default_data_dir().join("logs"))
}

/// Rename an existing log file to `<stem>.<timestamp>.log`
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<Option<PathBuf>> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(None);
    }

    let metadata = std::fs::metadata(&log_file_path)
        .map_err(|e| anyhow!("Failed to get log file metadata: {}", e))?;
    let file_time = metadata
        .modified()
        .unwrap_or_else(|_| std::time::SystemTime::now());
    let local_time: DateTime<Local> = file_time.into();

    let file_stem = log_file_name.trim_end_matches(".log");
    let timestamped_name = format!("{}.{}.log", file_stem, local_time.format("%Y%m%dT%H%M%S"));
    let timestamped_path = log_dir.join(&timestamped_name);

    std::fs::rename(&log_file_path, &timestamped_path).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {}",
            log_file_path.display(),
            timestamped_path.display(),
            e
        )
    })?;

    Ok(Some(timestamped_path))
}

/// Filter built from the configuration alone
fn configured_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter = EnvFilter::new(&config.level);

    if !config.level.to_lowercase().contains("trace") {
        for (target, level) in NOISY_TARGETS {
            filter = add_directive(filter, &format!("{}={}", target, level));
        }
        filter = add_directive(filter, &format!("{}={}", APP_TARGET, config.level));
    }

    for (module, level) in &config.module_filters {
        filter = add_directive(filter, &format!("{}={}", module, level));
    }

    filter
}

fn add_directive(filter: EnvFilter, directive: &str) -> EnvFilter {
    match directive.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(e) => {
            eprintln!("Ignoring invalid log directive '{}': {}", directive, e);
            filter
        }
    }
}

/// Initialize logging with custom configuration
///
/// Below trace level, SQL statements, HTTP internals and HTML tokenizer
/// chatter are suppressed. Override with `RUST_LOG`:
/// ```bash
/// RUST_LOG="debug,sqlx::query=debug" ingredient-harvest harvest
/// ```
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| configured_filter(&config));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .boxed(),
        );
    }

    let mut log_file = None;
    if config.file_output {
        let log_dir = get_log_directory(&config);
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
        rotate_existing_log_file(&log_dir, LOG_FILE_NAME)?;

        let (file_writer, file_guard) = non_blocking(rolling::never(&log_dir, LOG_FILE_NAME));
        if let Ok(mut guards) = LOG_GUARDS.lock() {
            guards.push(file_guard);
        }

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_timer(LocalTimeFormatter)
            .with_ansi(false);
        layers.push(if config.json_format {
            file_layer
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        } else {
            file_layer.with_target(false).boxed()
        });
        log_file = Some(log_dir.join(LOG_FILE_NAME));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized (level: {})", config.level);
    if let Some(path) = log_file {
        info!("Log file: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_noisy_targets_clamped_below_trace() {
        let filter = configured_filter(&LoggingConfig::default()).to_string();
        assert!(filter.contains("sqlx=warn"));
        assert!(filter.contains("html5ever=warn"));
    }

    #[test]
    fn test_trace_level_keeps_dependencies() {
        let config = LoggingConfig {
            level: "trace".to_string(),
            module_filters: Default::default(),
            ..LoggingConfig::default()
        };
        let filter = configured_filter(&config).to_string();
        assert!(!filter.contains("sqlx"));
    }

    #[test]
    fn test_module_filters_are_applied() {
        let mut config = LoggingConfig::default();
        config
            .module_filters
            .insert("ingredient_harvest_lib::application".to_string(), "debug".to_string());
        let filter = configured_filter(&config).to_string();
        assert!(filter.contains("ingredient_harvest_lib::application=debug"));
    }

    #[test]
    fn test_rotate_existing_log_file() {
        let dir = tempdir().unwrap();
        assert!(rotate_existing_log_file(dir.path(), LOG_FILE_NAME).unwrap().is_none());

        std::fs::write(dir.path().join(LOG_FILE_NAME), "old run").unwrap();
        let rotated = rotate_existing_log_file(dir.path(), LOG_FILE_NAME).unwrap().unwrap();

        assert!(!dir.path().join(LOG_FILE_NAME).exists());
        assert_eq!(std::fs::read_to_string(rotated).unwrap(), "old run");
    }

    #[test]
    fn test_log_directory_override() {
        let config = LoggingConfig {
            log_dir: Some(PathBuf::from("/var/log/harvest")),
            ..LoggingConfig::default()
        };
        assert_eq!(get_log_directory(&config), PathBuf::from("/var/log/harvest"));
    }
}
