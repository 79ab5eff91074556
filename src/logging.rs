//! # Structured Logging Module
//!
//! Environment-aware structured logging to stderr and, when a log directory
//! is configured, to a JSON file for post-mortem of long batches.

use chrono::Utc;
use std::fs;
use std::path::Path;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::constants::env;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process. Later calls are no-ops.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment).to_string());

        let console = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_level(true)
            .with_filter(EnvFilter::new(&log_level));

        let file_layer = config.log_dir.as_deref().and_then(|log_dir| {
            if let Err(e) = fs::create_dir_all(log_dir) {
                eprintln!("batchmatch: cannot create log directory {}: {e}", log_dir.display());
                return None;
            }
            let log_filename = format!(
                "{}.{}.{}.log",
                environment,
                process::id(),
                Utc::now().format("%Y%m%d_%H%M%S")
            );
            let file_appender = tracing_appender::rolling::never(log_dir, &log_filename);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            // The writer must outlive every log call for the rest of the process
            std::mem::forget(guard);
            Some((
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(&log_level)),
                log_dir.join(log_filename),
            ))
        });
        let (file_layer, log_path) = match file_layer {
            Some((layer, path)) => (Some(layer), Some(path)),
            None => (None, None),
        };

        if tracing_subscriber::registry()
            .with(console)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            level = %log_level,
            log_file = ?log_path,
            "🔧 STRUCTURED LOGGING: initialized"
        );
    });
}

/// Current environment name from `BATCHMATCH_ENV`, then `APP_ENV`
fn get_environment() -> String {
    std::env::var(env::ENVIRONMENT)
        .or_else(|_| std::env::var(env::FALLBACK_ENVIRONMENT))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for batch run operations
pub fn log_batch_operation(
    operation: &str,
    workers: Option<usize>,
    resuming: Option<bool>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        workers = workers,
        resuming = resuming,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 BATCH_OPERATION"
    );
}

/// Log structured data for journal operations
pub fn log_journal_operation(
    operation: &str,
    path: &Path,
    completed: Option<usize>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        journal = %path.display(),
        completed = completed,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "💾 JOURNAL_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
