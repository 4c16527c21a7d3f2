use std::{env, fs};

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{Builder, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    core::{PropsError, Result},
    settings::{LogFormat, LoggingSettings},
};

const DAYS_TO_KEEP: usize = 7;

/// Initialize tracing for the application
///
/// Uses `RUST_LOG` if set, otherwise the configured level. The console
/// format comes from `PROPS_LOG_FORMAT` (`pretty` or `json`) when set,
/// otherwise from the settings. When a log directory is configured, events
/// are also written to daily rolling files there.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the lifetime of the program.
///
/// # Errors
/// Returns error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.to_string()));

    let format = env::var("PROPS_LOG_FORMAT")
        .ok()
        .and_then(|name| LogFormat::parse(&name))
        .unwrap_or(settings.format);

    let (file_layer, guard) = match &settings.directory {
        Some(log_dir) => {
            fs::create_dir_all(log_dir).map_err(|e| PropsError::io(&e, log_dir))?;

            let file_appender = Builder::new()
                .rotation(Rotation::DAILY)
                .max_log_files(DAYS_TO_KEEP)
                .filename_prefix("props")
                .filename_suffix("log")
                .build(log_dir)
                .map_err(|e| PropsError::Logging {
                    details: e.to_string(),
                })?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .compact()
                .with_target(true)
                .with_level(true)
                .with_writer(non_blocking)
                .with_ansi(false);

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    let initialized = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    initialized.map_err(|e| PropsError::Logging {
        details: e.to_string(),
    })?;

    Ok(guard)
}
