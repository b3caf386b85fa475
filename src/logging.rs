use std::fs;
use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the structured logging system.
///
/// Sets up:
/// - Console output (stderr): human-readable format. Stdout is reserved for
///   the IPC event stream.
/// - File output: rolling log files in `log_dir/jarvis.<date>.log` with daily
///   rotation, keeping the latest 5 files. Skipped with a warning if the
///   directory cannot be used; console logging still comes up.
/// - Environment filter: `RUST_LOG` when set, otherwise `info` (or `debug`
///   when `debug` is true).
///
/// Fails only if a global subscriber is already installed.
pub fn init(log_dir: &Path, debug: bool) -> anyhow::Result<()> {
    let (appender, file_error) = match file_appender(log_dir) {
        Ok(appender) => (Some(appender), None),
        Err(e) => (None, Some(e)),
    };

    let file_layer = appender.map(|appender| {
        fmt::layer()
            .with_writer(appender)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
    });

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .compact();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    let debug_enabled = debug;
    match file_error {
        None => tracing::info!(log_dir = %log_dir.display(), debug = debug_enabled, "Logger initialized"),
        Some(e) => tracing::warn!(
            log_dir = %log_dir.display(),
            "File logging unavailable, logging to stderr only: {:#}",
            e
        ),
    }
    Ok(())
}

fn file_appender(log_dir: &Path) -> anyhow::Result<RollingFileAppender> {
    fs::create_dir_all(log_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("jarvis")
        .filename_suffix("log")
        .max_log_files(5)
        .build(log_dir)?;
    Ok(appender)
}

/// Filter used when `RUST_LOG` is unset. HTTP and audio internals are kept
/// at `warn` so they do not drown the turn-by-turn trace.
fn default_directives(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    format!("{level},reqwest=warn,hyper=warn,hyper_util=warn,mio=warn,rodio=warn,cpal=warn")
}
