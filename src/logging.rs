use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Keeps the file writer flushing for the life of the process.
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialise logging. Without `debug` the level is fixed at `info`
/// regardless of `RUST_LOG`; with it the default is `debug` and `RUST_LOG`
/// may override it.
///
/// When `log_file` is given, output is written there as well as to stderr.
/// Only the first successful call installs a subscriber.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let appender = match log_file.as_deref().map(open_appender) {
        Some(Ok(appender)) => appender,
        Some(Err(err)) => {
            if builder.with_writer(std::io::stderr).try_init().is_ok() {
                tracing::warn!("log file unavailable, logging to stderr only: {err}");
            }
            return;
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
            return;
        }
    };

    let (writer, guard) = tracing_appender::non_blocking(appender);
    if builder
        .with_ansi(false)
        .with_writer(std::io::stderr.and(writer))
        .try_init()
        .is_ok()
    {
        let _ = FILE_GUARD.set(guard);
    }
}

fn open_appender(path: &Path) -> anyhow::Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("{} has no file name", path.display()))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)?;
    Ok(appender)
}
