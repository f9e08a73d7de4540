use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/sd-uploader.log";

/// Console output plus a log file rolled once a day. `LOG_FILE_PATH` names the
/// directory and file prefix: `./logs/sd-uploader.log` writes
/// `./logs/sd-uploader.log.YYYY-MM-DD`. `TRACING_LEVEL` takes an env-filter
/// directive and defaults to `info`.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes the file writer.
pub fn init_logger() -> WorkerGuard {
    let filter = EnvFilter::try_from_env("TRACING_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let (directory, prefix) = split_log_path(Path::new(&log_file));
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&directory, &prefix));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stdout),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(file_writer),
        )
        .init();

    info!(
        "Logging to {} ({}.*, rolled daily)",
        directory.display(),
        prefix.to_string_lossy()
    );
    guard
}

fn split_log_path(path: &Path) -> (PathBuf, OsString) {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("sd-uploader.log"));
    (directory, prefix)
}
