//! Structured logging setup.
//!
//! Tries to log to a rolling file under the state directory, falling back
//! to stderr if the directory can't be created. Never logs to stdout —
//! stdout carries the JSON-RPC transport.

use tracing_subscriber::EnvFilter;

use crate::config::paths::get_data_dir;

/// Must be kept alive for the lifetime of the process when file logging
/// is active, or the non-blocking writer drops pending lines on exit.
pub struct LogGuard(#[allow(dead_code)] Option<tracing_appender::non_blocking::WorkerGuard>);

pub fn init() -> LogGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let data_dir = get_data_dir();
    let use_file = std::fs::create_dir_all(&data_dir).is_ok();

    if use_file {
        let file_appender = tracing_appender::rolling::never(&data_dir, "voxd.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .with_ansi(false)
            .init();
        LogGuard(Some(guard))
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        LogGuard(None)
    }
}
