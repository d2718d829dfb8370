use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the logging system with both console and file output.
///
/// The returned guard flushes the file writer when dropped; hold it for the
/// lifetime of the process. Without a writable `logs/` directory only the
/// console layer is installed.
pub fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("macau_ingest=info"));
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    // Daily-rotated JSON log alongside the human-readable console output
    let (file_layer, guard) = match fs::create_dir_all("logs") {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::daily("logs", "ingest.log");
            let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
            (
                Some(fmt::layer().json().with_writer(non_blocking_writer)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
