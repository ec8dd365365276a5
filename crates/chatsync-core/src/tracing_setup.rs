use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::LOG_FILE_ENV;

pub fn init_tracing() {
    init_tracing_with_service("chatsync");
}

/// Install the global subscriber: stderr output filtered by `RUST_LOG`
/// (default `info`), plus a DEBUG-level file log when `CHATSYNC_LOG_FILE`
/// names a path. Calling it twice is harmless; the second call is ignored.
pub fn init_tracing_with_service(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file_logging = std::env::var(LOG_FILE_ENV).ok();
    let file = file_logging.as_ref().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Could not open log file {}: {}", log_path, e);
                None
            }
        }
    });

    let result = match file {
        Some(file) => {
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);
            registry.with(file_layer).try_init()
        }
        None => registry.try_init(),
    };

    if result.is_ok() {
        tracing::debug!(service = service_name, "tracing initialized");
        if let Some(log_path) = file_logging {
            eprintln!("File logging enabled: {}", log_path);
        }
    }
}
