use std::fs;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "seeder.log";
const DEFAULT_DIRECTIVE: &str = "nutrition_seeder=info";

/// Human-readable layer on stderr, keeping stdout for the run summary
fn console_layer<S>() -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer().with_target(false).with_writer(std::io::stderr)
}

/// Initializes logging with a human console layer and a daily JSON file under `logs/`.
///
/// `RUST_LOG` refines the filter. Keep the returned guard alive until exit or
/// buffered file output is lost.
pub fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        tracing_subscriber::registry().with(filter).with(console_layer()).init();
        tracing::warn!("File logging disabled, cannot create {}: {}", LOG_DIR, e);
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, LOG_FILE);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer())
        .init();

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_console_layer_stacks_with_and_without_file_layer() {
        let console_only = tracing_subscriber::registry()
            .with(EnvFilter::new("debug"))
            .with(console_layer());
        tracing::subscriber::with_default(console_only, || tracing::info!("console only"));

        let dir = tempdir().unwrap();
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir.path(), LOG_FILE));
        let with_file = tracing_subscriber::registry()
            .with(EnvFilter::new("debug"))
            .with(fmt::layer().json().with_writer(writer))
            .with(console_layer());
        tracing::subscriber::with_default(with_file, || tracing::info!(rows = 3, "with file"));
        drop(guard);

        let written = fs::read_to_string(dir.path().join(LOG_FILE)).unwrap();
        assert!(written.contains("with file"));
    }
}
