//! Logging functionality.
//! The logging library of choice is [tracing].
//!
//! Levels double as the console colours: status is `INFO` (green), incomplete
//! command structures are `WARN` (yellow) and failures are `ERROR` (red).

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use crate::setup::LoggingConfig;

/// The name of this crate, used to set filter target.
const THIS_CRATE: &str = env!("CARGO_CRATE_NAME");

/// Setup format layers, tracing subscribers, and installs tracing.
/// The returned guard must be held for file logs to be flushed.
pub(super) fn install_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    // Uses local time.
    let timer = fmt::time::ChronoLocal::rfc_3339();

    // Set which traces are tracked.
    // By default, all INFO traces and above are shown.
    let target = if config.console_debug {
        Targets::new()
            .with_default(LevelFilter::INFO)
            .with_target(THIS_CRATE, LevelFilter::DEBUG)
    } else {
        Targets::new().with_default(LevelFilter::INFO)
    };

    // Compose the layer that prints traces to stdout
    let console_layer = fmt::layer()
        .with_ansi(true)
        .with_file(config.console_debug)
        .with_level(true)
        .with_line_number(config.console_debug)
        .with_target(true)
        .with_timer(timer.clone())
        .with_filter(target.clone());

    // Compose the layer that writes logs and get a guard for the writer.
    let (log_layer, guard) = if config.logs_enabled {
        // Put file logs in `log_dir` as "{THIS_CRATE}.log.{TIMESTAMP}" on an hourly basis.
        let prefix_format = format!("{THIS_CRATE}.log");
        let appender = tracing_appender::rolling::hourly(&config.log_dir, prefix_format);

        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = fmt::layer()
            .with_ansi(false)
            .with_file(config.console_debug)
            .with_level(true)
            .with_line_number(config.console_debug)
            .with_target(true)
            .with_timer(timer)
            .with_writer(writer)
            .compact()
            .with_filter(target);

        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // Add all the layers and initialize them.
    tracing_subscriber::registry()
        .with(console_layer)
        .with(log_layer)
        .init();

    guard
}
