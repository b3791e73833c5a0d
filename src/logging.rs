//! Logging initialization and configuration.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "geoclue_position=info";

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Try to initialize the logging system.
///
/// Uses the `RUST_LOG` environment variable for filtering. If not set,
/// defaults to `geoclue_position=info`. Returns `Err` if logging has
/// already been initialized.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    install(default_filter())
}

/// Initialize logging with an explicit filter, e.g. the configured level.
///
/// A bare level such as `debug` is scoped to this crate; anything else is
/// handed to [`EnvFilter`] verbatim.
pub fn init_with_filter(filter: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let directive = if matches!(filter, "error" | "warn" | "info" | "debug" | "trace") {
        format!("geoclue_position={}", filter)
    } else {
        filter.to_string()
    };
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    install(filter)
}

/// Log output goes to stderr so that stdout stays free for JSON lines.
fn install(filter: EnvFilter) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init()
}
