use tracing_subscriber::EnvFilter;

/// Builds the filter: `RUST_LOG` wins when set, otherwise `default_filter`.
/// An unparseable directive falls back to `info`.
pub fn env_filter(default_filter: &str) -> EnvFilter {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
        }
        _ => EnvFilter::try_new(default_filter).unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// Installs a global fmt subscriber.
///
/// Returns false when a subscriber was already installed, which is not an
/// error: libraries and tests may both try to set one up.
pub fn init_logging(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(true)
        .try_init()
        .is_ok()
}
