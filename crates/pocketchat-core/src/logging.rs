use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Called once by the host application at startup. Respects `RUST_LOG`;
/// defaults to `info` when unset. Safe to call more than once — later
/// calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
