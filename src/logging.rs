use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber, writing to stderr so CLI output
/// on stdout stays clean. An invalid filter falls back to `info`; calling
/// this twice is harmless.
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
