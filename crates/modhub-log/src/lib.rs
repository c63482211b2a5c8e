// ABOUTME: Shared tracing setup for the hub and its tooling.
// ABOUTME: init() logs to stderr, init_file() to a per-app file, init_for() filters by crate.

use tracing_subscriber::EnvFilter;

/// Standard logging to stderr. Default: INFO level, RUST_LOG override.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

/// File-based logging for desktop launches where stderr goes nowhere.
/// Logs to <config_dir>/modhub/{app_name}.log at INFO, RUST_LOG override.
/// If setup fails, prints a warning to stderr and continues without logging.
pub fn init_file(app_name: &str) {
    if let Err(e) = init_file_inner(app_name) {
        eprintln!("Warning: failed to set up file logging: {e}");
    }
}

fn init_file_inner(app_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = dirs::config_dir().ok_or("could not determine config directory")?;
    let log_dir = config_dir.join("modhub");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(format!("{app_name}.log")))?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_ansi(false)
        .init();

    Ok(())
}

/// Target-filtered logging to stderr. Default: INFO for the named targets, WARN for everything else.
/// Keeps tonic/hyper chatter out of the hub's output. Targets match by prefix,
/// so `modhub` covers every `modhub_*` crate.
pub fn init_for(targets: &[&str]) {
    let filter = targets.iter().fold(
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        |filter, target| match format!("{target}=info").parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        },
    );

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
