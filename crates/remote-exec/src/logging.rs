//! Tracing subscriber setup for binaries and tests embedding the engine

use tracing_subscriber::EnvFilter;

use crate::sink::Verbosity;

/// Default filter directive for `verbosity`
///
/// `RUST_LOG` takes precedence when set.
pub fn default_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Normal => "warn",
        Verbosity::Verbose => "remote_exec=info",
        Verbosity::VeryVerbose | Verbosity::Debug => "remote_exec=debug",
    }
}

fn filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

/// Install a stderr fmt subscriber
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn init(verbosity: Verbosity) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbosity))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Like [`init`], but fails instead of panicking when a subscriber is already set
pub fn try_init(verbosity: Verbosity) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbosity))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
}
