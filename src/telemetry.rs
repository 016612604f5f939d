//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! driver's call. [`init_tracing`] installs a formatted subscriber filtered
//! by `RUST_LOG` (default `info`).

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Errors emitted when configuring the tracing subscriber
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// [`init_tracing`] already ran in this process
    #[error("tracing has already been initialised")]
    AlreadyInitialised,
    /// Another global subscriber was installed first
    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Install the global tracing subscriber
///
/// # Errors
///
/// Returns [`InitError::AlreadyInitialised`] on every call after the first,
/// or [`InitError::Install`] if a different subscriber is already set
pub fn init_tracing() -> Result<(), InitError> {
    INITIALISED
        .set(())
        .map_err(|()| InitError::AlreadyInitialised)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| InitError::Install(e.to_string()))
}

/// Install the subscriber unless one is already present
///
/// Failures are ignored; repeated calls are harmless.
pub fn try_init_tracing() {
    let _ = init_tracing();
}
