//! `tracing` subscriber setup.
//!
//! Adhesive only emits events; nothing is printed until a subscriber is
//! installed, either by the host application or through [`init`].

use std::sync::OnceLock;

use adhesive_config::{LoggingConfig, DEFAULT_LOG_FILTER};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: OnceLock<()> = OnceLock::new();

/// Installs a formatting subscriber filtered by `RUST_LOG`, falling back to
/// the configured filter.
///
/// Safe to call multiple times - only the first call has effect. If the
/// host already installed a global subscriber, that one stays in place.
pub fn init(config: &LoggingConfig) {
    init_with_filter(&config.filter);
}

/// Like [`init`], with an explicit fallback filter directive.
pub fn init_with_filter(filter: &str) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(filter))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init();
    });
}

/// Returns true once [`init`] has run in this process.
pub fn is_initialized() -> bool {
    INIT.get().is_some()
}
