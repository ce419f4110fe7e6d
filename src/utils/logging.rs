//! Logging bootstrap
//!
//! The configured level applies to every target unless `RUST_LOG` holds a
//! valid filter, e.g. `RUST_LOG=eventrelay::broker=debug,info`.

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber. Later calls are no-ops.
pub fn init(default_level: &str) {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level, directives.as_deref()))
        .with_target(false)
        .try_init();
}

/// `directives` when they parse, else `default_level` for everything.
pub(crate) fn filter(default_level: &str, directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| {
            EnvFilter::default().add_directive(LevelFilter::from_level(parse_level(default_level)).into())
        })
}

pub(crate) fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" | "warning" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}
