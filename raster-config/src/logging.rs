//! Tracing subscriber bootstrap, grounded on the `registry()` + `EnvFilter`
//! + `fmt::layer()` pattern the host server binary initializes with.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs a global tracing subscriber. `default_directives` is used when
/// `RUST_LOG` isn't set, e.g. `"raster_core=debug,raster_config=info"`.
///
/// Panics if a global subscriber is already installed; call this once, at
/// process start.
pub fn init_tracing(default_directives: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
