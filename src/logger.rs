//! Tracing initialisation for the brokerage

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

static INIT: Once = Once::new();

fn parse_level(raw: Option<&str>) -> Level {
    match raw.map(str::to_uppercase).as_deref() {
        Some("TRACE") => Level::TRACE,
        Some("DEBUG") => Level::DEBUG,
        Some("WARN") => Level::WARN,
        Some("ERROR") => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global `FmtSubscriber` at the level given by
/// `TTB_LOG_LEVEL`, defaulting to INFO.
///
/// Safe to call from the server shell, the test fixtures and library
/// consumers alike: only the first call installs anything, and an
/// already-registered subscriber (a test harness, usually) is left alone.
pub fn setup_logger() {
    INIT.call_once(|| {
        let level = parse_level(env::var("TTB_LOG_LEVEL").ok().as_deref());
        let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::debug!("logging initialised at {level}");
        }
    });
}
