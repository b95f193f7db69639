#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod logger;

pub use crate::logger::TracingLogger;

use hyperion_core::log::{Level, LoggerRef};
use tracing_subscriber::EnvFilter;

/// Installs a process-wide `tracing-subscriber` fmt subscriber and
/// returns a [`TracingLogger`] at `default_level`.
///
/// The subscriber honors `RUST_LOG` when set and falls back to
/// `default_level` otherwise. Installing is best-effort: when a
/// subscriber is already set (tests, embedding hosts), the existing one
/// keeps receiving the events.
pub fn init(default_level: Level) -> LoggerRef {
    let fallback = match default_level {
        Level::Debug => "debug",
        Level::Info => "info",
        Level::Warn => "warn",
        Level::Error | Level::Fatal => "error",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    TracingLogger::shared(default_level)
}
