#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

#[doc(inline)]
pub use runtime::{Hyperion, HyperionBuilder};
#[doc(no_inline)]
pub use hyperion_core::async_trait;
pub use hyperion_core::{
    BoxError, Error, ErrorKind, Result, context, db, intercept, kv, log, metric, scope, trace,
};
#[cfg(feature = "config")]
#[cfg_attr(docsrs, doc(cfg(feature = "config")))]
pub use hyperion_config::{
    ChangeEvent, ConfigError, FileProvider, FileProviderBuilder, Provider, ProviderExt, WatchGuard,
};
#[cfg(feature = "tracing-logger")]
#[cfg_attr(docsrs, doc(cfg(feature = "tracing-logger")))]
pub use hyperion_tracing::TracingLogger;
#[cfg(feature = "otel")]
#[cfg_attr(docsrs, doc(cfg(feature = "otel")))]
pub use hyperion_otel::{OtelMeter, OtelSpan, OtelTracer};
#[cfg(feature = "sqlx")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlx")))]
pub use hyperion_sqlx::{SqlxDatabase, TxExecutor};

mod runtime;

#[doc(hidden)]
pub mod prelude;
