//! A convenience module that re-exports commonly used items.
//!
//! This module is intended to be glob-imported for convenience:
//!
//! ```
//! use hyperion::prelude::*;
//! ```

pub use hyperion_core::prelude::*;

pub use crate::runtime::{Hyperion, HyperionBuilder};

#[cfg(feature = "config")]
#[cfg_attr(docsrs, doc(cfg(feature = "config")))]
pub use hyperion_config::prelude::*;
#[cfg(feature = "tracing-logger")]
#[cfg_attr(docsrs, doc(cfg(feature = "tracing-logger")))]
pub use hyperion_tracing::TracingLogger;
#[cfg(feature = "otel")]
#[cfg_attr(docsrs, doc(cfg(feature = "otel")))]
pub use hyperion_otel::{OtelMeter, OtelTracer};
#[cfg(feature = "sqlx")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlx")))]
pub use hyperion_sqlx::SqlxDatabase;
