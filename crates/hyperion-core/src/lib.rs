#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod context;
pub mod db;
mod error;
pub mod intercept;
pub mod kv;
pub mod log;
pub mod metric;
pub mod scope;
pub mod trace;

#[doc(hidden)]
pub mod prelude;

#[doc(no_inline)]
pub use async_trait::async_trait;

pub use crate::error::{BoxError, Error, ErrorKind};

/// Specialized [`Result`] type for framework operations.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Tracing target for interceptor pipeline events.
#[cfg(feature = "tracing")]
pub(crate) const TRACING_TARGET_INTERCEPT: &str = "hyperion_core::intercept";
