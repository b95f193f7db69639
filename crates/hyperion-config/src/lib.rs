#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod file;
mod provider;

#[doc(hidden)]
pub mod prelude;

pub use crate::error::ConfigError;
pub use crate::file::{DEFAULT_ENV_PREFIX, FileProvider, FileProviderBuilder, Format};
pub use crate::provider::{ChangeEvent, Provider, ProviderExt, WatchCallback, WatchGuard};
