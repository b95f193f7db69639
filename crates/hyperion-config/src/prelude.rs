//! A convenience module that re-exports commonly used items.
//!
//! This module is intended to be glob-imported for convenience:
//!
//! ```
//! use hyperion_config::prelude::*;
//! ```

pub use crate::{
    ChangeEvent, ConfigError, FileProvider, FileProviderBuilder, Format, Provider, ProviderExt,
    WatchGuard,
};
