//! Configuration provider contract.

use std::fmt;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ConfigError;

/// Payload delivered to configuration subscribers on reload.
///
/// File-backed providers send the basename of the changed file as `key`
/// and no `value`; subscribers re-read the values they care about
/// explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Identifier of what changed (the file basename for file-backed
    /// providers).
    pub key: String,
    /// New value, when the provider can supply one.
    pub value: Option<Value>,
}

/// Type alias for a boxed configuration-change callback.
pub type WatchCallback = Box<dyn Fn(ChangeEvent) + Send + Sync>;

/// Typed read access to a configuration tree.
///
/// Keys are dot-separated paths (`database.host`). Readers observe a
/// fully consistent view: a concurrent reload never produces a torn
/// read.
pub trait Provider: Send + Sync {
    /// Returns the raw value at `key`, if set.
    fn get(&self, key: &str) -> Option<Value>;

    /// Returns `true` if `key` is set.
    fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns every leaf key path in the document, sorted.
    fn all_keys(&self) -> Vec<String>;

    /// Returns the string at `key`.
    ///
    /// Scalars (numbers, booleans) are rendered to their string form.
    fn get_string(&self, key: &str) -> Result<String, ConfigError>;

    /// Returns the signed 64-bit integer at `key`.
    fn get_int64(&self, key: &str) -> Result<i64, ConfigError>;

    /// Returns the 64-bit float at `key`.
    fn get_float64(&self, key: &str) -> Result<f64, ConfigError>;

    /// Returns the boolean at `key`.
    fn get_bool(&self, key: &str) -> Result<bool, ConfigError>;

    /// Returns the string array at `key`.
    fn get_string_slice(&self, key: &str) -> Result<Vec<String>, ConfigError>;

    /// Returns the raw value at `key` for decoding.
    ///
    /// `""` returns the whole document. Prefer [`ProviderExt::unmarshal`].
    fn unmarshal_value(&self, key: &str) -> Result<Value, ConfigError>;

    /// Subscribes to change notifications.
    ///
    /// Every call registers an independent subscriber and returns its
    /// own [`WatchGuard`]; stopping one subscriber does not affect the
    /// others.
    fn watch(&self, callback: WatchCallback) -> Result<WatchGuard, ConfigError>;
}

/// Extension methods that are not dyn-compatible.
pub trait ProviderExt: Provider {
    /// Decodes the value at `key` into `T`.
    ///
    /// `""` decodes the whole document.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// #[derive(serde::Deserialize)]
    /// struct DatabaseConfig {
    ///     host: String,
    ///     port: u16,
    /// }
    ///
    /// let db: DatabaseConfig = provider.unmarshal("database")?;
    /// ```
    fn unmarshal<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self.unmarshal_value(key)?;
        serde_json::from_value(value).map_err(|e| ConfigError::Decode {
            key: key.to_owned(),
            message: e.to_string(),
        })
    }
}

impl<P: Provider + ?Sized> ProviderExt for P {}

/// Stops a configuration subscription.
///
/// Returned by [`Provider::watch`]; each guard controls exactly one
/// subscriber. [`stop`] is idempotent, and dropping the guard stops the
/// subscription as well. Stopping the last subscriber does not tear
/// down the provider's underlying filesystem watcher.
///
/// [`stop`]: WatchGuard::stop
#[must_use = "the subscription is stopped when the guard is dropped"]
pub struct WatchGuard {
    stop: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl WatchGuard {
    /// Creates a guard from the provider-specific removal closure.
    pub fn new(stop: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            stop: Mutex::new(Some(stop)),
        }
    }

    /// Stops the subscription. Idempotent.
    pub fn stop(&self) {
        let stop = self.stop.lock().expect("WatchGuard mutex poisoned").take();
        if let Some(stop) = stop {
            stop();
        }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = self
            .stop
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false);
        f.debug_struct("WatchGuard").field("live", &live).finish()
    }
}
