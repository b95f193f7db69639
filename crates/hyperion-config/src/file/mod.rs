//! File-backed configuration provider with hot reload.
//!
//! [`FileProvider`] parses one structured document (YAML, JSON, or
//! TOML, auto-detected from the filename suffix), applies environment
//! overrides, and serves typed reads from an immutable-by-swap view.
//! Subscribers registered through [`Provider::watch`] are notified when
//! the file changes on disk and the parsed view actually differs.

mod format;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, Weak};

use hyperion_core::kv::KeyValue;
use hyperion_core::log::{Logger, LoggerRef, NopLogger};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;

pub use format::Format;

use crate::error::ConfigError;
use crate::provider::{ChangeEvent, Provider, WatchCallback, WatchGuard};

const POISONED: &str = "FileProvider lock poisoned";

/// Settle time between a change notification and the re-parse, letting
/// truncate-and-write and rename-and-replace writers finish the file.
const SETTLE: std::time::Duration = std::time::Duration::from_millis(50);

/// Default environment-override prefix.
pub const DEFAULT_ENV_PREFIX: &str = "APP_";

type SharedCallback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// File-backed [`Provider`] with environment overrides and hot reload.
///
/// One read-write lock guards the parsed view and the subscriber map:
/// readers take the read lock and always observe a fully consistent
/// view; the reload path re-parses outside the lock and swaps the tree
/// under the write lock. Change callbacks are invoked outside the lock,
/// so a callback may subscribe or unsubscribe without deadlocking.
///
/// # Examples
///
/// ```no_run
/// use hyperion_config::{FileProvider, Provider as _};
///
/// # fn main() -> Result<(), hyperion_config::ConfigError> {
/// let provider = FileProvider::builder()
///     .path("config/app.yaml")
///     .build()?;
///
/// let host = provider.get_string("database.host")?;
/// let guard = provider.watch(Box::new(|event| {
///     println!("config changed: {}", event.key);
/// }))?;
/// # Ok(())
/// # }
/// ```
#[must_use]
#[derive(Clone)]
pub struct FileProvider {
    inner: Arc<Shared>,
}

struct Shared {
    path: PathBuf,
    basename: String,
    format: Format,
    env_prefix: String,
    logger: LoggerRef,
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    root: Value,
    callbacks: HashMap<u64, SharedCallback>,
    next_id: u64,
    // Start-once: kept alive for the provider's lifetime even after the
    // last subscriber stops.
    watcher: Option<RecommendedWatcher>,
}

impl FileProvider {
    /// Returns a [`FileProviderBuilder`].
    pub fn builder() -> FileProviderBuilder {
        FileProviderBuilder::new()
    }

    /// Loads the provider from `path` with default settings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::builder().path(path).build()
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Re-reads and re-parses the backing file, swapping the view.
    ///
    /// Returns `true` when the parsed view differs from the current
    /// one. Called automatically on filesystem change notifications;
    /// exposed for deployments that signal reloads out of band.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        self.inner.reload()
    }
}

impl Shared {
    /// Parses the file and applies environment overrides.
    fn load(&self) -> Result<Value, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;

        let mut root = self.format.parse(&text, &self.path)?;
        format::apply_env_overrides(&mut root, &self.env_prefix, std::env::vars());
        Ok(root)
    }

    fn reload(&self) -> Result<bool, ConfigError> {
        // Parse outside the lock; readers keep the old view until the swap.
        let root = self.load()?;

        let mut state = self.state.write().expect(POISONED);
        if state.root == root {
            return Ok(false);
        }

        state.root = root;
        Ok(true)
    }

    /// Reacts to one filesystem notification for the watched directory.
    fn on_fs_event(&self, event: &Event) {
        if event.kind.is_access() {
            return;
        }

        let concerns_file = event.paths.is_empty()
            || event
                .paths
                .iter()
                .any(|p| p.file_name().is_some_and(|n| n == self.basename.as_str()));
        if !concerns_file {
            return;
        }

        std::thread::sleep(SETTLE);
        match self.reload() {
            Ok(true) => self.notify_subscribers(),
            Ok(false) => {}
            Err(error) => self.logger.error(
                "config reload failed",
                &[
                    KeyValue::string("file", self.basename.clone()),
                    KeyValue::string("error", error.to_string()),
                ],
            ),
        }
    }

    /// Invokes every live callback outside the lock.
    fn notify_subscribers(&self) {
        let callbacks: Vec<SharedCallback> = {
            let state = self.state.read().expect(POISONED);
            state.callbacks.values().cloned().collect()
        };

        let event = ChangeEvent {
            key: self.basename.clone(),
            value: None,
        };
        for callback in callbacks {
            callback(event.clone());
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Value) -> T) -> T {
        let state = self.state.read().expect(POISONED);
        f(&state.root)
    }
}

/// Starts the filesystem watcher for the provider's directory.
///
/// Watches the parent directory rather than the file itself, so
/// rename-and-replace writes (the common editor and config-map pattern)
/// keep notifying.
fn spawn_watcher(shared: &Arc<Shared>) -> Result<RecommendedWatcher, ConfigError> {
    let weak: Weak<Shared> = Arc::downgrade(shared);
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        let Some(shared) = weak.upgrade() else {
            return;
        };

        match result {
            Ok(event) => shared.on_fs_event(&event),
            Err(error) => shared.logger.error(
                "config watcher error",
                &[KeyValue::string("error", error.to_string())],
            ),
        }
    })
    .map_err(|e| ConfigError::Watch(e.to_string()))?;

    let dir = shared
        .path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| ConfigError::Watch(e.to_string()))?;

    Ok(watcher)
}

impl Provider for FileProvider {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.read(|root| format::lookup(root, key).cloned())
    }

    fn all_keys(&self) -> Vec<String> {
        self.inner.read(format::flatten_keys)
    }

    fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        match self.require(key)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(mismatch(key, "a string", &other)),
        }
    }

    fn get_int64(&self, key: &str) -> Result<i64, ConfigError> {
        let value = self.require(key)?;
        match &value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| mismatch(key, "an integer", &value))
    }

    fn get_float64(&self, key: &str) -> Result<f64, ConfigError> {
        let value = self.require(key)?;
        match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| mismatch(key, "a float", &value))
    }

    fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        let value = self.require(key)?;
        match &value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| mismatch(key, "a boolean", &value))
    }

    fn get_string_slice(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        let value = self.require(key)?;
        let Value::Array(items) = &value else {
            return Err(mismatch(key, "an array of strings", &value));
        };

        items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                _ => Err(mismatch(key, "an array of strings", &value)),
            })
            .collect()
    }

    fn unmarshal_value(&self, key: &str) -> Result<Value, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::NotFound {
            key: key.to_owned(),
        })
    }

    fn watch(&self, callback: WatchCallback) -> Result<WatchGuard, ConfigError> {
        let id = {
            let mut state = self.inner.state.write().expect(POISONED);

            // Lazy start-once watcher initialization.
            if state.watcher.is_none() {
                state.watcher = Some(spawn_watcher(&self.inner)?);
            }

            let id = state.next_id;
            state.next_id += 1;
            let _ = state.callbacks.insert(id, Arc::from(callback));
            id
        };

        let weak = Arc::downgrade(&self.inner);
        Ok(WatchGuard::new(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                let _ = shared.state.write().expect(POISONED).callbacks.remove(&id);
            }
        })))
    }
}

impl FileProvider {
    fn require(&self, key: &str) -> Result<Value, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::NotFound {
            key: key.to_owned(),
        })
    }
}

fn mismatch(key: &str, expected: &'static str, got: &Value) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_owned(),
        expected,
        got: got.to_string(),
    }
}

impl fmt::Debug for FileProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileProvider")
            .field("path", &self.inner.path)
            .field("format", &self.inner.format)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring and loading a [`FileProvider`].
///
/// # Examples
///
/// ```no_run
/// use hyperion_config::FileProvider;
///
/// # fn main() -> Result<(), hyperion_config::ConfigError> {
/// let provider = FileProvider::builder()
///     .path("config/app.toml")
///     .env_prefix("MYAPP_")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
#[derive(Default)]
pub struct FileProviderBuilder {
    path: Option<PathBuf>,
    env_prefix: Option<String>,
    logger: Option<LoggerRef>,
}

impl FileProviderBuilder {
    /// Creates a new [`FileProviderBuilder`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path. Required.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the environment-override prefix.
    ///
    /// Defaults to [`DEFAULT_ENV_PREFIX`]. A missing trailing `_` is
    /// appended.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into().to_ascii_uppercase();
        if !prefix.ends_with('_') {
            prefix.push('_');
        }
        self.env_prefix = Some(prefix);
        self
    }

    /// Sets the logger used for watcher and reload diagnostics.
    pub fn logger(mut self, logger: LoggerRef) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Loads the file and builds the [`FileProvider`].
    ///
    /// # Errors
    ///
    /// Returns an error when no path was given, the suffix maps to no
    /// supported format, the file is unreadable, or parsing fails.
    pub fn build(self) -> Result<FileProvider, ConfigError> {
        let path = self.path.ok_or(ConfigError::MissingPath)?;
        let format = Format::detect(&path)?;
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let shared = Shared {
            path,
            basename,
            format,
            env_prefix: self.env_prefix.unwrap_or_else(|| DEFAULT_ENV_PREFIX.to_owned()),
            logger: self.logger.unwrap_or_else(NopLogger::shared),
            state: RwLock::new(State::default()),
        };

        let root = shared.load()?;
        shared.state.write().expect(POISONED).root = root;

        Ok(FileProvider {
            inner: Arc::new(shared),
        })
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::sync::mpsc;
    use std::time::Duration;

    use serde_json::json;

    use crate::error::ConfigError;
    use crate::file::FileProvider;
    use crate::provider::{ChangeEvent, Provider, ProviderExt};

    const RECV_TIMEOUT: Duration = Duration::from_secs(10);
    const QUIET: Duration = Duration::from_millis(300);

    fn write_provider(name: &str, contents: &str) -> (tempfile::TempDir, FileProvider) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        let provider = FileProvider::open(path).unwrap();
        (dir, provider)
    }

    #[test]
    fn typed_reads_from_yaml() {
        let (_dir, provider) = write_provider(
            "app.yaml",
            "log:\n  level: info\ndatabase:\n  port: 5432\n  replicas: [one, two]\ndebug: true\nratio: 0.5\n",
        );

        assert_eq!(provider.get_string("log.level").unwrap(), "info");
        assert_eq!(provider.get_int64("database.port").unwrap(), 5432);
        assert_eq!(provider.get_float64("ratio").unwrap(), 0.5);
        assert!(provider.get_bool("debug").unwrap());
        assert_eq!(
            provider.get_string_slice("database.replicas").unwrap(),
            ["one", "two"]
        );

        assert!(provider.is_set("log.level"));
        assert!(!provider.is_set("log.file"));
        assert_eq!(
            provider.all_keys(),
            [
                "database.port",
                "database.replicas",
                "debug",
                "log.level",
                "ratio"
            ]
        );
    }

    #[test]
    fn read_errors_are_typed() {
        let (_dir, provider) = write_provider("app.json", r#"{"log": {"level": "info"}}"#);

        assert!(matches!(
            provider.get_string("log.missing"),
            Err(ConfigError::NotFound { .. })
        ));
        assert!(matches!(
            provider.get_int64("log.level"),
            Err(ConfigError::TypeMismatch { .. })
        ));
        assert!(matches!(
            provider.get_bool("log"),
            Err(ConfigError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn unmarshal_key_and_whole_document() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Database {
            host: String,
            port: u16,
        }

        #[derive(Debug, serde::Deserialize)]
        struct Document {
            database: Database,
        }

        let (_dir, provider) = write_provider(
            "app.toml",
            "[database]\nhost = \"localhost\"\nport = 5432\n",
        );

        let database: Database = provider.unmarshal("database").unwrap();
        assert_eq!(
            database,
            Database {
                host: "localhost".into(),
                port: 5432
            }
        );

        let document: Document = provider.unmarshal("").unwrap();
        assert_eq!(document.database.port, 5432);

        assert_eq!(
            provider.unmarshal_value("").unwrap(),
            json!({"database": {"host": "localhost", "port": 5432}})
        );
    }

    #[test]
    fn parse_failure_surfaces_at_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            FileProvider::open(path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn manual_reload_swaps_the_view() {
        let (dir, provider) = write_provider("app.yaml", "log:\n  level: info\n");
        assert_eq!(provider.get_string("log.level").unwrap(), "info");

        fs::write(dir.path().join("app.yaml"), "log:\n  level: debug\n").unwrap();
        assert!(provider.reload().unwrap());
        assert_eq!(provider.get_string("log.level").unwrap(), "debug");

        // Unchanged content does not report a new view.
        assert!(!provider.reload().unwrap());
    }

    #[test]
    fn readers_never_observe_a_torn_view() {
        let (dir, provider) = write_provider("app.yaml", "a: 1\nb: 1\n");
        let path = dir.path().join("app.yaml");

        std::thread::scope(|scope| {
            let writer = provider.clone();
            scope.spawn(move || {
                for generation in 2..50u64 {
                    fs::write(&path, format!("a: {generation}\nb: {generation}\n")).unwrap();
                    writer.reload().unwrap();
                }
            });

            for _ in 0..200 {
                // Both keys come from one consistent snapshot.
                let view = provider.unmarshal_value("").unwrap();
                assert_eq!(view["a"], view["b"]);
            }
        });
    }

    #[test]
    fn watch_delivers_one_event_per_change() {
        let (dir, provider) = write_provider("app.yaml", "log:\n  level: info\n");

        let (tx, rx) = mpsc::channel::<ChangeEvent>();
        let _guard = provider
            .watch(Box::new(move |event| {
                let _ = tx.send(event);
            }))
            .unwrap();

        fs::write(dir.path().join("app.yaml"), "log:\n  level: debug\n").unwrap();

        let event = rx.recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(event.key, "app.yaml");
        assert_eq!(event.value, None);
        assert_eq!(provider.get_string("log.level").unwrap(), "debug");

        // Duplicate filesystem notifications for the same content do
        // not re-notify.
        assert!(rx.recv_timeout(QUIET).is_err());
    }

    #[test]
    fn stopped_subscribers_receive_nothing() {
        let (dir, provider) = write_provider("app.yaml", "n: 1\n");

        let (tx1, rx1) = mpsc::channel::<ChangeEvent>();
        let (tx2, rx2) = mpsc::channel::<ChangeEvent>();
        let guard1 = provider
            .watch(Box::new(move |event| {
                let _ = tx1.send(event);
            }))
            .unwrap();
        let guard2 = provider
            .watch(Box::new(move |event| {
                let _ = tx2.send(event);
            }))
            .unwrap();

        fs::write(dir.path().join("app.yaml"), "n: 2\n").unwrap();
        assert!(rx1.recv_timeout(RECV_TIMEOUT).is_ok());
        assert!(rx2.recv_timeout(RECV_TIMEOUT).is_ok());

        guard1.stop();
        guard1.stop();

        fs::write(dir.path().join("app.yaml"), "n: 3\n").unwrap();
        assert!(rx2.recv_timeout(RECV_TIMEOUT).is_ok());
        assert!(rx1.recv_timeout(QUIET).is_err());
        drop(guard2);
    }

    #[test]
    fn failed_reload_keeps_the_view_and_notifies_nobody() {
        let (dir, provider) = write_provider("app.yaml", "log:\n  level: info\n");

        let (tx, rx) = mpsc::channel::<ChangeEvent>();
        let _guard = provider
            .watch(Box::new(move |event| {
                let _ = tx.send(event);
            }))
            .unwrap();

        fs::write(dir.path().join("app.yaml"), "log: [unclosed\n").unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(2)).is_err());
        assert_eq!(provider.get_string("log.level").unwrap(), "info");
    }
}
