//! Leveled, structured, field-chaining logger contract.
//!
//! The [`Logger`] trait is a capability interface: concrete sinks live in
//! adapter crates (`hyperion-tracing` maps it onto the `tracing`
//! ecosystem) and [`NopLogger`] stands in when logging is unconfigured.

use std::str::FromStr;
use std::sync::Arc;

use crate::kv::KeyValue;
use crate::{Error, ErrorKind, Result};

/// Type alias for a shared, type-erased [`Logger`].
pub type LoggerRef = Arc<dyn Logger>;

/// Severity level of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    /// Fine-grained diagnostics.
    Debug,
    /// Routine operational records.
    #[default]
    Info,
    /// Suspicious but recoverable conditions.
    Warn,
    /// Failures that abort the current unit of work.
    Error,
    /// Failures that terminate the process after flushing.
    Fatal,
}

impl Level {
    /// Returns a string representation of the level.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => Err(Error::new(
                ErrorKind::Config,
                format!("unknown log level '{other}'"),
            )),
        }
    }
}

/// Leveled, structured logger with field chaining.
///
/// Implementations must be safe for concurrent use. Derivation via
/// [`with`] returns a new logger that prepends the given fields to every
/// subsequent record; the original logger is unchanged, and chained
/// derivations compose by concatenation:
/// `with(a).with(b)` records the same fields as `with(a ++ b)`.
///
/// [`with`]: Logger::with
pub trait Logger: Send + Sync {
    /// Records a message at the given level with the given fields.
    ///
    /// Records below the logger's current [`level`] are discarded.
    ///
    /// [`level`]: Logger::level
    fn log(&self, level: Level, msg: &str, fields: &[KeyValue]);

    /// Terminates the process with a non-zero exit status after
    /// recording the message and flushing buffered records.
    fn fatal(&self, msg: &str, fields: &[KeyValue]);

    /// Returns a derived logger that prepends `fields` to every record.
    fn with(&self, fields: &[KeyValue]) -> LoggerRef;

    /// Sets the minimum level for this logger and its derivation family.
    fn set_level(&self, level: Level);

    /// Returns the current minimum level.
    fn level(&self) -> Level;

    /// Flushes buffered records.
    ///
    /// Called once at shutdown by the lifecycle owner; adapters that
    /// buffer must flush here.
    fn sync(&self) -> Result<()>;

    /// Records a message at [`Level::Debug`].
    fn debug(&self, msg: &str, fields: &[KeyValue]) {
        self.log(Level::Debug, msg, fields);
    }

    /// Records a message at [`Level::Info`].
    fn info(&self, msg: &str, fields: &[KeyValue]) {
        self.log(Level::Info, msg, fields);
    }

    /// Records a message at [`Level::Warn`].
    fn warn(&self, msg: &str, fields: &[KeyValue]) {
        self.log(Level::Warn, msg, fields);
    }

    /// Records a message at [`Level::Error`].
    fn error(&self, msg: &str, fields: &[KeyValue]) {
        self.log(Level::Error, msg, fields);
    }

    /// Returns a derived logger carrying an `error` field.
    ///
    /// Sugar for `with(&[KeyValue::string("error", err.to_string())])`.
    fn with_error(&self, err: &Error) -> LoggerRef {
        self.with(&[KeyValue::string("error", err.to_string())])
    }
}

/// No-op [`Logger`] used when logging is unconfigured.
///
/// Discards every record; [`with`] returns another no-op logger and
/// [`sync`] always succeeds. [`fatal`] still terminates the process
/// with a non-zero exit status: that part of the contract holds for
/// every implementation, the record is merely not written anywhere.
///
/// [`with`]: Logger::with
/// [`sync`]: Logger::sync
/// [`fatal`]: Logger::fatal
#[derive(Debug, Clone, Copy, Default)]
pub struct NopLogger;

impl NopLogger {
    /// Creates a new [`NopLogger`] behind a [`LoggerRef`].
    pub fn shared() -> LoggerRef {
        Arc::new(Self)
    }
}

impl Logger for NopLogger {
    #[inline]
    fn log(&self, _level: Level, _msg: &str, _fields: &[KeyValue]) {}

    /// Terminates the process; the record itself is discarded.
    fn fatal(&self, _msg: &str, _fields: &[KeyValue]) {
        std::process::exit(1);
    }

    fn with(&self, _fields: &[KeyValue]) -> LoggerRef {
        Arc::new(Self)
    }

    #[inline]
    fn set_level(&self, _level: Level) {}

    #[inline]
    fn level(&self) -> Level {
        Level::Info
    }

    #[inline]
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
