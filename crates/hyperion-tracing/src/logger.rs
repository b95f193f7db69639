use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use hyperion_core::Result;
use hyperion_core::kv::KeyValue;
use hyperion_core::log::{Level, Logger, LoggerRef};

/// [`Logger`] implementation emitting `tracing` events.
///
/// Fields attached via [`Logger::with`] are prepended to every record
/// and rendered as a single `fields` value on the emitted event, since
/// `tracing` field names are fixed at compile time.
///
/// The minimum level is shared across the whole `with`-derived family:
/// [`Logger::set_level`] on any member takes effect for all of them.
/// Records below the level are dropped before emission; the installed
/// subscriber applies its own filtering on top.
///
/// # Examples
///
/// ```no_run
/// use hyperion_core::kv::KeyValue;
/// use hyperion_core::log::{Level, Logger as _};
/// use hyperion_tracing::TracingLogger;
///
/// let logger = TracingLogger::shared(Level::Info);
/// let scoped = logger.with(&[KeyValue::string("component", "billing")]);
/// scoped.info("invoice issued", &[KeyValue::int("amount_cents", 1250)]);
/// ```
pub struct TracingLogger {
    fields: Vec<KeyValue>,
    level: Arc<AtomicU8>,
}

impl TracingLogger {
    /// Creates a new root [`TracingLogger`] at `level`.
    pub fn new(level: Level) -> Self {
        Self {
            fields: Vec::new(),
            level: Arc::new(AtomicU8::new(level_to_u8(level))),
        }
    }

    /// Creates a new root [`TracingLogger`] behind a [`LoggerRef`].
    pub fn shared(level: Level) -> LoggerRef {
        Arc::new(Self::new(level))
    }

    /// Renders the prepended and per-record fields into one string.
    fn render(&self, fields: &[KeyValue]) -> String {
        self.fields
            .iter()
            .chain(fields)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn emit(&self, level: Level, msg: &str, fields: &[KeyValue]) {
        let fields = self.render(fields);
        match level {
            Level::Debug => tracing::debug!(fields = %fields, "{msg}"),
            Level::Info => tracing::info!(fields = %fields, "{msg}"),
            Level::Warn => tracing::warn!(fields = %fields, "{msg}"),
            Level::Error => tracing::error!(fields = %fields, "{msg}"),
            Level::Fatal => tracing::error!(fields = %fields, fatal = true, "{msg}"),
        }
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: Level, msg: &str, fields: &[KeyValue]) {
        if level < self.level() {
            return;
        }
        self.emit(level, msg, fields);
    }

    /// Emits the record, flushes, and terminates the process with a
    /// non-zero exit status.
    fn fatal(&self, msg: &str, fields: &[KeyValue]) {
        self.emit(Level::Fatal, msg, fields);
        let _ = self.sync();
        std::process::exit(1);
    }

    fn with(&self, fields: &[KeyValue]) -> LoggerRef {
        let mut prefixed = self.fields.clone();
        prefixed.extend_from_slice(fields);
        Arc::new(Self {
            fields: prefixed,
            level: self.level.clone(),
        })
    }

    fn set_level(&self, level: Level) {
        self.level.store(level_to_u8(level), Ordering::SeqCst);
    }

    fn level(&self) -> Level {
        level_from_u8(self.level.load(Ordering::SeqCst))
    }

    /// No-op: the fmt subscriber writes unbuffered.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

const fn level_to_u8(level: Level) -> u8 {
    match level {
        Level::Debug => 0,
        Level::Info => 1,
        Level::Warn => 2,
        Level::Error => 3,
        Level::Fatal => 4,
    }
}

const fn level_from_u8(value: u8) -> Level {
    match value {
        0 => Level::Debug,
        1 => Level::Info,
        2 => Level::Warn,
        3 => Level::Error,
        _ => Level::Fatal,
    }
}
