use std::convert::Infallible;
use std::{fmt, io};

/// Type alias for a type-erased [`Error`] type.
///
/// [`Error`]: std::error::Error
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error kind representing the category of error that occurred.
///
/// This enum categorizes errors by their source and nature, making it easier
/// to handle different error scenarios programmatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration errors (file missing, parse failure, type mismatch)
    Config,

    /// Interceptor initialization errors
    Intercept,

    /// Database query or connection errors
    Database,

    /// Transaction begin/commit/rollback errors
    Transaction,

    /// Configuration watcher or reload errors
    Watch,

    /// I/O errors (file system, network)
    Io,

    /// Timeout errors
    Timeout,

    /// Other unclassified errors
    Other,
}

impl ErrorKind {
    /// Returns a string representation of the error kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Intercept => "intercept",
            Self::Database => "database",
            Self::Transaction => "transaction",
            Self::Watch => "watch",
            Self::Io => "io",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecoverable failure reported by a core handle or an interceptor.
///
/// `Error` provides structured error information including:
/// - Error kind for categorization
/// - Optional source error for error chains
///
/// # Examples
///
/// ## Creating Errors
///
/// ```no_run
/// use hyperion_core::{Error, ErrorKind};
///
/// // From a message
/// let err = Error::new(ErrorKind::Database, "connection refused");
///
/// // With a source error
/// let err = Error::with_source(
///     ErrorKind::Io,
///     "config file unreadable",
///     Box::new(std::io::Error::from(std::io::ErrorKind::NotFound))
/// );
/// ```
///
/// ## Error Handling
///
/// ```no_run
/// use std::error::Error as _;
///
/// use hyperion_core::{Error, ErrorKind};
///
/// # let result: Result<(), Error> = Err(Error::new(ErrorKind::Timeout, "timeout"));
/// match result {
///     Err(e) if e.kind() == ErrorKind::Timeout => {
///         // Retry on timeout
///     }
///     Err(e) => {
///         eprintln!("Error: {}", e);
///         if let Some(source) = e.source() {
///             eprintln!("Caused by: {}", source);
///         }
///     }
///     Ok(v) => { /* ... */ }
/// }
/// ```
#[must_use]
#[derive(thiserror::Error)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Creates a new [`Error`] with the given kind and message.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hyperion_core::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::Database, "no database configured");
    /// ```
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new [`Error`] with the given kind, message, and source error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hyperion_core::{Error, ErrorKind};
    ///
    /// let io_err = std::io::Error::from(std::io::ErrorKind::NotFound);
    /// let err = Error::with_source(
    ///     ErrorKind::Config,
    ///     "failed to read config file",
    ///     Box::new(io_err)
    /// );
    /// ```
    pub fn with_source(kind: ErrorKind, message: impl Into<String>, source: BoxError) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new [`Error`] from a boxable error with automatic kind detection.
    ///
    /// Attempts to determine the error kind based on the error message.
    pub fn from_boxed(error: impl Into<BoxError>) -> Self {
        let boxed = error.into();
        let message = boxed.to_string();

        let kind = if message.contains("config") {
            ErrorKind::Config
        } else if message.contains("io") || message.contains("file") {
            ErrorKind::Io
        } else if message.contains("timeout") {
            ErrorKind::Timeout
        } else {
            ErrorKind::Other
        };

        Self {
            kind,
            message,
            source: Some(boxed),
        }
    }

    /// Returns the error kind.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hyperion_core::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::Config, "missing key");
    /// assert_eq!(err.kind(), ErrorKind::Config);
    /// ```
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Attaches a secondary cause without displacing the primary error.
    ///
    /// Used by the unit of work: a body error stays primary and a failed
    /// rollback is attached behind it. When this error already carries a
    /// source, the existing chain is preserved and the secondary cause is
    /// appended after it.
    pub fn with_secondary(mut self, secondary: impl Into<BoxError>) -> Self {
        let secondary = secondary.into();
        self.source = Some(match self.source.take() {
            None => secondary,
            Some(primary) => Box::new(SecondaryCause { primary, secondary }),
        });
        self
    }
}

/// Keeps an existing cause chain intact while carrying an extra cause.
#[derive(Debug)]
struct SecondaryCause {
    primary: BoxError,
    secondary: BoxError,
}

impl fmt::Display for SecondaryCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (also: {})", self.primary, self.secondary)
    }
}

impl std::error::Error for SecondaryCause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.secondary.as_ref())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Error");
        debug
            .field("kind", &self.kind)
            .field("message", &self.message);

        if let Some(ref source) = self.source {
            debug.field("source", source);
        }

        debug.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<BoxError> for Error {
    #[inline]
    fn from(value: BoxError) -> Self {
        Self::from_boxed(value)
    }
}

impl From<Infallible> for Error {
    #[inline]
    fn from(_: Infallible) -> Self {
        unreachable!()
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(error: io::Error) -> Self {
        Self::with_source(ErrorKind::Io, "I/O error", Box::new(error))
    }
}
