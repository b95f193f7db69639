//! Cancellable execution scope threaded through every [`Context`].
//!
//! A [`Scope`] is the Rust rendition of a cancellable request context:
//! it carries cancellation, an optional deadline, and an
//! immutable-by-derivation map of opaque typed values (used for span
//! propagation between interceptors and tracing adapters).
//!
//! [`Context`]: crate::context::Context

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Type alias for a thread-safe, type-erased shared value.
type AnyArc = Arc<dyn Any + Send + Sync>;

/// Request-scoped cancellation, deadline, and opaque value carrier.
///
/// `Scope` is cheaply clonable and never mutated in place: every
/// derivation ([`with_value`], [`with_deadline`], [`child`]) returns a
/// new value while cancellation keeps flowing through the shared token.
///
/// # Examples
///
/// ```
/// use hyperion_core::scope::Scope;
///
/// #[derive(Debug, PartialEq)]
/// struct RequestId(u64);
///
/// let scope = Scope::new().with_value(RequestId(7));
/// assert_eq!(scope.value::<RequestId>(), Some(&RequestId(7)));
///
/// let child = scope.child();
/// scope.cancel();
/// assert!(child.is_cancelled());
/// ```
///
/// [`with_value`]: Scope::with_value
/// [`with_deadline`]: Scope::with_deadline
/// [`child`]: Scope::child
#[must_use]
#[derive(Clone, Default)]
pub struct Scope {
    token: CancellationToken,
    deadline: Option<Instant>,
    values: HashMap<TypeId, AnyArc>,
}

impl Scope {
    /// Creates a new root [`Scope`] with no deadline and no values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a child [`Scope`] whose token is cancelled when this one is.
    ///
    /// Values and the deadline are inherited; cancelling the child does
    /// not cancel the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            values: self.values.clone(),
        }
    }

    /// Cancels this scope and every scope derived from it.
    #[inline]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` if this scope has been cancelled.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when this scope is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Derives a new [`Scope`] with the given absolute deadline.
    ///
    /// An earlier existing deadline wins; deadlines only ever tighten.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        };

        Self {
            token: self.token.clone(),
            deadline: Some(deadline),
            values: self.values.clone(),
        }
    }

    /// Returns the deadline, if one is set.
    #[inline]
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time remaining until the deadline.
    ///
    /// Returns `None` when no deadline is set and [`Duration::ZERO`]
    /// when the deadline has already passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Derives a new [`Scope`] carrying `value`, keyed by its type.
    ///
    /// A value of the same type already present is replaced in the
    /// derived scope; the original scope is unchanged.
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        let mut values = self.values.clone();
        let _ = values.insert(TypeId::of::<T>(), Arc::new(value));

        Self {
            token: self.token.clone(),
            deadline: self.deadline,
            values,
        }
    }

    /// Attempts to retrieve a value of type `T` attached to this scope.
    #[must_use]
    pub fn value<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|x| x.downcast_ref::<T>())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .field("values", &self.values.len())
            .finish_non_exhaustive()
    }
}
