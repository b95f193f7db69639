//! Request-scoped execution context.
//!
//! This module provides the [`Context`] type that threads the four
//! cross-cutting handles (logger, tracer, meter, database executor) and
//! the cancellable [`Scope`] through every service call:
//!
//! - Accessors for each handle
//! - Derivations replacing exactly one handle (`with_*`)
//! - The interceptor pipeline entry point ([`use_intercept`])
//!
//! [`use_intercept`]: Context::use_intercept

use std::fmt;
use std::sync::Arc;

use crate::db::{ExecutorRef, NopExecutor};
use crate::intercept::{End, InterceptOptions, Registry};
use crate::log::{LoggerRef, NopLogger};
use crate::metric::{MeterRef, NopMeter};
use crate::scope::Scope;
use crate::trace::{NopTracer, TracerRef};
use crate::Result;

/// Request-scoped composite of the cross-cutting handles.
///
/// `Context` has value semantics: cloning is a handful of `Arc` clones,
/// and every derivation returns a new value with exactly one field
/// replaced. Every field is non-null; no-op implementations stand in
/// for unconfigured capabilities, so call sites never branch on
/// presence.
///
/// The embedded [`Scope`] is authoritative for cancellation, deadlines,
/// and opaque value propagation; it is always threaded unchanged
/// through handle derivations.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use hyperion_core::context::Context;
/// use hyperion_core::log::NopLogger;
///
/// let cx = Context::default();
/// let derived = cx.with_logger(NopLogger::shared());
///
/// // Only the logger changed; the other handles are shared.
/// assert!(Arc::ptr_eq(cx.meter(), derived.meter()));
/// ```
#[must_use]
#[derive(Clone)]
pub struct Context {
    scope: Scope,
    logger: LoggerRef,
    tracer: TracerRef,
    meter: MeterRef,
    executor: ExecutorRef,
    registry: Arc<Registry>,
}

impl Context {
    /// Creates a root [`Context`] over `scope` with no-op handles and
    /// the process-wide interceptor registry.
    pub fn new(scope: Scope) -> Self {
        Self::builder().scope(scope).build()
    }

    /// Returns a [`ContextBuilder`] for configuring handles.
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// Returns the cancellable [`Scope`].
    #[inline]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Returns the logger handle.
    #[inline]
    pub const fn logger(&self) -> &LoggerRef {
        &self.logger
    }

    /// Returns the tracer handle.
    #[inline]
    pub const fn tracer(&self) -> &TracerRef {
        &self.tracer
    }

    /// Returns the meter handle.
    #[inline]
    pub const fn meter(&self) -> &MeterRef {
        &self.meter
    }

    /// Returns the database executor handle.
    ///
    /// Points at the connection pool, or at a transactional scope when
    /// running inside [`with_transaction`].
    ///
    /// [`with_transaction`]: crate::db::with_transaction
    #[inline]
    pub const fn db(&self) -> &ExecutorRef {
        &self.executor
    }

    /// Returns the interceptor registry this context resolves against.
    #[inline]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns a new [`Context`] with the logger replaced.
    pub fn with_logger(&self, logger: LoggerRef) -> Self {
        Self {
            logger,
            ..self.clone()
        }
    }

    /// Returns a new [`Context`] with the tracer replaced.
    pub fn with_tracer(&self, tracer: TracerRef) -> Self {
        Self {
            tracer,
            ..self.clone()
        }
    }

    /// Returns a new [`Context`] with the meter replaced.
    pub fn with_meter(&self, meter: MeterRef) -> Self {
        Self {
            meter,
            ..self.clone()
        }
    }

    /// Returns a new [`Context`] with the database executor replaced.
    pub fn with_db(&self, executor: ExecutorRef) -> Self {
        Self {
            executor,
            ..self.clone()
        }
    }

    /// Returns a new [`Context`] with the scope replaced.
    ///
    /// Used by interceptors that attach propagation state (e.g. a span)
    /// to the cancellable parent.
    pub fn with_scope(&self, scope: Scope) -> Self {
        Self {
            scope,
            ..self.clone()
        }
    }

    /// Runs the interceptor pipeline for a method call.
    ///
    /// Walks the registered interceptors in ascending `(order, name)`
    /// order, rebinding the context to each interceptor's derivation,
    /// and returns the final context together with an [`End`] whose
    /// [`finish`] runs the collected end-callbacks in reverse order.
    ///
    /// The call-site protocol is three lines:
    ///
    /// ```no_run
    /// # use hyperion_core::context::Context;
    /// # use hyperion_core::intercept::InterceptOptions;
    /// # async fn work(cx: &Context) -> hyperion_core::Result<u64> { Ok(1) }
    /// # async fn method(cx: &Context) -> hyperion_core::Result<u64> {
    /// let (cx, end) = cx.use_intercept("user-service", "get", InterceptOptions::new())?;
    /// let result = work(&cx).await;
    /// end.finish(result.as_ref().err());
    /// # result
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// When an interceptor fails to initialize, the end-callbacks
    /// collected so far run immediately in reverse order observing that
    /// error, the remaining interceptors are skipped, and the error is
    /// returned so the caller's `?` skips the method body.
    pub fn use_intercept(
        &self,
        component: &str,
        method: &str,
        options: InterceptOptions,
    ) -> Result<(Context, End)> {
        crate::intercept::run_pipeline(self, component, method, options)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Scope::new())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Builder for a root [`Context`].
///
/// Handles not provided fall back to their no-op implementations; the
/// registry falls back to [`Registry::global`].
///
/// # Examples
///
/// ```no_run
/// use hyperion_core::context::Context;
/// use hyperion_core::log::NopLogger;
///
/// let cx = Context::builder()
///     .logger(NopLogger::shared())
///     .build();
/// ```
#[must_use]
#[derive(Default)]
pub struct ContextBuilder {
    scope: Option<Scope>,
    logger: Option<LoggerRef>,
    tracer: Option<TracerRef>,
    meter: Option<MeterRef>,
    executor: Option<ExecutorRef>,
    registry: Option<Arc<Registry>>,
}

impl ContextBuilder {
    /// Creates a new [`ContextBuilder`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cancellable scope.
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Sets the logger handle.
    pub fn logger(mut self, logger: LoggerRef) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Sets the tracer handle.
    pub fn tracer(mut self, tracer: TracerRef) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Sets the meter handle.
    pub fn meter(mut self, meter: MeterRef) -> Self {
        self.meter = Some(meter);
        self
    }

    /// Sets the database executor handle.
    pub fn executor(mut self, executor: ExecutorRef) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Sets the interceptor registry.
    ///
    /// Tests use this to resolve against an isolated registry instead
    /// of the process-wide one.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the [`Context`].
    pub fn build(self) -> Context {
        Context {
            scope: self.scope.unwrap_or_default(),
            logger: self.logger.unwrap_or_else(NopLogger::shared),
            tracer: self.tracer.unwrap_or_else(NopTracer::shared),
            meter: self.meter.unwrap_or_else(NopMeter::shared),
            executor: self.executor.unwrap_or_else(NopExecutor::shared),
            registry: self.registry.unwrap_or_else(Registry::global),
        }
    }
}
