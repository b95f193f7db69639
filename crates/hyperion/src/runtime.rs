//! Process lifecycle: configured handles, root-context factory, shutdown.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hyperion_core::context::Context;
use hyperion_core::db::{Database as _, DatabaseRef, ExecutorRef, NopExecutor};
use hyperion_core::intercept::{LoggingInterceptor, Registry, TracingInterceptor};
use hyperion_core::log::{Logger as _, LoggerRef, NopLogger};
use hyperion_core::metric::{MeterRef, NopMeter};
use hyperion_core::scope::Scope;
use hyperion_core::trace::{NopTracer, TracerRef};
use hyperion_core::{Error, ErrorKind, Result};

/// Owner of the process-wide handles and the root-context factory.
///
/// Built once at process start; every inbound unit of work gets its own
/// root [`Context`] from [`context`], closing over the configured
/// logger, tracer, meter, and database executor.
///
/// # Examples
///
/// ```
/// use hyperion::Hyperion;
/// use hyperion::log::Logger as _;
///
/// let hyperion = Hyperion::builder().build();
/// let cx = hyperion.context();
/// cx.logger().info("request accepted", &[]);
/// ```
///
/// [`context`]: Hyperion::context
#[must_use]
#[derive(Clone)]
pub struct Hyperion {
    logger: LoggerRef,
    tracer: TracerRef,
    meter: MeterRef,
    executor: ExecutorRef,
    registry: Arc<Registry>,
}

impl Hyperion {
    /// Returns a [`HyperionBuilder`].
    pub fn builder() -> HyperionBuilder {
        HyperionBuilder::new()
    }

    /// Creates a root [`Context`] for one inbound unit of work.
    pub fn context(&self) -> Context {
        self.context_with_scope(Scope::new())
    }

    /// Creates a root [`Context`] over an existing scope.
    ///
    /// Used when the transport already carries cancellation or
    /// propagation state for the request.
    pub fn context_with_scope(&self, scope: Scope) -> Context {
        Context::builder()
            .scope(scope)
            .logger(self.logger.clone())
            .tracer(self.tracer.clone())
            .meter(self.meter.clone())
            .executor(self.executor.clone())
            .registry(self.registry.clone())
            .build()
    }

    /// Returns the configured logger handle.
    #[inline]
    pub const fn logger(&self) -> &LoggerRef {
        &self.logger
    }

    /// Flushes buffered telemetry within `deadline`.
    ///
    /// Called once at process shutdown. Returns
    /// [`ErrorKind::Timeout`] when the flush overruns the deadline.
    pub async fn shutdown(self, deadline: Duration) -> Result<()> {
        let logger = self.logger.clone();
        let flush = tokio::task::spawn_blocking(move || logger.sync());

        match tokio::time::timeout(deadline, flush).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(Error::with_source(
                ErrorKind::Other,
                "logger flush task failed",
                Box::new(join_error),
            )),
            Err(_) => Err(Error::new(
                ErrorKind::Timeout,
                "logger flush exceeded the shutdown deadline",
            )),
        }
    }
}

impl fmt::Debug for Hyperion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hyperion").finish_non_exhaustive()
    }
}

/// Builder for configuring and creating a [`Hyperion`].
///
/// Handles not provided fall back to their no-op implementations, and
/// the registry falls back to the process-wide one.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use hyperion::Hyperion;
/// use hyperion::intercept::Registry;
///
/// let hyperion = Hyperion::builder()
///     .registry(Arc::new(Registry::new()))
///     .with_default_interceptors()
///     .build();
/// ```
#[must_use]
#[derive(Default)]
pub struct HyperionBuilder {
    logger: Option<LoggerRef>,
    tracer: Option<TracerRef>,
    meter: Option<MeterRef>,
    executor: Option<ExecutorRef>,
    registry: Option<Arc<Registry>>,
    default_interceptors: bool,
}

impl HyperionBuilder {
    /// Creates a new [`HyperionBuilder`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
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

    /// Sets the database; root contexts carry its pool executor.
    pub fn database(mut self, database: DatabaseRef) -> Self {
        self.executor = Some(database.executor());
        self
    }

    /// Sets the database executor handle directly.
    pub fn executor(mut self, executor: ExecutorRef) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Sets the interceptor registry.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Registers the built-in tracing and logging interceptors into the
    /// target registry at build time.
    ///
    /// # Panics
    ///
    /// Building panics if either built-in name is already registered or
    /// the registry is frozen, like any late or duplicate registration.
    pub fn with_default_interceptors(mut self) -> Self {
        self.default_interceptors = true;
        self
    }

    /// Builds the [`Hyperion`].
    pub fn build(self) -> Hyperion {
        let registry = self.registry.unwrap_or_else(Registry::global);

        if self.default_interceptors {
            registry.register(Arc::new(TracingInterceptor::new()));
            registry.register(Arc::new(LoggingInterceptor::new()));
        }

        Hyperion {
            logger: self.logger.unwrap_or_else(NopLogger::shared),
            tracer: self.tracer.unwrap_or_else(NopTracer::shared),
            meter: self.meter.unwrap_or_else(NopMeter::shared),
            executor: self.executor.unwrap_or_else(NopExecutor::shared),
            registry,
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use hyperion_core::intercept::{Interceptor as _, Registry};
    use hyperion_core::kv::KeyValue;
    use hyperion_core::log::{Level, Logger, LoggerRef, NopLogger};
    use hyperion_core::scope::Scope;
    use hyperion_core::{Error, ErrorKind, Result};

    use crate::runtime::Hyperion;

    #[test]
    fn default_interceptors_freeze_in_order() {
        let registry = Arc::new(Registry::new());
        let _hyperion = Hyperion::builder()
            .registry(registry.clone())
            .with_default_interceptors()
            .build();

        let names: Vec<_> = registry
            .freeze()
            .iter()
            .map(|x| x.name().to_owned())
            .collect();
        assert_eq!(names, ["tracing", "logging"]);
    }

    #[test]
    fn contexts_share_the_configured_handles() {
        let logger = NopLogger::shared();
        let hyperion = Hyperion::builder()
            .logger(logger.clone())
            .registry(Arc::new(Registry::new()))
            .build();

        let cx = hyperion.context();
        assert!(Arc::ptr_eq(cx.logger(), &logger));

        // Each unit of work gets an independent scope.
        let other = hyperion.context();
        cx.scope().cancel();
        assert!(!other.scope().is_cancelled());
    }

    #[test]
    fn contexts_adopt_a_transport_scope() {
        #[derive(Debug, PartialEq)]
        struct RequestId(u64);

        let hyperion = Hyperion::builder()
            .registry(Arc::new(Registry::new()))
            .build();

        let scope = Scope::new().with_value(RequestId(42));
        let cx = hyperion.context_with_scope(scope);
        assert_eq!(cx.scope().value::<RequestId>(), Some(&RequestId(42)));
    }

    #[tokio::test]
    async fn shutdown_flushes_within_the_deadline() {
        let hyperion = Hyperion::builder()
            .registry(Arc::new(Registry::new()))
            .build();
        assert!(hyperion.shutdown(Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test]
    async fn shutdown_times_out_on_a_stuck_flush() {
        struct StuckLogger;

        impl Logger for StuckLogger {
            fn log(&self, _level: Level, _msg: &str, _fields: &[KeyValue]) {}
            fn fatal(&self, _msg: &str, _fields: &[KeyValue]) {}
            fn with(&self, _fields: &[KeyValue]) -> LoggerRef {
                Arc::new(Self)
            }
            fn set_level(&self, _level: Level) {}
            fn level(&self) -> Level {
                Level::Info
            }
            fn sync(&self) -> Result<()> {
                std::thread::sleep(Duration::from_secs(5));
                Ok(())
            }
        }

        let hyperion = Hyperion::builder()
            .logger(Arc::new(StuckLogger))
            .registry(Arc::new(Registry::new()))
            .build();

        let err = hyperion
            .shutdown(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn shutdown_propagates_flush_failures() {
        struct FailingLogger;

        impl Logger for FailingLogger {
            fn log(&self, _level: Level, _msg: &str, _fields: &[KeyValue]) {}
            fn fatal(&self, _msg: &str, _fields: &[KeyValue]) {}
            fn with(&self, _fields: &[KeyValue]) -> LoggerRef {
                Arc::new(Self)
            }
            fn set_level(&self, _level: Level) {}
            fn level(&self) -> Level {
                Level::Info
            }
            fn sync(&self) -> Result<()> {
                Err(Error::new(ErrorKind::Io, "sink unavailable"))
            }
        }

        let hyperion = Hyperion::builder()
            .logger(Arc::new(FailingLogger))
            .registry(Arc::new(Registry::new()))
            .build();

        let err = hyperion
            .shutdown(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
