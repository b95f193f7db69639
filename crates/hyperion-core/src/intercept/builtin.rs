//! Built-in tracing and logging interceptors.
//!
//! These two are the canonical reference implementations of the
//! interceptor contract: tracing (order 100) wraps logging (order 200),
//! so log records land inside the span and both observe the method's
//! final error.

use std::time::Instant;

use crate::context::Context;
use crate::intercept::{EndFn, Interceptor};
use crate::kv::KeyValue;
use crate::log::Logger as _;
use crate::trace::{Span as _, Tracer as _};
use crate::Result;

/// Opens one span per intercepted method call.
///
/// On entry, starts a span named after the call's full path and derives
/// a [`Context`] whose scope carries the span, so nested calls open
/// child spans. On exit, records the method error (if any) on the span
/// and ends it; ending is idempotent.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingInterceptor;

impl TracingInterceptor {
    /// Sort order of the tracing interceptor.
    pub const ORDER: i32 = 100;

    /// Registered name of the tracing interceptor.
    pub const NAME: &'static str = "tracing";

    /// Creates a new [`TracingInterceptor`].
    #[inline]
    pub const fn new() -> Self {
        Self
    }
}

impl Interceptor for TracingInterceptor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn intercept(&self, cx: Context, full_path: &str) -> Result<(Context, EndFn)> {
        let (scope, span) = cx.tracer().start(cx.scope(), full_path);
        let derived = cx.with_scope(scope);

        let end: EndFn = Box::new(move |err| {
            if let Some(err) = err {
                span.record_error(err);
            }
            span.end();
        });

        Ok((derived, end))
    }
}

/// Records entry, exit, duration, and failure of intercepted calls.
///
/// On entry, derives a child logger carrying `component` and `method`
/// fields into the [`Context`] and emits a debug-level "method started"
/// record. On exit, emits "method failed" at error level (with the
/// duration and error) or "method completed" at debug level (with the
/// duration).
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor;

impl LoggingInterceptor {
    /// Sort order of the logging interceptor.
    pub const ORDER: i32 = 200;

    /// Registered name of the logging interceptor.
    pub const NAME: &'static str = "logging";

    /// Creates a new [`LoggingInterceptor`].
    #[inline]
    pub const fn new() -> Self {
        Self
    }
}

impl Interceptor for LoggingInterceptor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn intercept(&self, cx: Context, full_path: &str) -> Result<(Context, EndFn)> {
        // full_path is "{component}.{method}"; methods never contain dots.
        let (component, method) = full_path.rsplit_once('.').unwrap_or(("", full_path));

        let logger = cx.logger().with(&[
            KeyValue::string("component", component),
            KeyValue::string("method", method),
        ]);
        logger.debug("method started", &[]);

        let derived = cx.with_logger(logger.clone());
        let started = Instant::now();

        let end: EndFn = Box::new(move |err| {
            let duration = KeyValue::float(
                "duration_ms",
                started.elapsed().as_secs_f64() * 1_000.0,
            );

            match err {
                Some(err) => logger.error(
                    "method failed",
                    &[duration, KeyValue::string("error", err.to_string())],
                ),
                None => logger.debug("method completed", &[duration]),
            }
        });

        Ok((derived, end))
    }
}
