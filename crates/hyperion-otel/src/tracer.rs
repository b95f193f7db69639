use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hyperion_core::Error;
use hyperion_core::kv::KeyValue;
use hyperion_core::scope::Scope;
use hyperion_core::trace::{Span, SpanContext, SpanRef, Tracer};
use opentelemetry::Context as OtelContext;
use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{Status, TraceContextExt, Tracer as _};

use crate::utils::to_otel_kv;

/// [`Tracer`] adapter over an OpenTelemetry tracer.
///
/// Span parentage propagates through the Hyperion [`Scope`]: `start`
/// reads the parent OpenTelemetry context from the scope's value map
/// (falling back to a root context), opens a child span, and stores the
/// new context on the derived scope, so nested `start` calls build one
/// trace.
///
/// # Examples
///
/// ```no_run
/// use hyperion_core::scope::Scope;
/// use hyperion_core::trace::{Span as _, Tracer as _};
/// use hyperion_otel::OtelTracer;
///
/// let tracer = OtelTracer::global("my-service");
/// let (scope, span) = tracer.start(&Scope::new(), "user-service.get");
/// span.end();
/// ```
pub struct OtelTracer {
    tracer: BoxedTracer,
}

impl OtelTracer {
    /// Creates an [`OtelTracer`] from any OpenTelemetry tracer.
    pub fn new<T>(tracer: T) -> Self
    where
        T: opentelemetry::trace::Tracer + Send + Sync + 'static,
        T::Span: Send + Sync + 'static,
    {
        Self {
            tracer: BoxedTracer::new(Box::new(tracer)),
        }
    }

    /// Creates an [`OtelTracer`] from the globally installed provider.
    pub fn global(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tracer: global::tracer(name),
        }
    }
}

impl Tracer for OtelTracer {
    fn start(&self, scope: &Scope, name: &str) -> (Scope, SpanRef) {
        let parent = scope
            .value::<OtelContext>()
            .cloned()
            .unwrap_or_default();

        let span = self.tracer.start_with_context(name.to_owned(), &parent);
        let cx = parent.with_span(span);

        let handle = Arc::new(OtelSpan {
            cx: cx.clone(),
            ended: AtomicBool::new(false),
        });
        (scope.with_value(cx), handle)
    }
}

impl fmt::Debug for OtelTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelTracer").finish_non_exhaustive()
    }
}

/// [`Span`] adapter over an OpenTelemetry span.
///
/// Ending is guarded: the second [`Span::end`] call is a no-op.
pub struct OtelSpan {
    cx: OtelContext,
    ended: AtomicBool,
}

impl Span for OtelSpan {
    fn set_attributes(&self, attrs: &[KeyValue]) {
        let span = self.cx.span();
        for attr in attrs {
            span.set_attribute(to_otel_kv(attr));
        }
    }

    fn record_error(&self, error: &Error) {
        let span = self.cx.span();
        span.record_error(error);
        span.set_status(Status::error(error.to_string()));
    }

    fn end(&self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            self.cx.span().end();
        }
    }

    fn span_context(&self) -> SpanContext {
        let span = self.cx.span();
        let sc = span.span_context();
        SpanContext {
            trace_id: sc.trace_id().to_string(),
            span_id: sc.span_id().to_string(),
            valid: sc.is_valid(),
        }
    }
}

impl fmt::Debug for OtelSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelSpan")
            .field("ended", &self.ended.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
