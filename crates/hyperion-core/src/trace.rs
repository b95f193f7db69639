//! Tracer and span contracts.
//!
//! A [`Span`] is opened from a [`Tracer`] given a [`Scope`] and a name;
//! the returned derived scope carries the span so that downstream calls
//! nest under it. Ending a span is idempotent.

use std::sync::Arc;

use crate::Error;
use crate::kv::KeyValue;
use crate::scope::Scope;

/// Type alias for a shared, type-erased [`Span`].
pub type SpanRef = Arc<dyn Span>;

/// Type alias for a shared, type-erased [`Tracer`].
pub type TracerRef = Arc<dyn Tracer>;

/// Read-only identity of a [`Span`].
///
/// Ids are lowercase hex strings. A span produced by an unconfigured
/// tracer reports all-zero ids and `valid == false`; observable behavior
/// elsewhere is unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanContext {
    /// 128-bit trace id, hex-encoded.
    pub trace_id: String,
    /// 64-bit span id, hex-encoded.
    pub span_id: String,
    /// Whether the ids identify a recorded span.
    pub valid: bool,
}

impl SpanContext {
    /// Returns the invalid [`SpanContext`] with all-zero ids.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            trace_id: "0".repeat(32),
            span_id: "0".repeat(16),
            valid: false,
        }
    }
}

/// An open tracing unit.
///
/// Implementations must be safe for concurrent use. Attribute and error
/// recordings are observable before [`end`]; calling [`end`] a second
/// time is a no-op and must not panic.
///
/// [`end`]: Span::end
pub trait Span: Send + Sync {
    /// Attaches attributes to the span.
    fn set_attributes(&self, attrs: &[KeyValue]);

    /// Records an error on the span without ending it.
    fn record_error(&self, error: &Error);

    /// Ends the span. Idempotent.
    fn end(&self);

    /// Returns the span's identity.
    fn span_context(&self) -> SpanContext;
}

/// Opens [`Span`]s.
pub trait Tracer: Send + Sync {
    /// Starts a span named `name` under `scope`.
    ///
    /// Returns the derived scope carrying the span (adapter-specific
    /// propagation state lives on the scope's value map) together with
    /// the span handle. Cancellation and deadlines flow unchanged into
    /// the derived scope.
    fn start(&self, scope: &Scope, name: &str) -> (Scope, SpanRef);
}

/// No-op [`Span`] returned by [`NopTracer`].
///
/// Reports an invalid [`SpanContext`]; every operation is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopSpan;

impl Span for NopSpan {
    #[inline]
    fn set_attributes(&self, _attrs: &[KeyValue]) {}

    #[inline]
    fn record_error(&self, _error: &Error) {}

    #[inline]
    fn end(&self) {}

    fn span_context(&self) -> SpanContext {
        SpanContext::invalid()
    }
}

/// No-op [`Tracer`] used when tracing is unconfigured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopTracer;

impl NopTracer {
    /// Creates a new [`NopTracer`] behind a [`TracerRef`].
    pub fn shared() -> TracerRef {
        Arc::new(Self)
    }
}

impl Tracer for NopTracer {
    fn start(&self, scope: &Scope, _name: &str) -> (Scope, SpanRef) {
        (scope.clone(), Arc::new(NopSpan))
    }
}
