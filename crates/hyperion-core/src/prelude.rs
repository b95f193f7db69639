//! A convenience module that re-exports commonly used items.
//!
//! This module is intended to be glob-imported for convenience:
//!
//! ```
//! use hyperion_core::prelude::*;
//! ```

#[doc(hidden)]
pub use crate::async_trait;
pub use crate::context::{Context, ContextBuilder};
pub use crate::db::{
    Database, DatabaseRef, Executor, ExecutorRef, Row, SqlValue, Transaction, TransactionRef,
    with_transaction,
};
pub use crate::intercept::{
    End, EndFn, InterceptOptions, Interceptor, LoggingInterceptor, Registry, TracingInterceptor,
};
pub use crate::kv::{KeyValue, Value};
pub use crate::log::{Level, Logger, LoggerRef, NopLogger};
pub use crate::metric::{
    Counter, Gauge, Histogram, InstrumentOptions, Meter, MeterRef, NopMeter, UpDownCounter,
};
pub use crate::scope::Scope;
pub use crate::trace::{NopTracer, Span, SpanContext, SpanRef, Tracer, TracerRef};
pub use crate::{BoxError, Error, ErrorKind, Result};
