//! Meter and instrument contracts.
//!
//! A [`Meter`] is an instrument factory. Instruments are long-lived,
//! created once per name, and record typed attributes at call time.
//! Concrete exporters live in adapter crates (`hyperion-otel`);
//! [`NopMeter`] stands in when metrics are unconfigured.

use std::borrow::Cow;
use std::sync::Arc;

use crate::kv::KeyValue;
use crate::scope::Scope;

/// Type alias for a shared, type-erased [`Meter`].
pub type MeterRef = Arc<dyn Meter>;

/// Type alias for a shared, type-erased [`Counter`].
pub type CounterRef = Arc<dyn Counter>;

/// Type alias for a shared, type-erased [`UpDownCounter`].
pub type UpDownCounterRef = Arc<dyn UpDownCounter>;

/// Type alias for a shared, type-erased [`Histogram`].
pub type HistogramRef = Arc<dyn Histogram>;

/// Type alias for a shared, type-erased [`Gauge`].
pub type GaugeRef = Arc<dyn Gauge>;

/// Descriptive options attached to an instrument at creation time.
///
/// Unit strings follow UCUM-style conventions (`"1"`, `"ms"`, `"By"`)
/// and pass through to the exporter unvalidated.
///
/// # Examples
///
/// ```
/// use hyperion_core::metric::InstrumentOptions;
///
/// let opts = InstrumentOptions::new()
///     .with_description("requests handled")
///     .with_unit("1");
/// assert_eq!(opts.unit(), Some("1"));
/// ```
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentOptions {
    description: Option<Cow<'static, str>>,
    unit: Option<Cow<'static, str>>,
}

impl InstrumentOptions {
    /// Creates empty [`InstrumentOptions`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the human-readable instrument description.
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the UCUM-style unit string.
    pub fn with_unit(mut self, unit: impl Into<Cow<'static, str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Returns the description, if set.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the unit, if set.
    #[must_use]
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }
}

/// Monotonically increasing counter.
pub trait Counter: Send + Sync {
    /// Adds `delta` to the counter.
    ///
    /// # Panics
    ///
    /// Panics if `delta` is negative: counters are monotonic and a
    /// negative delta is a programming error. Use an [`UpDownCounter`]
    /// for signed deltas.
    fn add(&self, scope: &Scope, delta: i64, attrs: &[KeyValue]);
}

/// Counter accepting signed deltas.
pub trait UpDownCounter: Send + Sync {
    /// Adds `delta` (which may be negative) to the counter.
    fn add(&self, scope: &Scope, delta: i64, attrs: &[KeyValue]);
}

/// Records a distribution of numeric values.
pub trait Histogram: Send + Sync {
    /// Records a single value.
    fn record(&self, scope: &Scope, value: f64, attrs: &[KeyValue]);
}

/// Records an instantaneous value.
pub trait Gauge: Send + Sync {
    /// Records the current value.
    fn record(&self, scope: &Scope, value: f64, attrs: &[KeyValue]);
}

/// Instrument factory.
///
/// Implementations must be safe for concurrent use and cheap to
/// re-resolve; they may memoize instruments per name.
pub trait Meter: Send + Sync {
    /// Creates (or re-resolves) a [`Counter`].
    fn counter(&self, name: &str, options: InstrumentOptions) -> CounterRef;

    /// Creates (or re-resolves) an [`UpDownCounter`].
    fn up_down_counter(&self, name: &str, options: InstrumentOptions) -> UpDownCounterRef;

    /// Creates (or re-resolves) a [`Histogram`].
    fn histogram(&self, name: &str, options: InstrumentOptions) -> HistogramRef;

    /// Creates (or re-resolves) a [`Gauge`].
    fn gauge(&self, name: &str, options: InstrumentOptions) -> GaugeRef;
}

/// Rejects a negative delta handed to a monotonic counter.
///
/// Shared by every [`Counter`] implementation so the contract holds
/// independently of the configured exporter.
#[track_caller]
pub fn reject_negative_delta(delta: i64) {
    if delta < 0 {
        panic!(
            "Counter::add called with negative delta ({delta}). \
             Counters are monotonic; use an UpDownCounter for signed deltas."
        );
    }
}

/// No-op instrument implementing every instrument trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopInstrument;

impl Counter for NopInstrument {
    fn add(&self, _scope: &Scope, delta: i64, _attrs: &[KeyValue]) {
        reject_negative_delta(delta);
    }
}

impl UpDownCounter for NopInstrument {
    #[inline]
    fn add(&self, _scope: &Scope, _delta: i64, _attrs: &[KeyValue]) {}
}

impl Histogram for NopInstrument {
    #[inline]
    fn record(&self, _scope: &Scope, _value: f64, _attrs: &[KeyValue]) {}
}

impl Gauge for NopInstrument {
    #[inline]
    fn record(&self, _scope: &Scope, _value: f64, _attrs: &[KeyValue]) {}
}

/// No-op [`Meter`] used when metrics are unconfigured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopMeter;

impl NopMeter {
    /// Creates a new [`NopMeter`] behind a [`MeterRef`].
    pub fn shared() -> MeterRef {
        Arc::new(Self)
    }
}

impl Meter for NopMeter {
    fn counter(&self, _name: &str, _options: InstrumentOptions) -> CounterRef {
        Arc::new(NopInstrument)
    }

    fn up_down_counter(&self, _name: &str, _options: InstrumentOptions) -> UpDownCounterRef {
        Arc::new(NopInstrument)
    }

    fn histogram(&self, _name: &str, _options: InstrumentOptions) -> HistogramRef {
        Arc::new(NopInstrument)
    }

    fn gauge(&self, _name: &str, _options: InstrumentOptions) -> GaugeRef {
        Arc::new(NopInstrument)
    }
}

#[cfg(test)]
mod test {
    use crate::kv::KeyValue;
    use crate::metric::{
        Counter as _, InstrumentOptions, Meter, NopInstrument, NopMeter, UpDownCounter,
    };
    use crate::scope::Scope;

    #[test]
    fn options_builder() {
        let opts = InstrumentOptions::new()
            .with_description("bytes sent")
            .with_unit("By");

        assert_eq!(opts.description(), Some("bytes sent"));
        assert_eq!(opts.unit(), Some("By"));
    }

    #[test]
    fn counter_accepts_positive_delta() {
        let meter = NopMeter;
        let counter = meter.counter("requests", InstrumentOptions::new());
        counter.add(&Scope::new(), 1, &[KeyValue::string("route", "/")]);
        counter.add(&Scope::new(), 0, &[]);
    }

    #[test]
    #[should_panic(expected = "negative delta")]
    fn counter_rejects_negative_delta() {
        let meter = NopMeter;
        let counter = meter.counter("requests", InstrumentOptions::new());
        counter.add(&Scope::new(), -1, &[]);
    }

    #[test]
    fn up_down_counter_accepts_signed_delta() {
        UpDownCounter::add(&NopInstrument, &Scope::new(), -5, &[]);
        UpDownCounter::add(&NopInstrument, &Scope::new(), 5, &[]);
    }
}
