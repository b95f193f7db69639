use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use hyperion_core::kv::KeyValue;
use hyperion_core::metric::{
    Counter, CounterRef, Gauge, GaugeRef, Histogram, HistogramRef, InstrumentOptions, Meter,
    MeterRef, UpDownCounter, UpDownCounterRef, reject_negative_delta,
};
use hyperion_core::scope::Scope;
use opentelemetry::global;
use opentelemetry::metrics::Meter as SdkMeter;

use crate::utils::to_otel_attrs;

const POISONED: &str = "OtelMeter cache mutex poisoned";

/// [`Meter`] adapter over an OpenTelemetry meter.
///
/// Instruments are memoized per name: the first call for a name builds
/// the OpenTelemetry instrument with the given description and unit,
/// later calls return the cached handle and their options are ignored.
/// Re-resolution is a map lookup; the caches are concurrent-safe.
///
/// # Examples
///
/// ```no_run
/// use hyperion_core::metric::{Counter as _, InstrumentOptions, Meter as _};
/// use hyperion_core::scope::Scope;
/// use hyperion_otel::OtelMeter;
///
/// let meter = OtelMeter::global("my-service");
/// let requests = meter.counter(
///     "http.server.requests",
///     InstrumentOptions::new().with_unit("1"),
/// );
/// requests.add(&Scope::new(), 1, &[]);
/// ```
pub struct OtelMeter {
    meter: SdkMeter,
    counters: Mutex<HashMap<String, CounterRef>>,
    up_down_counters: Mutex<HashMap<String, UpDownCounterRef>>,
    histograms: Mutex<HashMap<String, HistogramRef>>,
    gauges: Mutex<HashMap<String, GaugeRef>>,
}

impl OtelMeter {
    /// Creates an [`OtelMeter`] from an OpenTelemetry meter.
    pub fn new(meter: SdkMeter) -> Self {
        Self {
            meter,
            counters: Mutex::new(HashMap::new()),
            up_down_counters: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
            gauges: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an [`OtelMeter`] from the globally installed provider.
    pub fn global(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(global::meter_with_scope(
            opentelemetry::InstrumentationScope::builder(name).build(),
        ))
    }

    /// Creates an [`OtelMeter`] behind a [`MeterRef`].
    pub fn shared(name: impl Into<Cow<'static, str>>) -> MeterRef {
        Arc::new(Self::global(name))
    }
}

/// Memoizes one instrument kind per name.
fn resolve<T: ?Sized>(
    cache: &Mutex<HashMap<String, Arc<T>>>,
    name: &str,
    build: impl FnOnce() -> Arc<T>,
) -> Arc<T> {
    let mut cache = cache.lock().expect(POISONED);
    cache.entry(name.to_owned()).or_insert_with(build).clone()
}

impl Meter for OtelMeter {
    fn counter(&self, name: &str, options: InstrumentOptions) -> CounterRef {
        resolve(&self.counters, name, || {
            let mut builder = self.meter.u64_counter(name.to_owned());
            if let Some(description) = options.description() {
                builder = builder.with_description(description.to_owned());
            }
            if let Some(unit) = options.unit() {
                builder = builder.with_unit(unit.to_owned());
            }
            Arc::new(OtelCounter {
                inner: builder.build(),
            })
        })
    }

    fn up_down_counter(&self, name: &str, options: InstrumentOptions) -> UpDownCounterRef {
        resolve(&self.up_down_counters, name, || {
            let mut builder = self.meter.i64_up_down_counter(name.to_owned());
            if let Some(description) = options.description() {
                builder = builder.with_description(description.to_owned());
            }
            if let Some(unit) = options.unit() {
                builder = builder.with_unit(unit.to_owned());
            }
            Arc::new(OtelUpDownCounter {
                inner: builder.build(),
            })
        })
    }

    fn histogram(&self, name: &str, options: InstrumentOptions) -> HistogramRef {
        resolve(&self.histograms, name, || {
            let mut builder = self.meter.f64_histogram(name.to_owned());
            if let Some(description) = options.description() {
                builder = builder.with_description(description.to_owned());
            }
            if let Some(unit) = options.unit() {
                builder = builder.with_unit(unit.to_owned());
            }
            Arc::new(OtelHistogram {
                inner: builder.build(),
            })
        })
    }

    fn gauge(&self, name: &str, options: InstrumentOptions) -> GaugeRef {
        resolve(&self.gauges, name, || {
            let mut builder = self.meter.f64_gauge(name.to_owned());
            if let Some(description) = options.description() {
                builder = builder.with_description(description.to_owned());
            }
            if let Some(unit) = options.unit() {
                builder = builder.with_unit(unit.to_owned());
            }
            Arc::new(OtelGauge {
                inner: builder.build(),
            })
        })
    }
}

impl fmt::Debug for OtelMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelMeter").finish_non_exhaustive()
    }
}

struct OtelCounter {
    inner: opentelemetry::metrics::Counter<u64>,
}

impl Counter for OtelCounter {
    fn add(&self, _scope: &Scope, delta: i64, attrs: &[KeyValue]) {
        reject_negative_delta(delta);
        self.inner.add(delta as u64, &to_otel_attrs(attrs));
    }
}

struct OtelUpDownCounter {
    inner: opentelemetry::metrics::UpDownCounter<i64>,
}

impl UpDownCounter for OtelUpDownCounter {
    fn add(&self, _scope: &Scope, delta: i64, attrs: &[KeyValue]) {
        self.inner.add(delta, &to_otel_attrs(attrs));
    }
}

struct OtelHistogram {
    inner: opentelemetry::metrics::Histogram<f64>,
}

impl Histogram for OtelHistogram {
    fn record(&self, _scope: &Scope, value: f64, attrs: &[KeyValue]) {
        self.inner.record(value, &to_otel_attrs(attrs));
    }
}

struct OtelGauge {
    inner: opentelemetry::metrics::Gauge<f64>,
}

impl Gauge for OtelGauge {
    fn record(&self, _scope: &Scope, value: f64, attrs: &[KeyValue]) {
        self.inner.record(value, &to_otel_attrs(attrs));
    }
}
