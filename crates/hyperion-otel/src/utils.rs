//! Conversions between Hyperion attributes and OpenTelemetry types.

use hyperion_core::kv::{KeyValue, Value};

/// Maps a Hyperion attribute onto an OpenTelemetry key-value pair.
pub(crate) fn to_otel_kv(kv: &KeyValue) -> opentelemetry::KeyValue {
    let key = opentelemetry::Key::new(kv.key.clone());
    let value = match &kv.value {
        Value::Str(s) => opentelemetry::Value::from(s.to_string()),
        Value::I64(i) => opentelemetry::Value::from(*i),
        Value::F64(f) => opentelemetry::Value::from(*f),
        Value::Bool(b) => opentelemetry::Value::from(*b),
    };
    opentelemetry::KeyValue::new(key, value)
}

/// Maps a record-time attribute slice.
pub(crate) fn to_otel_attrs(attrs: &[KeyValue]) -> Vec<opentelemetry::KeyValue> {
    attrs.iter().map(to_otel_kv).collect()
}
