#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod meter;
mod tracer;
mod utils;

pub use crate::meter::OtelMeter;
pub use crate::tracer::{OtelSpan, OtelTracer};
