//! Core types: time windows, event times, tracing setup

pub mod time;
pub mod tracing;

pub use time::{EventTime, LOCAL_INPUT_FORMAT, TimeError, TimeWindow, WindowZone};
pub use tracing::{TracingConfig, TracingError, init_tracing};
