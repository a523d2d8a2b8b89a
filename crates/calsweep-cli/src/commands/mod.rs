//! What each invocation does once arguments and configuration are loaded.

pub mod clean;
pub mod sweep;
