//! Observability setup for Zapwire.

pub mod tracing_setup;
