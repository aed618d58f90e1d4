//! Observability setup for flowgate binaries.

pub mod tracing_setup;
