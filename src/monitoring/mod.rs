//! Process-local observability.

pub mod metrics;

pub use metrics::Metrics;
