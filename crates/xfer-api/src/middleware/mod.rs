//! # Middleware Stack
//!
//! - [`metrics`]: Prometheus request metrics and the transfer counters.

pub mod metrics;
