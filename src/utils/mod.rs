//! # Utility Modules
//!
//! Supporting utilities shared by the protocol and service layers.
//!
//! ## Components
//! - **Logging**: `tracing` subscriber setup from configuration
//! - **Metrics**: Thread-safe observability counters

pub mod logging;
pub mod metrics;
