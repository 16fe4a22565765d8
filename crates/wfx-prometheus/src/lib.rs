//! Prometheus implementation of [`wfx_core::metrics::MetricsBackend`].
//!
//! ```rust
//! use std::sync::Arc;
//! use wfx_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: wfx_core::metrics::MetricsHandle = Arc::new(metrics.clone());
//! // scheduler.with_metrics(handle) ...
//! # let _ = handle;
//! let text = metrics.encode_text()?;
//! # let _ = text;
//! # Ok(())
//! # }
//! ```
//!
//! Serving `/metrics` over HTTP is left to the embedding application.
mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
