//! Prometheus metrics backend for ward task runners.
//!
//! [`PrometheusMetrics`] implements [`ward_core::MetricsBackend`] on top of a
//! private [`Registry`].
//!
//! ## Metrics
//! All counters carry the labels `job`, `task_group`, `alloc_id` and `task`.
//! - `client_allocs_restart_total`
//! - `client_allocs_running_total`
//! - `client_allocs_failed_total`
//! - `client_allocs_complete_total`
//! - `client_allocs_undetermined_restart_total`
//!
//! ## HTTP Server
//! This crate does NOT serve `/metrics`. Encode [`PrometheusMetrics::gather`]
//! with a [`TextEncoder`] from whatever HTTP stack the agent embeds.

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
