// Observability: metrics and their Prometheus rendering

pub mod metrics;

pub use metrics::{init_metrics, render_metrics};
