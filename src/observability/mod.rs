// Observability: metrics recording and Pushgateway export

pub mod metrics;

pub use metrics::{init, push_all};
