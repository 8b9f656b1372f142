//! Queue-draining worker pool

pub mod pool;

pub use pool::{JobWorker, JobWorkerConfig};
