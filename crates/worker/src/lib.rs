//! # StoreSync Worker
//!
//! Process wiring for the background worker: builds every adapter from the
//! loaded [`Config`](storesync_domain::Config), runs the job pool and the
//! schedule ticker, and serves `/health` and `/metrics`.

pub mod context;
pub mod server;
pub mod telemetry;

pub use context::WorkerContext;
pub use server::{router, serve, ServerState};
