//! Database implementations

mod common;
pub mod failure_repository;
pub mod job_queue;
pub mod manager;
pub mod order_repository;
pub mod product_repository;
pub mod report_repository;
pub mod request_repository;
pub mod schedule_repository;
pub mod session_repository;
pub mod store_repository;
pub mod webhook_repository;

pub use failure_repository::*;
pub use job_queue::*;
pub use manager::*;
pub use order_repository::*;
pub use product_repository::*;
pub use report_repository::*;
pub use request_repository::*;
pub use schedule_repository::*;
pub use session_repository::*;
pub use store_repository::*;
pub use webhook_repository::*;
