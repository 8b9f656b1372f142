//! One [`JobHandler`](crate::jobs::ports::JobHandler) per job name

mod maintenance;
mod report;
mod request;
mod sync;

pub use maintenance::{CleanupCacheHandler, CleanupSessionsHandler};
pub use report::GenerateReportHandler;
pub use request::ProcessRequestHandler;
pub use sync::{StoreSyncHandler, WebhookEventsHandler, WooScheduleHandler};
