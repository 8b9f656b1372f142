//! Domain types and models

pub mod job;
pub mod order;
pub mod product;
pub mod report;
pub mod request;
pub mod store;
pub mod webhook;

pub use job::{
    Job, JobFailure, JobName, JobRequest, JobStatus, RecurringSchedule, ReportPayload,
    RequestPayload, StorePayload,
};
pub use order::{Order, OrderItem, OrderItemDraft, OrderUpsert, UpsertOutcome};
pub use product::{Product, ProductUpsert};
pub use report::{Report, ReportType};
pub use request::{ChangeRequest, RequestAction, RequestKind, RequestStatus};
pub use store::{EntityType, SyncCursor, WooStore};
pub use webhook::{WebhookEvent, WebhookStatus, WebhookTopic};
