//! `generate-report`

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use storesync_common::Clock;
use storesync_domain::{Job, JobName, Report, ReportPayload, ReportType, Result};
use tracing::info;
use uuid::Uuid;

use crate::clock::utc_now;
use crate::jobs::ports::JobHandler;
use crate::maintenance::ports::ReportRepository;

pub struct GenerateReportHandler {
    reports: Arc<dyn ReportRepository>,
    clock: Arc<dyn Clock>,
}

impl GenerateReportHandler {
    pub fn new(reports: Arc<dyn ReportRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { reports, clock }
    }
}

#[async_trait]
impl JobHandler for GenerateReportHandler {
    fn name(&self) -> JobName {
        JobName::GenerateReport
    }

    async fn handle(&self, job: &Job) -> Result<Value> {
        let payload: ReportPayload = job.payload()?;
        let report_type = ReportType::parse(&payload.report_type)?;

        let summary = self.reports.summarize(&payload.tenant_id, report_type).await?;
        let report = Report {
            id: Uuid::now_v7().to_string(),
            tenant_id: payload.tenant_id,
            report_type,
            summary,
            generated_at: utc_now(self.clock.as_ref()),
        };
        self.reports.save_report(&report).await?;

        info!(report_id = %report.id, tenant_id = %report.tenant_id, %report_type, "Report generated");
        Ok(json!({ "success": true, "reportId": report.id, "summary": report.summary }))
    }
}
