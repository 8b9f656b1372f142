//! Tenant summaries computed in SQL and persisted as report rows

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde_json::{json, Map, Value};
use storesync_core::ReportRepository;
use storesync_domain::{Report, ReportType, Result};

use super::common::{json_column, to_json_text, to_millis, with_connection};
use super::manager::{map_sql_error, DbManager, SqliteConnection};

pub struct SqliteReportRepository {
    db: Arc<DbManager>,
}

impl SqliteReportRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    pub async fn latest_report(&self, tenant_id: &str, report_type: ReportType) -> Result<Option<Value>> {
        let tenant_id = tenant_id.to_string();
        with_connection(&self.db, move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT summary FROM reports WHERE tenant_id = ?1 AND report_type = ?2
                     ORDER BY generated_at DESC LIMIT 1",
                    params![tenant_id, report_type.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)?;
            raw.map(|text| json_column(0, &text).map_err(map_sql_error)).transpose()
        })
        .await
    }
}

fn orders_summary(conn: &SqliteConnection, tenant_id: &str) -> Result<Value> {
    let mut stmt = conn
        .prepare(
            "SELECT currency, COUNT(*), COALESCE(SUM(CAST(total AS REAL)), 0.0)
             FROM orders WHERE tenant_id = ?1 GROUP BY currency ORDER BY currency",
        )
        .map_err(map_sql_error)?;
    let rows = stmt
        .query_map(params![tenant_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, f64>(2)?))
        })
        .map_err(map_sql_error)?;

    let mut count = 0_i64;
    let mut revenue = Map::new();
    for row in rows {
        let (currency, orders, total) = row.map_err(map_sql_error)?;
        count += orders;
        revenue.insert(currency, Value::String(format!("{total:.2}")));
    }

    Ok(json!({ "orderCount": count, "revenueByCurrency": revenue }))
}

fn products_summary(conn: &SqliteConnection, tenant_id: &str) -> Result<Value> {
    let (count, active, stock): (i64, i64, i64) = conn
        .query_row(
            "SELECT COUNT(*), COALESCE(SUM(active), 0), COALESCE(SUM(stock), 0)
             FROM products WHERE tenant_id = ?1",
            params![tenant_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map_err(map_sql_error)?;

    Ok(json!({ "productCount": count, "activeCount": active, "totalStock": stock }))
}

#[async_trait]
impl ReportRepository for SqliteReportRepository {
    async fn summarize(&self, tenant_id: &str, report_type: ReportType) -> Result<Value> {
        let tenant_id = tenant_id.to_string();
        with_connection(&self.db, move |conn| {
            let mut summary = match report_type {
                ReportType::Orders => orders_summary(conn, &tenant_id)?,
                ReportType::Products => products_summary(conn, &tenant_id)?,
            };
            if let Value::Object(fields) = &mut summary {
                fields.insert("tenantId".into(), Value::String(tenant_id));
                fields.insert("reportType".into(), Value::String(report_type.as_str().into()));
            }
            Ok(summary)
        })
        .await
    }

    async fn save_report(&self, report: &Report) -> Result<()> {
        let report = report.clone();
        let summary = to_json_text(&report.summary)?;
        with_connection(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO reports (id, tenant_id, report_type, summary, generated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    report.id,
                    report.tenant_id,
                    report.report_type.as_str(),
                    summary,
                    to_millis(report.generated_at)
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }
}
