//! SQLite implementation of the order port
//!
//! Orders are unique per (tenant_id, external_order_no). An upsert that
//! carries line items replaces the whole item set inside the same
//! transaction as the order write, so readers never observe a half-replaced
//! set.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row, Transaction, TransactionBehavior};
use storesync_core::OrderRepository;
use storesync_domain::{Order, OrderItem, OrderItemDraft, OrderUpsert, Result, StoreSyncError, UpsertOutcome};
use uuid::Uuid;

use super::common::{from_millis, opt_json_column, to_json_text, to_millis, with_connection};
use super::manager::{map_sql_error, DbManager};

const ORDER_COLUMNS: &str = "id, tenant_id, external_order_no, order_source, status, mapped_status, total, currency,
    customer_email, customer_phone, shipping_address, billing_address, payment_method, confirmed_at, notes,
    created_at, updated_at";

pub struct SqliteOrderRepository {
    db: Arc<DbManager>,
}

impl SqliteOrderRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn replace_items(tx: &Transaction<'_>, order_id: &str, items: &[OrderItemDraft]) -> Result<()> {
        tx.execute("DELETE FROM order_items WHERE order_id = ?1", params![order_id])
            .map_err(map_sql_error)?;

        let mut insert = tx
            .prepare(
                "INSERT INTO order_items (id, order_id, sku, name, qty, price) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(map_sql_error)?;
        for item in items {
            insert
                .execute(params![
                    Uuid::now_v7().to_string(),
                    order_id,
                    item.sku,
                    item.name,
                    item.qty,
                    item.price
                ])
                .map_err(map_sql_error)?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn upsert_order(&self, order: &OrderUpsert) -> Result<UpsertOutcome> {
        let order = order.clone();
        let shipping = order.shipping_address.as_ref().map(to_json_text).transpose()?;
        let billing = order.billing_address.as_ref().map(to_json_text).transpose()?;

        with_connection(&self.db, move |conn| {
            let now = to_millis(Utc::now());
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM orders WHERE tenant_id = ?1 AND external_order_no = ?2",
                    params![order.tenant_id, order.external_order_no],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)?;

            let outcome = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE orders SET order_source = ?1, status = ?2, mapped_status = ?3, total = ?4,
                            currency = ?5, customer_email = ?6, customer_phone = ?7, shipping_address = ?8,
                            billing_address = ?9, payment_method = ?10, confirmed_at = ?11, updated_at = ?12
                         WHERE id = ?13",
                        params![
                            order.order_source,
                            order.status,
                            order.mapped_status,
                            order.total,
                            order.currency,
                            order.customer_email,
                            order.customer_phone,
                            shipping,
                            billing,
                            order.payment_method,
                            to_millis(order.confirmed_at),
                            now,
                            id
                        ],
                    )
                    .map_err(map_sql_error)?;
                    UpsertOutcome { id, created: false }
                }
                None => {
                    let id = Uuid::now_v7().to_string();
                    tx.execute(
                        &format!(
                            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES
                             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, NULL, ?15, ?15)"
                        ),
                        params![
                            id,
                            order.tenant_id,
                            order.external_order_no,
                            order.order_source,
                            order.status,
                            order.mapped_status,
                            order.total,
                            order.currency,
                            order.customer_email,
                            order.customer_phone,
                            shipping,
                            billing,
                            order.payment_method,
                            to_millis(order.confirmed_at),
                            now
                        ],
                    )
                    .map_err(map_sql_error)?;
                    UpsertOutcome { id, created: true }
                }
            };

            if let Some(items) = &order.items {
                Self::replace_items(&tx, &outcome.id, items)?;
            }

            tx.commit().map_err(map_sql_error)?;
            Ok(outcome)
        })
        .await
    }

    async fn find_order(&self, tenant_id: &str, external_order_no: &str) -> Result<Option<Order>> {
        let tenant_id = tenant_id.to_string();
        let external_order_no = external_order_no.to_string();
        with_connection(&self.db, move |conn| {
            let order = conn
                .query_row(
                    &format!(
                        "SELECT {ORDER_COLUMNS} FROM orders WHERE tenant_id = ?1 AND external_order_no = ?2"
                    ),
                    params![tenant_id, external_order_no],
                    map_order_row,
                )
                .optional()
                .map_err(map_sql_error)?;

            let Some(mut order) = order else {
                return Ok(None);
            };

            let mut stmt = conn
                .prepare(
                    "SELECT id, order_id, sku, name, qty, price FROM order_items WHERE order_id = ?1 ORDER BY rowid",
                )
                .map_err(map_sql_error)?;
            let items = stmt
                .query_map(params![order.id], map_item_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            order.items = items;
            Ok(Some(order))
        })
        .await
    }

    async fn set_order_note(&self, order_id: &str, note: &str) -> Result<()> {
        let order_id = order_id.to_string();
        let note = note.to_string();
        with_connection(&self.db, move |conn| {
            let changed = conn
                .execute(
                    "UPDATE orders SET notes = ?1, updated_at = ?2 WHERE id = ?3",
                    params![note, to_millis(Utc::now()), order_id],
                )
                .map_err(map_sql_error)?;
            if changed == 0 {
                return Err(StoreSyncError::NotFound(format!("order {order_id}")));
            }
            Ok(())
        })
        .await
    }
}

fn map_order_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        external_order_no: row.get(2)?,
        order_source: row.get(3)?,
        status: row.get(4)?,
        mapped_status: row.get(5)?,
        total: row.get(6)?,
        currency: row.get(7)?,
        customer_email: row.get(8)?,
        customer_phone: row.get(9)?,
        shipping_address: opt_json_column(10, row.get(10)?)?,
        billing_address: opt_json_column(11, row.get(11)?)?,
        payment_method: row.get(12)?,
        confirmed_at: from_millis(13, row.get(13)?)?,
        notes: row.get(14)?,
        created_at: from_millis(15, row.get(15)?)?,
        updated_at: from_millis(16, row.get(16)?)?,
        items: Vec::new(),
    })
}

fn map_item_row(row: &Row<'_>) -> rusqlite::Result<OrderItem> {
    Ok(OrderItem {
        id: row.get(0)?,
        order_id: row.get(1)?,
        sku: row.get(2)?,
        name: row.get(3)?,
        qty: row.get(4)?,
        price: row.get(5)?,
    })
}
