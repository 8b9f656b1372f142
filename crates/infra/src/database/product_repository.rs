//! SQLite implementation of the product port

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use storesync_core::ProductRepository;
use storesync_domain::{Product, ProductUpsert, Result, UpsertOutcome};
use uuid::Uuid;

use super::common::{
    bool_to_int, from_millis, int_to_bool, json_column, to_json_text, to_millis, with_connection,
};
use super::manager::{map_sql_error, DbManager};

pub struct SqliteProductRepository {
    db: Arc<DbManager>,
}

impl SqliteProductRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn upsert_product(&self, product: &ProductUpsert) -> Result<UpsertOutcome> {
        let product = product.clone();
        let images = to_json_text(&product.images)?;
        let tags = to_json_text(&product.tags)?;

        with_connection(&self.db, move |conn| {
            let now = to_millis(Utc::now());
            let candidate = Uuid::now_v7().to_string();

            // RETURNING yields the surviving row id on both the insert and the
            // conflict path.
            let id: String = conn
                .query_row(
                    "INSERT INTO products (id, tenant_id, sku, name, price, stock, images, tags, active, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                     ON CONFLICT(tenant_id, sku) DO UPDATE SET
                        name = excluded.name,
                        price = excluded.price,
                        stock = excluded.stock,
                        images = excluded.images,
                        tags = excluded.tags,
                        active = excluded.active,
                        updated_at = excluded.updated_at
                     RETURNING id",
                    params![
                        candidate,
                        product.tenant_id,
                        product.sku,
                        product.name,
                        product.price,
                        product.stock,
                        images,
                        tags,
                        bool_to_int(product.active),
                        now
                    ],
                    |row| row.get(0),
                )
                .map_err(map_sql_error)?;

            let created = id == candidate;
            Ok(UpsertOutcome { id, created })
        })
        .await
    }

    async fn find_product(&self, tenant_id: &str, sku: &str) -> Result<Option<Product>> {
        let tenant_id = tenant_id.to_string();
        let sku = sku.to_string();
        with_connection(&self.db, move |conn| {
            conn.query_row(
                "SELECT id, tenant_id, sku, name, price, stock, images, tags, active, created_at, updated_at
                 FROM products WHERE tenant_id = ?1 AND sku = ?2",
                params![tenant_id, sku],
                map_product_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }
}

fn map_product_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let images: String = row.get(6)?;
    let tags: String = row.get(7)?;
    Ok(Product {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        sku: row.get(2)?,
        name: row.get(3)?,
        price: row.get(4)?,
        stock: row.get(5)?,
        images: json_column(6, &images)?,
        tags: json_column(7, &tags)?,
        active: int_to_bool(row.get(8)?),
        created_at: from_millis(9, row.get(9)?)?,
        updated_at: from_millis(10, row.get(10)?)?,
    })
}
