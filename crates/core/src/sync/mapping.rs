//! Upstream payload to write-model mapping
//!
//! Pull sweeps and webhook reconciliation share these functions so both
//! paths produce byte-identical upserts for the same upstream record.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use storesync_domain::constants::{DEFAULT_CURRENCY, DEFAULT_ORDER_STATUS, ORDER_SOURCE_WOO};
use storesync_domain::{OrderItemDraft, OrderUpsert, ProductUpsert, Result, StoreSyncError};

/// Map an upstream order object for `tenant_id`.
///
/// `now` is the fallback confirmation time when the order carries neither a
/// paid nor a created date.
pub fn map_order(tenant_id: &str, raw: &Value, now: DateTime<Utc>) -> Result<OrderUpsert> {
    let obj = as_object(raw, "order")?;

    let external_order_no = text_or_number(obj.get("number"))
        .or_else(|| text_or_number(obj.get("id")))
        .ok_or_else(|| StoreSyncError::InvalidPayload("order has neither number nor id".into()))?;

    let status = non_empty(obj.get("status")).unwrap_or_else(|| DEFAULT_ORDER_STATUS.to_string());
    let billing = obj.get("billing").and_then(Value::as_object);

    let confirmed_at = match first_date(obj, &["date_paid_gmt", "date_paid", "date_created_gmt", "date_created"])? {
        Some(at) => at,
        None => now,
    };

    let items = match obj.get("line_items") {
        Some(Value::Array(lines)) => Some(
            lines
                .iter()
                .map(map_line_item)
                .collect::<Result<Vec<_>>>()?,
        ),
        Some(Value::Null) | None => None,
        Some(_) => {
            return Err(StoreSyncError::InvalidPayload("order line_items is not an array".into()))
        }
    };

    Ok(OrderUpsert {
        tenant_id: tenant_id.to_string(),
        external_order_no,
        order_source: ORDER_SOURCE_WOO.to_string(),
        mapped_status: status.clone(),
        status,
        total: decimal(obj.get("total"), "order total")?,
        currency: non_empty(obj.get("currency")).unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        customer_email: billing.and_then(|b| non_empty(b.get("email"))),
        customer_phone: billing.and_then(|b| non_empty(b.get("phone"))),
        shipping_address: object_value(obj.get("shipping")),
        billing_address: object_value(obj.get("billing")),
        payment_method: non_empty(obj.get("payment_method")),
        confirmed_at,
        items,
    })
}

/// Map an upstream product object for `tenant_id`
pub fn map_product(tenant_id: &str, raw: &Value) -> Result<ProductUpsert> {
    let obj = as_object(raw, "product")?;

    let sku = non_empty(obj.get("sku"))
        .or_else(|| text_or_number(obj.get("id")))
        .ok_or_else(|| StoreSyncError::InvalidPayload("product has neither sku nor id".into()))?;

    let status = obj.get("status").and_then(Value::as_str).unwrap_or_default();

    Ok(ProductUpsert {
        tenant_id: tenant_id.to_string(),
        sku,
        name: non_empty(obj.get("name")),
        price: decimal(obj.get("price"), "product price")?,
        stock: obj.get("stock_quantity").and_then(Value::as_i64),
        images: collect_field(obj.get("images"), "src"),
        tags: collect_field(obj.get("tags"), "name"),
        active: !matches!(status, "draft" | "trash"),
    })
}

fn map_line_item(raw: &Value) -> Result<OrderItemDraft> {
    let obj = as_object(raw, "line item")?;
    let qty = match obj.get("quantity") {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| StoreSyncError::InvalidPayload(format!("line item quantity: {s}")))?,
        Some(other) => {
            return Err(StoreSyncError::InvalidPayload(format!("line item quantity: {other}")))
        }
    };

    Ok(OrderItemDraft {
        sku: non_empty(obj.get("sku")),
        name: non_empty(obj.get("name")),
        qty,
        price: decimal(obj.get("total"), "line item total")?,
    })
}

// ============================================================================
// Field helpers
// ============================================================================

fn as_object<'a>(raw: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    raw.as_object()
        .ok_or_else(|| StoreSyncError::InvalidPayload(format!("{what} payload is not an object")))
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn text_or_number(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        other => non_empty(Some(other)),
    }
}

fn object_value(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| v.is_object()).cloned()
}

/// Decimal amounts stay textual; empty means absent
fn decimal(value: Option<&Value>, what: &str) -> Result<Option<String>> {
    let text = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => return Err(StoreSyncError::InvalidPayload(format!("{what}: {other}"))),
    };
    text.parse::<f64>()
        .map_err(|_| StoreSyncError::InvalidPayload(format!("{what}: {text}")))?;
    Ok(Some(text))
}

fn collect_field(value: Option<&Value>, field: &str) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(|e| non_empty(e.get(field))).collect())
        .unwrap_or_default()
}

/// First present date among `keys`. Zone-less values are read as UTC.
fn first_date(obj: &Map<String, Value>, keys: &[&str]) -> Result<Option<DateTime<Utc>>> {
    for key in keys {
        let Some(raw) = non_empty(obj.get(*key)) else {
            continue;
        };
        return parse_date(&raw)
            .map(Some)
            .ok_or_else(|| StoreSyncError::InvalidPayload(format!("{key}: {raw}")));
    }
    Ok(None)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
