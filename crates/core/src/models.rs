//! Persisted entity rows
//!
//! All entities are owner-partitioned and carry the external system's stable
//! identifier; `(owner_id, external_id)` is unique per table. Surrogate ids
//! and timestamps are store-generated. Rows are never updated after creation
//! except `updated_at` bookkeeping.

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub external_id: String,
    pub owner_id: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserAddress {
    pub id: Uuid,
    pub external_id: String,
    pub owner_id: i64,
    /// Owning user; rows cascade away when the user is deleted
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub external_id: String,
    pub owner_id: i64,
    pub price: f64,
    pub name: String,
    pub state: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Invoice {
    pub id: Uuid,
    pub external_id: String,
    pub owner_id: i64,
    pub user_id: Uuid,
    /// Nullable in the schema; the reconciliation path always sets it
    pub address_id: Option<Uuid>,
    pub total_price: f64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub external_id: String,
    pub owner_id: i64,
    pub invoice_id: Uuid,
    /// Absent when the message carried no product reference
    pub product_id: Option<Uuid>,
    pub product_price: f64,
    pub quantity: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Invoice fields supplied by the reconciler; the store generates the rest
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub external_id: String,
    pub owner_id: i64,
    pub user_id: Uuid,
    pub address_id: Option<Uuid>,
    pub total_price: f64,
}

/// Invoice item fields supplied by the reconciler
#[derive(Debug, Clone)]
pub struct NewInvoiceItem {
    pub external_id: String,
    pub owner_id: i64,
    pub invoice_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_price: f64,
    pub quantity: i32,
}
