//! Entity store (write gateway)
//!
//! Each call persists or reads exactly one entity on one checked-out pool
//! connection. The `create_*` operations are atomic
//! insert-or-return-existing: `INSERT ... ON CONFLICT ... DO UPDATE SET
//! updated_at = now() ... RETURNING` claims the `(owner_id, external_id)`
//! key or hands back the row that already owns it, so concurrent first-time
//! resolutions of the same key cannot produce duplicates. Store failures map
//! to [`CollectorError::Database`] and are always returned to the caller.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::CollectorResult;
use crate::models::{Invoice, InvoiceItem, NewInvoice, NewInvoiceItem, Product, User, UserAddress};

/// Create the database connection pool.
///
/// Constructed once at process startup and handed to every component
/// explicitly; no ambient global handle.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Run pending schema migrations from `migrations/`
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// Persistence operations for the five entity kinds.
///
/// `find_*` returns the at-most-one row matching `(external_id, owner_id)`.
/// `create_*` inserts a row for that key, or returns the existing one when
/// another writer got there first.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_user(&self, external_id: &str, owner_id: i64)
        -> CollectorResult<Option<User>>;
    async fn create_user(&self, external_id: &str, owner_id: i64) -> CollectorResult<User>;

    async fn find_address(
        &self,
        external_id: &str,
        owner_id: i64,
    ) -> CollectorResult<Option<UserAddress>>;
    async fn create_address(
        &self,
        external_id: &str,
        owner_id: i64,
        user_id: Uuid,
    ) -> CollectorResult<UserAddress>;

    async fn find_product(
        &self,
        external_id: &str,
        owner_id: i64,
    ) -> CollectorResult<Option<Product>>;
    async fn create_product(&self, external_id: &str, owner_id: i64)
        -> CollectorResult<Product>;

    async fn create_invoice(&self, new: NewInvoice) -> CollectorResult<Invoice>;
    async fn create_invoice_item(&self, new: NewInvoiceItem) -> CollectorResult<InvoiceItem>;
}

/// Postgres-backed entity store
#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Raw invoice insert bypassing reconciliation. Debug surface only;
    /// the server mounts it solely behind `ENABLE_DEBUG_ENDPOINTS`.
    pub async fn insert_raw_invoice(&self, new: NewInvoice) -> CollectorResult<Invoice> {
        let invoice: Invoice = sqlx::query_as(
            r#"
            INSERT INTO invoices (external_id, owner_id, user_id, address_id, total_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, external_id, owner_id, user_id, address_id, total_price,
                      created_at, updated_at
            "#,
        )
        .bind(&new.external_id)
        .bind(new.owner_id)
        .bind(new.user_id)
        .bind(new.address_id)
        .bind(new.total_price)
        .fetch_one(&self.pool)
        .await?;

        Ok(invoice)
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn find_user(
        &self,
        external_id: &str,
        owner_id: i64,
    ) -> CollectorResult<Option<User>> {
        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT id, external_id, owner_id, created_at, updated_at
            FROM users
            WHERE external_id = $1 AND owner_id = $2
            "#,
        )
        .bind(external_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(&self, external_id: &str, owner_id: i64) -> CollectorResult<User> {
        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (external_id, owner_id)
            VALUES ($1, $2)
            ON CONFLICT (owner_id, external_id)
                DO UPDATE SET updated_at = now()
            RETURNING id, external_id, owner_id, created_at, updated_at
            "#,
        )
        .bind(external_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_address(
        &self,
        external_id: &str,
        owner_id: i64,
    ) -> CollectorResult<Option<UserAddress>> {
        let address: Option<UserAddress> = sqlx::query_as(
            r#"
            SELECT id, external_id, owner_id, user_id, created_at, updated_at
            FROM user_addresses
            WHERE external_id = $1 AND owner_id = $2
            "#,
        )
        .bind(external_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(address)
    }

    async fn create_address(
        &self,
        external_id: &str,
        owner_id: i64,
        user_id: Uuid,
    ) -> CollectorResult<UserAddress> {
        // On conflict the existing row keeps its original user back-reference
        let address: UserAddress = sqlx::query_as(
            r#"
            INSERT INTO user_addresses (external_id, owner_id, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id, external_id)
                DO UPDATE SET updated_at = now()
            RETURNING id, external_id, owner_id, user_id, created_at, updated_at
            "#,
        )
        .bind(external_id)
        .bind(owner_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(address)
    }

    async fn find_product(
        &self,
        external_id: &str,
        owner_id: i64,
    ) -> CollectorResult<Option<Product>> {
        let product: Option<Product> = sqlx::query_as(
            r#"
            SELECT id, external_id, owner_id, price, name, state, created_at, updated_at
            FROM products
            WHERE external_id = $1 AND owner_id = $2
            "#,
        )
        .bind(external_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn create_product(
        &self,
        external_id: &str,
        owner_id: i64,
    ) -> CollectorResult<Product> {
        // Lazily created products carry column defaults until the product
        // catalog message for this external id arrives
        let product: Product = sqlx::query_as(
            r#"
            INSERT INTO products (external_id, owner_id)
            VALUES ($1, $2)
            ON CONFLICT (owner_id, external_id)
                DO UPDATE SET updated_at = now()
            RETURNING id, external_id, owner_id, price, name, state, created_at, updated_at
            "#,
        )
        .bind(external_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    async fn create_invoice(&self, new: NewInvoice) -> CollectorResult<Invoice> {
        // Same upsert primitive as resolution: a redelivered message returns
        // the invoice written by the first delivery instead of duplicating it
        let invoice: Invoice = sqlx::query_as(
            r#"
            INSERT INTO invoices (external_id, owner_id, user_id, address_id, total_price)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner_id, external_id)
                DO UPDATE SET updated_at = now()
            RETURNING id, external_id, owner_id, user_id, address_id, total_price,
                      created_at, updated_at
            "#,
        )
        .bind(&new.external_id)
        .bind(new.owner_id)
        .bind(new.user_id)
        .bind(new.address_id)
        .bind(new.total_price)
        .fetch_one(&self.pool)
        .await?;

        Ok(invoice)
    }

    async fn create_invoice_item(&self, new: NewInvoiceItem) -> CollectorResult<InvoiceItem> {
        let item: InvoiceItem = sqlx::query_as(
            r#"
            INSERT INTO invoice_items
                (external_id, owner_id, invoice_id, product_id, product_price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (owner_id, external_id)
                DO UPDATE SET updated_at = now()
            RETURNING id, external_id, owner_id, invoice_id, product_id, product_price,
                      quantity, created_at, updated_at
            "#,
        )
        .bind(&new.external_id)
        .bind(new.owner_id)
        .bind(new.invoice_id)
        .bind(new.product_id)
        .bind(new.product_price)
        .bind(new.quantity)
        .fetch_one(&self.pool)
        .await?;

        Ok(item)
    }
}
