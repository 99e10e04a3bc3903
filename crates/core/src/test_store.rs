//! In-memory `EntityStore` double for tests
//!
//! Mirrors the Postgres store's semantics: `(owner_id, external_id)` is
//! unique per kind and `create_*` returns the existing row on a key
//! collision (the mutex plays the role of the database's atomic upsert).
//! Supports failure injection for lookup and write paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{CollectorError, CollectorResult};
use crate::models::{Invoice, InvoiceItem, NewInvoice, NewInvoiceItem, Product, User, UserAddress};
use crate::store::EntityStore;

type Key = (i64, String);

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<Key, User>>,
    addresses: Mutex<HashMap<Key, UserAddress>>,
    products: Mutex<HashMap<Key, Product>>,
    invoices: Mutex<HashMap<Key, Invoice>>,
    items: Mutex<HashMap<Key, InvoiceItem>>,

    /// When set, all `find_*` calls fail (connectivity loss)
    pub fail_finds: AtomicBool,
    /// When set, `create_invoice` fails
    pub fail_invoice_writes: AtomicBool,
    /// Item writes beyond this count fail (`usize::MAX` = never)
    pub fail_item_writes_after: AtomicUsize,
    item_write_attempts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            fail_item_writes_after: AtomicUsize::new(usize::MAX),
            ..Self::default()
        }
    }

    fn check_finds(&self) -> CollectorResult<()> {
        if self.fail_finds.load(Ordering::SeqCst) {
            return Err(CollectorError::Database("injected lookup failure".into()));
        }
        Ok(())
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.lock().unwrap().len()
    }

    pub fn item_count(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn get_invoice(&self, external_id: &str, owner_id: i64) -> Option<Invoice> {
        self.invoices
            .lock()
            .unwrap()
            .get(&(owner_id, external_id.to_string()))
            .cloned()
    }

    pub fn get_item(&self, external_id: &str, owner_id: i64) -> Option<InvoiceItem> {
        self.items
            .lock()
            .unwrap()
            .get(&(owner_id, external_id.to_string()))
            .cloned()
    }

    pub fn get_user(&self, external_id: &str, owner_id: i64) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .get(&(owner_id, external_id.to_string()))
            .cloned()
    }

    pub fn get_address(&self, external_id: &str, owner_id: i64) -> Option<UserAddress> {
        self.addresses
            .lock()
            .unwrap()
            .get(&(owner_id, external_id.to_string()))
            .cloned()
    }

    pub fn get_product(&self, external_id: &str, owner_id: i64) -> Option<Product> {
        self.products
            .lock()
            .unwrap()
            .get(&(owner_id, external_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_user(
        &self,
        external_id: &str,
        owner_id: i64,
    ) -> CollectorResult<Option<User>> {
        self.check_finds()?;
        Ok(self.get_user(external_id, owner_id))
    }

    async fn create_user(&self, external_id: &str, owner_id: i64) -> CollectorResult<User> {
        let now = OffsetDateTime::now_utc();
        let mut users = self.users.lock().unwrap();
        let user = users
            .entry((owner_id, external_id.to_string()))
            .and_modify(|u| u.updated_at = now)
            .or_insert_with(|| User {
                id: Uuid::new_v4(),
                external_id: external_id.to_string(),
                owner_id,
                created_at: now,
                updated_at: now,
            });
        Ok(user.clone())
    }

    async fn find_address(
        &self,
        external_id: &str,
        owner_id: i64,
    ) -> CollectorResult<Option<UserAddress>> {
        self.check_finds()?;
        Ok(self.get_address(external_id, owner_id))
    }

    async fn create_address(
        &self,
        external_id: &str,
        owner_id: i64,
        user_id: Uuid,
    ) -> CollectorResult<UserAddress> {
        let now = OffsetDateTime::now_utc();
        let mut addresses = self.addresses.lock().unwrap();
        let address = addresses
            .entry((owner_id, external_id.to_string()))
            .and_modify(|a| a.updated_at = now)
            .or_insert_with(|| UserAddress {
                id: Uuid::new_v4(),
                external_id: external_id.to_string(),
                owner_id,
                user_id,
                created_at: now,
                updated_at: now,
            });
        Ok(address.clone())
    }

    async fn find_product(
        &self,
        external_id: &str,
        owner_id: i64,
    ) -> CollectorResult<Option<Product>> {
        self.check_finds()?;
        Ok(self.get_product(external_id, owner_id))
    }

    async fn create_product(
        &self,
        external_id: &str,
        owner_id: i64,
    ) -> CollectorResult<Product> {
        let now = OffsetDateTime::now_utc();
        let mut products = self.products.lock().unwrap();
        let product = products
            .entry((owner_id, external_id.to_string()))
            .and_modify(|p| p.updated_at = now)
            .or_insert_with(|| Product {
                id: Uuid::new_v4(),
                external_id: external_id.to_string(),
                owner_id,
                price: 0.0,
                name: String::new(),
                state: String::new(),
                created_at: now,
                updated_at: now,
            });
        Ok(product.clone())
    }

    async fn create_invoice(&self, new: NewInvoice) -> CollectorResult<Invoice> {
        if self.fail_invoice_writes.load(Ordering::SeqCst) {
            return Err(CollectorError::Database(
                "injected invoice write failure".into(),
            ));
        }
        let now = OffsetDateTime::now_utc();
        let mut invoices = self.invoices.lock().unwrap();
        let invoice = invoices
            .entry((new.owner_id, new.external_id.clone()))
            .and_modify(|i| i.updated_at = now)
            .or_insert_with(|| Invoice {
                id: Uuid::new_v4(),
                external_id: new.external_id.clone(),
                owner_id: new.owner_id,
                user_id: new.user_id,
                address_id: new.address_id,
                total_price: new.total_price,
                created_at: now,
                updated_at: now,
            });
        Ok(invoice.clone())
    }

    async fn create_invoice_item(&self, new: NewInvoiceItem) -> CollectorResult<InvoiceItem> {
        let attempt = self.item_write_attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.fail_item_writes_after.load(Ordering::SeqCst) {
            return Err(CollectorError::Database(
                "injected item write failure".into(),
            ));
        }
        let now = OffsetDateTime::now_utc();
        let mut items = self.items.lock().unwrap();
        let item = items
            .entry((new.owner_id, new.external_id.clone()))
            .and_modify(|i| i.updated_at = now)
            .or_insert_with(|| InvoiceItem {
                id: Uuid::new_v4(),
                external_id: new.external_id.clone(),
                owner_id: new.owner_id,
                invoice_id: new.invoice_id,
                product_id: new.product_id,
                product_price: new.product_price,
                quantity: new.quantity,
                created_at: now,
                updated_at: now,
            });
        Ok(item.clone())
    }
}
