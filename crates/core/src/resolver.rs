//! Owner-scoped entity resolution
//!
//! Idempotency core of the pipeline: resolving the same
//! (kind, external id, owner) twice returns the same persisted row. Lookup
//! first, then fall through to the store's atomic insert-or-return-existing,
//! so two concurrent first-time resolutions still converge on one row.
//!
//! Lookup failures propagate as [`CollectorError::Database`] instead of
//! being treated as "not found"; resolution never falls through to creation
//! on a failed query.
//!
//! [`CollectorError::Database`]: crate::error::CollectorError::Database

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::CollectorResult;
use crate::models::{Product, User, UserAddress};
use crate::store::EntityStore;

#[derive(Clone)]
pub struct EntityResolver {
    store: Arc<dyn EntityStore>,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Return the user for (external_id, owner_id), creating it if absent
    pub async fn resolve_user(&self, external_id: &str, owner_id: i64) -> CollectorResult<User> {
        if let Some(user) = self.store.find_user(external_id, owner_id).await? {
            return Ok(user);
        }

        debug!(external_id = %external_id, owner_id = owner_id, "Creating user on first reference");
        self.store.create_user(external_id, owner_id).await
    }

    /// Return the address for (external_id, owner_id), creating it if absent.
    ///
    /// `user_id` is the already-resolved owning user; it is only consulted
    /// when a new row has to be created.
    pub async fn resolve_address(
        &self,
        external_id: &str,
        owner_id: i64,
        user_id: Uuid,
    ) -> CollectorResult<UserAddress> {
        if let Some(address) = self.store.find_address(external_id, owner_id).await? {
            return Ok(address);
        }

        debug!(external_id = %external_id, owner_id = owner_id, "Creating address on first reference");
        self.store.create_address(external_id, owner_id, user_id).await
    }

    /// Return the product for (external_id, owner_id), creating it if absent
    pub async fn resolve_product(
        &self,
        external_id: &str,
        owner_id: i64,
    ) -> CollectorResult<Product> {
        if let Some(product) = self.store.find_product(external_id, owner_id).await? {
            return Ok(product);
        }

        debug!(external_id = %external_id, owner_id = owner_id, "Creating product on first reference");
        self.store.create_product(external_id, owner_id).await
    }
}
