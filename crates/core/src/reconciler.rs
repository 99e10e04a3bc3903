//! Invoice reconciliation
//!
//! Orchestrates one paid-invoice message: resolve the referenced user and
//! address, persist the invoice, then persist each line item (resolving its
//! product when referenced). There is no transaction spanning these writes;
//! resolution always happens strictly before the dependent write that needs
//! the resolved foreign key, and a failure aborts only the remaining steps,
//! never rolling back rows already committed.

use std::sync::Arc;

use tracing::{error, warn};

use crate::error::{CollectorError, CollectorResult};
use crate::message::{InvoiceItemPayload, InvoicePayload};
use crate::models::{Invoice, NewInvoice, NewInvoiceItem};
use crate::resolver::EntityResolver;
use crate::store::EntityStore;

/// Outcome of reconciling one invoice message
#[derive(Debug)]
pub struct ReconciledInvoice {
    pub invoice: Invoice,
    pub items_written: usize,
    /// Items that hit a store failure. The invoice and earlier items remain
    /// committed; redelivery can complete the remainder.
    pub items_failed: usize,
    /// Items missing required fields. Redelivery cannot fix these.
    pub items_invalid: usize,
}

pub struct InvoiceReconciler {
    resolver: EntityResolver,
    store: Arc<dyn EntityStore>,
}

impl InvoiceReconciler {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            resolver: EntityResolver::new(store.clone()),
            store,
        }
    }

    /// Reconcile a paid invoice for `owner_id`.
    ///
    /// Validation failures and store failures before the invoice write abort
    /// with no partial invoice state. Item failures after the invoice write
    /// are counted in the returned [`ReconciledInvoice`].
    pub async fn apply(
        &self,
        owner_id: i64,
        payload: &InvoicePayload,
    ) -> CollectorResult<ReconciledInvoice> {
        let invoice_external_id = payload
            .id
            .as_deref()
            .ok_or(CollectorError::MissingField("invoice.id"))?;
        let user_external_id = payload
            .user_id
            .as_deref()
            .ok_or(CollectorError::MissingField("invoice.user_id"))?;
        // Required by the orchestration even though the column is nullable
        let address_external_id = payload
            .address_id
            .as_deref()
            .ok_or(CollectorError::MissingField("invoice.address_id"))?;
        let total_price = payload
            .total_price
            .ok_or(CollectorError::MissingField("invoice.total_price"))?;

        let user = self.resolver.resolve_user(user_external_id, owner_id).await?;
        let address = self
            .resolver
            .resolve_address(address_external_id, owner_id, user.id)
            .await?;

        let invoice = self
            .store
            .create_invoice(NewInvoice {
                external_id: invoice_external_id.to_string(),
                owner_id,
                user_id: user.id,
                address_id: Some(address.id),
                total_price,
            })
            .await?;

        if payload.items.is_empty() {
            warn!(
                invoice_external_id = %invoice.external_id,
                owner_id = owner_id,
                "Paid invoice carried no line items"
            );
            return Ok(ReconciledInvoice {
                invoice,
                items_written: 0,
                items_failed: 0,
                items_invalid: 0,
            });
        }

        let mut items_written = 0;
        let mut items_failed = 0;
        let mut items_invalid = 0;

        for item in &payload.items {
            match self.persist_item(owner_id, invoice.id, item).await {
                Ok(()) => items_written += 1,
                Err(e) => {
                    match e {
                        CollectorError::MissingField(_) => items_invalid += 1,
                        _ => items_failed += 1,
                    }
                    error!(
                        invoice_external_id = %invoice.external_id,
                        item_external_id = ?item.id,
                        owner_id = owner_id,
                        error = %e,
                        "Failed to persist invoice item"
                    );
                }
            }
        }

        Ok(ReconciledInvoice {
            invoice,
            items_written,
            items_failed,
            items_invalid,
        })
    }

    /// Persist one line item, resolving its product reference when present.
    /// Product-less items still record unit price and quantity.
    async fn persist_item(
        &self,
        owner_id: i64,
        invoice_id: uuid::Uuid,
        item: &InvoiceItemPayload,
    ) -> CollectorResult<()> {
        let external_id = item
            .id
            .as_deref()
            .ok_or(CollectorError::MissingField("item.id"))?;
        let product_price = item
            .product_price
            .ok_or(CollectorError::MissingField("item.product_price"))?;
        let quantity = item
            .quantity
            .ok_or(CollectorError::MissingField("item.quantity"))?;

        let product_id = match item.product_id.as_deref() {
            Some(product_external_id) => Some(
                self.resolver
                    .resolve_product(product_external_id, owner_id)
                    .await?
                    .id,
            ),
            None => None,
        };

        self.store
            .create_invoice_item(NewInvoiceItem {
                external_id: external_id.to_string(),
                owner_id,
                invoice_id,
                product_id,
                product_price,
                quantity,
            })
            .await?;

        Ok(())
    }
}
