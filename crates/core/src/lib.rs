#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Collector Core
//!
//! Reconciles billing event messages into owner-partitioned entities
//! (users, addresses, products, invoices, invoice items).
//!
//! ## Pipeline
//!
//! - **Dispatcher**: validates the message envelope, routes by status, and
//!   converts every failure into an explicit [`Disposition`]
//! - **Invoice Reconciler**: resolves the referenced user, address and
//!   products, then persists the invoice and its line items
//! - **Entity Resolver**: idempotent get-or-create keyed by
//!   (external id, owner)
//! - **Entity Store**: one entity per write, each in its own unit of work,
//!   with an atomic insert-or-return-existing primitive

pub mod dispatcher;
pub mod error;
pub mod health;
pub mod message;
pub mod models;
pub mod reconciler;
pub mod resolver;
pub mod store;

#[cfg(test)]
pub(crate) mod test_store;

// Dispatcher
pub use dispatcher::{Dispatcher, Disposition, STATUS_INVOICE_PAID};

// Error
pub use error::{CollectorError, CollectorResult};

// Health
pub use health::{database_healthy, HealthReport, ResourceStatus};

// Message
pub use message::{InvoiceItemPayload, InvoicePayload, MessageBody, MessageEnvelope};

// Models
pub use models::{
    Invoice, InvoiceItem, NewInvoice, NewInvoiceItem, Product, User, UserAddress,
};

// Reconciler
pub use reconciler::{InvoiceReconciler, ReconciledInvoice};

// Resolver
pub use resolver::EntityResolver;

// Store
pub use store::{create_pool, run_migrations, EntityStore, PgEntityStore};
