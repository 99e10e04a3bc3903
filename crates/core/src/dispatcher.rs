//! Message dispatch
//!
//! Validates the envelope, routes by status, and converts every outcome into
//! an explicit [`Disposition`] for the transport. Never panics and never
//! returns an error: the transport always learns how to settle the message.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::CollectorError;
use crate::message::MessageEnvelope;
use crate::reconciler::InvoiceReconciler;
use crate::store::EntityStore;

/// The only status currently recognized
pub const STATUS_INVOICE_PAID: &str = "invoice_paid";

/// How the transport should settle a processed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed successfully; acknowledge and drop
    Ack,
    /// Unprocessable (unknown status, malformed or incomplete payload);
    /// acknowledge but route to the dead-letter path for inspection
    DeadLetter,
    /// Transient store failure; negatively acknowledge for redelivery.
    /// Safe because every persist is an idempotent upsert.
    Retry,
}

pub struct Dispatcher {
    reconciler: InvoiceReconciler,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            reconciler: InvoiceReconciler::new(store),
        }
    }

    /// Process one decoded message payload and decide its settlement
    pub async fn process(&self, payload: Value) -> Disposition {
        let envelope: MessageEnvelope = match serde_json::from_value(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "Message discarded: payload does not match envelope shape");
                return Disposition::DeadLetter;
            }
        };

        if envelope.metadata.is_none() {
            error!("Message discarded: missing required metadata structure");
            return Disposition::DeadLetter;
        }

        match envelope.status.as_deref() {
            Some(STATUS_INVOICE_PAID) => self.handle_paid_invoice(&envelope).await,
            other => {
                let err = CollectorError::UnknownStatus(other.map(str::to_string));
                error!(error = %err, "Message discarded");
                Disposition::DeadLetter
            }
        }
    }

    async fn handle_paid_invoice(&self, envelope: &MessageEnvelope) -> Disposition {
        let Some(body) = &envelope.body else {
            error!("Message discarded: missing body");
            return Disposition::DeadLetter;
        };
        let Some(owner_id) = body.owner else {
            error!("Message discarded: missing owner");
            return Disposition::DeadLetter;
        };
        let Some(invoice) = &body.invoice else {
            error!(owner_id = owner_id, "Message discarded: missing invoice");
            return Disposition::DeadLetter;
        };

        // Store failures take precedence over invalid items: a message with
        // both retries first, and only dead-letters once every remaining
        // failure is a validation one (or the retry budget runs out).
        match self.reconciler.apply(owner_id, invoice).await {
            Ok(outcome) if outcome.items_failed > 0 => {
                // Idempotent upserts make redelivery safe: the invoice and
                // already-written items are returned unchanged on replay
                warn!(
                    invoice_external_id = %outcome.invoice.external_id,
                    owner_id = owner_id,
                    items_written = outcome.items_written,
                    items_failed = outcome.items_failed,
                    "Invoice reconciled with failed items; requesting redelivery"
                );
                Disposition::Retry
            }
            Ok(outcome) if outcome.items_invalid > 0 => {
                error!(
                    invoice_external_id = %outcome.invoice.external_id,
                    owner_id = owner_id,
                    items_written = outcome.items_written,
                    items_invalid = outcome.items_invalid,
                    "Invoice reconciled but some items are missing required fields"
                );
                Disposition::DeadLetter
            }
            Ok(outcome) => {
                info!(
                    invoice_external_id = %outcome.invoice.external_id,
                    owner_id = owner_id,
                    items_written = outcome.items_written,
                    "Invoice reconciled"
                );
                Disposition::Ack
            }
            Err(err @ CollectorError::Database(_)) => {
                error!(owner_id = owner_id, error = %err, "Invoice reconciliation hit store failure");
                Disposition::Retry
            }
            Err(err) => {
                error!(owner_id = owner_id, error = %err, "Invoice reconciliation rejected message");
                Disposition::DeadLetter
            }
        }
    }
}
