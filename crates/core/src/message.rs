//! Inbound message envelope
//!
//! Every field deserializes as optional so that presence checks are explicit
//! validation steps with named errors, not deserialization failures.
//!
//! Wire shape:
//!
//! ```json
//! {
//!   "status": "invoice_paid",
//!   "metadata": { ... },
//!   "body": {
//!     "owner": 7,
//!     "invoice": {
//!       "id": "INV-1", "user_id": "U-1", "address_id": "A-1",
//!       "total_price": 99.5,
//!       "items": [
//!         { "id": "IT-1", "product_id": "P-1",
//!           "product_price": 9.99, "quantity": 3 }
//!       ]
//!     }
//!   }
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEnvelope {
    pub status: Option<String>,
    /// Presence-checked only; contents are unspecified
    pub metadata: Option<Value>,
    pub body: Option<MessageBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageBody {
    pub owner: Option<i64>,
    pub invoice: Option<InvoicePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicePayload {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub address_id: Option<String>,
    pub total_price: Option<f64>,
    #[serde(default)]
    pub items: Vec<InvoiceItemPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceItemPayload {
    pub id: Option<String>,
    pub product_id: Option<String>,
    pub product_price: Option<f64>,
    pub quantity: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_envelope() {
        let raw = serde_json::json!({
            "status": "invoice_paid",
            "metadata": {"source": "billing"},
            "body": {
                "owner": 7,
                "invoice": {
                    "id": "INV-1",
                    "user_id": "U-1",
                    "address_id": "A-1",
                    "total_price": 99.5,
                    "items": [
                        {"id": "IT-1", "product_id": "P-1",
                         "product_price": 9.99, "quantity": 3}
                    ]
                }
            }
        });

        let envelope: MessageEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.status.as_deref(), Some("invoice_paid"));
        assert!(envelope.metadata.is_some());

        let body = envelope.body.unwrap();
        assert_eq!(body.owner, Some(7));

        let invoice = body.invoice.unwrap();
        assert_eq!(invoice.id.as_deref(), Some("INV-1"));
        assert_eq!(invoice.total_price, Some(99.5));
        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.items[0].quantity, Some(3));
    }

    #[test]
    fn test_deserialize_sparse_envelope() {
        // Missing fields become None rather than a parse error
        let envelope: MessageEnvelope = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(envelope.status.is_none());
        assert!(envelope.metadata.is_none());
        assert!(envelope.body.is_none());
    }

    #[test]
    fn test_missing_items_defaults_to_empty() {
        let invoice: InvoicePayload = serde_json::from_value(serde_json::json!({
            "id": "INV-2", "user_id": "U-2"
        }))
        .unwrap();
        assert!(invoice.items.is_empty());
        assert!(invoice.address_id.is_none());
    }
}
