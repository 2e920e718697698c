//! Order domain types.
//!
//! An order enters the system as a [`NewOrder`]: caller-supplied fields only, no
//! identifier and no status. The document store writer is the only place that
//! turns a [`NewOrder`] into an [`Order`], assigning the identifier and the
//! initial [`OrderStatus::Open`] status in one step. After that the order is
//! read-only.
//!
//! # Lifecycle
//!
//! ```text
//! NewOrder ──(writer assigns id + Open)──► Order ──► persisted ──► published
//! ```
//!
//! The pipeline never moves an order past `Open`; downstream consumers own any
//! later transitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a persisted order.
///
/// Identifiers are 32 lowercase hex characters (a UUID v4 in simple form).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generate a new, globally unique identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an identifier read back from storage.
    #[must_use]
    pub const fn from_existing(id: String) -> Self {
        Self(id)
    }

    /// Returns the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the identifier, returning the inner string
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of an order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Order has been captured and awaits fulfilment downstream.
    Open,
}

impl OrderStatus {
    /// String form used in documents and JSON bodies.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order as submitted by a caller, before persistence.
///
/// Fields are opaque to the pipeline: no validation happens here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    /// Customer e-mail address
    #[serde(default)]
    pub email_address: String,
    /// Product name or SKU
    #[serde(default)]
    pub product: String,
    /// Order total, stored as given
    #[serde(default)]
    pub total: f64,
}

impl NewOrder {
    /// Creates a new order request
    #[must_use]
    pub fn new(email_address: impl Into<String>, product: impl Into<String>, total: f64) -> Self {
        Self {
            email_address: email_address.into(),
            product: product.into(),
            total,
        }
    }

    /// Assign an identifier and open the order.
    ///
    /// This is the single point where an order gains its identity.
    #[must_use]
    pub fn open(self, id: OrderId) -> Order {
        Order {
            id,
            email_address: self.email_address,
            product: self.product,
            total: self.total,
            status: OrderStatus::Open,
        }
    }
}

/// A persisted order with an assigned identifier.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    email_address: String,
    product: String,
    total: f64,
    status: OrderStatus,
}

impl Order {
    /// The identifier assigned at persist time
    #[must_use]
    pub const fn id(&self) -> &OrderId {
        &self.id
    }

    /// Customer e-mail address
    #[must_use]
    pub fn email_address(&self) -> &str {
        &self.email_address
    }

    /// Product name or SKU
    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Order total
    #[must_use]
    pub const fn total(&self) -> f64 {
        self.total
    }

    /// Current status (always [`OrderStatus::Open`] inside the pipeline)
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_hex() {
        let a = OrderId::generate();
        let b = OrderId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn open_assigns_id_and_status() {
        let id = OrderId::from_existing("abc".to_string());
        let order = NewOrder::new("a@b.c", "widget", 12.5).open(id.clone());

        assert_eq!(order.id(), &id);
        assert_eq!(order.status(), OrderStatus::Open);
        assert_eq!(order.email_address(), "a@b.c");
        assert_eq!(order.product(), "widget");
        assert!((order.total() - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn new_order_ignores_caller_supplied_identity() {
        let json = r#"{"id":"forged","status":"Shipped","emailAddress":"x@y.z","product":"p","total":3}"#;
        let parsed: NewOrder = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, NewOrder::new("x@y.z", "p", 3.0));
    }

    #[test]
    fn order_serializes_camel_case() {
        let order = NewOrder::new("a@b.c", "widget", 1.0).open(OrderId::from_existing("id1".into()));
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["id"], "id1");
        assert_eq!(value["emailAddress"], "a@b.c");
        assert_eq!(value["status"], "Open");
    }
}
