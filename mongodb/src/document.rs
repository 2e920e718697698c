//! BSON shape of a stored order.

use capture_order_core::order::Order;
use serde::{Deserialize, Serialize};

/// One order as written to the collection.
///
/// The order id doubles as the document `_id`, which is also the default shard
/// key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDocument {
    /// Order id
    #[serde(rename = "_id")]
    pub id: String,
    /// Customer e-mail address
    pub email_address: String,
    /// Product name or SKU
    pub product: String,
    /// Order total
    pub total: f64,
    /// Order status
    pub status: String,
}

impl From<&Order> for OrderDocument {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().as_str().to_string(),
            email_address: order.email_address().to_string(),
            product: order.product().to_string(),
            total: order.total(),
            status: order.status().as_str().to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use capture_order_core::order::{NewOrder, OrderId};
    use mongodb::bson;

    #[test]
    fn id_is_stored_as_underscore_id() {
        let order = NewOrder::new("a@b.c", "widget", 4.25).open(OrderId::from_existing("abc".into()));

        let document = bson::to_document(&OrderDocument::from(&order)).unwrap();

        assert_eq!(document.get_str("_id").unwrap(), "abc");
        assert_eq!(document.get_str("emailAddress").unwrap(), "a@b.c");
        assert_eq!(document.get_str("product").unwrap(), "widget");
        assert!((document.get_f64("total").unwrap() - 4.25).abs() < f64::EPSILON);
        assert_eq!(document.get_str("status").unwrap(), "Open");
        assert!(!document.contains_key("id"));
    }
}
