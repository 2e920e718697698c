//! Dial settings for the order store.

use capture_order_core::store::{ShardSpec, StoreFlavor};
use std::fmt;
use std::time::Duration;

/// Timeout for the initial dial and for server selection.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach the order collection.
#[derive(Clone)]
pub struct MongoConfig {
    /// Host name, without port
    pub host: String,
    /// User name; empty disables authentication
    pub username: String,
    /// Password
    pub password: String,
    /// Database holding the collection, also the authentication source
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Field used as the hashed shard key
    pub shard_key: String,
    /// Maximum pooled connections
    pub pool_limit: u32,
}

impl MongoConfig {
    /// Flavor resolved from the host.
    #[must_use]
    pub fn flavor(&self) -> StoreFlavor {
        StoreFlavor::resolve(&self.host)
    }

    /// Host plus the flavor's port suffix.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}{}", self.host, self.flavor().port_suffix())
    }

    /// Connection string without credentials.
    #[must_use]
    pub fn connection_uri(&self) -> String {
        format!("mongodb://{}", self.address())
    }

    /// Sharding request for the configured collection.
    #[must_use]
    pub fn shard_spec(&self) -> ShardSpec {
        ShardSpec {
            database: self.database.clone(),
            collection: self.collection.clone(),
            key: self.shard_key.clone(),
        }
    }
}

impl fmt::Debug for MongoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("shard_key", &self.shard_key)
            .field("pool_limit", &self.pool_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str) -> MongoConfig {
        MongoConfig {
            host: host.into(),
            username: "user".into(),
            password: "s3cret".into(),
            database: "akschallenge".into(),
            collection: "orders".into(),
            shard_key: "_id".into(),
            pool_limit: 25,
        }
    }

    #[test]
    fn cosmos_uses_the_tls_port() {
        let config = config("team1.documents.azure.com");
        assert_eq!(config.connection_uri(), "mongodb://team1.documents.azure.com:10255");
        assert!(config.flavor().uses_tls());
    }

    #[test]
    fn mongo_uses_the_default_port() {
        let config = config("orders-mongodb");
        assert_eq!(config.connection_uri(), "mongodb://orders-mongodb");
        assert_eq!(config.shard_spec().namespace(), "akschallenge.orders");
    }

    #[test]
    fn debug_hides_the_password() {
        assert!(!format!("{:?}", config("h")).contains("s3cret"));
    }
}
