//! AMQP 1.0 broker connector for the order capture pipeline.
//!
//! Implements [`BrokerConnector`](capture_order_core::broker::BrokerConnector)
//! and [`BrokerLink`](capture_order_core::broker::BrokerLink) on `fe2o3-amqp`.
//! One connect builds the whole chain:
//!
//! ```text
//! Connection (SASL) ──► Session ──► [$cbs put-token] ──► Sender(target = URL path)
//! ```
//!
//! # Authentication
//!
//! | Configured                      | SASL        | Then                          |
//! |---------------------------------|-------------|-------------------------------|
//! | SAS key name + key              | `ANONYMOUS` | SAS token put to `$cbs`       |
//! | user-info in the URL            | `PLAIN`     | -                             |
//! | neither                         | none        | -                             |
//!
//! The SAS token is signed per connect by
//! [`SasSigner`](capture_order_core::sas::SasSigner), so every reconnect
//! carries a fresh expiry.
//!
//! # Failure mapping
//!
//! | Step / outcome                        | [`BrokerError`](capture_order_core::broker::BrokerError) |
//! |---------------------------------------|-----------------|
//! | connection open                       | `Connect`       |
//! | session begin                         | `Session`       |
//! | CBS authorization, sender attach      | `Link`          |
//! | link state error, remote detach       | `Detached`      |
//! | non-`Accepted` outcome                | `Rejected`      |
//! | anything else while sending           | `Send`          |

pub mod address;
pub mod connector;
pub mod link;

pub use address::{AmqpConfigError, BrokerAddress};
pub use connector::{AmqpConnector, AmqpConnectorBuilder, DEFAULT_CONTAINER_ID};
pub use link::AmqpLink;
