//! Service configuration, loaded once from the environment at startup.

use capture_order_amqp::{AmqpConnector, BrokerAddress};
use capture_order_mongodb::MongoConfig;
use capture_order_runtime::DEFAULT_POOL_LIMIT;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where the store password is mounted when `MONGOPASSWORD` is unset.
pub const DEFAULT_PASSWORD_FILE: &str = "/kvmnt/mongo-password";

/// Variables reported at startup. Values are never logged.
const KNOWN_VARS: &[&str] = &[
    "MONGOHOST",
    "MONGOUSER",
    "MONGOPASSWORD",
    "MONGOPASSWORD_FILE",
    "MONGOPOOL_LIMIT",
    "MONGO_DATABASE",
    "MONGO_COLLECTION",
    "MONGO_SHARD_KEY",
    "AMQPURL",
    "AMQP_SAS_KEY_NAME",
    "AMQP_SAS_KEY",
    "TEAMNAME",
    "PORT",
    "METRICS_ENABLED",
];

/// Configuration errors. Any of these stops the service.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is unset or empty
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A variable is set to an unusable value
    #[error("{var} is invalid: {reason}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// The password file could not be read
    #[error("can't read secret from {}: {source}", path.display())]
    Secret {
        /// File that was tried
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Broker settings; present only when `AMQPURL` is set.
#[derive(Clone)]
pub struct BrokerConfig {
    /// Broker URL, possibly carrying credentials
    pub url: String,
    /// Shared access key name and key
    pub sas: Option<(String, String)>,
}

impl BrokerConfig {
    /// Build the AMQP connector.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unusable URL.
    pub fn connector(&self) -> Result<AmqpConnector, ConfigError> {
        let builder = AmqpConnector::builder().url(self.url.clone());
        let builder = match &self.sas {
            Some((key_name, key)) => builder.sas_credentials(key_name.clone(), key.clone()),
            None => builder,
        };
        builder.build().map_err(|e| ConfigError::Invalid {
            var: "AMQPURL",
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("sas", &self.sas.as_ref().map(|(name, _)| name))
            .finish_non_exhaustive()
    }
}

/// Everything the service needs to start.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Order store
    pub mongo: MongoConfig,
    /// Broker, if orders are forwarded
    pub broker: Option<BrokerConfig>,
    /// Team / tenant tag
    pub team: String,
    /// HTTP port
    pub port: u16,
    /// Whether to install the Prometheus recorder and serve `/metrics`
    pub metrics_enabled: bool,
}

impl ServiceConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// See [`ServiceConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from any variable source. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Missing`] without `MONGOUSER` or a password
    /// - [`ConfigError::Secret`] when the password file can't be read
    /// - [`ConfigError::Invalid`] for a bad `AMQPURL`, `PORT` or
    ///   `METRICS_ENABLED`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
        log_environment(&var);

        let host = var("MONGOHOST").unwrap_or_else(|| {
            tracing::error!("MONGOHOST is not set");
            String::new()
        });
        let username = var("MONGOUSER").ok_or(ConfigError::Missing("MONGOUSER"))?;
        let password = match var("MONGOPASSWORD") {
            Some(password) => password,
            None => {
                let path = var("MONGOPASSWORD_FILE")
                    .unwrap_or_else(|| DEFAULT_PASSWORD_FILE.to_string());
                read_secret(Path::new(&path))?
            }
        };

        let mongo = MongoConfig {
            host,
            username,
            password,
            database: var("MONGO_DATABASE").unwrap_or_else(|| "akschallenge".to_string()),
            collection: var("MONGO_COLLECTION").unwrap_or_else(|| "orders".to_string()),
            shard_key: var("MONGO_SHARD_KEY").unwrap_or_else(|| "_id".to_string()),
            pool_limit: pool_limit(var("MONGOPOOL_LIMIT").as_deref()),
        };

        let broker = match var("AMQPURL") {
            Some(url) => {
                BrokerAddress::parse(&url).map_err(|e| ConfigError::Invalid {
                    var: "AMQPURL",
                    reason: e.to_string(),
                })?;
                let sas = match (var("AMQP_SAS_KEY_NAME"), var("AMQP_SAS_KEY")) {
                    (Some(name), Some(key)) => Some((name, key)),
                    (None, None) => None,
                    _ => {
                        tracing::warn!(
                            "Only one of AMQP_SAS_KEY_NAME and AMQP_SAS_KEY is set, ignoring both"
                        );
                        None
                    }
                };
                Some(BrokerConfig { url, sas })
            }
            None => None,
        };

        let team = var("TEAMNAME").unwrap_or_else(|| {
            tracing::error!("TEAMNAME is not set");
            String::new()
        });

        let port = match var("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                reason: format!("{raw:?} is not a port number"),
            })?,
            None => 8080,
        };

        let metrics_enabled = match var("METRICS_ENABLED").as_deref() {
            None => true,
            Some(raw) => parse_flag(raw).ok_or_else(|| ConfigError::Invalid {
                var: "METRICS_ENABLED",
                reason: format!("{raw:?} is not a boolean"),
            })?,
        };

        Ok(Self {
            mongo,
            broker,
            team,
            port,
            metrics_enabled,
        })
    }
}

fn log_environment(var: &dyn Fn(&str) -> Option<String>) {
    for name in KNOWN_VARS {
        tracing::info!(var = *name, set = var(name).is_some(), "Environment");
    }
}

fn read_secret(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim_end_matches(['\r', '\n']).to_string())
        .map_err(|source| ConfigError::Secret {
            path: path.to_path_buf(),
            source,
        })
}

/// Non-numeric or zero values keep the default.
fn pool_limit(raw: Option<&str>) -> u32 {
    let default = u32::try_from(DEFAULT_POOL_LIMIT).unwrap_or(u32::MAX);
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<u32>() {
        Ok(limit) if limit > 0 => limit,
        _ => {
            tracing::warn!(value = raw, default, "Ignoring MONGOPOOL_LIMIT");
            default
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("MONGOHOST", "orders-mongodb"),
        ("MONGOUSER", "orders"),
        ("MONGOPASSWORD", "s3cret"),
        ("TEAMNAME", "team-azure"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut pairs = BASE.to_vec();
        pairs.extend_from_slice(extra);
        pairs
    }

    #[test]
    fn defaults() {
        let config = ServiceConfig::from_lookup(env(BASE)).unwrap();

        assert_eq!(config.mongo.database, "akschallenge");
        assert_eq!(config.mongo.collection, "orders");
        assert_eq!(config.mongo.shard_key, "_id");
        assert_eq!(config.mongo.pool_limit, 25);
        assert_eq!(config.team, "team-azure");
        assert_eq!(config.port, 8080);
        assert!(config.metrics_enabled);
        assert!(config.broker.is_none());
    }

    #[test]
    fn missing_user_is_fatal() {
        let pairs = [("MONGOHOST", "h"), ("MONGOPASSWORD", "p")];
        assert!(matches!(
            ServiceConfig::from_lookup(env(&pairs)),
            Err(ConfigError::Missing("MONGOUSER"))
        ));
    }

    #[test]
    fn pool_limit_ignores_garbage_and_zero() {
        assert_eq!(pool_limit(Some("10")), 10);
        assert_eq!(pool_limit(Some("0")), 25);
        assert_eq!(pool_limit(Some("lots")), 25);
        assert_eq!(pool_limit(None), 25);
    }

    #[test]
    fn password_falls_back_to_the_mounted_file() {
        let path = std::env::temp_dir().join(format!("capture-order-secret-{}", std::process::id()));
        std::fs::write(&path, "from-file\n").unwrap();
        let file = path.to_string_lossy().into_owned();

        let pairs = [
            ("MONGOHOST", "h"),
            ("MONGOUSER", "u"),
            ("MONGOPASSWORD_FILE", file.as_str()),
        ];
        let config = ServiceConfig::from_lookup(env(&pairs)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.mongo.password, "from-file");
    }

    #[test]
    fn unreadable_password_file_is_a_secret_error() {
        let pairs = [
            ("MONGOHOST", "h"),
            ("MONGOUSER", "u"),
            ("MONGOPASSWORD_FILE", "/nonexistent/capture-order/password"),
        ];
        assert!(matches!(
            ServiceConfig::from_lookup(env(&pairs)),
            Err(ConfigError::Secret { .. })
        ));
    }

    #[test]
    fn invalid_amqp_url_is_fatal() {
        let pairs = with(&[("AMQPURL", "not a url")]);
        assert!(matches!(
            ServiceConfig::from_lookup(env(&pairs)),
            Err(ConfigError::Invalid { var: "AMQPURL", .. })
        ));
    }

    #[test]
    fn sas_needs_both_halves() {
        let pairs = with(&[
            ("AMQPURL", "amqps://team1.servicebus.windows.net/orders"),
            ("AMQP_SAS_KEY_NAME", "RootManageSharedAccessKey"),
        ]);
        let broker = ServiceConfig::from_lookup(env(&pairs)).unwrap().broker.unwrap();
        assert!(broker.sas.is_none());

        let pairs = with(&[
            ("AMQPURL", "amqps://team1.servicebus.windows.net/orders"),
            ("AMQP_SAS_KEY_NAME", "RootManageSharedAccessKey"),
            ("AMQP_SAS_KEY", "a2V5"),
        ]);
        let broker = ServiceConfig::from_lookup(env(&pairs)).unwrap().broker.unwrap();
        assert_eq!(broker.connector().unwrap().auth_mode(), "sas-cbs");
        assert!(!format!("{broker:?}").contains("a2V5"));
    }

    #[test]
    fn port_and_metrics_flag() {
        let pairs = with(&[("PORT", "9000"), ("METRICS_ENABLED", "false")]);
        let config = ServiceConfig::from_lookup(env(&pairs)).unwrap();
        assert_eq!(config.port, 9000);
        assert!(!config.metrics_enabled);

        let pairs = with(&[("PORT", "http")]);
        assert!(matches!(
            ServiceConfig::from_lookup(env(&pairs)),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
    }
}
