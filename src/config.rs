use std::{collections::HashMap, time::Duration};

use crate::{
    endpoint::{BrokerEndpoint, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_HEARTBEAT, DEFAULT_PORT},
    error::ConfigError,
    tls::{KeyStore, TlsIdentity},
    topology::{
        Declaration, ExchangeKind, ExchangeOptions, ExchangeSpec, QueueOptions, QueueSpec,
        Topology,
    },
};

pub const DEFAULT_ITERATIONS: u32 = 1;

/// Property keys of a saved test plan. They must not change.
pub mod keys {
    pub const HOST: &str = "AMQPSamplerSSL.Host";
    pub const PORT: &str = "AMQPSamplerSSL.Port";
    pub const VIRTUAL_HOST: &str = "AMQPSamplerSSL.VirtualHost";
    pub const USERNAME: &str = "AMQPSamplerSSL.Username";
    pub const PASSWORD: &str = "AMQPSamplerSSL.Password";
    pub const TIMEOUT: &str = "AMQPSamplerSSL.Timeout";
    pub const ITERATIONS: &str = "AMQPSamplerSSL.Iterations";

    pub const SSL: &str = "AMQPSamplerSSL.SSL";
    pub const SSL_KEYSTORE: &str = "AMQPSamplerSSL.SSLKeystore";
    pub const SSL_KEYSTORE_PASS: &str = "AMQPSamplerSSL.SSLKeystorePass";
    pub const SSL_TRUSTSTORE: &str = "AMQPSamplerSSL.SSLTruststore";
    pub const SSL_TRUSTSTORE_PASS: &str = "AMQPSamplerSSL.SSLTruststorePass";
    pub const SSL_USER_ID: &str = "AMQPSamplerSSL.SSLUserId";

    pub const EXCHANGE: &str = "AMQPSamplerSSL.Exchange";
    pub const EXCHANGE_TYPE: &str = "AMQPSamplerSSL.ExchangeType";
    pub const EXCHANGE_DURABLE: &str = "AMQPSamplerSSL.ExchangeDurable";
    pub const EXCHANGE_REDECLARE: &str = "AMQPSamplerSSL.ExchangeRedeclare";
    pub const EXCHANGE_DECLARE_PASSIVE: &str = "AMQPSamplerSSL.ExchangeDeclarePassive";

    pub const QUEUE: &str = "AMQPSamplerSSL.Queue";
    pub const QUEUE_DURABLE: &str = "AMQPSamplerSSL.QueueDurable";
    pub const QUEUE_EXCLUSIVE: &str = "AMQPSamplerSSL.QueueExclusive";
    pub const QUEUE_AUTO_DELETE: &str = "AMQPSamplerSSL.QueueAutoDelete";
    pub const QUEUE_REDECLARE: &str = "AMQPSamplerSSL.Redeclare";
    pub const QUEUE_DECLARE_PASSIVE: &str = "AMQPSamplerSSL.DeclarePassive";
    pub const ROUTING_KEY: &str = "AMQPSamplerSSL.RoutingKey";
    pub const MESSAGE_TTL: &str = "AMQPSamplerSSL.MessageTTL";
    pub const MESSAGE_EXPIRES: &str = "AMQPSamplerSSL.MessageExpires";
}

/// String typed key-value store the test plan lives in.
pub trait PropertyStore {
    fn get(&self, key: &str) -> Option<&str>;

    /// The raw value, empty when unset.
    fn string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_owned()
    }

    fn boolean_or(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(str::trim) {
            Some(value) if !value.is_empty() => value.eq_ignore_ascii_case("true"),
            _ => default,
        }
    }

    /// Blank or non-positive values fall back to `default`, non-numeric ones are an error.
    fn positive_int_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: TryFrom<i64>,
        Self: Sized,
    {
        Ok(self.optional_positive_int(key)?.unwrap_or(default))
    }

    fn optional_positive_int<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: TryFrom<i64>,
        Self: Sized,
    {
        let raw = match self.get(key).map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };
        let invalid = || ConfigError::InvalidNumber {
            key,
            value: raw.to_owned(),
        };

        let value: i64 = raw.parse().map_err(|_| invalid())?;
        if value <= 0 {
            return Ok(None);
        }
        T::try_from(value).map(Some).map_err(|_| invalid())
    }
}

impl PropertyStore for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

/// In-memory [`PropertyStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Properties(HashMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }
}

impl PropertyStore for Properties {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Properties(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Everything one sampling attempt needs, read from the store in a single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    pub endpoint: BrokerEndpoint,
    pub tls: Option<TlsIdentity>,
    pub topology: Topology,
    pub iterations: u32,
}

impl SamplerConfig {
    pub fn from_store<S: PropertyStore>(store: &S) -> Result<SamplerConfig, ConfigError> {
        Ok(SamplerConfig {
            endpoint: endpoint(store)?,
            tls: tls_identity(store)?,
            topology: topology(store)?,
            iterations: store.positive_int_or(keys::ITERATIONS, DEFAULT_ITERATIONS)?,
        })
    }
}

fn endpoint<S: PropertyStore>(store: &S) -> Result<BrokerEndpoint, ConfigError> {
    let timeout_ms = store.positive_int_or(
        keys::TIMEOUT,
        DEFAULT_CONNECTION_TIMEOUT.as_millis() as u64,
    )?;
    let virtual_host = match store.string(keys::VIRTUAL_HOST) {
        vhost if vhost.trim().is_empty() => "/".to_owned(),
        vhost => vhost,
    };

    Ok(BrokerEndpoint {
        hosts: store.string(keys::HOST),
        port: store.positive_int_or(keys::PORT, DEFAULT_PORT)?,
        virtual_host,
        username: store.string(keys::USERNAME),
        password: store.string(keys::PASSWORD),
        connection_timeout: Duration::from_millis(timeout_ms),
        heartbeat: DEFAULT_HEARTBEAT,
    })
}

fn tls_identity<S: PropertyStore>(store: &S) -> Result<Option<TlsIdentity>, ConfigError> {
    if !store.boolean_or(keys::SSL, false) {
        return Ok(None);
    }

    let path = |key: &'static str| match store.string(key) {
        value if value.trim().is_empty() => Err(ConfigError::MissingSetting { key }),
        value => Ok(value),
    };

    let keystore = KeyStore::new(
        path(keys::SSL_KEYSTORE)?.as_str(),
        store.string(keys::SSL_KEYSTORE_PASS),
    );
    let truststore = KeyStore::new(
        path(keys::SSL_TRUSTSTORE)?.as_str(),
        store.string(keys::SSL_TRUSTSTORE_PASS),
    );

    let mut identity = TlsIdentity::new(keystore, truststore);
    let user = store.string(keys::SSL_USER_ID);
    if !user.trim().is_empty() {
        identity = identity.sasl_external_user(user);
    }
    Ok(Some(identity))
}

fn topology<S: PropertyStore>(store: &S) -> Result<Topology, ConfigError> {
    let kind = match store.string(keys::EXCHANGE_TYPE) {
        kind if kind.trim().is_empty() => ExchangeKind::default(),
        kind => kind.parse()?,
    };

    let exchange = ExchangeSpec {
        name: store.string(keys::EXCHANGE),
        declaration: if store.boolean_or(keys::EXCHANGE_DECLARE_PASSIVE, false) {
            Declaration::Passive
        } else {
            Declaration::Active(ExchangeOptions {
                kind,
                durable: store.boolean_or(keys::EXCHANGE_DURABLE, true),
            })
        },
        redeclare: store.boolean_or(keys::EXCHANGE_REDECLARE, false),
    };

    let queue = QueueSpec {
        name: store.string(keys::QUEUE),
        declaration: if store.boolean_or(keys::QUEUE_DECLARE_PASSIVE, false) {
            Declaration::Passive
        } else {
            Declaration::Active(QueueOptions {
                durable: store.boolean_or(keys::QUEUE_DURABLE, true),
                exclusive: store.boolean_or(keys::QUEUE_EXCLUSIVE, false),
                auto_delete: store.boolean_or(keys::QUEUE_AUTO_DELETE, false),
                message_ttl: store.optional_positive_int(keys::MESSAGE_TTL)?,
                expires: store.optional_positive_int(keys::MESSAGE_EXPIRES)?,
            })
        },
        redeclare: store.boolean_or(keys::QUEUE_REDECLARE, false),
    };

    Ok(Topology::new(exchange, queue, store.string(keys::ROUTING_KEY)))
}
