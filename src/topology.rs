use std::{fmt, str::FromStr};

use amqp_sampler_protocol::types::FieldTable;
use tracing::{debug, info};

use crate::{
    error::{ConfigError, Entity, TopologyError},
    transport::{BrokerChannel, BrokerConnection},
};

pub const MESSAGE_TTL_ARGUMENT: &str = "x-message-ttl";
pub const EXPIRES_ARGUMENT: &str = "x-expires";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangeKind {
    #[default]
    Direct,
    Topic,
    Headers,
    Fanout,
}

impl AsRef<str> for ExchangeKind {
    fn as_ref(&self) -> &str {
        match self {
            ExchangeKind::Direct => "direct",
            ExchangeKind::Topic => "topic",
            ExchangeKind::Headers => "headers",
            ExchangeKind::Fanout => "fanout",
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl FromStr for ExchangeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(ExchangeKind::Direct),
            "topic" => Ok(ExchangeKind::Topic),
            "headers" => Ok(ExchangeKind::Headers),
            "fanout" => Ok(ExchangeKind::Fanout),
            _ => Err(ConfigError::UnknownExchangeType(s.to_owned())),
        }
    }
}

/// Either assert that an entity exists, or create it with the given options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration<T> {
    Passive,
    Active(T),
}

impl<T> Declaration<T> {
    pub fn is_passive(&self) -> bool {
        matches!(self, Declaration::Passive)
    }

    pub fn active(&self) -> Option<&T> {
        match self {
            Declaration::Passive => None,
            Declaration::Active(options) => Some(options),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExchangeOptions {
    pub kind: ExchangeKind,
    pub durable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub declaration: Declaration<ExchangeOptions>,
    pub redeclare: bool,
}

impl ExchangeSpec {
    pub fn new(name: impl Into<String>, kind: ExchangeKind, durable: bool) -> Self {
        Self {
            name: name.into(),
            declaration: Declaration::Active(ExchangeOptions { kind, durable }),
            redeclare: false,
        }
    }

    pub fn passive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaration: Declaration::Passive,
            redeclare: false,
        }
    }

    pub fn none() -> Self {
        Self::passive("")
    }

    pub fn redeclare(mut self, redeclare: bool) -> Self {
        self.redeclare = redeclare;
        self
    }

    /// A blank name means no named exchange.
    pub fn is_configured(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// Options of an actively declared queue. TTL and expiry are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueOptions {
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub message_ttl: Option<i32>,
    pub expires: Option<i32>,
}

impl QueueOptions {
    pub fn arguments(&self) -> FieldTable {
        queue_arguments(self.message_ttl, self.expires)
    }
}

/// `x-message-ttl` and `x-expires`, each present only when positive.
pub fn queue_arguments(message_ttl: Option<i32>, expires: Option<i32>) -> FieldTable {
    let mut arguments = FieldTable::new();
    if let Some(ttl) = message_ttl.filter(|ttl| *ttl > 0) {
        arguments.insert(MESSAGE_TTL_ARGUMENT, ttl);
    }
    if let Some(expires) = expires.filter(|expires| *expires > 0) {
        arguments.insert(EXPIRES_ARGUMENT, expires);
    }
    arguments
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub declaration: Declaration<QueueOptions>,
    pub redeclare: bool,
}

impl QueueSpec {
    pub fn new(name: impl Into<String>, options: QueueOptions) -> Self {
        Self {
            name: name.into(),
            declaration: Declaration::Active(options),
            redeclare: false,
        }
    }

    pub fn passive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaration: Declaration::Passive,
            redeclare: false,
        }
    }

    pub fn none() -> Self {
        Self::passive("")
    }

    pub fn redeclare(mut self, redeclare: bool) -> Self {
        self.redeclare = redeclare;
        self
    }

    /// A blank name means no queue.
    pub fn is_configured(&self) -> bool {
        !self.name.trim().is_empty()
    }

    pub fn arguments(&self) -> FieldTable {
        self.declaration
            .active()
            .map(QueueOptions::arguments)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
}

/// The exchange, queue and routing key a test exercises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: ExchangeSpec,
    pub queue: QueueSpec,
    pub routing_key: String,
}

impl Default for Topology {
    fn default() -> Self {
        Topology {
            exchange: ExchangeSpec::none(),
            queue: QueueSpec::none(),
            routing_key: String::new(),
        }
    }
}

impl Topology {
    pub fn new(exchange: ExchangeSpec, queue: QueueSpec, routing_key: impl Into<String>) -> Self {
        Self {
            exchange,
            queue,
            routing_key: routing_key.into(),
        }
    }

    /// Present only when both a queue and an exchange are named.
    pub fn binding(&self) -> Option<BindingSpec> {
        if self.exchange.is_configured() && self.queue.is_configured() {
            Some(BindingSpec {
                queue: self.queue.name.clone(),
                exchange: self.exchange.name.clone(),
                routing_key: self.routing_key.clone(),
            })
        } else {
            None
        }
    }
}

/// Brings the broker's exchange, queue and binding to the declared state.
///
/// Deletions run on a scratch channel of the same connection, so that a failed delete
/// (which makes the broker close the channel it ran on) cannot take the working channel down.
pub struct TopologyDeclarator<'a, C> {
    connection: &'a C,
}

impl<'a, C: BrokerConnection> TopologyDeclarator<'a, C> {
    pub fn new(connection: &'a C) -> Self {
        Self { connection }
    }

    pub async fn declare(
        &self,
        channel: &C::Channel,
        topology: &Topology,
    ) -> Result<(), TopologyError> {
        let queue = &topology.queue;
        if queue.is_configured() {
            if queue.redeclare {
                self.delete(Entity::Queue, &queue.name).await;
            }
            self.declare_queue(channel, queue).await?;
        }

        let exchange = &topology.exchange;
        if exchange.is_configured() {
            if exchange.redeclare {
                self.delete(Entity::Exchange, &exchange.name).await;
            }
            if let Declaration::Active(options) = &exchange.declaration {
                channel
                    .exchange_declare(&exchange.name, options.kind, options.durable)
                    .await
                    .map_err(|source| TopologyError::Declare {
                        entity: Entity::Exchange,
                        name: exchange.name.clone(),
                        passive: false,
                        source,
                    })?;
            }
        }

        if let Some(binding) = topology.binding() {
            channel
                .queue_bind(&binding.queue, &binding.exchange, &binding.routing_key)
                .await
                .map_err(|source| TopologyError::Bind {
                    queue: binding.queue.clone(),
                    exchange: binding.exchange.clone(),
                    routing_key: binding.routing_key.clone(),
                    source,
                })?;

            info!(
                queue = %binding.queue,
                exchange = %binding.exchange,
                exchange_durable = ?exchange.declaration.active().map(|options| options.durable),
                routing_key = %binding.routing_key,
                arguments = %queue.arguments(),
                "bound to"
            );
        }

        Ok(())
    }

    async fn declare_queue(
        &self,
        channel: &C::Channel,
        queue: &QueueSpec,
    ) -> Result<(), TopologyError> {
        let result = match &queue.declaration {
            Declaration::Passive => channel.queue_declare_passive(&queue.name).await,
            Declaration::Active(options) => {
                channel
                    .queue_declare(&queue.name, options, options.arguments())
                    .await
            }
        };

        result.map_err(|source| TopologyError::Declare {
            entity: Entity::Queue,
            name: queue.name.clone(),
            passive: queue.declaration.is_passive(),
            source,
        })
    }

    async fn delete(&self, entity: Entity, name: &str) {
        let scratch = match self.connection.create_channel().await {
            Ok(channel) => channel,
            Err(err) => {
                debug!(%entity, name, %err, "cannot open a channel to delete, skipping");
                return;
            }
        };

        let result = match entity {
            Entity::Queue => scratch.queue_delete(name).await,
            Entity::Exchange => scratch.exchange_delete(name).await,
        };

        match result {
            Ok(()) => debug!(%entity, name, "deleted before redeclare"),
            Err(err) => debug!(%entity, name, %err, "delete failed, ignoring"),
        }

        if scratch.is_open() {
            if let Err(err) = scratch.close().await {
                debug!(channel = scratch.id(), %err, "failed to close scratch channel");
            }
        }
    }
}
