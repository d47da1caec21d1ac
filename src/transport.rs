use amqp_sampler_protocol::types::FieldTable;
use async_trait::async_trait;

use crate::{
    client::ConnectionOptions,
    error::{ChannelError, CloseReason, ConnectionError},
    topology::{ExchangeKind, QueueOptions},
};

/// Opens connections to a broker cluster.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: BrokerConnection;

    async fn connect(&self, options: ConnectionOptions) -> Result<Self::Connection, ConnectionError>;
}

/// A multiplexed session to the broker. Clones share the same session.
#[async_trait]
pub trait BrokerConnection: Clone + Send + Sync + 'static {
    type Channel: BrokerChannel;

    fn is_open(&self) -> bool;

    async fn create_channel(&self) -> Result<Self::Channel, ChannelError>;

    /// Closes the session and every channel on it.
    async fn close(&self) -> Result<(), ConnectionError>;
}

#[async_trait]
pub trait BrokerChannel: Send + Sync + 'static {
    fn id(&self) -> u16;

    fn is_open(&self) -> bool;

    /// Why the broker closed this channel, if it did.
    fn close_reason(&self) -> Option<CloseReason>;

    async fn queue_declare(
        &self,
        queue: &str,
        options: &QueueOptions,
        arguments: FieldTable,
    ) -> Result<(), ChannelError>;

    async fn queue_declare_passive(&self, queue: &str) -> Result<(), ChannelError>;

    async fn queue_delete(&self, queue: &str) -> Result<(), ChannelError>;

    async fn exchange_declare(
        &self,
        exchange: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> Result<(), ChannelError>;

    async fn exchange_delete(&self, exchange: &str) -> Result<(), ChannelError>;

    async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), ChannelError>;

    async fn close(&self) -> Result<(), ChannelError>;
}
