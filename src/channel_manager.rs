use tracing::{debug, error, info, warn};

use crate::{
    client::AmqpConnector,
    config::SamplerConfig,
    error::SamplerError,
    factory::ConnectionFactory,
    topology::TopologyDeclarator,
    transport::{BrokerChannel, BrokerConnection, Connector},
    SamplerResult,
};

type ChannelOf<C> = <<C as Connector>::Connection as BrokerConnection>::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NoChannel,
    ChannelOpen,
    /// Shut down by the owning worker, never reopened.
    Closed,
}

/// Owns the single channel of one worker and keeps it usable.
///
/// A new channel gets the topology declared on it once. Calls that find a live channel
/// return it untouched.
pub struct ChannelManager<C: Connector = AmqpConnector> {
    factory: ConnectionFactory<C>,
    channel: Option<ChannelOf<C>>,
    closed: bool,
}

impl Default for ChannelManager<AmqpConnector> {
    fn default() -> Self {
        ChannelManager::new(AmqpConnector)
    }
}

impl<C: Connector> ChannelManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            factory: ConnectionFactory::new(connector),
            channel: None,
            closed: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        match &self.channel {
            _ if self.closed => LifecycleState::Closed,
            Some(channel) if channel.is_open() => LifecycleState::ChannelOpen,
            _ => LifecycleState::NoChannel,
        }
    }

    pub fn channel(&self) -> Option<&ChannelOf<C>> {
        self.channel.as_ref()
    }

    pub fn connection(&self) -> Option<&C::Connection> {
        self.factory.connection()
    }

    pub async fn ensure_channel(&mut self, config: &SamplerConfig) -> SamplerResult<&ChannelOf<C>> {
        if self.closed {
            return Err(SamplerError::ShutDown);
        }

        let channel = match self.channel.take() {
            Some(channel) if channel.is_open() => channel,
            stale => {
                if let Some(stale) = stale {
                    warn!(
                        channel = stale.id(),
                        reason = %stale
                            .close_reason()
                            .map(|reason| reason.to_string())
                            .unwrap_or_else(|| "unknown".to_owned()),
                        "channel closed unexpectedly"
                    );
                }
                self.open_channel(config).await?
            }
        };

        Ok(&*self.channel.insert(channel))
    }

    async fn open_channel(&mut self, config: &SamplerConfig) -> SamplerResult<ChannelOf<C>> {
        info!(
            virtual_host = %config.endpoint.virtual_host,
            port = config.endpoint.port,
            "creating channel"
        );
        let connection = self
            .factory
            .ensure_connection(&config.endpoint, config.tls.as_ref())
            .await?;
        let channel = connection.create_channel().await?;

        if let Err(err) = TopologyDeclarator::new(&connection)
            .declare(&channel, &config.topology)
            .await
        {
            if channel.is_open() {
                if let Err(close_err) = channel.close().await {
                    debug!(channel = channel.id(), %close_err, "cannot close channel");
                }
            }
            return Err(err.into());
        }

        Ok(channel)
    }

    /// Closes the connection, and with it the channel. Errors are logged, never returned.
    pub async fn cleanup(&mut self) {
        self.closed = true;
        self.channel = None;

        if let Some(connection) = self.factory.take_connection() {
            if connection.is_open() {
                if let Err(err) = connection.close().await {
                    error!(%err, "failed to close connection");
                }
            }
        }
    }
}
