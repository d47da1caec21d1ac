use tracing::info;

use crate::{
    client::{AmqpConnector, ConnectionOptions},
    endpoint::BrokerEndpoint,
    tls::{TlsContext, TlsIdentity},
    transport::{BrokerConnection, Connector},
    SamplerResult,
};

/// Owns at most one connection and hands it out for as long as it stays open.
pub struct ConnectionFactory<C: Connector = AmqpConnector> {
    connector: C,
    connection: Option<C::Connection>,
}

impl Default for ConnectionFactory<AmqpConnector> {
    fn default() -> Self {
        ConnectionFactory::new(AmqpConnector)
    }
}

impl<C: Connector> ConnectionFactory<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            connection: None,
        }
    }

    /// Returns the held connection if it is still open, otherwise connects.
    ///
    /// With a TLS identity the key material is loaded again on every new connection and
    /// the broker is authenticated with SASL EXTERNAL. Failures are returned as is, there is
    /// no retry here.
    pub async fn ensure_connection(
        &mut self,
        endpoint: &BrokerEndpoint,
        tls: Option<&TlsIdentity>,
    ) -> SamplerResult<C::Connection> {
        let connection = match self.connection.take() {
            Some(connection) if connection.is_open() => connection,
            _ => self.connect(endpoint, tls).await?,
        };
        Ok(self.connection.insert(connection).clone())
    }

    pub fn connection(&self) -> Option<&C::Connection> {
        self.connection.as_ref()
    }

    pub fn take_connection(&mut self) -> Option<C::Connection> {
        self.connection.take()
    }

    async fn connect(
        &self,
        endpoint: &BrokerEndpoint,
        tls: Option<&TlsIdentity>,
    ) -> SamplerResult<C::Connection> {
        let mut options = ConnectionOptions::from_endpoint(endpoint);
        if let Some(identity) = tls {
            let context = TlsContext::build(identity)?;
            options = options.tls(context, identity.sasl_external_user.clone());
        }

        info!(
            virtual_host = %endpoint.virtual_host,
            hosts = %endpoint.hosts,
            port = endpoint.port,
            username = %endpoint.username,
            timeout = ?endpoint.connection_timeout,
            heartbeat = ?endpoint.heartbeat,
            mechanism = options.get_authentication().mechanism(),
            "connecting"
        );
        info!(
            addresses = ?options
                .get_addresses()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            "broker addresses"
        );

        Ok(self.connector.connect(options).await?)
    }
}
