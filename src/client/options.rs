use std::{fmt, time::Duration};

use crate::{
    endpoint::{Address, BrokerEndpoint, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_HEARTBEAT, DEFAULT_PORT},
    tls::TlsContext,
};

pub const DEFAULT_FRAME_MAX: u32 = 131_072;
pub const DEFAULT_CHANNEL_MAX: u16 = 2047;

/// SASL mechanism used during the handshake.
#[derive(Clone, PartialEq, Eq)]
pub enum Authentication {
    Plain { username: String, password: String },
    /// Identity comes from the TLS client certificate. The optional value is sent as
    /// the authorization identity.
    External { identity: Option<String> },
}

impl Authentication {
    pub fn mechanism(&self) -> &'static str {
        match self {
            Authentication::Plain { .. } => "PLAIN",
            Authentication::External { .. } => "EXTERNAL",
        }
    }

    pub(crate) fn response(&self) -> Vec<u8> {
        match self {
            Authentication::Plain { username, password } => {
                format!("\u{0000}{}\u{0000}{}", username, password).into_bytes()
            }
            Authentication::External { identity } => {
                identity.clone().unwrap_or_default().into_bytes()
            }
        }
    }
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authentication::Plain { username, .. } => f
                .debug_struct("Plain")
                .field("username", username)
                .field("password", &"****")
                .finish(),
            Authentication::External { identity } => f
                .debug_struct("External")
                .field("identity", identity)
                .finish(),
        }
    }
}

/// Everything a single connect needs. Nothing here is shared between connections.
#[derive(Clone, Debug)]
pub struct ConnectionOptions {
    pub(crate) addresses: Vec<Address>,
    pub(crate) virtual_host: String,
    pub(crate) authentication: Authentication,
    pub(crate) connection_timeout: Duration,
    pub(crate) heartbeat: Duration,
    pub(crate) frame_max: u32,
    pub(crate) channel_max: u16,
    pub(crate) tls: Option<TlsContext>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            addresses: vec![Address::new("localhost", DEFAULT_PORT)],
            virtual_host: "/".to_owned(),
            authentication: Authentication::Plain {
                username: "guest".to_owned(),
                password: "guest".to_owned(),
            },
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            heartbeat: DEFAULT_HEARTBEAT,
            frame_max: DEFAULT_FRAME_MAX,
            channel_max: DEFAULT_CHANNEL_MAX,
            tls: None,
        }
    }
}

impl ConnectionOptions {
    /// Plain credentials from the endpoint. Call [`ConnectionOptions::tls`] to switch to TLS.
    pub fn from_endpoint(endpoint: &BrokerEndpoint) -> Self {
        ConnectionOptions {
            addresses: endpoint.addresses(),
            virtual_host: endpoint.virtual_host.clone(),
            authentication: Authentication::Plain {
                username: endpoint.username.clone(),
                password: endpoint.password.clone(),
            },
            connection_timeout: endpoint.connection_timeout,
            heartbeat: endpoint.heartbeat,
            ..Default::default()
        }
    }

    /// Mutual TLS with SASL EXTERNAL. Username and password are no longer sent.
    pub fn tls(mut self, context: TlsContext, external_identity: Option<String>) -> Self {
        self.tls = Some(context);
        self.authentication = Authentication::External {
            identity: external_identity,
        };
        self
    }

    pub fn addresses(mut self, addresses: Vec<Address>) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn authentication(mut self, authentication: Authentication) -> Self {
        self.authentication = authentication;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Zero disables heartbeats unless the broker asks for them.
    pub fn heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn virtual_host(mut self, virtual_host: impl Into<String>) -> Self {
        self.virtual_host = virtual_host.into();
        self
    }

    pub fn get_addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn get_virtual_host(&self) -> &str {
        &self.virtual_host
    }

    pub fn get_authentication(&self) -> &Authentication {
        &self.authentication
    }

    pub fn get_connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    pub fn get_heartbeat(&self) -> Duration {
        self.heartbeat
    }

    pub fn get_tls(&self) -> Option<&TlsContext> {
        self.tls.as_ref()
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Authentication, ConnectionOptions};
    use crate::endpoint::{Address, BrokerEndpoint};

    #[test]
    fn plain_response_is_nul_separated() {
        let auth = Authentication::Plain {
            username: "guest".to_owned(),
            password: "secret".to_owned(),
        };

        assert_eq!("PLAIN", auth.mechanism());
        assert_eq!(b"\0guest\0secret".to_vec(), auth.response());
        assert!(!format!("{:?}", auth).contains("secret"));
    }

    #[test]
    fn external_response_is_the_identity() {
        let anonymous = Authentication::External { identity: None };
        let named = Authentication::External {
            identity: Some("sampler".to_owned()),
        };

        assert_eq!("EXTERNAL", named.mechanism());
        assert!(anonymous.response().is_empty());
        assert_eq!(b"sampler".to_vec(), named.response());
    }

    #[test]
    fn from_endpoint() {
        let endpoint = BrokerEndpoint {
            port: 5673,
            virtual_host: "perf".to_owned(),
            connection_timeout: Duration::from_millis(250),
            ..BrokerEndpoint::new("a,b")
        };

        let options = ConnectionOptions::from_endpoint(&endpoint);

        assert_eq!(
            &[Address::new("a", 5673), Address::new("b", 5673)],
            options.get_addresses()
        );
        assert_eq!("perf", options.get_virtual_host());
        assert_eq!(Duration::from_millis(250), options.get_connection_timeout());
        assert_eq!("PLAIN", options.get_authentication().mechanism());
        assert!(!options.is_tls_enabled());
    }
}
