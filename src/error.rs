use std::{fmt, path::PathBuf};

use amqp_sampler_protocol::{
    error::{DecodeError, EncodeError},
    method::{channel, connection},
};
use thiserror::Error;

use crate::endpoint::Address;

/// Reply code and text sent by the broker when it closes a channel or a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub reply_code: u16,
    pub reply_text: String,
    pub class_id: u16,
    pub method_id: u16,
}

impl CloseReason {
    pub fn new(reply_code: u16, reply_text: impl Into<String>) -> Self {
        Self {
            reply_code,
            reply_text: reply_text.into(),
            class_id: 0,
            method_id: 0,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.reply_code, self.reply_text)?;
        if self.class_id != 0 {
            write!(f, " (method {}.{})", self.class_id, self.method_id)?;
        }
        Ok(())
    }
}

impl From<connection::Close> for CloseReason {
    fn from(close: connection::Close) -> Self {
        Self {
            reply_code: close.reply_code,
            reply_text: close.reply_text,
            class_id: close.class_id,
            method_id: close.method_id,
        }
    }
}

impl From<channel::Close> for CloseReason {
    fn from(close: channel::Close) -> Self {
        Self {
            reply_code: close.reply_code,
            reply_text: close.reply_text,
            class_id: close.class_id,
            method_id: close.method_id,
        }
    }
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Encode Error {0:?}")]
    Encode(EncodeError),
    #[error("Decode Error {0:?}")]
    Decode(DecodeError),
}

/// Key material that could not be read, parsed or unlocked.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Cannot read {store} from {path}: {source}")]
    Read {
        store: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot parse {store}: {reason}")]
    Parse { store: &'static str, reason: String },
    #[error("Cannot unlock {store}: {source}")]
    Unlock {
        store: &'static str,
        #[source]
        source: openssl::error::ErrorStack,
    },
    #[error("{store} does not contain {missing}")]
    Missing {
        store: &'static str,
        missing: &'static str,
    },
    #[error("{store} is a Java keystore (JKS), which is not supported; convert it to PKCS#12 or PEM")]
    Jks { store: &'static str },
    #[error("Trust store contains no certificates")]
    EmptyTrustStore,
    #[error("Invalid TLS configuration: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Protocol Error: {0}")]
    Protocol(ProtocolError),
    #[error("No broker address configured")]
    NoAddress,
    #[error("Connection to {address} timed out")]
    Timeout { address: Address },
    #[error("Invalid server name {0}")]
    InvalidServerName(String),
    #[error("SASL mechanism {requested} not offered by the broker (offered: {offered})")]
    MechanismNotSupported { requested: String, offered: String },
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(CloseReason),
    #[error("Unexpected frame during handshake: {0}")]
    UnexpectedFrame(String),
    #[error("Connection closed by the broker: {0}")]
    Closed(CloseReason),
    #[error("Connection lost")]
    Lost,
    #[error("Connection already closed")]
    AlreadyClosed,
    #[error("All broker addresses failed: {}", format_attempts(.0))]
    AllAddressesFailed(Vec<(Address, ConnectionError)>),
}

fn format_attempts(attempts: &[(Address, ConnectionError)]) -> String {
    attempts
        .iter()
        .map(|(address, err)| format!("{} ({})", address, err))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<EncodeError> for ConnectionError {
    fn from(err: EncodeError) -> Self {
        ConnectionError::Protocol(ProtocolError::Encode(err))
    }
}

impl From<DecodeError> for ConnectionError {
    fn from(err: DecodeError) -> Self {
        ConnectionError::Protocol(ProtocolError::Decode(err))
    }
}

/// Failure of a single operation on an open channel.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel closed by the broker: {0}")]
    Closed(CloseReason),
    #[error("Channel is closed")]
    AlreadyClosed,
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),
    #[error("Expected {expected}, received {received}")]
    UnexpectedReply {
        expected: &'static str,
        received: &'static str,
    },
    #[error("Cannot send to the broker: {0}")]
    Send(String),
}

impl ChannelError {
    /// Reply code the broker used to close the channel, if it did.
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            ChannelError::Closed(reason) => Some(reason.reply_code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Queue,
    Exchange,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Queue => write!(f, "queue"),
            Entity::Exchange => write!(f, "exchange"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Cannot declare {entity} {name}: {source}")]
    Declare {
        entity: Entity,
        name: String,
        passive: bool,
        #[source]
        source: ChannelError,
    },
    #[error("Cannot bind queue {queue} to exchange {exchange} with routing key {routing_key:?}: {source}")]
    Bind {
        queue: String,
        exchange: String,
        routing_key: String,
        #[source]
        source: ChannelError,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Property {key} is not a number: {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("Unknown exchange type {0:?}")]
    UnknownExchangeType(String),
    #[error("Property {key} is required")]
    MissingSetting { key: &'static str },
}

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("Sampler already shut down")]
    ShutDown,
}
