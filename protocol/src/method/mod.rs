use std::io::Write;

use crate::{
    codec::{Decoder, Encoder},
    error::{DecodeError, EncodeError},
    protocol::{
        classes::*,
        methods::{channel as ch, connection as conn, exchange as ex, queue as qu},
    },
};

pub mod channel;
pub mod connection;
pub mod exchange;
pub mod queue;

pub trait Command {
    fn class_id(&self) -> u16;
    fn method_id(&self) -> u16;
}

/// Extracts a typed method out of a decoded [`Method`]
pub trait FromMethod
where
    Self: Sized,
{
    fn from_method(method: Method) -> Option<Self>;
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, derive_more::Display)]
#[display("{class_id}.{method_id}")]
pub struct MethodId {
    pub class_id: u16,
    pub method_id: u16,
}

impl MethodId {
    pub fn new(class_id: u16, method_id: u16) -> Self {
        Self {
            class_id,
            method_id,
        }
    }
}

macro_rules! methods {
    ($($variant:ident($ty:ty) => ($class:expr, $method:expr, $name:literal)),* $(,)?) => {
        #[derive(Debug, PartialEq, Clone)]
        pub enum Method {
            $($variant($ty),)*
            Unknown(MethodId),
        }

        impl Method {
            pub fn id(&self) -> MethodId {
                match self {
                    $(Method::$variant(_) => MethodId::new($class, $method),)*
                    Method::Unknown(id) => *id,
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(Method::$variant(_) => $name,)*
                    Method::Unknown(_) => "unknown",
                }
            }
        }

        $(
            impl Command for $ty {
                fn class_id(&self) -> u16 {
                    $class
                }

                fn method_id(&self) -> u16 {
                    $method
                }
            }

            impl From<$ty> for Method {
                fn from(method: $ty) -> Method {
                    Method::$variant(method)
                }
            }

            impl FromMethod for $ty {
                fn from_method(method: Method) -> Option<Self> {
                    match method {
                        Method::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*

        impl Encoder for Method {
            fn encoded_size(&self) -> u32 {
                4 + match self {
                    $(Method::$variant(method) => method.encoded_size(),)*
                    Method::Unknown(_) => 0,
                }
            }

            fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
                let id = self.id();
                id.class_id.encode(writer)?;
                id.method_id.encode(writer)?;
                match self {
                    $(Method::$variant(method) => method.encode(writer),)*
                    Method::Unknown(_) => Ok(()),
                }
            }
        }

        impl Decoder for Method {
            fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
                let (input, class_id) = u16::decode(input)?;
                let (input, method_id) = u16::decode(input)?;

                $(
                    if (class_id, method_id) == ($class, $method) {
                        return <$ty>::decode(input).map(|(i, method)| (i, Method::$variant(method)));
                    }
                )*

                Ok((&input[input.len()..], Method::Unknown(MethodId::new(class_id, method_id))))
            }
        }
    };
}

methods! {
    ConnectionStart(connection::Start) => (CLASS_CONNECTION, conn::START, "connection.start"),
    ConnectionStartOk(connection::StartOk) => (CLASS_CONNECTION, conn::START_OK, "connection.start-ok"),
    ConnectionTune(connection::Tune) => (CLASS_CONNECTION, conn::TUNE, "connection.tune"),
    ConnectionTuneOk(connection::TuneOk) => (CLASS_CONNECTION, conn::TUNE_OK, "connection.tune-ok"),
    ConnectionOpen(connection::Open) => (CLASS_CONNECTION, conn::OPEN, "connection.open"),
    ConnectionOpenOk(connection::OpenOk) => (CLASS_CONNECTION, conn::OPEN_OK, "connection.open-ok"),
    ConnectionClose(connection::Close) => (CLASS_CONNECTION, conn::CLOSE, "connection.close"),
    ConnectionCloseOk(connection::CloseOk) => (CLASS_CONNECTION, conn::CLOSE_OK, "connection.close-ok"),
    ConnectionBlocked(connection::Blocked) => (CLASS_CONNECTION, conn::BLOCKED, "connection.blocked"),
    ConnectionUnblocked(connection::Unblocked) => (CLASS_CONNECTION, conn::UNBLOCKED, "connection.unblocked"),
    ChannelOpen(channel::Open) => (CLASS_CHANNEL, ch::OPEN, "channel.open"),
    ChannelOpenOk(channel::OpenOk) => (CLASS_CHANNEL, ch::OPEN_OK, "channel.open-ok"),
    ChannelClose(channel::Close) => (CLASS_CHANNEL, ch::CLOSE, "channel.close"),
    ChannelCloseOk(channel::CloseOk) => (CLASS_CHANNEL, ch::CLOSE_OK, "channel.close-ok"),
    ExchangeDeclare(exchange::Declare) => (CLASS_EXCHANGE, ex::DECLARE, "exchange.declare"),
    ExchangeDeclareOk(exchange::DeclareOk) => (CLASS_EXCHANGE, ex::DECLARE_OK, "exchange.declare-ok"),
    ExchangeDelete(exchange::Delete) => (CLASS_EXCHANGE, ex::DELETE, "exchange.delete"),
    ExchangeDeleteOk(exchange::DeleteOk) => (CLASS_EXCHANGE, ex::DELETE_OK, "exchange.delete-ok"),
    QueueDeclare(queue::Declare) => (CLASS_QUEUE, qu::DECLARE, "queue.declare"),
    QueueDeclareOk(queue::DeclareOk) => (CLASS_QUEUE, qu::DECLARE_OK, "queue.declare-ok"),
    QueueBind(queue::Bind) => (CLASS_QUEUE, qu::BIND, "queue.bind"),
    QueueBindOk(queue::BindOk) => (CLASS_QUEUE, qu::BIND_OK, "queue.bind-ok"),
    QueueDelete(queue::Delete) => (CLASS_QUEUE, qu::DELETE, "queue.delete"),
    QueueDeleteOk(queue::DeleteOk) => (CLASS_QUEUE, qu::DELETE_OK, "queue.delete-ok"),
}

/// Arguments-free methods: nothing to encode, nothing to decode.
macro_rules! empty_method {
    ($ty:ident) => {
        #[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
        pub struct $ty;

        impl $crate::codec::Encoder for $ty {
            fn encoded_size(&self) -> u32 {
                0
            }

            fn encode(
                &self,
                _writer: &mut impl std::io::Write,
            ) -> Result<(), $crate::error::EncodeError> {
                Ok(())
            }
        }

        impl $crate::codec::Decoder for $ty {
            fn decode(input: &[u8]) -> Result<(&[u8], Self), $crate::error::DecodeError> {
                Ok((input, $ty))
            }
        }
    };
}

pub(crate) use empty_method;
