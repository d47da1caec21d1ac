mod channel;
mod codec;
mod dispatcher;
mod io;
mod options;
mod task;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use amqp_sampler_protocol::{
    method::connection,
    protocol::{replies::ACCESS_REFUSED, replies::REPLY_SUCCESS, PROTOCOL_HEADER},
    types::FieldTable,
    FromMethod, Frame, FramePayload, Method,
};
use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

pub use self::channel::Channel;
pub use self::options::{Authentication, ConnectionOptions, DEFAULT_CHANNEL_MAX, DEFAULT_FRAME_MAX};
use self::{
    codec::AmqpCodec,
    dispatcher::Dispatcher,
    io::{frame_io, FrameReceiver, FrameSender},
    task::TaskHandle,
};
use crate::{
    endpoint::Address,
    error::{ChannelError, CloseReason, ConnectionError},
    tls::TlsContext,
    transport::{BrokerConnection, Connector},
};

pub(crate) trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

type BoxedStream = Box<dyn AsyncStream>;
type Transport = Framed<BoxedStream, AmqpCodec>;
type SinkConnection = SplitSink<Transport, Frame>;
type StreamConnection = SplitStream<Transport>;
pub(crate) type FrameSink = FrameSender<SinkConnection>;

/// Parameters agreed with the broker during `connection.tune`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
}

struct Handshake {
    server_properties: FieldTable,
    tuning: Tuning,
}

struct ConnectionInner {
    address: Address,
    sender: FrameSink,
    dispatcher: Arc<Dispatcher>,
    tuning: Tuning,
    server_properties: FieldTable,
    close_timeout: Duration,
    tasks: Mutex<Vec<TaskHandle>>,
}

/// An AMQP 0-9-1 connection. Clones share the same socket.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.inner.address)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Connection {
    /// Tries every address in order, each bounded by the connection timeout. The first
    /// success wins.
    pub async fn connect(options: ConnectionOptions) -> Result<Connection, ConnectionError> {
        if options.addresses.is_empty() {
            return Err(ConnectionError::NoAddress);
        }

        let mut attempts = Vec::with_capacity(options.addresses.len());
        for address in &options.addresses {
            let attempt = tokio::time::timeout(
                options.connection_timeout,
                Connection::connect_to(address, &options),
            )
            .await
            .unwrap_or_else(|_| {
                Err(ConnectionError::Timeout {
                    address: address.clone(),
                })
            });

            match attempt {
                Ok(connection) => {
                    info!(%address, "connected");
                    return Ok(connection);
                }
                Err(err) => {
                    warn!(%address, %err, "cannot connect, trying next address");
                    attempts.push((address.clone(), err));
                }
            }
        }

        Err(ConnectionError::AllAddressesFailed(attempts))
    }

    pub fn address(&self) -> &Address {
        &self.inner.address
    }

    pub fn tuning(&self) -> Tuning {
        self.inner.tuning
    }

    pub fn server_properties(&self) -> &FieldTable {
        &self.inner.server_properties
    }

    /// Why the broker closed this connection, if it did.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.inner.dispatcher.close_reason()
    }

    async fn connect_to(
        address: &Address,
        options: &ConnectionOptions,
    ) -> Result<Connection, ConnectionError> {
        let stream = Connection::open_stream(address, options.tls.as_ref()).await?;
        let mut transport = Framed::new(stream, AmqpCodec::default());

        let handshake = Connection::handshake(&mut transport, options).await?;
        debug!(%address, tuning = ?handshake.tuning, "handshake completed");

        let (sink, stream) = transport.split();
        let (sender, receiver) = frame_io(sink, stream);
        let dispatcher = Arc::new(Dispatcher::new());

        let heartbeat = handshake.tuning.heartbeat;
        let mut tasks = vec![Connection::start_reader(
            receiver,
            sender.clone(),
            dispatcher.clone(),
            heartbeat,
        )];
        if heartbeat != 0 {
            tasks.push(Connection::start_heartbeat(sender.clone(), heartbeat));
        }

        Ok(Connection {
            inner: Arc::new(ConnectionInner {
                address: address.clone(),
                sender,
                dispatcher,
                tuning: handshake.tuning,
                server_properties: handshake.server_properties,
                close_timeout: options.connection_timeout,
                tasks: Mutex::new(tasks),
            }),
        })
    }

    async fn open_stream(
        address: &Address,
        tls: Option<&TlsContext>,
    ) -> Result<BoxedStream, ConnectionError> {
        let stream = TcpStream::connect((address.host.as_str(), address.port)).await?;
        stream.set_nodelay(true)?;

        let mut stream: BoxedStream = match tls {
            None => Box::new(stream),
            Some(context) => {
                let server_name = ServerName::try_from(address.host.as_str())
                    .map_err(|_| ConnectionError::InvalidServerName(address.host.clone()))?
                    .to_owned();
                Box::new(context.connector().connect(server_name, stream).await?)
            }
        };

        stream.write_all(PROTOCOL_HEADER).await?;
        stream.flush().await?;
        Ok(stream)
    }

    async fn handshake(
        transport: &mut Transport,
        options: &ConnectionOptions,
    ) -> Result<Handshake, ConnectionError> {
        let start: connection::Start = expect(transport, "connection.start").await?;

        let mechanism = options.authentication.mechanism();
        let offered = start.mechanisms();
        if !offered.iter().any(|m| m == mechanism) {
            return Err(ConnectionError::MechanismNotSupported {
                requested: mechanism.to_owned(),
                offered: offered.join(" "),
            });
        }

        transport
            .send(Frame::method(
                0,
                connection::StartOk {
                    client_properties: client_properties(),
                    mechanism: mechanism.to_owned(),
                    response: options.authentication.response(),
                    locale: "en_US".to_owned(),
                },
            ))
            .await?;

        let tune: connection::Tune = expect(transport, "connection.tune").await?;
        let requested_heartbeat = u16::try_from(options.heartbeat.as_secs()).unwrap_or(u16::MAX);
        let tuning = Tuning {
            channel_max: negotiate(options.channel_max, tune.channel_max),
            frame_max: negotiate(options.frame_max, tune.frame_max),
            heartbeat: negotiate(requested_heartbeat, tune.heartbeat),
        };
        transport.codec_mut().set_frame_max(tuning.frame_max);

        transport
            .send(Frame::method(
                0,
                connection::TuneOk {
                    channel_max: tuning.channel_max,
                    frame_max: tuning.frame_max,
                    heartbeat: tuning.heartbeat,
                },
            ))
            .await?;
        transport
            .send(Frame::method(
                0,
                connection::Open::new(options.virtual_host.clone()),
            ))
            .await?;

        let _: connection::OpenOk = expect(transport, "connection.open-ok").await?;

        Ok(Handshake {
            server_properties: start.server_properties,
            tuning,
        })
    }

    fn start_reader(
        mut receiver: FrameReceiver<StreamConnection>,
        sender: FrameSink,
        dispatcher: Arc<Dispatcher>,
        heartbeat: u16,
    ) -> TaskHandle {
        // two silent heartbeat intervals mean the peer is gone
        let silence = (heartbeat != 0).then(|| Duration::from_secs(u64::from(heartbeat) * 2));

        tokio::spawn(async move {
            loop {
                let next = match silence {
                    Some(silence) => match tokio::time::timeout(silence, receiver.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            warn!(?silence, "missed heartbeats from the broker");
                            break;
                        }
                    },
                    None => receiver.next().await,
                };

                match next {
                    Some(Ok(frame)) => dispatcher.dispatch(frame, &sender).await,
                    Some(Err(err)) => {
                        warn!(%err, "cannot read from the broker");
                        break;
                    }
                    None => break,
                }
            }

            if dispatcher.is_open() && !receiver.is_closed() {
                warn!("connection lost");
            }
            dispatcher.shutdown(None);
        })
        .into()
    }

    fn start_heartbeat(sender: FrameSink, heartbeat: u16) -> TaskHandle {
        let heartbeat_interval = (heartbeat / 2).max(1);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(heartbeat_interval.into())).await;
                trace!("sending heartbeat");
                if sender.send(Frame::heartbeat()).await.is_err() {
                    break;
                }
            }
        })
        .into()
    }

    fn stop_tasks(&self) {
        if let Ok(mut tasks) = self.inner.tasks.lock() {
            tasks.clear();
        }
    }
}

#[async_trait]
impl BrokerConnection for Connection {
    type Channel = Channel;

    fn is_open(&self) -> bool {
        self.inner.dispatcher.is_open() && !self.inner.sender.is_closed()
    }

    async fn create_channel(&self) -> Result<Channel, ChannelError> {
        let channel_max = match self.inner.tuning.channel_max {
            0 => u16::MAX,
            max => max,
        };
        let (state, replies) = self.inner.dispatcher.register(channel_max)?;
        let id = state.id();

        let channel = Channel::new(
            state,
            replies,
            self.inner.sender.clone(),
            self.inner.dispatcher.clone(),
        );
        if let Err(err) = channel.open().await {
            self.inner.dispatcher.release(id, None);
            return Err(err);
        }

        info!(channel = id, address = %self.inner.address, "channel opened");
        Ok(channel)
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::AlreadyClosed);
        }

        self.inner
            .sender
            .send(Frame::method(
                0,
                connection::Close::new(REPLY_SUCCESS, "Goodbye"),
            ))
            .await?;
        if tokio::time::timeout(
            self.inner.close_timeout,
            self.inner.dispatcher.wait_close_ok(),
        )
        .await
        .is_err()
        {
            debug!(address = %self.inner.address, "no close-ok from the broker");
        }

        self.inner.dispatcher.shutdown(None);
        let result = self.inner.sender.close().await;
        self.stop_tasks();
        info!(address = %self.inner.address, "connection closed");

        result
    }
}

/// Production [`Connector`]: real sockets, optional TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmqpConnector;

#[async_trait]
impl Connector for AmqpConnector {
    type Connection = Connection;

    async fn connect(&self, options: ConnectionOptions) -> Result<Connection, ConnectionError> {
        Connection::connect(options).await
    }
}

/// Reads the next method on channel 0. A `connection.close` in its place ends the handshake.
async fn expect<T: FromMethod>(
    transport: &mut Transport,
    expected: &'static str,
) -> Result<T, ConnectionError> {
    let method = loop {
        match transport.next().await {
            Some(Ok(frame)) => match frame.into_payload() {
                FramePayload::Method(method) => break method,
                _ => trace!(expected, "ignoring frame during handshake"),
            },
            Some(Err(err)) => return Err(err),
            None => return Err(ConnectionError::Lost),
        }
    };

    match method {
        Method::ConnectionClose(close) => {
            let _ = transport.send(Frame::method(0, connection::CloseOk)).await;
            let reason = CloseReason::from(close);
            if reason.reply_code == ACCESS_REFUSED {
                Err(ConnectionError::AuthenticationFailed(reason))
            } else {
                Err(ConnectionError::Closed(reason))
            }
        }
        method => {
            let received = method.name();
            T::from_method(method).ok_or_else(|| {
                ConnectionError::UnexpectedFrame(format!(
                    "expected {}, received {}",
                    expected, received
                ))
            })
        }
    }
}

/// Zero means "no limit", so the other side wins. Otherwise the lower value wins.
fn negotiate<T: Ord + Default + Copy>(client: T, server: T) -> T {
    let zero = T::default();
    if client == zero || server == zero {
        client.max(server)
    } else {
        client.min(server)
    }
}

fn client_properties() -> FieldTable {
    FieldTable::new()
        .with("product", env!("CARGO_PKG_NAME"))
        .with("version", env!("CARGO_PKG_VERSION"))
        .with("platform", "Rust")
        .with(
            "capabilities",
            FieldTable::new()
                .with("authentication_failure_close", true)
                .with("connection.blocked", true),
        )
}
