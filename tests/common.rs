#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use amqp_sampler::{
    client::ConnectionOptions,
    error::{ChannelError, CloseReason, ConnectionError},
    transport::{BrokerChannel, BrokerConnection, Connector},
    types::{Address, ExchangeKind, FieldTable, QueueOptions},
};
use async_trait::async_trait;
use fake::{Fake, Faker};

pub const NOT_FOUND: u16 = 404;
pub const PRECONDITION_FAILED: u16 = 406;

/// Every broker interaction the client makes, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(Vec<Address>),
    CreateChannel(u16),
    QueueDeclare {
        channel: u16,
        queue: String,
        options: QueueOptions,
        arguments: FieldTable,
    },
    QueueDeclarePassive {
        channel: u16,
        queue: String,
    },
    QueueDelete {
        channel: u16,
        queue: String,
    },
    ExchangeDeclare {
        channel: u16,
        exchange: String,
        kind: ExchangeKind,
        durable: bool,
    },
    ExchangeDelete {
        channel: u16,
        exchange: String,
    },
    QueueBind {
        channel: u16,
        queue: String,
        exchange: String,
        routing_key: String,
    },
    CloseChannel(u16),
    CloseConnection,
}

impl Call {
    /// Declares, deletes and binds.
    pub fn is_topology(&self) -> bool {
        !matches!(
            self,
            Call::Connect(_) | Call::CreateChannel(_) | Call::CloseChannel(_) | Call::CloseConnection
        )
    }
}

#[derive(Default)]
struct BrokerState {
    calls: Vec<Call>,
    queues: HashMap<String, QueueOptions>,
    exchanges: HashMap<String, ExchangeKind>,
    channels: HashMap<u16, Arc<ChannelFlags>>,
    next_channel: u16,
    connection: Option<Arc<AtomicBool>>,
    refuse_connections: bool,
    fail_deletes: bool,
}

#[derive(Default)]
struct ChannelFlags {
    closed: AtomicBool,
    reason: Mutex<Option<CloseReason>>,
}

impl ChannelFlags {
    fn close(&self, reason: Option<CloseReason>) {
        if let (Some(reason), Ok(mut guard)) = (reason, self.reason.lock()) {
            guard.get_or_insert(reason);
        }
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// In-memory broker: keeps exchanges, queues and channels the way a real one would and
/// records every call made against it.
#[derive(Clone, Default)]
pub struct MockBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn topology_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_topology).collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn connect_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Connect(_)))
            .count()
    }

    pub fn channel_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::CreateChannel(_)))
            .count()
    }

    pub fn with_queue(self, name: &str) -> Self {
        self.state()
            .queues
            .insert(name.to_owned(), QueueOptions::default());
        self
    }

    pub fn with_exchange(self, name: &str, kind: ExchangeKind) -> Self {
        self.state().exchanges.insert(name.to_owned(), kind);
        self
    }

    pub fn has_queue(&self, name: &str) -> bool {
        self.state().queues.contains_key(name)
    }

    pub fn has_exchange(&self, name: &str) -> bool {
        self.state().exchanges.contains_key(name)
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state().refuse_connections = refuse;
    }

    /// Makes every delete fail the way a broker refusing it would: the channel is closed.
    pub fn fail_deletes(&self, fail: bool) {
        self.state().fail_deletes = fail;
    }

    /// Broker-initiated `channel.close`.
    pub fn close_channel(&self, id: u16, code: u16, text: &str) {
        if let Some(flags) = self.state().channels.remove(&id) {
            flags.close(Some(CloseReason::new(code, text)));
        }
    }

    /// The network drops: the connection and every channel on it are gone.
    pub fn drop_connection(&self) {
        let mut state = self.state();
        if let Some(open) = state.connection.take() {
            open.store(false, Ordering::SeqCst);
        }
        for (_, flags) in state.channels.drain() {
            flags.close(None);
        }
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector {
            broker: self.clone(),
        }
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn random_name() -> String {
    format!("q-{}", Faker.fake::<u32>())
}

#[derive(Clone)]
pub struct MockConnector {
    broker: MockBroker,
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, options: ConnectionOptions) -> Result<MockConnection, ConnectionError> {
        let addresses = options.get_addresses().to_vec();
        self.broker.record(Call::Connect(addresses.clone()));

        let mut state = self.broker.state();
        if state.refuse_connections {
            return Err(ConnectionError::AllAddressesFailed(
                addresses
                    .into_iter()
                    .map(|address| {
                        let err = ConnectionError::Timeout {
                            address: address.clone(),
                        };
                        (address, err)
                    })
                    .collect(),
            ));
        }

        let open = Arc::new(AtomicBool::new(true));
        state.connection = Some(open.clone());
        Ok(MockConnection {
            broker: self.broker.clone(),
            open,
        })
    }
}

#[derive(Clone)]
pub struct MockConnection {
    broker: MockBroker,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl BrokerConnection for MockConnection {
    type Channel = MockChannel;

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn create_channel(&self) -> Result<MockChannel, ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::ConnectionClosed("connection closed".to_owned()));
        }
        let mut state = self.broker.state();
        state.next_channel += 1;
        let id = state.next_channel;
        let flags = Arc::new(ChannelFlags::default());
        state.channels.insert(id, flags.clone());
        state.calls.push(Call::CreateChannel(id));

        Ok(MockChannel {
            id,
            broker: self.broker.clone(),
            flags,
            connection: self.open.clone(),
        })
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::AlreadyClosed);
        }
        self.broker.record(Call::CloseConnection);
        self.broker.drop_connection();
        Ok(())
    }
}

pub struct MockChannel {
    id: u16,
    broker: MockBroker,
    flags: Arc<ChannelFlags>,
    connection: Arc<AtomicBool>,
}

impl std::fmt::Debug for MockChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChannel").field("id", &self.id).finish_non_exhaustive()
    }
}

impl MockChannel {
    fn check_open(&self) -> Result<(), ChannelError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(self
                .close_reason()
                .map(ChannelError::Closed)
                .unwrap_or(ChannelError::AlreadyClosed))
        }
    }

    /// Broker-side failure: the channel is closed and the operation fails.
    fn fail(&self, code: u16, text: String) -> ChannelError {
        let reason = CloseReason::new(code, text);
        self.broker.state().channels.remove(&self.id);
        self.flags.close(Some(reason.clone()));
        ChannelError::Closed(reason)
    }
}

#[async_trait]
impl BrokerChannel for MockChannel {
    fn id(&self) -> u16 {
        self.id
    }

    fn is_open(&self) -> bool {
        !self.flags.closed.load(Ordering::SeqCst) && self.connection.load(Ordering::SeqCst)
    }

    fn close_reason(&self) -> Option<CloseReason> {
        self.flags.reason.lock().unwrap().clone()
    }

    async fn queue_declare(
        &self,
        queue: &str,
        options: &QueueOptions,
        arguments: FieldTable,
    ) -> Result<(), ChannelError> {
        self.check_open()?;
        self.broker.record(Call::QueueDeclare {
            channel: self.id,
            queue: queue.to_owned(),
            options: *options,
            arguments,
        });

        let mut state = self.broker.state();
        let inequivalent = state
            .queues
            .get(queue)
            .map_or(false, |existing| existing.durable != options.durable);
        if inequivalent {
            drop(state);
            return Err(self.fail(
                PRECONDITION_FAILED,
                format!("PRECONDITION_FAILED - inequivalent arg 'durable' for queue '{}'", queue),
            ));
        }
        state.queues.insert(queue.to_owned(), *options);
        Ok(())
    }

    async fn queue_declare_passive(&self, queue: &str) -> Result<(), ChannelError> {
        self.check_open()?;
        self.broker.record(Call::QueueDeclarePassive {
            channel: self.id,
            queue: queue.to_owned(),
        });

        if self.broker.has_queue(queue) {
            Ok(())
        } else {
            Err(self.fail(NOT_FOUND, format!("NOT_FOUND - no queue '{}'", queue)))
        }
    }

    async fn queue_delete(&self, queue: &str) -> Result<(), ChannelError> {
        self.check_open()?;
        self.broker.record(Call::QueueDelete {
            channel: self.id,
            queue: queue.to_owned(),
        });

        let mut state = self.broker.state();
        if state.fail_deletes {
            drop(state);
            return Err(self.fail(NOT_FOUND, format!("NOT_FOUND - no queue '{}'", queue)));
        }
        state.queues.remove(queue);
        Ok(())
    }

    async fn exchange_declare(
        &self,
        exchange: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> Result<(), ChannelError> {
        self.check_open()?;
        self.broker.record(Call::ExchangeDeclare {
            channel: self.id,
            exchange: exchange.to_owned(),
            kind,
            durable,
        });

        let mut state = self.broker.state();
        let inequivalent = state
            .exchanges
            .get(exchange)
            .map_or(false, |existing| *existing != kind);
        if inequivalent {
            drop(state);
            return Err(self.fail(
                PRECONDITION_FAILED,
                format!("PRECONDITION_FAILED - inequivalent arg 'type' for exchange '{}'", exchange),
            ));
        }
        state.exchanges.insert(exchange.to_owned(), kind);
        Ok(())
    }

    async fn exchange_delete(&self, exchange: &str) -> Result<(), ChannelError> {
        self.check_open()?;
        self.broker.record(Call::ExchangeDelete {
            channel: self.id,
            exchange: exchange.to_owned(),
        });

        let mut state = self.broker.state();
        if state.fail_deletes {
            drop(state);
            return Err(self.fail(NOT_FOUND, format!("NOT_FOUND - no exchange '{}'", exchange)));
        }
        state.exchanges.remove(exchange);
        Ok(())
    }

    async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), ChannelError> {
        self.check_open()?;
        self.broker.record(Call::QueueBind {
            channel: self.id,
            queue: queue.to_owned(),
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
        });

        if !self.broker.has_exchange(exchange) {
            return Err(self.fail(NOT_FOUND, format!("NOT_FOUND - no exchange '{}'", exchange)));
        }
        if !self.broker.has_queue(queue) {
            return Err(self.fail(NOT_FOUND, format!("NOT_FOUND - no queue '{}'", queue)));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.check_open()?;
        self.broker.record(Call::CloseChannel(self.id));
        self.broker.state().channels.remove(&self.id);
        self.flags.close(None);
        Ok(())
    }
}
