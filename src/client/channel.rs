use std::sync::Arc;

use amqp_sampler_protocol::{
    method::{channel, exchange, queue},
    protocol::replies::REPLY_SUCCESS,
    types::FieldTable,
    FromMethod, Frame, Method,
};
use async_trait::async_trait;
use tokio::sync::{mpsc::Receiver, Mutex};
use tracing::trace;

use super::{
    dispatcher::{ChannelState, Dispatcher},
    FrameSink,
};
use crate::{
    error::{ChannelError, CloseReason},
    topology::{ExchangeKind, QueueOptions},
    transport::BrokerChannel,
};

/// One AMQP channel. Operations are synchronous request/reply pairs, one at a time.
pub struct Channel {
    state: Arc<ChannelState>,
    replies: Mutex<Receiver<Method>>,
    sender: FrameSink,
    dispatcher: Arc<Dispatcher>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.state.id())
            .field("open", &self.state.is_open())
            .finish()
    }
}

impl Channel {
    pub(crate) fn new(
        state: Arc<ChannelState>,
        replies: Receiver<Method>,
        sender: FrameSink,
        dispatcher: Arc<Dispatcher>,
    ) -> Channel {
        Channel {
            state,
            replies: Mutex::new(replies),
            sender,
            dispatcher,
        }
    }

    pub(crate) async fn open(&self) -> Result<(), ChannelError> {
        let _: channel::OpenOk = self.rpc(channel::Open, "channel.open-ok").await?;
        Ok(())
    }

    fn closed_error(&self) -> ChannelError {
        match self.state.close_reason() {
            Some(reason) => ChannelError::Closed(reason),
            None if !self.dispatcher.is_open() => self.dispatcher.closed_error(),
            None => ChannelError::AlreadyClosed,
        }
    }

    async fn rpc<T: FromMethod>(
        &self,
        method: impl Into<Method>,
        expected: &'static str,
    ) -> Result<T, ChannelError> {
        if !self.state.is_open() {
            return Err(self.closed_error());
        }
        let method = method.into();
        trace!(channel = self.state.id(), method = method.name(), "sending");

        let mut replies = self.replies.lock().await;
        self.sender
            .send(Frame::method(self.state.id(), method))
            .await
            .map_err(|err| ChannelError::Send(err.to_string()))?;

        match replies.recv().await {
            Some(reply) => {
                let received = reply.name();
                T::from_method(reply).ok_or(ChannelError::UnexpectedReply { expected, received })
            }
            None => Err(self.closed_error()),
        }
    }
}

#[async_trait]
impl BrokerChannel for Channel {
    fn id(&self) -> u16 {
        self.state.id()
    }

    fn is_open(&self) -> bool {
        self.state.is_open() && self.dispatcher.is_open()
    }

    fn close_reason(&self) -> Option<CloseReason> {
        self.state
            .close_reason()
            .or_else(|| self.dispatcher.close_reason())
    }

    async fn queue_declare(
        &self,
        queue: &str,
        options: &QueueOptions,
        arguments: FieldTable,
    ) -> Result<(), ChannelError> {
        let declare = queue::Declare {
            durable: options.durable,
            exclusive: options.exclusive,
            auto_delete: options.auto_delete,
            arguments,
            ..queue::Declare::new(queue)
        };
        let _: queue::DeclareOk = self.rpc(declare, "queue.declare-ok").await?;
        Ok(())
    }

    async fn queue_declare_passive(&self, queue: &str) -> Result<(), ChannelError> {
        let _: queue::DeclareOk = self
            .rpc(queue::Declare::passive(queue), "queue.declare-ok")
            .await?;
        Ok(())
    }

    async fn queue_delete(&self, queue: &str) -> Result<(), ChannelError> {
        let _: queue::DeleteOk = self
            .rpc(queue::Delete::new(queue), "queue.delete-ok")
            .await?;
        Ok(())
    }

    async fn exchange_declare(
        &self,
        exchange: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> Result<(), ChannelError> {
        let declare = exchange::Declare::new(exchange, kind.as_ref()).durable(durable);
        let _: exchange::DeclareOk = self.rpc(declare, "exchange.declare-ok").await?;
        Ok(())
    }

    async fn exchange_delete(&self, exchange: &str) -> Result<(), ChannelError> {
        let _: exchange::DeleteOk = self
            .rpc(exchange::Delete::new(exchange), "exchange.delete-ok")
            .await?;
        Ok(())
    }

    async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), ChannelError> {
        let _: queue::BindOk = self
            .rpc(
                queue::Bind::new(queue, exchange, routing_key),
                "queue.bind-ok",
            )
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        let result: Result<channel::CloseOk, _> = self
            .rpc(
                channel::Close::new(REPLY_SUCCESS, "Goodbye"),
                "channel.close-ok",
            )
            .await;
        self.dispatcher.release(self.state.id(), None);
        result.map(|_| ())
    }
}
