use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use amqp_sampler_protocol::{
    method::{channel, connection},
    Frame, FramePayload, Method,
};
use futures::Sink;
use tokio::sync::{
    mpsc::{channel as reply_channel, Receiver, Sender},
    Notify,
};
use tracing::{info, trace, warn};

use super::io::FrameSender;
use crate::error::{ChannelError, CloseReason};

const REPLY_BUFFER: usize = 8;

/// Open/closed flag and close reason of one channel, readable without blocking.
#[derive(Debug)]
pub(crate) struct ChannelState {
    id: u16,
    open: AtomicBool,
    close_reason: Mutex<Option<CloseReason>>,
}

impl ChannelState {
    fn new(id: u16) -> Self {
        Self {
            id,
            open: AtomicBool::new(true),
            close_reason: Mutex::new(None),
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
            .lock()
            .ok()
            .and_then(|reason| reason.clone())
    }

    pub fn mark_closed(&self, reason: Option<CloseReason>) {
        if let (Some(reason), Ok(mut guard)) = (reason, self.close_reason.lock()) {
            guard.get_or_insert(reason);
        }
        self.open.store(false, Ordering::Release);
    }
}

struct ChannelSlot {
    replies: Sender<Method>,
    state: Arc<ChannelState>,
}

/// Routes incoming frames to the channel they are addressed to and tracks what is still open.
pub(crate) struct Dispatcher {
    channels: Mutex<HashMap<u16, ChannelSlot>>,
    open: AtomicBool,
    close_reason: Mutex<Option<CloseReason>>,
    close_ok: Notify,
}

impl Dispatcher {
    pub fn new() -> Dispatcher {
        Dispatcher {
            channels: Mutex::new(HashMap::new()),
            open: AtomicBool::new(true),
            close_reason: Mutex::new(None),
            close_ok: Notify::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
            .lock()
            .ok()
            .and_then(|reason| reason.clone())
    }

    /// Error handed to channel operations once the connection is gone.
    pub fn closed_error(&self) -> ChannelError {
        ChannelError::ConnectionClosed(
            self.close_reason()
                .map(|reason| reason.to_string())
                .unwrap_or_else(|| "connection closed".to_owned()),
        )
    }

    /// Allocates the lowest free channel id and a queue for its replies.
    pub fn register(
        &self,
        channel_max: u16,
    ) -> Result<(Arc<ChannelState>, Receiver<Method>), ChannelError> {
        if !self.is_open() {
            return Err(self.closed_error());
        }
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| ChannelError::ConnectionClosed("dispatcher poisoned".to_owned()))?;

        let id = (1..=channel_max)
            .find(|id| !channels.contains_key(id))
            .ok_or_else(|| {
                ChannelError::ConnectionClosed(format!("no free channel id up to {}", channel_max))
            })?;

        let (tx, rx) = reply_channel(REPLY_BUFFER);
        let state = Arc::new(ChannelState::new(id));
        channels.insert(
            id,
            ChannelSlot {
                replies: tx,
                state: state.clone(),
            },
        );

        Ok((state, rx))
    }

    /// Forgets a channel: its reply queue is dropped and the id becomes free again.
    pub fn release(&self, id: u16, reason: Option<CloseReason>) {
        let slot = match self.channels.lock() {
            Ok(mut channels) => channels.remove(&id),
            Err(_) => None,
        };
        if let Some(slot) = slot {
            slot.state.mark_closed(reason);
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Marks the connection and every channel on it closed.
    pub fn shutdown(&self, reason: Option<CloseReason>) {
        if let (Some(reason), Ok(mut guard)) = (reason, self.close_reason.lock()) {
            guard.get_or_insert(reason);
        }
        self.open.store(false, Ordering::Release);

        let slots: Vec<ChannelSlot> = match self.channels.lock() {
            Ok(mut channels) => channels.drain().map(|(_, slot)| slot).collect(),
            Err(_) => vec![],
        };
        for slot in slots {
            slot.state.mark_closed(None);
        }
        self.close_ok.notify_one();
    }

    pub async fn wait_close_ok(&self) {
        self.close_ok.notified().await
    }

    pub async fn dispatch<S>(&self, frame: Frame, sender: &FrameSender<S>)
    where
        S: Sink<Frame> + Unpin,
    {
        let channel_id = frame.channel();
        match frame.into_payload() {
            FramePayload::Heartbeat => trace!("received heartbeat"),
            FramePayload::Method(method) if channel_id == 0 => {
                self.connection_method(method, sender).await
            }
            FramePayload::Method(Method::ChannelClose(close)) => {
                let _ = sender
                    .send(Frame::method(channel_id, channel::CloseOk))
                    .await;
                let reason = CloseReason::from(close);
                warn!(channel = channel_id, %reason, "channel closed by the broker");
                self.release(channel_id, Some(reason));
            }
            FramePayload::Method(method) => {
                let replies = self
                    .channels
                    .lock()
                    .ok()
                    .and_then(|channels| channels.get(&channel_id).map(|s| s.replies.clone()));
                match replies {
                    Some(replies) => {
                        let _ = replies.send(method).await;
                    }
                    None => trace!(
                        channel = channel_id,
                        method = method.name(),
                        "ignoring method for unknown channel"
                    ),
                }
            }
            FramePayload::Header(_) | FramePayload::Body(_) => {
                trace!(channel = channel_id, "ignoring content frame")
            }
        }
    }

    async fn connection_method<S>(&self, method: Method, sender: &FrameSender<S>)
    where
        S: Sink<Frame> + Unpin,
    {
        match method {
            Method::ConnectionClose(close) => {
                let _ = sender.send(Frame::method(0, connection::CloseOk)).await;
                let reason = CloseReason::from(close);
                warn!(%reason, "connection closed by the broker");
                self.shutdown(Some(reason));
            }
            Method::ConnectionCloseOk(_) => self.close_ok.notify_one(),
            Method::ConnectionBlocked(blocked) => {
                warn!(reason = %blocked.reason, "connection blocked by the broker")
            }
            Method::ConnectionUnblocked(_) => info!("connection unblocked"),
            other => trace!(method = other.name(), "ignoring connection method"),
        }
    }
}
