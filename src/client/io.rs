use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

use amqp_sampler_protocol::Frame;
use futures::Sink;
use futures::SinkExt;
use futures::Stream;
use futures::StreamExt;

use tokio::sync::Mutex;

use crate::error::ConnectionError;

/// Pairs the halves of a split transport. Both share one flag, set once the local side
/// has closed the sink, so the reader can tell a requested shutdown from a lost socket.
pub(crate) fn frame_io<S, T>(sink: S, stream: T) -> (FrameSender<S>, FrameReceiver<T>)
where
    S: Sink<Frame>,
    T: Stream<Item = Result<Frame, ConnectionError>>,
{
    let closed = Arc::new(AtomicBool::new(false));
    (
        FrameSender {
            inner: Arc::new(Mutex::new(sink)),
            closed: closed.clone(),
        },
        FrameReceiver {
            inner: stream,
            closed,
        },
    )
}

/// Write half of a connection, shared by every channel on it.
pub(crate) struct FrameSender<T>
where
    T: Sink<Frame>,
{
    inner: Arc<Mutex<T>>,
    closed: Arc<AtomicBool>,
}

impl<T: Sink<Frame>> Clone for FrameSender<T> {
    fn clone(&self) -> Self {
        FrameSender {
            inner: self.inner.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<T> FrameSender<T>
where
    T: Sink<Frame>,
{
    pub fn is_closed(&self) -> bool {
        self.closed.load(Relaxed)
    }
}

/// Read half, owned by the connection's reader task.
pub(crate) struct FrameReceiver<T>
where
    T: Stream<Item = Result<Frame, ConnectionError>>,
{
    inner: T,
    closed: Arc<AtomicBool>,
}

impl<T> FrameReceiver<T>
where
    T: Stream<Item = Result<Frame, ConnectionError>>,
{
    pub fn is_closed(&self) -> bool {
        self.closed.load(Relaxed)
    }
}

impl<T: Sink<Frame> + Unpin> FrameSender<T> {
    pub async fn send(&self, item: Frame) -> Result<(), T::Error> {
        let mut sink = self.inner.lock().await;
        sink.send(item).await
    }

    /// Marks the connection as closed locally before flushing the sink.
    pub async fn close(&self) -> Result<(), T::Error> {
        let mut sink = self.inner.lock().await;
        self.closed.store(true, Relaxed);
        sink.close().await
    }
}

impl<T: Stream<Item = Result<Frame, ConnectionError>> + Unpin> FrameReceiver<T> {
    pub async fn next(&mut self) -> Option<Result<Frame, ConnectionError>> {
        self.inner.next().await
    }
}
