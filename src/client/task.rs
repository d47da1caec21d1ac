/// Aborts the wrapped task when dropped.
pub(crate) struct TaskHandle {
    task: tokio::task::JoinHandle<()>,
}

impl From<tokio::task::JoinHandle<()>> for TaskHandle {
    fn from(task: tokio::task::JoinHandle<()>) -> Self {
        TaskHandle { task }
    }
}

impl Drop for TaskHandle {
    /// Stops the reader or heartbeat loop with its connection. Nothing waits on the
    /// abort, so a frame being written at that moment may be cut short.
    fn drop(&mut self) {
        self.task.abort();
    }
}
