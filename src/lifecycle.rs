use async_trait::async_trait;

/// Worker thread hooks of the load-testing harness.
#[async_trait]
pub trait ThreadListener: Send {
    /// Nothing to do by default, the connection is opened on first use.
    async fn thread_started(&mut self) {}

    /// Must not fail: release whatever the worker holds.
    async fn thread_finished(&mut self);
}
