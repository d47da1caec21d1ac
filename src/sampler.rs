use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    channel_manager::ChannelManager,
    client::AmqpConnector,
    config::{PropertyStore, SamplerConfig},
    lifecycle::ThreadListener,
    transport::{BrokerChannel, Connector},
    SamplerResult,
};

pub const SUCCESS_CODE: &str = "200";
pub const FAILURE_CODE: &str = "500";

/// Outcome of one sampling iteration as the harness records it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleResult {
    pub label: String,
    pub success: bool,
    pub response_code: String,
    pub response_message: String,
}

impl SampleResult {
    fn ok(label: &str, message: String) -> Self {
        SampleResult {
            label: label.to_owned(),
            success: true,
            response_code: SUCCESS_CODE.to_owned(),
            response_message: message,
        }
    }

    fn failed(label: &str, message: String) -> Self {
        SampleResult {
            label: label.to_owned(),
            success: false,
            response_code: FAILURE_CODE.to_owned(),
            response_message: message,
        }
    }
}

/// One worker's sampler: re-reads the test plan on every sample and keeps a channel ready.
pub struct Sampler<S, C: Connector = AmqpConnector> {
    label: String,
    store: S,
    manager: ChannelManager<C>,
}

impl<S: PropertyStore> Sampler<S, AmqpConnector> {
    pub fn amqp(label: impl Into<String>, store: S) -> Self {
        Sampler::new(label, store, AmqpConnector)
    }
}

impl<S: PropertyStore, C: Connector> Sampler<S, C> {
    pub fn new(label: impl Into<String>, store: S, connector: C) -> Self {
        Self {
            label: label.into(),
            store,
            manager: ChannelManager::new(connector),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn manager(&self) -> &ChannelManager<C> {
        &self.manager
    }

    pub fn iterations(&self) -> SamplerResult<u32> {
        Ok(SamplerConfig::from_store(&self.store)?.iterations)
    }

    /// Never fails: errors become a failed result carrying the error message.
    pub async fn sample(&mut self) -> SampleResult {
        match self.ready().await {
            Ok(message) => SampleResult::ok(&self.label, message),
            Err(err) => {
                warn!(label = %self.label, %err, "sample failed");
                SampleResult::failed(&self.label, err.to_string())
            }
        }
    }

    async fn ready(&mut self) -> SamplerResult<String> {
        let config = SamplerConfig::from_store(&self.store)?;
        let channel = self.manager.ensure_channel(&config).await?;
        Ok(format!("channel {} ready", channel.id()))
    }
}

#[async_trait]
impl<S, C> ThreadListener for Sampler<S, C>
where
    S: PropertyStore + Send + Sync,
    C: Connector,
{
    async fn thread_started(&mut self) {
        info!(label = %self.label, "thread started");
    }

    async fn thread_finished(&mut self) {
        info!(label = %self.label, "thread finished");
        self.manager.cleanup().await;
    }
}
