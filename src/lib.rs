//! Connection and topology lifecycle for an AMQP 0-9-1 load-testing sampler.
//!
//! Each worker owns a [`Sampler`], which keeps one connection and one channel open to a
//! broker, declares the configured exchange, queue and binding once per fresh channel,
//! and tears everything down when the worker finishes.
//!
//! ```rust,no_run
//! use amqp_sampler::{config::keys, Properties, Sampler, ThreadListener};
//!
//! # async fn run() {
//! let plan = Properties::new()
//!     .with(keys::HOST, "rabbit-1,rabbit-2")
//!     .with(keys::QUEUE, "perf-queue")
//!     .with(keys::EXCHANGE, "perf-exchange")
//!     .with(keys::ROUTING_KEY, "perf");
//!
//! let mut sampler = Sampler::amqp("worker-1", plan);
//! sampler.thread_started().await;
//! let result = sampler.sample().await;
//! assert!(result.success, "{}", result.response_message);
//! sampler.thread_finished().await;
//! # }
//! ```
mod channel_manager;
pub mod client;
pub mod config;
mod endpoint;
pub mod error;
mod factory;
mod lifecycle;
mod sampler;
pub mod tls;
pub mod topology;
pub mod transport;

pub type SamplerResult<T> = Result<T, error::SamplerError>;

pub use crate::channel_manager::{ChannelManager, LifecycleState};
pub use crate::config::{Properties, PropertyStore, SamplerConfig};
pub use crate::factory::ConnectionFactory;
pub use crate::lifecycle::ThreadListener;
pub use crate::sampler::{SampleResult, Sampler, FAILURE_CODE, SUCCESS_CODE};

pub mod types {

    pub use crate::client::{Authentication, ConnectionOptions, Tuning};
    pub use crate::endpoint::{
        Address, BrokerEndpoint, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_HEARTBEAT, DEFAULT_PORT,
    };
    pub use crate::tls::{KeySource, KeyStore, TlsIdentity};
    pub use crate::topology::{
        Declaration, ExchangeKind, ExchangeOptions, ExchangeSpec, QueueOptions, QueueSpec,
        Topology,
    };
    pub use amqp_sampler_protocol::types::{FieldTable, FieldValue};
}
