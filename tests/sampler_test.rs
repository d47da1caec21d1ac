use amqp_sampler::{
    config::keys, LifecycleState, Properties, PropertyStore, Sampler, ThreadListener,
    FAILURE_CODE, SUCCESS_CODE,
};

mod common;

use common::{init_tracing, Call, MockBroker};

fn plan() -> Properties {
    Properties::new()
        .with(keys::HOST, "rabbit-1")
        .with(keys::QUEUE, "q1")
        .with(keys::EXCHANGE, "ex1")
        .with(keys::ROUTING_KEY, "rk")
        .with(keys::ITERATIONS, "25")
}

#[tokio::test]
async fn successful_sample() {
    init_tracing();
    let broker = MockBroker::new();
    let mut sampler = Sampler::new("worker-1", plan(), broker.connector());

    sampler.thread_started().await;
    let result = sampler.sample().await;

    assert!(result.success, "{}", result.response_message);
    assert_eq!("worker-1", result.label);
    assert_eq!(SUCCESS_CODE, result.response_code);
    assert_eq!(25, sampler.iterations().unwrap());
}

#[tokio::test]
async fn repeated_samples_reuse_the_channel() {
    let broker = MockBroker::new();
    let mut sampler = Sampler::new("worker-1", plan(), broker.connector());

    for _ in 0..10 {
        assert!(sampler.sample().await.success);
    }

    assert_eq!(1, broker.connect_count());
    assert_eq!(1, broker.channel_count());
    assert_eq!(3, broker.topology_calls().len());
}

#[tokio::test]
async fn failures_become_failed_results_and_the_worker_recovers() {
    init_tracing();
    let broker = MockBroker::new();
    broker.refuse_connections(true);
    let mut sampler = Sampler::new("worker-1", plan(), broker.connector());

    let failed = sampler.sample().await;

    assert!(!failed.success);
    assert_eq!(FAILURE_CODE, failed.response_code);
    assert!(failed.response_message.contains("rabbit-1:5672"));

    broker.refuse_connections(false);
    let recovered = sampler.sample().await;

    assert!(recovered.success);
    assert_eq!(LifecycleState::ChannelOpen, sampler.manager().state());
}

#[tokio::test]
async fn configuration_is_read_on_every_sample() {
    let broker = MockBroker::new();
    let mut sampler = Sampler::new("worker-1", plan(), broker.connector());
    assert!(sampler.sample().await.success);

    sampler.store_mut().set(keys::PORT, "not-a-port");
    let failed = sampler.sample().await;

    assert!(!failed.success);
    assert!(failed.response_message.contains(keys::PORT));
    assert!(sampler.iterations().is_err());

    sampler.store_mut().remove(keys::PORT);
    assert!(sampler.sample().await.success);
    assert_eq!("", sampler.store_mut().string(keys::PORT));
}

#[tokio::test]
async fn thread_finished_closes_the_connection() {
    let broker = MockBroker::new();
    let mut sampler = Sampler::new("worker-1", plan(), broker.connector());
    sampler.sample().await;

    sampler.thread_finished().await;

    assert_eq!(Some(&Call::CloseConnection), broker.calls().last());
    assert_eq!(LifecycleState::Closed, sampler.manager().state());

    let after = sampler.sample().await;
    assert!(!after.success);
    assert_eq!(1, broker.connect_count());
}

#[tokio::test]
async fn thread_finished_without_samples_does_nothing() {
    let broker = MockBroker::new();
    let mut sampler = Sampler::new("worker-1", plan(), broker.connector());

    sampler.thread_started().await;
    sampler.thread_finished().await;

    assert!(broker.calls().is_empty());
}
