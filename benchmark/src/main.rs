use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use amqp_sampler::{config::keys, Properties, Sampler, ThreadListener};
use clap::Parser;
use futures::future::join_all;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();
    let subscriber = FmtSubscriber::builder().finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let plan = opts.test_plan();
    let stats = Stats::default();
    let reporter = start_reporting_task(stats.clone());

    let workers = (0..opts.workers)
        .map(|worker| {
            let plan = plan.clone();
            let stats = stats.clone();
            tokio::spawn(run_worker(format!("worker-{}", worker), plan, stats))
        })
        .collect::<Vec<_>>();

    for result in join_all(workers).await {
        if let Err(err) = result {
            warn!(%err, "worker panicked");
        }
    }
    reporter.abort();

    info!(
        "Done: {} samples ok, {} failed",
        stats.ok_count.load(Ordering::Relaxed),
        stats.failed_count.load(Ordering::Relaxed)
    );
    Ok(())
}

#[derive(Parser, Debug)]
#[clap(version = "1.0", about = "Opens channels and declares topology against an AMQP broker")]
struct Opts {
    /// Comma separated broker hosts, tried in order
    #[clap(long, default_value = "localhost")]
    hosts: String,
    #[clap(short, long, default_value = "5672")]
    port: u16,
    #[clap(long, default_value = "/")]
    vhost: String,
    #[clap(short, long, default_value = "guest")]
    username: String,
    #[clap(long, default_value = "guest")]
    password: String,
    /// Connection timeout in milliseconds
    #[clap(long, default_value = "1000")]
    timeout: u64,

    /// PKCS12 or PEM client keystore, enables TLS with SASL EXTERNAL
    #[clap(long)]
    keystore: Option<String>,
    #[clap(long, default_value = "")]
    keystore_pass: String,
    #[clap(long)]
    truststore: Option<String>,
    #[clap(long, default_value = "")]
    truststore_pass: String,
    #[clap(long)]
    ssl_user: Option<String>,

    #[clap(short, long, default_value = "")]
    exchange: String,
    #[clap(long, default_value = "direct")]
    exchange_type: String,
    #[clap(long)]
    exchange_passive: bool,
    #[clap(long)]
    exchange_redeclare: bool,
    #[clap(short, long, default_value = "")]
    queue: String,
    #[clap(long)]
    queue_passive: bool,
    #[clap(long)]
    queue_redeclare: bool,
    #[clap(short, long, default_value = "")]
    routing_key: String,
    /// Message TTL in milliseconds, 0 for none
    #[clap(long, default_value = "0")]
    message_ttl: u32,
    /// Queue expiry in milliseconds, 0 for none
    #[clap(long, default_value = "0")]
    expires: u32,

    #[clap(short, long, default_value = "4")]
    workers: usize,
    #[clap(short, long, default_value = "100")]
    iterations: u32,
}

impl Opts {
    fn test_plan(&self) -> Properties {
        let mut plan = Properties::new()
            .with(keys::HOST, &self.hosts)
            .with(keys::PORT, self.port)
            .with(keys::VIRTUAL_HOST, &self.vhost)
            .with(keys::USERNAME, &self.username)
            .with(keys::PASSWORD, &self.password)
            .with(keys::TIMEOUT, self.timeout)
            .with(keys::ITERATIONS, self.iterations)
            .with(keys::EXCHANGE, &self.exchange)
            .with(keys::EXCHANGE_TYPE, &self.exchange_type)
            .with(keys::EXCHANGE_DECLARE_PASSIVE, self.exchange_passive)
            .with(keys::EXCHANGE_REDECLARE, self.exchange_redeclare)
            .with(keys::QUEUE, &self.queue)
            .with(keys::QUEUE_DECLARE_PASSIVE, self.queue_passive)
            .with(keys::QUEUE_REDECLARE, self.queue_redeclare)
            .with(keys::ROUTING_KEY, &self.routing_key)
            .with(keys::MESSAGE_TTL, self.message_ttl)
            .with(keys::MESSAGE_EXPIRES, self.expires);

        if let (Some(keystore), Some(truststore)) = (&self.keystore, &self.truststore) {
            plan.set(keys::SSL, true)
                .set(keys::SSL_KEYSTORE, keystore)
                .set(keys::SSL_KEYSTORE_PASS, &self.keystore_pass)
                .set(keys::SSL_TRUSTSTORE, truststore)
                .set(keys::SSL_TRUSTSTORE_PASS, &self.truststore_pass);
            if let Some(user) = &self.ssl_user {
                plan.set(keys::SSL_USER_ID, user);
            }
        }
        plan
    }
}

#[derive(Clone, Default)]
pub struct Stats {
    ok_count: Arc<AtomicU64>,
    failed_count: Arc<AtomicU64>,
}

async fn run_worker(label: String, plan: Properties, stats: Stats) {
    let mut sampler = Sampler::amqp(label, plan);
    sampler.thread_started().await;

    let iterations = match sampler.iterations() {
        Ok(iterations) => iterations,
        Err(err) => {
            warn!(label = sampler.label(), %err, "invalid test plan");
            sampler.thread_finished().await;
            return;
        }
    };

    for _ in 0..iterations {
        let result = sampler.sample().await;
        if result.success {
            stats.ok_count.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.failed_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    sampler.thread_finished().await;
}

fn start_reporting_task(stats: Stats) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn(async move {
        let start = Instant::now();
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;

            let sec = start.elapsed().as_secs();
            if sec > 0 {
                info!(
                    "Samples ok {}/s, failed {}/s, elapsed {}",
                    stats.ok_count.load(Ordering::Relaxed) / sec,
                    stats.failed_count.load(Ordering::Relaxed) / sec,
                    sec
                );
            }
        }
    })
}
