//! courier: consumes tasks from Redis queues and hands them to the processing API.

mod args;
mod signal;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use courier_core::ConsumerSupervisor;
use courier_core::impls::{
    HttpDownstream, HttpMailer, PgUserDirectory, QueueDeadLetterSink, QueueNotifier,
    RedisTransport,
};

use crate::args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    telemetry::init(args.log_format);

    let config = args.consumer_config()?;
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    config.validate().context("invalid configuration")?;

    let redis_url = args.redis_url();
    let shared = Arc::new(
        RedisTransport::connect(&redis_url)
            .await
            .context("connecting to redis")?,
    );
    let downstream = Arc::new(HttpDownstream::new(&config.downstream)?);
    let sink = Arc::new(QueueDeadLetterSink::new(
        shared.clone(),
        config.dead_letter_queue.clone(),
    ));
    let notifier = Arc::new(QueueNotifier::new(
        shared.clone(),
        config.email_queue.clone(),
        config.email_sender.clone(),
    ));
    let users = Arc::new(PgUserDirectory::connect_lazy(&args.database_url)?);

    let mut builder = ConsumerSupervisor::builder(config.clone())
        .downstream(downstream)
        .dead_letter_sink(sink)
        .reporter(users, notifier)
        .requeue_transport(shared);
    for queue in &config.queues {
        // BRPOP holds its connection, so every queue gets a dedicated one.
        let transport = RedisTransport::connect(&redis_url)
            .await
            .with_context(|| format!("connecting to redis for {queue}"))?;
        builder = builder.pull_transport(queue.clone(), Arc::new(transport));
    }
    if let Some(url) = &args.mailer_url {
        let mailer = HttpMailer::new(url, args.mailer_timeout()?)?;
        let transport = RedisTransport::connect(&redis_url)
            .await
            .context("connecting to redis for the email relay")?;
        builder = builder.email_relay(Arc::new(mailer), Arc::new(transport));
    }
    let supervisor = builder.build()?;

    info!(
        queues = ?config.queues,
        workers = config.pool.workers,
        processor = %config.downstream.base_url,
        mailer = args.mailer_url.as_deref().unwrap_or("external"),
        "courier started"
    );
    let counts = supervisor.run_until(signal::shutdown_signal()).await;
    info!(?counts, "courier stopped");
    Ok(())
}
