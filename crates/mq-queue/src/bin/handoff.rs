//! mq-handoff: producers and consumers exchanging items through one
//! `BlockingQueue`.
//!
//! # Usage
//!
//! ```bash
//! mq-handoff --print                       # 1..=100 through a queue of 30
//! mq-handoff --producers 4 --consumers 3 --items 10000 --capacity 8 --json
//! RUST_LOG=mq_queue=trace mq-handoff --capacity 1 --items 5
//! ```
//!
//! Producers put `(producer, seq)` pairs. Once every producer is done the
//! queue is closed, and consumers drain it until `get` reports `Closed`.
//! Each consumer checks that it sees every producer's items in order.

use std::process;
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;

use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use mq_queue::{BlockingQueue, CapacityError};

/// `(producer, seq)`, seq counting from 1.
type Item = (u32, u32);

/// Move items from producer threads to consumer threads through a bounded
/// blocking queue and report delivery statistics.
#[derive(Parser, Debug)]
#[command(name = "mq-handoff")]
#[command(about = "Bounded blocking queue producer/consumer hand-off")]
struct Cli {
    /// Queue capacity.
    #[arg(long, default_value_t = 30)]
    capacity: usize,

    /// Items put by each producer.
    #[arg(long, default_value_t = 100)]
    items: u32,

    /// Producer threads.
    #[arg(long, default_value_t = 1)]
    producers: u32,

    /// Consumer threads.
    #[arg(long, default_value_t = 1)]
    consumers: u32,

    /// Print every received item.
    #[arg(long)]
    print: bool,

    /// Emit the summary as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Error)]
enum HandoffError {
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("at least one {0} is required")]
    NoThreads(&'static str),

    #[error("queue closed while producer {0} was still running")]
    ClosedEarly(u32),

    #[error("consumer {consumer} saw producer {producer} seq {seq} after seq {previous}")]
    OutOfOrder {
        consumer: u32,
        producer: u32,
        seq: u32,
        previous: u32,
    },

    #[error("expected {expected} items, received {received}")]
    Missing { expected: u64, received: u64 },

    #[error("a worker thread panicked")]
    WorkerPanicked,

    #[error("failed to encode summary: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct Summary {
    capacity: usize,
    producers: u32,
    consumers: u32,
    items_per_producer: u32,
    received: u64,
    per_consumer: Vec<u64>,
    elapsed_ms: f64,
    items_per_sec: f64,
}

fn produce(queue: &BlockingQueue<Item>, producer: u32, items: u32) -> Result<(), HandoffError> {
    for seq in 1..=items {
        queue
            .put((producer, seq))
            .map_err(|_| HandoffError::ClosedEarly(producer))?;
    }
    debug!(producer, items, "producer done");
    Ok(())
}

fn consume(queue: &BlockingQueue<Item>, consumer: u32, cli: &Cli) -> Result<u64, HandoffError> {
    let mut last_seq: Vec<Option<u32>> = vec![None; cli.producers as usize];
    let mut received = 0;

    while let Ok((producer, seq)) = queue.get() {
        let slot = &mut last_seq[producer as usize];
        if let Some(previous) = *slot {
            if seq <= previous {
                // Release producers so the run can end.
                queue.close();
                return Err(HandoffError::OutOfOrder {
                    consumer,
                    producer,
                    seq,
                    previous,
                });
            }
        }
        *slot = Some(seq);
        received += 1;

        if cli.print {
            if cli.producers == 1 {
                println!("{}", seq);
            } else {
                println!("{}:{}", producer, seq);
            }
        }
    }

    debug!(consumer, received, "consumer drained");
    Ok(received)
}

fn join<T>(handle: ScopedJoinHandle<'_, Result<T, HandoffError>>) -> Result<T, HandoffError> {
    handle.join().map_err(|_| HandoffError::WorkerPanicked)?
}

fn run(cli: &Cli) -> Result<Summary, HandoffError> {
    if cli.producers == 0 {
        return Err(HandoffError::NoThreads("producer"));
    }
    if cli.consumers == 0 {
        return Err(HandoffError::NoThreads("consumer"));
    }

    let queue = BlockingQueue::new(cli.capacity)?;
    info!(
        capacity = cli.capacity,
        producers = cli.producers,
        consumers = cli.consumers,
        items = cli.items,
        "starting hand-off"
    );

    let start = Instant::now();
    let per_consumer = thread::scope(|s| {
        let queue = &queue;

        let consumers: Vec<_> = (0..cli.consumers)
            .map(|id| s.spawn(move || consume(queue, id, cli)))
            .collect();
        let producers: Vec<_> = (0..cli.producers)
            .map(|id| s.spawn(move || produce(queue, id, cli.items)))
            .collect();

        let produced: Result<Vec<()>, HandoffError> = producers.into_iter().map(join).collect();
        queue.close();
        let received: Result<Vec<u64>, HandoffError> = consumers.into_iter().map(join).collect();

        // A consumer failure closes the queue early, so report it first.
        let received = received?;
        produced?;
        Ok::<_, HandoffError>(received)
    })?;
    let elapsed = start.elapsed();

    let expected = u64::from(cli.producers) * u64::from(cli.items);
    let received: u64 = per_consumer.iter().sum();
    if received != expected {
        return Err(HandoffError::Missing { expected, received });
    }

    let secs = elapsed.as_secs_f64();
    let summary = Summary {
        capacity: cli.capacity,
        producers: cli.producers,
        consumers: cli.consumers,
        items_per_producer: cli.items,
        received,
        per_consumer,
        elapsed_ms: secs * 1000.0,
        items_per_sec: if secs > 0.0 { received as f64 / secs } else { 0.0 },
    };
    info!(received, elapsed_ms = summary.elapsed_ms, "hand-off complete");

    Ok(summary)
}

fn report(cli: &Cli, summary: &Summary) -> Result<(), HandoffError> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!(
        "received {} items from {} producer(s) in {:.2} ms ({:.0} items/s)",
        summary.received, summary.producers, summary.elapsed_ms, summary.items_per_sec
    );
    for (id, count) in summary.per_consumer.iter().enumerate() {
        println!("  consumer {}: {}", id, count);
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli).and_then(|summary| report(&cli, &summary)) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
