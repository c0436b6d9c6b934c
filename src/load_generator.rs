use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use sampled_metrics::{Histogram, Meter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

// ─── Public entry point ──────────────────────────────────────────

/// Drives `concurrency` simulated clients against the shared meter and
/// latency histogram. Returns once every client has hit the deadline or
/// seen `running` cleared, and leaves `running` cleared behind it.
pub async fn run(
    running: Arc<AtomicBool>,
    meter: Arc<Meter>,
    latencies: Arc<Mutex<Histogram>>,
    concurrency: u32,
    duration: Duration,
) {
    let deadline = Instant::now() + duration;
    let mut clients = JoinSet::new();

    for id in 0..concurrency {
        clients.spawn(worker(
            id,
            running.clone(),
            meter.clone(),
            latencies.clone(),
            deadline,
        ));
    }

    while let Some(joined) = clients.join_next().await {
        if let Err(err) = joined {
            warn!(error = %err, "simulated client aborted");
        }
    }

    // a run that reached its deadline reads the same as an interrupted one
    running.store(false, Ordering::SeqCst);
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    id: u32,
    running: Arc<AtomicBool>,
    meter: Arc<Meter>,
    latencies: Arc<Mutex<Histogram>>,
    deadline: Instant,
) {
    // per-client seed: latency sequences repeat across runs
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);
    let mut requests = 0u64;

    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        let latency_us = simulated_latency_us(&mut rng);
        tokio::time::sleep(Duration::from_micros(latency_us)).await;

        meter.update(1);
        // one lock per observation: the histogram is single-writer
        latencies.lock().update(latency_us as f64);
        requests += 1;
    }

    debug!(client = id, requests, "simulated client finished");
}

/// Mostly fast requests with a slow tail.
fn simulated_latency_us(rng: &mut StdRng) -> u64 {
    if rng.gen_bool(0.9) {
        rng.gen_range(80..400)
    } else {
        rng.gen_range(1_000..20_000)
    }
}
