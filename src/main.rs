use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use sampled_metrics::{Histogram, HistogramSnapshot, Meter, MeterSnapshot};
use serde::Serialize;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod load_generator;

/// Percentiles reported for the latency histogram
const PERCENTILES: [f64; 4] = [0.5, 0.95, 0.99, 0.999];

/// Demo knobs, overridable through the environment.
struct DemoSettings {
    workers: u32,
    duration: Duration,
    report_interval: Duration,
}

impl DemoSettings {
    fn from_env() -> anyhow::Result<Self> {
        let settings = Self {
            workers: env_or("METRICS_DEMO_WORKERS", 8)?,
            duration: Duration::from_secs(env_or("METRICS_DEMO_SECS", 30)?),
            report_interval: Duration::from_millis(env_or("METRICS_DEMO_REPORT_MS", 5_000)?),
        };
        anyhow::ensure!(
            !settings.report_interval.is_zero(),
            "METRICS_DEMO_REPORT_MS must be positive"
        );
        Ok(settings)
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

/// One line of the periodic report.
#[derive(Serialize)]
struct Report {
    requests: MeterSnapshot,
    latency_us: HistogramSnapshot,
}

fn report(meter: &Meter, latencies: &Mutex<Histogram>) -> anyhow::Result<()> {
    let report = Report {
        requests: meter.snapshot(),
        latency_us: latencies.lock().snapshot(&PERCENTILES),
    };
    let json = serde_json::to_string(&report).context("serializing report")?;
    info!(report = %json, "metrics");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = DemoSettings::from_env()?;

    // ── 1. Build the metrics under load ──────────────────────────
    let meter = Arc::new(Meter::new()?);
    let latencies = Arc::new(Mutex::new(Histogram::new_biased()?));
    let running = Arc::new(AtomicBool::new(true));

    // ── 2. Start the load generator ──────────────────────────────
    info!(
        workers = settings.workers,
        secs = settings.duration.as_secs(),
        "starting synthetic load"
    );
    let mut load = tokio::spawn(load_generator::run(
        running.clone(),
        meter.clone(),
        latencies.clone(),
        settings.workers,
        settings.duration,
    ));

    // ── 3. Report until the run ends or Ctrl-C ───────────────────
    let mut reports = IntervalStream::new(tokio::time::interval(settings.report_interval));
    loop {
        tokio::select! {
            finished = &mut load => {
                finished.context("load generator panicked")?;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, draining workers");
                running.store(false, Ordering::SeqCst);
            }
            Some(_) = reports.next() => report(&meter, &latencies)?,
        }
    }

    // ── 4. Final numbers ─────────────────────────────────────────
    meter.stop();
    // second stop is a no-op
    meter.stop();
    report(&meter, &latencies)?;
    info!(summary = %latencies.lock(), "done");
    Ok(())
}
