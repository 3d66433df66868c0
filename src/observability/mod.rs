//! Logging and metrics setup
//!
//! Logging goes through `tracing`; the filter comes from `RUST_LOG` when set
//! and from the CLI level otherwise. Metrics are OpenTelemetry instruments
//! registered on a process-wide meter provider.

use anyhow::Result;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter},
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::jobs::types::JobOutcome;

pub const SERVICE_NAME: &str = "presentation-worker";

/// Install the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let log_filter = format!("presentation_worker={log_level},{log_level}");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }
    Ok(())
}

/// Build the meter provider and register it globally.
///
/// Metrics stay in-process unless an exporter is attached; the provider is
/// returned so `main` can flush it on shutdown.
pub fn init_metrics() -> SdkMeterProvider {
    let provider = SdkMeterProvider::builder().build();
    global::set_meter_provider(provider.clone());
    info!("Metrics initialised (in-process meter provider)");
    provider
}

/// Counters and histograms recorded by the dispatcher and executor
#[derive(Clone)]
pub struct WorkerMetrics {
    pub jobs_dispatched: Counter<u64>,
    pub jobs_finished: Counter<u64>,
    pub malformed_entries: Counter<u64>,
    pub drain_passes: Counter<u64>,
    pub queue_errors: Counter<u64>,
    pub job_duration: Histogram<f64>,
}

impl WorkerMetrics {
    pub fn new(meter: &Meter) -> Self {
        let jobs_dispatched = meter
            .u64_counter("jobs_dispatched_total")
            .with_description("Jobs handed to the worker pool")
            .build();
        let jobs_finished = meter
            .u64_counter("jobs_finished_total")
            .with_description("Jobs finished, labelled by outcome")
            .build();
        let malformed_entries = meter
            .u64_counter("malformed_entries_total")
            .with_description("Queue entries discarded because they could not be decoded")
            .build();
        let drain_passes = meter
            .u64_counter("drain_passes_total")
            .with_description("Drain passes started, labelled by trigger")
            .build();
        let queue_errors = meter
            .u64_counter("queue_errors_total")
            .with_description("Work queue transport errors")
            .build();
        let job_duration = meter
            .f64_histogram("job_duration_seconds")
            .with_description("Time from dispatch to the final status write")
            .build();

        Self {
            jobs_dispatched,
            jobs_finished,
            malformed_entries,
            drain_passes,
            queue_errors,
            job_duration,
        }
    }

    /// Instruments on the global meter provider. Without a registered
    /// provider these record into a no-op meter.
    pub fn global() -> Self {
        Self::new(&global::meter(SERVICE_NAME))
    }

    pub fn record_outcome(&self, outcome: JobOutcome, elapsed: Duration) {
        let labels = [KeyValue::new("outcome", outcome.as_ref().to_string())];
        self.jobs_finished.add(1, &labels);
        self.job_duration.record(elapsed.as_secs_f64(), &labels);
    }

    pub fn record_drain(&self, trigger: &'static str) {
        self.drain_passes.add(1, &[KeyValue::new("trigger", trigger)]);
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::global()
    }
}
