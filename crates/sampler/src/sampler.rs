//! Sampler Loop Implementation

use crate::{
    Accumulator, AccumulatorSettings, AnalogSource, Clock, PeriodicSchedule, SamplerError,
    TickTiming,
};
use metrics::{Counter, Gauge};
use ring_buffer::{Reading, RingBuffer};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the sampling loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Fine tick period in microseconds (default: 400)
    pub sample_period_us: u64,
    /// Fine ticks per published reading (default: 239)
    pub samples_per_reading: u32,
    /// Lateness beyond which a tick is reported as an overrun
    pub overrun_threshold_us: u64,
    /// Final stretch before a deadline spent spinning instead of sleeping
    pub spin_margin_us: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_period_us: 400,
            samples_per_reading: 239,
            overrun_threshold_us: 1000,
            spin_margin_us: 20,
        }
    }
}

impl SamplerConfig {
    pub fn sample_period(&self) -> Duration {
        Duration::from_micros(self.sample_period_us)
    }

    pub fn overrun_threshold(&self) -> Duration {
        Duration::from_micros(self.overrun_threshold_us)
    }

    pub fn spin_margin(&self) -> Duration {
        Duration::from_micros(self.spin_margin_us)
    }

    /// Reject settings the loop cannot run with
    pub fn validate(&self, accumulator: &AccumulatorSettings) -> Result<(), SamplerError> {
        if self.sample_period_us == 0 {
            return Err(SamplerError::InvalidConfig(
                "sample_period_us must be greater than zero".into(),
            ));
        }
        if self.samples_per_reading == 0 {
            return Err(SamplerError::InvalidConfig(
                "samples_per_reading must be greater than zero".into(),
            ));
        }
        if accumulator.window_size == 0 {
            return Err(SamplerError::InvalidConfig(
                "accumulator window_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Counters shared between the sampler thread and observers
#[derive(Debug, Default)]
pub struct SamplerStats {
    ticks: AtomicU64,
    readings: AtomicU64,
    overruns: AtomicU64,
    max_lateness_us: AtomicU64,
}

/// Point-in-time copy of [`SamplerStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SamplerStatsSnapshot {
    pub ticks: u64,
    pub readings: u64,
    pub overruns: u64,
    pub max_lateness_us: u64,
}

impl SamplerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SamplerStatsSnapshot {
        SamplerStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            readings: self.readings.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            max_lateness_us: self.max_lateness_us.load(Ordering::Relaxed),
        }
    }

    fn record_overrun(&self, late_by: Duration) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
        self.max_lateness_us
            .fetch_max(late_by.as_micros() as u64, Ordering::Relaxed);
    }
}

/// Metric handles registered once, so the loop never touches the registry
struct SamplerMetrics {
    ticks: Counter,
    readings: Counter,
    overruns: Counter,
    cursor: Gauge,
}

impl SamplerMetrics {
    fn register() -> Self {
        Self {
            ticks: metrics::counter!("volta_sampler_ticks_total"),
            readings: metrics::counter!("volta_readings_published_total"),
            overruns: metrics::counter!("volta_sampler_overruns_total"),
            cursor: metrics::gauge!("volta_ring_cursor"),
        }
    }
}

/// Sampling loop: the single writer of its ring buffer
pub struct Sampler<A, S, C> {
    config: SamplerConfig,
    accumulator: A,
    source: S,
    clock: C,
    buffer: Arc<RingBuffer>,
    stats: Arc<SamplerStats>,
    metrics: SamplerMetrics,
    /// Fine ticks since the last publish
    ticks_in_window: u32,
}

impl<A, S, C> Sampler<A, S, C>
where
    A: Accumulator,
    S: AnalogSource,
    C: Clock,
{
    /// Create a sampler, configuring and starting the accumulator.
    ///
    /// Metric handles come from the recorder installed at this point.
    pub fn new(
        config: SamplerConfig,
        settings: AccumulatorSettings,
        mut accumulator: A,
        source: S,
        clock: C,
        buffer: Arc<RingBuffer>,
    ) -> Result<Self, SamplerError> {
        config.validate(&settings)?;
        accumulator.configure(settings);
        accumulator.start();

        info!(
            "Sampler created: {}us period, {} samples per reading, ring of {}",
            config.sample_period_us,
            config.samples_per_reading,
            buffer.capacity()
        );

        Ok(Self {
            config,
            accumulator,
            source,
            clock,
            buffer,
            stats: Arc::new(SamplerStats::new()),
            metrics: SamplerMetrics::register(),
            ticks_in_window: 0,
        })
    }

    /// Shared statistics handle
    pub fn stats(&self) -> Arc<SamplerStats> {
        Arc::clone(&self.stats)
    }

    /// Run one fine tick; returns the reading when this tick published one
    pub fn tick(&mut self) -> Option<Reading> {
        let raw = self.source.read();
        self.accumulator.update(raw);
        self.ticks_in_window += 1;
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);
        self.metrics.ticks.increment(1);

        if self.ticks_in_window < self.config.samples_per_reading {
            return None;
        }

        self.accumulator.publish();
        let reading = Reading::new(self.clock.millis(), self.accumulator.last_published());
        self.buffer.append(reading);
        self.ticks_in_window = 0;

        self.stats.readings.fetch_add(1, Ordering::Relaxed);
        self.metrics.readings.increment(1);
        self.metrics.cursor.set(self.buffer.snapshot_end() as f64);
        debug!("Published t={} v={}", reading.timestamp_ms, reading.value);

        Some(reading)
    }

    /// Run ticks on the fixed schedule until `running` is cleared
    pub fn run(&mut self, running: &AtomicBool) {
        info!("Starting sampler loop");
        let mut schedule = PeriodicSchedule::new(
            self.config.sample_period(),
            self.clock.now(),
            self.config.overrun_threshold(),
        );

        while running.load(Ordering::Relaxed) {
            self.tick();

            if let TickTiming::Overrun { late_by } = schedule.wait(&self.clock) {
                self.stats.record_overrun(late_by);
                self.metrics.overruns.increment(1);
                warn!(
                    "Sampler overrun: tick {} late by {}us, cursor {}",
                    self.ticks_in_window,
                    late_by.as_micros(),
                    self.buffer.snapshot_end()
                );
            }
        }

        info!("Sampler loop stopped");
    }
}

impl<A, S, C> Sampler<A, S, C>
where
    A: Accumulator + 'static,
    S: AnalogSource + 'static,
    C: Clock + 'static,
{
    /// Move the sampler onto its own OS thread
    pub fn spawn(mut self) -> Result<SamplerHandle, SamplerError> {
        let running = Arc::new(AtomicBool::new(true));
        let stats = self.stats();
        let flag = Arc::clone(&running);

        let thread = std::thread::Builder::new()
            .name("sampler".into())
            .spawn(move || self.run(&flag))?;

        Ok(SamplerHandle {
            running,
            stats,
            thread: Some(thread),
        })
    }
}

/// Owner of a running sampler thread; stops it on drop
pub struct SamplerHandle {
    running: Arc<AtomicBool>,
    stats: Arc<SamplerStats>,
    thread: Option<JoinHandle<()>>,
}

impl SamplerHandle {
    /// Check if the sampler thread is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
            && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stats(&self) -> Arc<SamplerStats> {
        Arc::clone(&self.stats)
    }

    /// Stop the loop and wait for the thread to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            info!("Stopping sampler");
            if thread.join().is_err() {
                warn!("Sampler thread panicked");
            }
        }
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
