//! Fixed-interval tick driver
//!
//! ## Overview
//!
//! One driver owns the [`Engine`] and is its only writer. Every tick:
//!
//! ```text
//!            ┌─► air-quality task ─► JoinSet: fetch(location), timeout ─┐
//! tick ──────┤                                                          ├─► TickInput ─► Engine::run_tick ─► publish
//!            └─► traffic task ─────► JoinSet: fetch(segment), timeout ──┘
//! ```
//!
//! Both sources are polled as independent tasks and every call is bounded
//! by the provider timeout, so the tick waits at most one timeout for data.
//! A source that timed out or failed simply contributes nothing; the
//! affected intersections keep their last-known state and age towards
//! StaleData.
//!
//! ## Tick Outcomes
//!
//! - `Completed`: the engine ran and a new publication replaced the old one
//! - `Skipped`: a tick was already in flight (skip-if-busy)
//! - `Aborted`: every reading of one source violated the payload format; the
//!   engine is untouched and the previous publication stays servable
//!
//! Shutdown cancels in-flight polls. The engine only runs after polling has
//! finished, so a cancelled tick never leaves a partial update behind.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ecosignal_connectors::{AirQualityProvider, ProviderError, ProviderResult, TrafficProvider};
use ecosignal_core::{
    AirQualityReading, Engine, EngineConfig, SystemTime, TickInput, TimeSource, TrafficReading,
};
use log::{error, info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::error::RuntimeResult;
use crate::handle::{EngineHandle, Publication};

/// What happened to one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick number published
    Completed(u64),
    Skipped,
    /// Reason the tick was abandoned
    Aborted(String),
}

/// Tick counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriverStats {
    pub completed: u64,
    pub skipped: u64,
    pub aborted: u64,
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicU64,
    skipped: AtomicU64,
    aborted: AtomicU64,
}

/// Readings and failures collected from one source in one tick
#[derive(Debug)]
struct SourcePoll<R> {
    source: &'static str,
    readings: Vec<R>,
    failures: Vec<(String, ProviderError)>,
}

impl<R> SourcePoll<R> {
    fn new(source: &'static str) -> Self {
        Self {
            source,
            readings: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Reason to abort when nothing arrived and every failure is a format violation
    fn format_abort(&self) -> Option<String> {
        let (id, first) = self.failures.first()?;
        let all_format = self.failures.iter().all(|(_, e)| e.is_format_violation());
        (self.readings.is_empty() && all_format).then(|| {
            format!(
                "every {} reading violated the payload format (first: {id}: {first})",
                self.source
            )
        })
    }
}

enum Polled {
    Air(SourcePoll<AirQualityReading>),
    Traffic(SourcePoll<TrafficReading>),
}

/// Drives the engine on a fixed interval
pub struct TickDriver {
    engine: Mutex<Engine>,
    air_quality: Arc<dyn AirQualityProvider>,
    traffic: Arc<dyn TrafficProvider>,
    clock: Arc<dyn TimeSource>,
    locations: Arc<[String]>,
    segments: Arc<[String]>,
    interval: Duration,
    timeout: Duration,
    publisher: watch::Sender<Arc<Publication>>,
    handle: EngineHandle,
    counters: Counters,
}

impl TickDriver {
    /// Validate the configuration and build a driver on the system clock
    pub fn new(
        config: EngineConfig,
        air_quality: Arc<dyn AirQualityProvider>,
        traffic: Arc<dyn TrafficProvider>,
    ) -> RuntimeResult<Self> {
        Self::with_clock(config, air_quality, traffic, Arc::new(SystemTime))
    }

    pub fn with_clock(
        config: EngineConfig,
        air_quality: Arc<dyn AirQualityProvider>,
        traffic: Arc<dyn TrafficProvider>,
        clock: Arc<dyn TimeSource>,
    ) -> RuntimeResult<Self> {
        let locations: BTreeSet<String> = config
            .intersections
            .iter()
            .map(|i| i.location_id.clone())
            .collect();
        let segments: BTreeSet<String> = config
            .intersections
            .iter()
            .map(|i| i.segment_id.clone())
            .collect();

        let (publisher, rx) = watch::channel(Arc::new(Publication::initial(clock.now())));
        let handle = EngineHandle::new(rx, &config);
        let interval = config.tick_interval();
        let timeout = config.provider_timeout();

        Ok(Self {
            engine: Mutex::new(Engine::new(config)?),
            air_quality,
            traffic,
            clock,
            locations: locations.into_iter().collect(),
            segments: segments.into_iter().collect(),
            interval,
            timeout,
            publisher,
            handle,
            counters: Counters::default(),
        })
    }

    /// Reader of published results
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> DriverStats {
        DriverStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            aborted: self.counters.aborted.load(Ordering::Relaxed),
        }
    }

    /// Tick until `shutdown` turns true or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "Tick driver started: every {:?}, provider timeout {:?}, {} locations, {} segments",
            self.interval,
            self.timeout,
            self.locations.len(),
            self.segments.len()
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    info!("Shutdown during tick, in-flight polls cancelled");
                    break;
                }
                _ = self.tick_once() => {}
            }
        }
        info!("Tick driver stopped after {} completed ticks", self.stats().completed);
    }

    /// Poll both providers and run one engine tick
    pub async fn tick_once(&self) -> TickOutcome {
        let Ok(mut engine) = self.engine.try_lock() else {
            warn!("Tick skipped: previous tick still in flight");
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return TickOutcome::Skipped;
        };

        let (air, traffic) = self.poll().await;
        if let Some(reason) = air.format_abort().or_else(|| traffic.format_abort()) {
            error!("Tick aborted: {reason}");
            self.counters.aborted.fetch_add(1, Ordering::Relaxed);
            return TickOutcome::Aborted(reason);
        }

        let mut input = TickInput::new();
        for reading in air.readings {
            input.add_air_quality(reading);
        }
        for reading in traffic.readings {
            input.add_traffic(reading);
        }

        let report = engine.run_tick(&input, self.clock.now());
        let tick = report.tick;
        self.publisher
            .send_replace(Arc::new(Publication::completed(report)));
        self.counters.completed.fetch_add(1, Ordering::Relaxed);
        TickOutcome::Completed(tick)
    }

    async fn poll(&self) -> (SourcePoll<AirQualityReading>, SourcePoll<TrafficReading>) {
        let mut tasks = JoinSet::new();

        let provider = Arc::clone(&self.air_quality);
        let locations = Arc::clone(&self.locations);
        let polled = poll_source("air-quality", locations, self.timeout, move |id| {
            let provider = Arc::clone(&provider);
            async move { provider.fetch_air_quality(&id).await }
        });
        tasks.spawn(async move { Polled::Air(polled.await) });

        let provider = Arc::clone(&self.traffic);
        let segments = Arc::clone(&self.segments);
        let polled = poll_source("traffic", segments, self.timeout, move |id| {
            let provider = Arc::clone(&provider);
            async move { provider.fetch_traffic(&id).await }
        });
        tasks.spawn(async move { Polled::Traffic(polled.await) });

        let mut air = SourcePoll::new("air-quality");
        let mut traffic = SourcePoll::new("traffic");
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Polled::Air(poll)) => air = poll,
                Ok(Polled::Traffic(poll)) => traffic = poll,
                Err(e) => error!("Provider poll task failed: {e}"),
            }
        }
        (air, traffic)
    }
}

/// Fetch every id concurrently, each call bounded by `timeout`
async fn poll_source<R, F, Fut>(
    source: &'static str,
    ids: Arc<[String]>,
    timeout: Duration,
    fetch: F,
) -> SourcePoll<R>
where
    R: Send + 'static,
    F: Fn(String) -> Fut + Send + 'static,
    Fut: Future<Output = ProviderResult<R>> + Send + 'static,
{
    let mut calls = JoinSet::new();
    for id in ids.iter() {
        let call = fetch(id.clone());
        let id = id.clone();
        calls.spawn(async move {
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout),
            };
            (id, result)
        });
    }

    let mut poll = SourcePoll::new(source);
    while let Some(joined) = calls.join_next().await {
        match joined {
            Ok((_, Ok(reading))) => poll.readings.push(reading),
            Ok((id, Err(e))) => {
                warn!("{source} {id}: {e}");
                poll.failures.push((id, e));
            }
            Err(e) => error!("{source} fetch task failed: {e}"),
        }
    }
    poll
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also stops the driver
    let _ = shutdown.wait_for(|stop| *stop).await;
}
