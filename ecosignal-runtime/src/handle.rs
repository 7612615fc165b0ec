//! Read-only view of the latest completed tick
//!
//! The driver publishes one [`Publication`] per completed tick through a
//! `tokio::sync::watch` channel. Readers clone an `Arc` out of the channel
//! and never wait on the tick in progress. Aborted ticks publish nothing, so
//! the previous result stays servable together with its freshness timestamp.

use std::collections::BTreeSet;
use std::sync::Arc;

use ecosignal_core::time::age_ms;
use ecosignal_core::{
    ConflictRecord, CorridorStatus, EngineConfig, EngineError, EngineResult, IntersectionState,
    NetworkStatusSnapshot, SpeedAdvisory, StrategyDecision, TickReport, Timestamp,
};
use tokio::sync::watch;

/// Result of the last completed tick
#[derive(Debug, Clone)]
pub struct Publication {
    pub report: TickReport,
    /// When the report was produced; `None` until the first tick completes
    pub last_success_at: Option<Timestamp>,
}

impl Publication {
    /// Placeholder served before the first tick
    pub fn initial(now: Timestamp) -> Self {
        Self {
            report: TickReport::empty(now),
            last_success_at: None,
        }
    }

    pub fn completed(report: TickReport) -> Self {
        let at = report.snapshot.generated_at;
        Self {
            report,
            last_success_at: Some(at),
        }
    }
}

/// Cheap-to-clone reader of published engine output
#[derive(Debug, Clone)]
pub struct EngineHandle {
    rx: watch::Receiver<Arc<Publication>>,
    topology: Arc<Topology>,
}

#[derive(Debug)]
struct Topology {
    intersections: BTreeSet<String>,
    corridors: Vec<ecosignal_core::Corridor>,
}

impl EngineHandle {
    pub(crate) fn new(rx: watch::Receiver<Arc<Publication>>, config: &EngineConfig) -> Self {
        let topology = Topology {
            intersections: config.intersections.iter().map(|i| i.id.clone()).collect(),
            corridors: config.corridors.clone(),
        };
        Self {
            rx,
            topology: Arc::new(topology),
        }
    }

    /// The whole latest publication
    pub fn latest(&self) -> Arc<Publication> {
        Arc::clone(&self.rx.borrow())
    }

    pub fn latest_snapshot(&self) -> NetworkStatusSnapshot {
        self.latest().report.snapshot.clone()
    }

    /// Status of a configured corridor; pending until its first coordination
    pub fn corridor_status(&self, corridor_id: &str) -> EngineResult<CorridorStatus> {
        let corridor = self
            .topology
            .corridors
            .iter()
            .find(|c| c.id == corridor_id)
            .ok_or_else(|| EngineError::UnknownCorridor(corridor_id.to_string()))?;

        let latest = self.latest();
        Ok(latest
            .report
            .snapshot
            .corridor(corridor_id)
            .cloned()
            .unwrap_or_else(|| CorridorStatus::pending(corridor, latest.report.snapshot.generated_at)))
    }

    /// State of a configured intersection; `None` until it has been observed
    pub fn intersection_state(&self, intersection_id: &str) -> EngineResult<Option<IntersectionState>> {
        if !self.topology.intersections.contains(intersection_id) {
            return Err(EngineError::UnknownIntersection(intersection_id.to_string()));
        }
        Ok(self.latest().report.states.get(intersection_id).cloned())
    }

    pub fn decisions(&self) -> Vec<StrategyDecision> {
        self.latest().report.decisions.clone()
    }

    pub fn conflicts(&self) -> Vec<ConflictRecord> {
        self.latest().report.conflicts.clone()
    }

    pub fn speed_advisories(&self) -> Vec<SpeedAdvisory> {
        self.latest().report.advisories.clone()
    }

    pub fn last_success_at(&self) -> Option<Timestamp> {
        self.rx.borrow().last_success_at
    }

    /// Milliseconds since the last completed tick
    pub fn freshness_ms(&self, now: Timestamp) -> Option<u64> {
        self.last_success_at().map(|at| age_ms(at, now))
    }

    /// Completed ticks so far
    pub fn tick(&self) -> u64 {
        self.rx.borrow().report.tick
    }

    /// Wait for the next publication; `false` once the driver is gone
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecosignal_core::{Corridor, IntersectionConfig};

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_intersection(IntersectionConfig::new("A", "A", "loc", "s1"))
            .with_intersection(IntersectionConfig::new("B", "B", "loc", "s2"))
            .with_corridor(Corridor::new("ab", ["A", "B"], [0.0, 300.0], 36.0))
    }

    #[test]
    fn serves_placeholder_before_first_tick() {
        let (_tx, rx) = watch::channel(Arc::new(Publication::initial(5_000)));
        let handle = EngineHandle::new(rx, &config());

        assert_eq!(handle.last_success_at(), None);
        assert_eq!(handle.freshness_ms(9_000), None);
        assert!(handle.latest_snapshot().no_data);
        assert_eq!(handle.intersection_state("A").unwrap(), None);
        assert!(handle.decisions().is_empty());

        let pending = handle.corridor_status("ab").unwrap();
        assert!(pending.offsets.is_empty());
        assert_eq!(pending.computed_at, 5_000);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let (_tx, rx) = watch::channel(Arc::new(Publication::initial(0)));
        let handle = EngineHandle::new(rx, &config());

        assert_eq!(
            handle.corridor_status("ring-road").unwrap_err(),
            EngineError::UnknownCorridor("ring-road".into())
        );
        assert_eq!(
            handle.intersection_state("Z").unwrap_err(),
            EngineError::UnknownIntersection("Z".into())
        );
    }

    #[tokio::test]
    async fn sees_new_publications() {
        let (tx, rx) = watch::channel(Arc::new(Publication::initial(0)));
        let mut handle = EngineHandle::new(rx, &config());

        let mut report = TickReport::empty(60_000);
        report.tick = 1;
        tx.send_replace(Arc::new(Publication::completed(report)));

        assert!(handle.changed().await);
        assert_eq!(handle.tick(), 1);
        assert_eq!(handle.last_success_at(), Some(60_000));
        assert_eq!(handle.freshness_ms(75_000), Some(15_000));

        drop(tx);
        assert!(!handle.changed().await);
    }
}
