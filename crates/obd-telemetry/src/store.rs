//! Live Metrics Store
//!
//! Holds the latest value of every metric. One writer applies decoded
//! updates; any number of readers observe either the whole snapshot or a
//! single metric. Each `apply` is published as one snapshot, so readers never
//! see half of a decoded line.

use crate::metric::{Metric, MetricUpdate, MetricsSnapshot};
use tokio::sync::watch;
use tracing::debug;

/// Latest-value store with whole-snapshot and per-metric subscriptions
pub struct MetricsStore {
    snapshot: watch::Sender<MetricsSnapshot>,
    per_metric: [watch::Sender<f32>; Metric::COUNT],
}

impl MetricsStore {
    /// Create a store with every metric at 0.0
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(MetricsSnapshot::new());
        Self {
            snapshot,
            per_metric: std::array::from_fn(|_| watch::channel(0.0).0),
        }
    }

    /// Apply updates in order, last write wins per metric
    ///
    /// Returns the number of metrics whose value changed. Observers are only
    /// notified when something changed.
    pub fn apply(&self, updates: &[MetricUpdate]) -> usize {
        if updates.is_empty() {
            return 0;
        }

        let mut changed = 0;
        self.snapshot.send_if_modified(|snapshot| {
            changed = snapshot.apply(updates);
            changed > 0
        });
        if changed == 0 {
            return 0;
        }

        let next = self.snapshot();
        for metric in Metric::ALL {
            let value = next.get(metric);
            self.per_metric[metric.index()].send_if_modified(|current| {
                if current.to_bits() == value.to_bits() {
                    false
                } else {
                    *current = value;
                    true
                }
            });
        }
        debug!("Applied {} updates ({} changed)", updates.len(), changed);
        changed
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.snapshot.borrow()
    }

    /// Current value of one metric
    pub fn get(&self, metric: Metric) -> f32 {
        self.snapshot.borrow().get(metric)
    }

    /// Subscribe to whole-snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<MetricsSnapshot> {
        self.snapshot.subscribe()
    }

    /// Subscribe to changes of a single metric
    pub fn watch(&self, metric: Metric) -> watch::Receiver<f32> {
        self.per_metric[metric.index()].subscribe()
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;

    #[test]
    fn test_store_starts_at_zero() {
        let store = MetricsStore::new();
        assert_eq!(store.snapshot(), MetricsSnapshot::new());
        assert_eq!(store.get(Metric::Rpm), 0.0);
    }

    #[test]
    fn test_apply_is_last_write_wins() {
        let store = MetricsStore::new();
        store.apply(&decode("850,10,87"));
        store.apply(&decode("rpm=900"));
        assert_eq!(store.get(Metric::Rpm), 900.0);
        assert_eq!(store.get(Metric::Speed), 10.0);
        assert_eq!(store.get(Metric::Coolant), 87.0);
    }

    #[test]
    fn test_apply_reports_changes() {
        let store = MetricsStore::new();
        assert_eq!(store.apply(&decode("rpm=900")), 1);
        assert_eq!(store.apply(&decode("rpm=900")), 0);
        assert_eq!(store.apply(&[]), 0);
    }

    #[tokio::test]
    async fn test_snapshot_subscriber_sees_whole_line() {
        let store = MetricsStore::new();
        let mut rx = store.subscribe();
        store.apply(&decode("850,10,87"));
        rx.changed().await.unwrap();
        let snapshot = *rx.borrow_and_update();
        assert_eq!(snapshot.get(Metric::Rpm), 850.0);
        assert_eq!(snapshot.get(Metric::Coolant), 87.0);
    }

    #[tokio::test]
    async fn test_per_metric_watch_is_selective() {
        let store = MetricsStore::new();
        let mut speed = store.watch(Metric::Speed);
        let mut coolant = store.watch(Metric::Coolant);

        store.apply(&decode("speed: 42"));
        speed.changed().await.unwrap();
        assert_eq!(*speed.borrow_and_update(), 42.0);
        assert!(!coolant.has_changed().unwrap());

        store.apply(&decode("rpm=1200"));
        assert!(!speed.has_changed().unwrap());
        assert!(!coolant.has_changed().unwrap());
    }
}
