use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::sampling::domain::dashboard_snapshot::DashboardSnapshot;

type Slot = Arc<Mutex<Option<DashboardSnapshot>>>;

/// Creates a connected publisher/subscriber pair with latest-value
/// semantics: a publish replaces any snapshot the subscriber has not taken
/// yet, so a slow reader always catches up to the current state.
pub fn snapshot_feed() -> (SnapshotPublisher, SnapshotSubscriber) {
    let slot: Slot = Arc::new(Mutex::new(None));
    let (notify_tx, notify_rx) = crossbeam_channel::bounded(1);
    (
        SnapshotPublisher {
            slot: slot.clone(),
            notify: notify_tx,
        },
        SnapshotSubscriber {
            slot,
            notify: notify_rx,
        },
    )
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<DashboardSnapshot>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Loop-side end of a snapshot feed.
pub struct SnapshotPublisher {
    slot: Slot,
    notify: Sender<()>,
}

impl SnapshotPublisher {
    /// Replaces the pending snapshot. Returns `false` once the subscriber
    /// has been dropped.
    pub fn publish(&self, snapshot: DashboardSnapshot) -> bool {
        *lock(&self.slot) = Some(snapshot);
        match self.notify.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// Reader-side end of a snapshot feed.
pub struct SnapshotSubscriber {
    slot: Slot,
    notify: Receiver<()>,
}

impl SnapshotSubscriber {
    /// Takes the newest unread snapshot, if any.
    pub fn try_recv(&self) -> Option<DashboardSnapshot> {
        lock(&self.slot).take()
    }

    /// Waits up to `timeout` for a snapshot newer than the last one taken.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<DashboardSnapshot, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(snapshot) = self.try_recv() {
                return Ok(snapshot);
            }
            let left = deadline.saturating_duration_since(Instant::now());
            // A notification whose snapshot was already taken wakes us with
            // an empty slot; wait again.
            self.notify.recv_timeout(left)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::domain::dashboard_snapshot::CameraStatus;
    use crate::sampling::domain::sampling_loop::SamplingLoop;

    fn snapshot(ticks_started: u64) -> DashboardSnapshot {
        DashboardSnapshot {
            ticks_started,
            ..SamplingLoop::new().snapshot()
        }
    }

    #[test]
    fn test_reader_sees_only_the_newest() {
        let (publisher, subscriber) = snapshot_feed();
        for i in 0..100 {
            assert!(publisher.publish(snapshot(i)));
        }
        let got = subscriber.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(got.ticks_started, 99);
        assert!(subscriber.try_recv().is_none());
    }

    #[test]
    fn test_times_out_when_nothing_new() {
        let (publisher, subscriber) = snapshot_feed();
        publisher.publish(snapshot(1));
        subscriber.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(
            subscriber.recv_timeout(Duration::from_millis(20)),
            Err(RecvTimeoutError::Timeout)
        );
    }

    #[test]
    fn test_try_recv_leaves_stale_notification_harmless() {
        let (publisher, subscriber) = snapshot_feed();
        publisher.publish(snapshot(1));
        assert_eq!(subscriber.try_recv().unwrap().ticks_started, 1);
        assert!(subscriber.recv_timeout(Duration::from_millis(20)).is_err());

        publisher.publish(DashboardSnapshot {
            camera: CameraStatus::Active,
            ..snapshot(2)
        });
        let got = subscriber.recv_timeout(Duration::from_millis(20)).unwrap();
        assert_eq!(got.camera, CameraStatus::Active);
    }

    #[test]
    fn test_wakes_on_publish_from_another_thread() {
        let (publisher, subscriber) = snapshot_feed();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            publisher.publish(snapshot(7));
            publisher
        });
        let got = subscriber.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(got.ticks_started, 7);
        t.join().unwrap();
    }

    #[test]
    fn test_publish_reports_dropped_subscriber() {
        let (publisher, subscriber) = snapshot_feed();
        drop(subscriber);
        assert!(!publisher.publish(snapshot(1)));
    }

    #[test]
    fn test_disconnected_when_publisher_gone_and_nothing_pending() {
        let (publisher, subscriber) = snapshot_feed();
        drop(publisher);
        assert_eq!(
            subscriber.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Disconnected)
        );
    }
}
