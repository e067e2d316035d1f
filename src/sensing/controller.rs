use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::timer::TrackerController;

use super::detector::FaceDetector;
use super::loop_worker::{sensing_loop, SharedDetector};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Owns the polling task that feeds detector readings to the tracker.
pub struct SensingController {
    detector: SharedDetector,
    poll_interval: Duration,
    detect_timeout: Duration,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SensingController {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self {
            detector: Arc::new(Mutex::new(detector)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            detect_timeout: DEFAULT_DETECT_TIMEOUT,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn with_timing(mut self, poll_interval: Duration, detect_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.detect_timeout = detect_timeout;
        self
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start_sensing(&mut self, tracker: TrackerController) -> Result<()> {
        if self.handle.is_some() {
            bail!("sensing already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sensing_loop(
            Arc::clone(&self.detector),
            tracker,
            self.poll_interval,
            self.detect_timeout,
            cancel_token.clone(),
        ));

        info!(
            "Sensing started (every {}ms, timeout {}ms)",
            self.poll_interval.as_millis(),
            self.detect_timeout.as_millis()
        );
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop_sensing(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sensing loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertConfig, AlertEngine, LogNotifier};
    use crate::audio::{ClipId, SilentPlayer, SoundPlayer};
    use crate::timer::{SessionStore, SessionTracker, TrackerConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedDetector {
        calls: Arc<AtomicUsize>,
    }

    impl FaceDetector for ScriptedDetector {
        fn estimate_faces(&mut self) -> Result<usize> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 1 {
                anyhow::bail!("camera unavailable");
            }
            Ok(1)
        }
    }

    /// Sees a face once, then hangs past any reasonable timeout.
    struct StallingDetector {
        calls: Arc<AtomicUsize>,
        stall: Duration,
    }

    impl FaceDetector for StallingDetector {
        fn estimate_faces(&mut self) -> Result<usize> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                std::thread::sleep(self.stall);
            }
            Ok(1)
        }
    }

    #[derive(Default)]
    struct RecordingPlayer {
        played: Mutex<Vec<ClipId>>,
    }

    impl RecordingPlayer {
        fn played(&self) -> Vec<ClipId> {
            self.played.lock().unwrap().clone()
        }
    }

    impl SoundPlayer for RecordingPlayer {
        fn play(&self, clip: ClipId) -> Result<(), String> {
            self.played.lock().unwrap().push(clip);
            Ok(())
        }
    }

    fn controller(sound: Arc<RecordingPlayer>) -> TrackerController {
        let engine = AlertEngine::new(
            AlertConfig::default(),
            Arc::new(LogNotifier::new()),
            Arc::new(SilentPlayer),
        )
        .unwrap();
        TrackerController::spawn(
            SessionTracker::new(TrackerConfig::default(), SessionStore::new()),
            engine,
            sound,
            None,
            None,
        )
    }

    #[tokio::test]
    async fn polls_detector_until_stopped() {
        let sound = Arc::new(RecordingPlayer::default());
        let tracker = controller(Arc::clone(&sound));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut sensing = SensingController::new(Box::new(ScriptedDetector {
            calls: Arc::clone(&calls),
        }))
        .with_timing(Duration::from_millis(10), Duration::from_millis(500));

        sensing.start_sensing(tracker.clone()).unwrap();
        assert!(sensing.start_sensing(tracker.clone()).is_err());

        while calls.load(Ordering::SeqCst) < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        sensing.stop_sensing().await.unwrap();
        assert!(!sensing.is_running());

        let snapshot = tracker.snapshot().await.unwrap();
        assert!(snapshot.state.last_presence);
        assert!(snapshot.state.is_active());

        // The failed reading counted as absent: present, gone, back again.
        assert_eq!(
            sound.played()[..3],
            [ClipId::Connected, ClipId::Disconnected, ClipId::Connected]
        );
        tracker.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn stalled_detector_counts_as_absent() {
        let sound = Arc::new(RecordingPlayer::default());
        let tracker = controller(Arc::clone(&sound));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut sensing = SensingController::new(Box::new(StallingDetector {
            calls: Arc::clone(&calls),
            stall: Duration::from_millis(200),
        }))
        .with_timing(Duration::from_millis(10), Duration::from_millis(20));

        sensing.start_sensing(tracker.clone()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !sound.played().contains(&ClipId::Disconnected) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed-out detection never closed the session");
        sensing.stop_sensing().await.unwrap();

        let snapshot = tracker.snapshot().await.unwrap();
        assert!(!snapshot.state.last_presence);
        assert!(!snapshot.state.is_active());
        assert_eq!(sound.played(), vec![ClipId::Connected, ClipId::Disconnected]);
        tracker.shutdown().await.unwrap();
    }
}
