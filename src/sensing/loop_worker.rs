use std::sync::{Arc, Mutex, TryLockError};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::timer::TrackerController;

use super::detector::{FaceDetector, PresenceSample};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub(crate) type SharedDetector = Arc<Mutex<Box<dyn FaceDetector>>>;

pub async fn sensing_loop(
    detector: SharedDetector,
    tracker: TrackerController,
    poll_interval: Duration,
    detect_timeout: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let sampled_at = Utc::now();
                let faces = match tokio::time::timeout(detect_timeout, detect(Arc::clone(&detector))).await {
                    Ok(Ok(faces)) => faces,
                    Ok(Err(err)) => {
                        log_warn!("face detection failed: {err:?}");
                        0
                    }
                    Err(_) => {
                        log_warn!("face detection timed out (> {}ms)", detect_timeout.as_millis());
                        0
                    }
                };

                let sample = PresenceSample::from_face_count(faces, sampled_at);
                log_debug!("{faces} face(s) at {sampled_at}");
                if let Err(err) = tracker.presence(sample.present, sample.sampled_at) {
                    log_error!("dropping presence sample: {err}");
                    break;
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("sensing loop shutting down");
                break;
            }
        }
    }
}

async fn detect(detector: SharedDetector) -> Result<usize> {
    tokio::task::spawn_blocking(move || {
        // A detector still stuck on a timed-out call keeps the lock; skip this round.
        let mut guard = match detector.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(anyhow!("detector busy")),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        guard.estimate_faces()
    })
    .await
    .context("detector worker join failed")?
}
