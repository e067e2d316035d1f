use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use facefocus::{
    alerts::{Alert, AlertConfig, AlertEngine, LogNotifier, Priority},
    audio::{ClipId, SilentPlayer, SoundPlayer},
    db::Database,
    timer::{
        SessionStore, SessionTracker, TrackerConfig, TrackerController, TrackerEffect,
        TrackerEvent,
    },
};
use tempfile::tempdir;

#[derive(Default)]
struct CountingPlayer {
    clips: Mutex<Vec<ClipId>>,
}

impl SoundPlayer for CountingPlayer {
    fn play(&self, clip: ClipId) -> Result<(), String> {
        self.clips.lock().unwrap().push(clip);
        Ok(())
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
}

fn engine(sound: Arc<dyn SoundPlayer>) -> AlertEngine {
    AlertEngine::new(
        AlertConfig::two_tier(300.0, 1800.0, 600.0),
        Arc::new(LogNotifier::new()),
        sound,
    )
    .unwrap()
}

#[test]
fn two_minute_session_through_the_state_machine() {
    let mut tracker = SessionTracker::new(TrackerConfig::default(), SessionStore::new());
    let mut alerts = engine(Arc::new(SilentPlayer));
    let mut fired: Vec<Alert> = Vec::new();

    let mut drive = |tracker: &mut SessionTracker, event: TrackerEvent, now: DateTime<Utc>| {
        for effect in tracker.handle(event) {
            if let TrackerEffect::ElapsedChanged(elapsed) = effect {
                let active = tracker.state().is_active();
                fired.extend(alerts.evaluate(elapsed, active, now));
            }
        }
    };

    drive(&mut tracker, TrackerEvent::Presence { present: true, at: t0() }, t0());
    for step in 1..=1253 {
        let at = t0() + Duration::milliseconds(step * 100);
        drive(&mut tracker, TrackerEvent::Tick { at }, at);
    }
    let end = t0() + Duration::milliseconds(125_400);
    drive(&mut tracker, TrackerEvent::Presence { present: false, at: end }, end);

    let sessions = tracker.store().all();
    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert_eq!(session.started_at, t0());
    assert_eq!(session.ended_at, end);
    assert!((session.duration_secs - 125.4).abs() < 1e-6);
    assert!(session.duration_secs > 0.5);

    assert!(fired.iter().all(|alert| alert.priority != Priority::High));
    assert!(!tracker.state().is_active());
    assert_eq!(tracker.state().elapsed_secs, 0.0);
}

#[tokio::test]
async fn two_minute_session_through_the_controller() {
    let dir = tempdir().unwrap();
    let db = Database::new(dir.path().join("facefocus.sqlite3")).unwrap();
    let player = Arc::new(CountingPlayer::default());

    let controller = TrackerController::spawn(
        SessionTracker::new(TrackerConfig::default(), SessionStore::new()),
        engine(player.clone()),
        player.clone(),
        Some(db.clone()),
        None,
    );
    let mut alerts = controller.subscribe_alerts();

    controller.presence(true, t0()).unwrap();
    for step in 1..=1253 {
        controller.tick(t0() + Duration::milliseconds(step * 100)).unwrap();
    }
    controller
        .presence(false, t0() + Duration::milliseconds(125_400))
        .unwrap();

    let snapshot = controller.snapshot().await.unwrap();
    assert_eq!(snapshot.sessions.len(), 1);
    assert!((snapshot.sessions[0].duration_secs - 125.4).abs() < 1e-6);
    assert_eq!(snapshot.suppressed_duplicates, 0);

    let mut high = 0;
    while let Ok(alert) = alerts.try_recv() {
        if alert.priority == Priority::High {
            high += 1;
        }
    }
    assert_eq!(high, 0);

    {
        let clips = player.clips.lock().unwrap();
        assert_eq!(clips.first(), Some(&ClipId::Connected));
        assert_eq!(clips.last(), Some(&ClipId::Disconnected));
        assert!(!clips.contains(&ClipId::HighAlarm));
    }

    controller.shutdown().await.unwrap();

    // A restart picks the history back up.
    let reloaded = SessionStore::from_sessions(db.list_sessions().await.unwrap());
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.all(), snapshot.sessions);
}

#[test]
fn blips_and_duplicates_never_reach_history() {
    let mut tracker = SessionTracker::new(TrackerConfig::default(), SessionStore::new());

    tracker.handle(TrackerEvent::Presence { present: true, at: t0() });
    tracker.handle(TrackerEvent::Presence {
        present: false,
        at: t0() + Duration::milliseconds(300),
    });
    assert!(tracker.store().is_empty());

    let mut store = tracker.store().clone();
    let start = t0() + Duration::seconds(1);
    let session = facefocus::models::Session::new(1, start, start + Duration::seconds(1));
    store.append(session.clone());
    store.append(session);
    assert_eq!(store.len(), 1);
    assert_eq!(store.suppressed_duplicates(), 1);
}
