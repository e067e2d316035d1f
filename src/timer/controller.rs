use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch, Mutex},
    task::JoinHandle,
    time::{self, Duration, Interval, MissedTickBehavior},
};

use crate::{
    alerts::{Alert, AlertEngine, ManualOutcome, NotificationPermission, Priority},
    audio::{ClipId, SoundPlayer},
    db::Database,
    models::{DetectionEvent, Session},
};

use super::state::{SessionTracker, TrackerEffect, TrackerEvent, TrackerState};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const ALERT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub state: TrackerState,
    /// Most recent first.
    pub sessions: Vec<Session>,
    pub suppressed_duplicates: u64,
    pub last_alert_at: Option<DateTime<Utc>>,
    pub permission: NotificationPermission,
}

pub enum TrackerCommand {
    Presence {
        present: bool,
        sampled_at: DateTime<Utc>,
    },
    Tick {
        at: DateTime<Utc>,
    },
    Suspend {
        at: DateTime<Utc>,
    },
    Resume {
        at: DateTime<Utc>,
    },
    SetMonitoring {
        active: bool,
        at: DateTime<Utc>,
    },
    SetDetection {
        active: bool,
        at: DateTime<Utc>,
    },
    ManualAlert {
        priority: Priority,
        at: DateTime<Utc>,
        reply: oneshot::Sender<ManualOutcome>,
    },
    ClearHistory,
    Snapshot(oneshot::Sender<TrackerSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the task that owns the tracker and the alert engine. Every
/// signal goes through one queue, so transitions never interleave.
#[derive(Clone)]
pub struct TrackerController {
    commands: mpsc::UnboundedSender<TrackerCommand>,
    elapsed_rx: watch::Receiver<f64>,
    sessions_rx: watch::Receiver<Vec<Session>>,
    alerts_tx: broadcast::Sender<Alert>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TrackerController {
    /// Spawn the owner task. With `tick_interval` set, elapsed time is driven
    /// from the wall clock while a session is open; without it the caller
    /// sends [`TrackerController::tick`] itself.
    pub fn spawn(
        tracker: SessionTracker,
        alerts: AlertEngine,
        sound: Arc<dyn SoundPlayer>,
        db: Option<Database>,
        tick_interval: Option<Duration>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (elapsed_tx, elapsed_rx) = watch::channel(tracker.state().elapsed_secs);
        let (sessions_tx, sessions_rx) = watch::channel(tracker.store().all());
        let (alerts_tx, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);

        let worker = Worker {
            tracker,
            alerts,
            sound,
            db,
            elapsed_tx,
            sessions_tx,
            alerts_tx: alerts_tx.clone(),
        };
        let handle = tokio::spawn(worker.run(command_rx, tick_interval));

        Self {
            commands,
            elapsed_rx,
            sessions_rx,
            alerts_tx,
            worker: Arc::new(Mutex::new(Some(handle))),
        }
    }

    pub fn presence(&self, present: bool, sampled_at: DateTime<Utc>) -> Result<()> {
        self.send(TrackerCommand::Presence {
            present,
            sampled_at,
        })
    }

    pub fn tick(&self, at: DateTime<Utc>) -> Result<()> {
        self.send(TrackerCommand::Tick { at })
    }

    pub fn suspend(&self, at: DateTime<Utc>) -> Result<()> {
        self.send(TrackerCommand::Suspend { at })
    }

    pub fn resume(&self, at: DateTime<Utc>) -> Result<()> {
        self.send(TrackerCommand::Resume { at })
    }

    pub fn set_monitoring(&self, active: bool, at: DateTime<Utc>) -> Result<()> {
        self.send(TrackerCommand::SetMonitoring { active, at })
    }

    pub fn set_detection(&self, active: bool, at: DateTime<Utc>) -> Result<()> {
        self.send(TrackerCommand::SetDetection { active, at })
    }

    pub fn clear_history(&self) -> Result<()> {
        self.send(TrackerCommand::ClearHistory)
    }

    pub async fn trigger_manual(&self, priority: Priority, at: DateTime<Utc>) -> Result<ManualOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(TrackerCommand::ManualAlert { priority, at, reply })?;
        rx.await.map_err(|_| anyhow!("tracker task dropped the manual alert request"))
    }

    pub async fn snapshot(&self) -> Result<TrackerSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(TrackerCommand::Snapshot(reply))?;
        rx.await.map_err(|_| anyhow!("tracker task dropped the snapshot request"))
    }

    /// Close any open session, flush it, and stop the owner task.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self.send(TrackerCommand::Shutdown(reply)).is_ok() {
            let _ = rx.await;
        }
        if let Some(handle) = self.worker.lock().await.take() {
            handle
                .await
                .map_err(|err| anyhow!("tracker task failed to join: {err}"))?;
        }
        Ok(())
    }

    /// Live elapsed seconds of the open session.
    pub fn elapsed(&self) -> watch::Receiver<f64> {
        self.elapsed_rx.clone()
    }

    /// Session history in insertion order, updated after every change.
    pub fn sessions(&self) -> watch::Receiver<Vec<Session>> {
        self.sessions_rx.clone()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts_tx.subscribe()
    }

    fn send(&self, command: TrackerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("tracker task has stopped"))
    }
}

struct Worker {
    tracker: SessionTracker,
    alerts: AlertEngine,
    sound: Arc<dyn SoundPlayer>,
    db: Option<Database>,
    elapsed_tx: watch::Sender<f64>,
    sessions_tx: watch::Sender<Vec<Session>>,
    alerts_tx: broadcast::Sender<Alert>,
}

impl Worker {
    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<TrackerCommand>,
        tick_interval: Option<Duration>,
    ) {
        let mut ticker = tick_interval.map(|period| {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let ticking = ticker.is_some() && self.tracker.state().wants_ticks();
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(TrackerCommand::Shutdown(reply)) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                _ = next_tick(&mut ticker), if ticking => {
                    let at = Utc::now();
                    self.apply(TrackerEvent::Tick { at }, at).await;
                }
            }
        }

        log_info!("tracker task stopped");
    }

    async fn handle_command(&mut self, command: TrackerCommand) {
        match command {
            TrackerCommand::Presence {
                present,
                sampled_at,
            } => {
                self.apply(
                    TrackerEvent::Presence {
                        present,
                        at: sampled_at,
                    },
                    sampled_at,
                )
                .await
            }
            TrackerCommand::Tick { at } => self.apply(TrackerEvent::Tick { at }, at).await,
            TrackerCommand::Suspend { at } => self.apply(TrackerEvent::Suspend { at }, at).await,
            TrackerCommand::Resume { at } => self.apply(TrackerEvent::Resume { at }, at).await,
            TrackerCommand::SetMonitoring { active, at } => {
                self.apply(TrackerEvent::SetMonitoring { active, at }, at).await
            }
            TrackerCommand::SetDetection { active, at } => {
                self.apply(TrackerEvent::SetDetection { active, at }, at).await
            }
            TrackerCommand::ManualAlert { priority, at, reply } => {
                let outcome = self.alerts.trigger_manual(priority, at);
                if let ManualOutcome::Fired(alert) = &outcome {
                    let _ = self.alerts_tx.send(alert.clone());
                }
                let _ = reply.send(outcome);
            }
            TrackerCommand::ClearHistory => {
                self.apply(TrackerEvent::ClearHistory, Utc::now()).await
            }
            TrackerCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            TrackerCommand::Shutdown(_) => {}
        }
    }

    fn snapshot(&self) -> TrackerSnapshot {
        let store = self.tracker.store();
        TrackerSnapshot {
            state: self.tracker.state().clone(),
            sessions: store.recent_first(),
            suppressed_duplicates: store.suppressed_duplicates(),
            last_alert_at: self.alerts.last_alert_at(),
            permission: self.alerts.permission(),
        }
    }

    async fn shutdown(&mut self) {
        let at = Utc::now();
        self.apply(TrackerEvent::SetMonitoring { active: false, at }, at)
            .await;
    }

    async fn apply(&mut self, event: TrackerEvent, now: DateTime<Utc>) {
        for effect in self.tracker.handle(event) {
            self.execute(effect, now).await;
        }
    }

    async fn execute(&mut self, effect: TrackerEffect, now: DateTime<Utc>) {
        match effect {
            TrackerEffect::SessionOpened { started_at } => {
                log_info!("session opened at {started_at}");
            }
            TrackerEffect::ElapsedChanged(elapsed_secs) => {
                self.elapsed_tx.send_replace(elapsed_secs);
                let active = self.tracker.state().is_active();
                if let Some(alert) = self.alerts.evaluate(elapsed_secs, active, now) {
                    let _ = self.alerts_tx.send(alert);
                }
            }
            TrackerEffect::SessionRecorded(session) => {
                log_info!(
                    "session {} recorded ({:.1}s)",
                    session.id,
                    session.duration_secs
                );
            }
            TrackerEffect::SessionDiscarded {
                duration_secs,
                reason,
            } => {
                log_info!("session discarded after {duration_secs:.1}s ({reason:?})");
            }
            TrackerEffect::DuplicateSuppressed(session) => {
                log_warn!(
                    "duplicate session {} suppressed ({} total)",
                    session.id,
                    self.tracker.store().suppressed_duplicates()
                );
            }
            TrackerEffect::PersistSessions(snapshot) => {
                self.sessions_tx.send_replace(snapshot.clone());
                if let Some(db) = &self.db {
                    if let Err(err) = db.replace_sessions(snapshot).await {
                        log_error!("failed to persist sessions: {err:?}");
                    }
                }
            }
            TrackerEffect::PresenceChanged { present, at } => {
                let clip = if present {
                    ClipId::Connected
                } else {
                    ClipId::Disconnected
                };
                if let Err(err) = self.sound.play(clip) {
                    log_warn!("failed to play {} sound: {err}", clip.as_str());
                }
                if present {
                    if let Some(db) = &self.db {
                        if let Err(err) = db.insert_detection_event(&DetectionEvent::new(at)).await {
                            log_error!("failed to record detection event: {err:?}");
                        }
                    }
                }
            }
            TrackerEffect::HistoryCleared => {
                log_info!("session history cleared");
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
