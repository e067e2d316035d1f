use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::models::{seconds_between, Session, MIN_SESSION_DURATION_SECS};

use super::store::{AppendOutcome, SessionStore};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TrackerPhase {
    #[default]
    Idle,
    Active,
}

/// What happens to an open session when the host stops monitoring or detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum StopPolicy {
    #[default]
    Close,
    Discard,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DiscardReason {
    TooShort,
    StoppedByHost,
}

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    /// Keep ingesting presence samples while the host is suspended.
    pub background_detection: bool,
    pub stop_policy: StopPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            background_detection: true,
            stop_policy: StopPolicy::Close,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    pub phase: TrackerPhase,
    pub open_started_at: Option<DateTime<Utc>>,
    pub elapsed_secs: f64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub monitoring_active: bool,
    pub detection_active: bool,
    /// Last presence value accepted, used for connect/disconnect edges.
    pub last_presence: bool,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            phase: TrackerPhase::Idle,
            open_started_at: None,
            elapsed_secs: 0.0,
            last_tick_at: None,
            suspended_at: None,
            monitoring_active: true,
            detection_active: true,
            last_presence: false,
        }
    }
}

impl TrackerState {
    pub fn is_active(&self) -> bool {
        self.phase == TrackerPhase::Active
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }

    /// Whether the periodic tick should currently be driven.
    pub fn wants_ticks(&self) -> bool {
        self.is_active() && !self.is_suspended()
    }

    fn accepts_samples(&self, config: &TrackerConfig) -> bool {
        self.monitoring_active
            && self.detection_active
            && (config.background_detection || !self.is_suspended())
    }

    fn open(&mut self, at: DateTime<Utc>) {
        self.phase = TrackerPhase::Active;
        self.open_started_at = Some(at);
        self.elapsed_secs = 0.0;
        self.last_tick_at = Some(at);
    }

    /// Fold wall-clock time since the last tick into `elapsed_secs`.
    /// Backward clock jumps contribute nothing.
    fn advance(&mut self, at: DateTime<Utc>) {
        let Some(last) = self.last_tick_at else {
            self.last_tick_at = Some(at);
            return;
        };

        let delta = seconds_between(last, at);
        if delta < 0.0 {
            warn!("Clock moved backwards by {:.3}s; clamping tick delta to zero", -delta);
            return;
        }
        self.elapsed_secs += delta;
        self.last_tick_at = Some(at);
    }

    fn reset(&mut self) {
        self.phase = TrackerPhase::Idle;
        self.open_started_at = None;
        self.elapsed_secs = 0.0;
        self.last_tick_at = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackerEvent {
    Presence { present: bool, at: DateTime<Utc> },
    Tick { at: DateTime<Utc> },
    Suspend { at: DateTime<Utc> },
    Resume { at: DateTime<Utc> },
    SetMonitoring { active: bool, at: DateTime<Utc> },
    SetDetection { active: bool, at: DateTime<Utc> },
    ClearHistory,
}

/// Work for the caller to carry out after a transition commits.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEffect {
    SessionOpened { started_at: DateTime<Utc> },
    ElapsedChanged(f64),
    SessionRecorded(Session),
    SessionDiscarded { duration_secs: f64, reason: DiscardReason },
    DuplicateSuppressed(Session),
    PersistSessions(Vec<Session>),
    PresenceChanged { present: bool, at: DateTime<Utc> },
    HistoryCleared,
}

/// Turns presence samples into sessions. Sole writer of tracker state and of
/// the session store.
#[derive(Debug)]
pub struct SessionTracker {
    state: TrackerState,
    store: SessionStore,
    config: TrackerConfig,
    last_session_id: i64,
}

impl SessionTracker {
    pub fn new(config: TrackerConfig, store: SessionStore) -> Self {
        let last_session_id = store.max_id().unwrap_or(0);
        Self {
            state: TrackerState::default(),
            store,
            config,
            last_session_id,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn handle(&mut self, event: TrackerEvent) -> Vec<TrackerEffect> {
        let mut effects = Vec::new();
        match event {
            TrackerEvent::Presence { present, at } => self.on_presence(present, at, &mut effects),
            TrackerEvent::Tick { at } => {
                if self.state.wants_ticks() {
                    self.state.advance(at);
                    effects.push(TrackerEffect::ElapsedChanged(self.state.elapsed_secs));
                }
            }
            TrackerEvent::Suspend { at } => {
                if self.state.is_suspended() {
                    return effects;
                }
                if self.state.is_active() {
                    self.state.advance(at);
                    effects.push(TrackerEffect::ElapsedChanged(self.state.elapsed_secs));
                }
                self.state.suspended_at = Some(at);
            }
            TrackerEvent::Resume { at } => {
                let Some(suspended_at) = self.state.suspended_at.take() else {
                    return effects;
                };
                if self.state.is_active() {
                    debug!(
                        "Resumed after {:.1}s suspended; folding gap into elapsed time",
                        seconds_between(suspended_at, at).max(0.0)
                    );
                    self.state.advance(at);
                    effects.push(TrackerEffect::ElapsedChanged(self.state.elapsed_secs));
                }
            }
            TrackerEvent::SetMonitoring { active, at } => {
                if !active {
                    self.stop_by_host(at, &mut effects);
                }
                self.state.monitoring_active = active;
            }
            TrackerEvent::SetDetection { active, at } => {
                if !active {
                    self.stop_by_host(at, &mut effects);
                }
                self.state.detection_active = active;
            }
            TrackerEvent::ClearHistory => {
                self.store.clear();
                effects.push(TrackerEffect::HistoryCleared);
                effects.push(TrackerEffect::PersistSessions(self.store.all()));
            }
        }
        effects
    }

    fn on_presence(&mut self, present: bool, at: DateTime<Utc>, effects: &mut Vec<TrackerEffect>) {
        if !self.state.accepts_samples(&self.config) {
            return;
        }

        if present != self.state.last_presence {
            self.state.last_presence = present;
            effects.push(TrackerEffect::PresenceChanged { present, at });
        }

        match (present, self.state.phase) {
            (true, TrackerPhase::Idle) => {
                self.state.open(at);
                effects.push(TrackerEffect::SessionOpened { started_at: at });
                effects.push(TrackerEffect::ElapsedChanged(0.0));
            }
            (false, TrackerPhase::Active) => self.close(at, effects),
            // Repeated presence while open, or absence while idle.
            _ => {}
        }
    }

    fn stop_by_host(&mut self, at: DateTime<Utc>, effects: &mut Vec<TrackerEffect>) {
        self.state.last_presence = false;
        if !self.state.is_active() {
            return;
        }

        match self.config.stop_policy {
            StopPolicy::Close => self.close(at, effects),
            StopPolicy::Discard => {
                let duration_secs = self.open_duration(at);
                self.state.reset();
                effects.push(TrackerEffect::SessionDiscarded {
                    duration_secs,
                    reason: DiscardReason::StoppedByHost,
                });
                effects.push(TrackerEffect::ElapsedChanged(0.0));
            }
        }
    }

    fn open_duration(&self, at: DateTime<Utc>) -> f64 {
        self.state
            .open_started_at
            .map(|start| seconds_between(start, at).max(0.0))
            .unwrap_or(0.0)
    }

    fn close(&mut self, at: DateTime<Utc>, effects: &mut Vec<TrackerEffect>) {
        if let Some(started_at) = self.state.open_started_at {
            let ended_at = if at < started_at {
                warn!("Session end precedes its start; clamping to start");
                started_at
            } else {
                at
            };
            let duration_secs = seconds_between(started_at, ended_at);

            if duration_secs > MIN_SESSION_DURATION_SECS {
                let id = self.next_session_id(ended_at);
                let session = Session::new(id, started_at, ended_at);
                match self.store.append(session.clone()) {
                    AppendOutcome::Inserted => {
                        effects.push(TrackerEffect::SessionRecorded(session));
                        effects.push(TrackerEffect::PersistSessions(self.store.all()));
                    }
                    AppendOutcome::Duplicate => {
                        effects.push(TrackerEffect::DuplicateSuppressed(session));
                    }
                    AppendOutcome::Rejected => {}
                }
            } else {
                debug!("Session too short ({duration_secs:.1}s); not recording");
                effects.push(TrackerEffect::SessionDiscarded {
                    duration_secs,
                    reason: DiscardReason::TooShort,
                });
            }
        }

        self.state.reset();
        effects.push(TrackerEffect::ElapsedChanged(0.0));
    }

    /// Millisecond timestamp of the closing instant, bumped past the last id
    /// so two closures in the same millisecond still differ.
    fn next_session_id(&mut self, ended_at: DateTime<Utc>) -> i64 {
        let id = ended_at
            .timestamp_millis()
            .max(self.last_session_id.saturating_add(1));
        self.last_session_id = id;
        id
    }
}
