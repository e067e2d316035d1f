use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::audio::{ClipId, SoundPlayer};
use crate::models::seconds_between;

use super::copy::message_for;
use super::notifier::{NotificationPermission, Notifier};
use super::policy::{select_tier, AlertConfig, AlertKind, ConfigError, Priority};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub priority: Priority,
    pub kind: AlertKind,
    pub title: String,
    pub body: String,
    pub fired_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub sound_played: bool,
    pub notified: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManualOutcome {
    Fired(Alert),
    CoolingDown { remaining_secs: f64 },
}

/// Decides when break reminders fire and hands them to the injected
/// notifier and sound player.
pub struct AlertEngine {
    config: AlertConfig,
    notifier: Arc<dyn Notifier>,
    sound: Arc<dyn SoundPlayer>,
    last_alert_at: Option<DateTime<Utc>>,
    last_manual_at: Option<DateTime<Utc>>,
    permission_requested: bool,
    session_open: bool,
}

impl AlertEngine {
    pub fn new(
        config: AlertConfig,
        notifier: Arc<dyn Notifier>,
        sound: Arc<dyn SoundPlayer>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            notifier,
            sound,
            last_alert_at: None,
            last_manual_at: None,
            permission_requested: false,
            session_open: false,
        })
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn last_alert_at(&self) -> Option<DateTime<Utc>> {
        self.last_alert_at
    }

    pub fn permission(&self) -> NotificationPermission {
        self.notifier.permission()
    }

    /// Called on every elapsed-time update.
    pub fn evaluate(
        &mut self,
        elapsed_secs: f64,
        is_session_active: bool,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        if !is_session_active || elapsed_secs <= 0.0 {
            if self.session_open {
                self.session_ended();
            }
            return None;
        }
        self.session_open = true;

        if !self.config.enabled {
            return None;
        }

        let since_last = self
            .last_alert_at
            .map(|last| seconds_between(last, now).max(0.0));

        if let Some(since) = since_last {
            if since < self.config.min_gap_secs {
                return None;
            }
        }

        let tier = select_tier(&self.config.policy, elapsed_secs)?;
        if let Some(since) = since_last {
            if since < tier.required_interval_secs {
                return None;
            }
        }

        // Recorded before delivery so a failing notifier cannot cause a re-fire storm.
        self.last_alert_at = Some(now);
        let alert = self.deliver(tier.kind, tier.priority, elapsed_secs, now, false);
        info!(
            "Alert fired ({} priority): {} - {}",
            alert.priority.as_str(),
            alert.title,
            alert.body
        );
        Some(alert)
    }

    /// Forget the automatic cooldown if configured to do so.
    pub fn session_ended(&mut self) {
        self.session_open = false;
        if self.config.resets_cooldown_on_session_end() {
            self.last_alert_at = None;
        }
    }

    /// User-invoked alert: ignores duration thresholds, has its own cooldown,
    /// and may prompt for notification permission.
    pub fn trigger_manual(&mut self, priority: Priority, now: DateTime<Utc>) -> ManualOutcome {
        if let Some(last) = self.last_manual_at {
            let since = seconds_between(last, now).max(0.0);
            if since < self.config.manual_cooldown_secs {
                let remaining_secs = self.config.manual_cooldown_secs - since;
                debug!("Manual alert suppressed; {remaining_secs:.0}s of cooldown left");
                return ManualOutcome::CoolingDown { remaining_secs };
            }
        }

        self.last_manual_at = Some(now);
        ManualOutcome::Fired(self.deliver(AlertKind::Manual, priority, 0.0, now, true))
    }

    fn deliver(
        &mut self,
        kind: AlertKind,
        priority: Priority,
        elapsed_secs: f64,
        now: DateTime<Utc>,
        interactive: bool,
    ) -> Alert {
        let (title, body) = message_for(kind, priority, elapsed_secs);

        let clip = match priority {
            Priority::Low => ClipId::LowAlarm,
            Priority::High => ClipId::HighAlarm,
        };
        let sound_played = match self.sound.play(clip) {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to play {} alert sound: {err}", priority.as_str());
                false
            }
        };

        let notified = if self.ensure_permission(interactive) == NotificationPermission::Granted {
            match self.notifier.deliver(priority, &title, &body) {
                Ok(()) => true,
                Err(err) => {
                    warn!("Failed to show notification: {err}");
                    false
                }
            }
        } else {
            debug!("Notifications unavailable; alert is sound-only");
            false
        };

        Alert {
            priority,
            kind,
            title,
            body,
            fired_at: now,
            elapsed_secs,
            sound_played,
            notified,
        }
    }

    /// Automatic alerts prompt at most once per process; manual alerts may
    /// prompt whenever the answer is still undetermined.
    fn ensure_permission(&mut self, interactive: bool) -> NotificationPermission {
        let current = self.notifier.permission();
        if current != NotificationPermission::Default {
            return current;
        }
        if self.permission_requested && !interactive {
            return current;
        }
        self.permission_requested = true;
        self.notifier.request_permission()
    }
}
