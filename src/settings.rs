use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::alerts::AlertConfig;
use crate::timer::{StopPolicy, TrackerConfig};

pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerSettings {
    pub background_detection: bool,
    pub stop_policy: StopPolicy,
    pub tick_interval_ms: u64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            background_detection: true,
            stop_policy: StopPolicy::Close,
            tick_interval_ms: 100,
        }
    }
}

impl TrackerSettings {
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            background_detection: self.background_detection,
            stop_policy: self.stop_policy,
        }
    }

    /// Never faster than 10ms.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(10))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorSettings {
    pub alerts: AlertConfig,
    pub tracker: TrackerSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<MonitorSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(err) => {
                    warn!(
                        "Ignoring unreadable settings at {} ({err}); using defaults",
                        path.display()
                    );
                    MonitorSettings::default()
                }
            }
        } else {
            MonitorSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn in_dir(dir: &Path) -> Result<Self> {
        Self::new(dir.join(SETTINGS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> MonitorSettings {
        *self.read()
    }

    pub fn alerts(&self) -> AlertConfig {
        self.read().alerts
    }

    pub fn tracker(&self) -> TrackerSettings {
        self.read().tracker
    }

    /// Apply `change` and write the result to disk. Alert settings are
    /// validated before anything is stored.
    pub fn update<F>(&self, change: F) -> Result<MonitorSettings>
    where
        F: FnOnce(&mut MonitorSettings),
    {
        let mut guard = self.write();
        let mut next = *guard;
        change(&mut next);
        next.alerts.validate()?;
        self.persist(&next)?;
        *guard = next;
        Ok(next)
    }

    /// Write the current settings, creating the file if needed.
    pub fn save(&self) -> Result<()> {
        let data = self.snapshot();
        self.persist(&data)
    }

    fn persist(&self, data: &MonitorSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, MonitorSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MonitorSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertEngine, AlertPolicy, LogNotifier};
    use crate::audio::SilentPlayer;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::in_dir(dir.path()).unwrap();

        let settings = store.snapshot();
        assert_eq!(settings, MonitorSettings::default());
        assert_eq!(settings.alerts.manual_cooldown_secs, 300.0);
        assert_eq!(settings.tracker.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE_NAME), "{ not json").unwrap();

        let store = SettingsStore::in_dir(dir.path()).unwrap();
        assert_eq!(store.snapshot(), MonitorSettings::default());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE_NAME),
            r#"{ "tracker": { "stopPolicy": "discard" },
                 "alerts": { "policy": { "shape": "threshold", "minDurationSecs": 60, "alertIntervalSecs": 120 } } }"#,
        )
        .unwrap();

        let store = SettingsStore::in_dir(dir.path()).unwrap();
        let tracker = store.tracker();
        assert_eq!(tracker.stop_policy, StopPolicy::Discard);
        assert!(tracker.background_detection);
        assert_eq!(
            store.alerts().policy,
            AlertPolicy::Threshold {
                min_duration_secs: 60.0,
                alert_interval_secs: 120.0
            }
        );
        assert_eq!(store.alerts().min_gap_secs, 10.0);
    }

    #[test]
    fn threshold_only_file_resets_cooldown_each_session() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE_NAME),
            r#"{ "alerts": { "policy": { "shape": "threshold", "minDurationSecs": 60, "alertIntervalSecs": 120 } } }"#,
        )
        .unwrap();

        let alerts = SettingsStore::in_dir(dir.path()).unwrap().alerts();
        assert_eq!(alerts.reset_cooldown_on_session_end, None);
        assert!(alerts.resets_cooldown_on_session_end());

        let mut engine =
            AlertEngine::new(alerts, Arc::new(LogNotifier::new()), Arc::new(SilentPlayer)).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        assert!(engine.evaluate(61.0, true, t0).is_some());
        assert!(engine.evaluate(0.0, false, t0 + ChronoDuration::seconds(5)).is_none());
        assert!(engine
            .evaluate(61.0, true, t0 + ChronoDuration::seconds(70))
            .is_some());
    }

    #[test]
    fn updates_are_persisted() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::in_dir(dir.path()).unwrap();
        store
            .update(|settings| settings.tracker.background_detection = false)
            .unwrap();

        let reopened = SettingsStore::in_dir(dir.path()).unwrap();
        assert!(!reopened.tracker().background_detection);
    }

    #[test]
    fn invalid_alert_update_is_rejected_and_not_stored() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::in_dir(dir.path()).unwrap();

        let result = store.update(|settings| settings.alerts = AlertConfig::two_tier(900.0, 300.0, 60.0));
        assert!(result.is_err());
        assert_eq!(store.alerts(), AlertConfig::default());
        assert!(!store.path().exists());
    }
}
