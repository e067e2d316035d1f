use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Elapsed time past which a long-session warning becomes "very long".
pub const VERY_LONG_SESSION_SECS: f64 = 3600.0;
/// Elapsed time past which a long-session warning becomes critical.
pub const CRITICAL_SESSION_SECS: f64 = 7200.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Low,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::High => "high",
        }
    }
}

/// What an alert is about; selects the message copy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AlertKind {
    Encouragement,
    ThresholdReached,
    LongSession,
    VeryLongSession,
    CriticalSession,
    Manual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum AlertPolicy {
    /// One tier: alert once `min_duration_secs` is reached, then at most every
    /// `alert_interval_secs`.
    #[serde(rename_all = "camelCase")]
    Threshold {
        min_duration_secs: f64,
        alert_interval_secs: f64,
    },
    /// Low-priority encouragement up to `low_threshold_secs` at half cadence,
    /// high-priority warnings from `high_threshold_secs` at full cadence,
    /// nothing in between.
    #[serde(rename_all = "camelCase")]
    TwoTier {
        low_threshold_secs: f64,
        high_threshold_secs: f64,
        alert_interval_secs: f64,
    },
}

impl AlertPolicy {
    pub fn alert_interval_secs(&self) -> f64 {
        match *self {
            AlertPolicy::Threshold {
                alert_interval_secs,
                ..
            }
            | AlertPolicy::TwoTier {
                alert_interval_secs,
                ..
            } => alert_interval_secs,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero (got {value})")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must be a finite, non-negative number of seconds (got {value})")]
    Invalid { field: &'static str, value: f64 },
    #[error("low threshold ({low}s) must not exceed high threshold ({high}s)")]
    ThresholdOrder { low: f64, high: f64 },
}

/// Validated alert configuration; immutable once the engine is built.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub policy: AlertPolicy,
    pub manual_cooldown_secs: f64,
    /// Floor between any two automatic alerts, whatever the tier.
    pub min_gap_secs: f64,
    /// Forget the last automatic alert when a session ends. Unset means the
    /// policy shape decides, see [`AlertConfig::resets_cooldown_on_session_end`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_cooldown_on_session_end: Option<bool>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: AlertPolicy::TwoTier {
                low_threshold_secs: 300.0,
                high_threshold_secs: 1800.0,
                alert_interval_secs: 600.0,
            },
            manual_cooldown_secs: 300.0,
            min_gap_secs: 10.0,
            reset_cooldown_on_session_end: None,
        }
    }
}

impl AlertConfig {
    pub fn threshold(min_duration_secs: f64, alert_interval_secs: f64) -> Self {
        Self {
            policy: AlertPolicy::Threshold {
                min_duration_secs,
                alert_interval_secs,
            },
            ..Self::default()
        }
    }

    pub fn two_tier(low_threshold_secs: f64, high_threshold_secs: f64, alert_interval_secs: f64) -> Self {
        Self {
            policy: AlertPolicy::TwoTier {
                low_threshold_secs,
                high_threshold_secs,
                alert_interval_secs,
            },
            ..Self::default()
        }
    }

    /// Threshold policies start each session with a fresh cooldown; two-tier
    /// policies carry it over unless told otherwise.
    pub fn resets_cooldown_on_session_end(&self) -> bool {
        self.reset_cooldown_on_session_end
            .unwrap_or(matches!(self.policy, AlertPolicy::Threshold { .. }))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.policy {
            AlertPolicy::Threshold {
                min_duration_secs,
                alert_interval_secs,
            } => {
                non_negative("min_duration_secs", min_duration_secs)?;
                positive("alert_interval_secs", alert_interval_secs)?;
            }
            AlertPolicy::TwoTier {
                low_threshold_secs,
                high_threshold_secs,
                alert_interval_secs,
            } => {
                non_negative("low_threshold_secs", low_threshold_secs)?;
                non_negative("high_threshold_secs", high_threshold_secs)?;
                positive("alert_interval_secs", alert_interval_secs)?;
                if low_threshold_secs > high_threshold_secs {
                    return Err(ConfigError::ThresholdOrder {
                        low: low_threshold_secs,
                        high: high_threshold_secs,
                    });
                }
            }
        }
        non_negative("manual_cooldown_secs", self.manual_cooldown_secs)?;
        non_negative("min_gap_secs", self.min_gap_secs)?;
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::Invalid { field, value });
    }
    if value <= 0.0 {
        return Err(ConfigError::NotPositive { field, value });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Invalid { field, value });
    }
    Ok(())
}

/// The tier an elapsed time falls into, with the spacing it requires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierDecision {
    pub priority: Priority,
    pub kind: AlertKind,
    pub required_interval_secs: f64,
}

/// Tier selection only; rate limiting is the engine's job.
pub fn select_tier(policy: &AlertPolicy, elapsed_secs: f64) -> Option<TierDecision> {
    match *policy {
        AlertPolicy::Threshold {
            min_duration_secs,
            alert_interval_secs,
        } => (elapsed_secs >= min_duration_secs).then_some(TierDecision {
            priority: Priority::High,
            kind: AlertKind::ThresholdReached,
            required_interval_secs: alert_interval_secs,
        }),
        AlertPolicy::TwoTier {
            low_threshold_secs,
            high_threshold_secs,
            alert_interval_secs,
        } => {
            if elapsed_secs >= high_threshold_secs {
                let kind = if elapsed_secs >= CRITICAL_SESSION_SECS {
                    AlertKind::CriticalSession
                } else if elapsed_secs >= VERY_LONG_SESSION_SECS {
                    AlertKind::VeryLongSession
                } else {
                    AlertKind::LongSession
                };
                Some(TierDecision {
                    priority: Priority::High,
                    kind,
                    required_interval_secs: alert_interval_secs,
                })
            } else if elapsed_secs <= low_threshold_secs {
                Some(TierDecision {
                    priority: Priority::Low,
                    kind: AlertKind::Encouragement,
                    required_interval_secs: alert_interval_secs / 2.0,
                })
            } else {
                None
            }
        }
    }
}
