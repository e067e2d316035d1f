use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Sessions at or below this length are presence blips and never recorded.
pub const MIN_SESSION_DURATION_SECS: f64 = 0.5;

/// A closed interval of continuous presence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// `ended_at - started_at` in seconds, fixed when the session closes.
    pub duration_secs: f64,
}

impl Session {
    pub fn new(id: i64, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            ended_at,
            duration_secs: seconds_between(started_at, ended_at),
        }
    }

    pub fn same_interval(&self, other: &Session) -> bool {
        self.started_at == other.started_at && self.ended_at == other.ended_at
    }

    pub fn health_badge(&self) -> HealthBadge {
        HealthBadge::for_duration(self.duration_secs)
    }
}

/// Signed distance from `from` to `to` in fractional seconds.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    duration_to_secs(to - from)
}

pub fn duration_to_secs(delta: Duration) -> f64 {
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

/// History badge for a session length.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum HealthBadge {
    VeryShort,
    Short,
    Normal,
    Good,
    Long,
    VeryLong,
    Extreme,
    Critical,
}

impl HealthBadge {
    pub fn for_duration(duration_secs: f64) -> Self {
        let minutes = duration_secs / 60.0;
        if minutes < 1.0 {
            HealthBadge::VeryShort
        } else if minutes < 5.0 {
            HealthBadge::Short
        } else if minutes < 15.0 {
            HealthBadge::Normal
        } else if minutes < 30.0 {
            HealthBadge::Good
        } else if minutes < 60.0 {
            HealthBadge::Long
        } else if minutes < 120.0 {
            HealthBadge::VeryLong
        } else if minutes < 180.0 {
            HealthBadge::Extreme
        } else {
            HealthBadge::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthBadge::VeryShort => "Very short",
            HealthBadge::Short => "Short",
            HealthBadge::Normal => "Normal",
            HealthBadge::Good => "Good",
            HealthBadge::Long => "Long",
            HealthBadge::VeryLong => "Very long",
            HealthBadge::Extreme => "Extreme",
            HealthBadge::Critical => "Critical",
        }
    }

    /// Badges from `Long` upward suggest taking a break.
    pub fn suggests_break(&self) -> bool {
        matches!(
            self,
            HealthBadge::Long | HealthBadge::VeryLong | HealthBadge::Extreme | HealthBadge::Critical
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duration_is_fixed_from_the_interval() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let end = start + Duration::milliseconds(125_400);
        let session = Session::new(1, start, end);
        assert!((session.duration_secs - 125.4).abs() < 1e-9);
        assert_eq!(session.health_badge(), HealthBadge::Short);
    }

    #[test]
    fn badges_follow_minute_boundaries() {
        assert_eq!(HealthBadge::for_duration(59.9), HealthBadge::VeryShort);
        assert_eq!(HealthBadge::for_duration(60.0), HealthBadge::Short);
        assert_eq!(HealthBadge::for_duration(14.0 * 60.0), HealthBadge::Normal);
        assert_eq!(HealthBadge::for_duration(29.0 * 60.0), HealthBadge::Good);
        assert_eq!(HealthBadge::for_duration(45.0 * 60.0), HealthBadge::Long);
        assert_eq!(HealthBadge::for_duration(90.0 * 60.0), HealthBadge::VeryLong);
        assert_eq!(HealthBadge::for_duration(150.0 * 60.0), HealthBadge::Extreme);
        assert_eq!(HealthBadge::for_duration(200.0 * 60.0), HealthBadge::Critical);
        assert!(!HealthBadge::Good.suggests_break());
        assert!(HealthBadge::Long.suggests_break());
    }

    #[test]
    fn seconds_between_is_signed() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let earlier = start - Duration::milliseconds(1500);
        assert_eq!(seconds_between(start, earlier), -1.5);
    }
}
