use chrono::{Datelike, TimeZone, Timelike, Weekday};
use serde::Serialize;

use crate::models::Session;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayBucket {
    pub weekday: Weekday,
    pub total_secs: f64,
    pub session_count: u32,
    pub average_secs: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HourBucket {
    pub hour: u32,
    pub total_secs: f64,
    pub session_count: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    /// Monday first.
    pub weekdays: Vec<WeekdayBucket>,
    pub hours: Vec<HourBucket>,
    pub total_secs: f64,
    pub total_sessions: u32,
    pub average_secs: f64,
    pub longest_secs: f64,
}

/// Aggregate recorded sessions by the local weekday and hour they started in.
/// The open session, if any, counts towards the totals but not the buckets.
pub fn summarize<Tz: TimeZone>(
    sessions: &[Session],
    current_elapsed_secs: f64,
    tz: &Tz,
) -> AnalyticsSummary {
    let mut weekdays: Vec<WeekdayBucket> = WEEK
        .iter()
        .map(|&weekday| WeekdayBucket {
            weekday,
            total_secs: 0.0,
            session_count: 0,
            average_secs: 0.0,
        })
        .collect();
    let mut hours: Vec<HourBucket> = (0..24)
        .map(|hour| HourBucket {
            hour,
            total_secs: 0.0,
            session_count: 0,
        })
        .collect();

    for session in sessions {
        let local = session.started_at.with_timezone(tz);

        let day = &mut weekdays[local.weekday().num_days_from_monday() as usize];
        day.total_secs += session.duration_secs;
        day.session_count += 1;

        let hour = &mut hours[local.hour() as usize];
        hour.total_secs += session.duration_secs;
        hour.session_count += 1;
    }

    for day in &mut weekdays {
        if day.session_count > 0 {
            day.average_secs = day.total_secs / f64::from(day.session_count);
        }
    }

    let current = current_elapsed_secs.max(0.0);
    let recorded: f64 = sessions.iter().map(|s| s.duration_secs).sum();
    let total_secs = recorded + current;
    let total_sessions = sessions.len() as u32 + u32::from(current > 0.0);
    let average_secs = if total_sessions > 0 {
        total_secs / f64::from(total_sessions)
    } else {
        0.0
    };
    let longest_secs = sessions
        .iter()
        .map(|s| s.duration_secs)
        .fold(current, f64::max);

    AnalyticsSummary {
        weekdays,
        hours,
        total_secs,
        total_sessions,
        average_secs,
        longest_secs,
    }
}

/// `1h 05m`, `12m 30s`, `45s`.
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
