use super::policy::{AlertKind, Priority};

/// Title and body for an alert at the given elapsed time.
pub fn message_for(kind: AlertKind, priority: Priority, elapsed_secs: f64) -> (String, String) {
    let total = elapsed_secs.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;

    match kind {
        AlertKind::Encouragement => (
            "Keep it up!".to_string(),
            format!("{} minutes focused so far. Great work!", total / 60),
        ),
        AlertKind::ThresholdReached => (
            "Time for a break".to_string(),
            format!("You have been at the screen for {}.", format_hm(hours, minutes)),
        ),
        AlertKind::LongSession => (
            "Long session".to_string(),
            format!("{} minutes without a pause. A break is recommended.", total / 60),
        ),
        AlertKind::VeryLongSession => (
            "Very long session".to_string(),
            format!("{hours}h {minutes}m so far. Consider taking a break."),
        ),
        AlertKind::CriticalSession => (
            "Critical session".to_string(),
            format!("{hours}h {minutes}m so far. Please take a break now!"),
        ),
        AlertKind::Manual => match priority {
            Priority::High => (
                "High priority alert".to_string(),
                "Test of the high priority break reminder".to_string(),
            ),
            Priority::Low => (
                "Low priority alert".to_string(),
                "Test of the low priority break reminder".to_string(),
            ),
        },
    }
}

fn format_hm(hours: u64, minutes: u64) -> String {
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes} minutes")
    }
}
