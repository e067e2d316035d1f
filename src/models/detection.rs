use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A moment the presence signal went from absent to present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    pub id: Option<i64>,
    pub detected_at: DateTime<Utc>,
}

impl DetectionEvent {
    pub fn new(detected_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            detected_at,
        }
    }
}
