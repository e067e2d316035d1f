use anyhow::Result;
use rusqlite::params;

use crate::db::{
    helpers::{format_datetime, parse_datetime},
    Database,
};
use crate::models::DetectionEvent;

impl Database {
    pub async fn insert_detection_event(&self, event: &DetectionEvent) -> Result<i64> {
        let detected_at = format_datetime(&event.detected_at);
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO detection_events (detected_at) VALUES (?1)",
                params![detected_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Most recent first.
    pub async fn list_detection_events(&self, limit: usize) -> Result<Vec<DetectionEvent>> {
        let limit = i64::try_from(limit)?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, detected_at
                 FROM detection_events
                 ORDER BY detected_at DESC, id DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                let detected_at: String = row.get(1)?;
                events.push(DetectionEvent {
                    id: Some(row.get(0)?),
                    detected_at: parse_datetime(&detected_at, "detected_at")?,
                });
            }
            Ok(events)
        })
        .await
    }

    pub async fn clear_detection_events(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM detection_events", [])?;
            Ok(())
        })
        .await
    }
}
