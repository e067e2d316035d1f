use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    helpers::{format_datetime, parse_datetime},
    Database,
};
use crate::models::Session;

fn row_to_session(row: &Row) -> Result<Session> {
    let started_at: String = row.get("started_at")?;
    let ended_at: String = row.get("ended_at")?;

    Ok(Session {
        id: row.get("id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_datetime(&ended_at, "ended_at")?,
        duration_secs: row.get("duration_secs")?,
    })
}

impl Database {
    /// Mirror the in-memory store: the table ends up holding exactly
    /// `sessions`, in the same order.
    pub async fn replace_sessions(&self, sessions: Vec<Session>) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM sessions", [])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO sessions (id, started_at, ended_at, duration_secs, position)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (position, session) in sessions.iter().enumerate() {
                    stmt.execute(params![
                        session.id,
                        format_datetime(&session.started_at),
                        format_datetime(&session.ended_at),
                        session.duration_secs,
                        i64::try_from(position)?,
                    ])
                    .with_context(|| format!("failed to store session {}", session.id))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Sessions in the order they were recorded.
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, started_at, ended_at, duration_secs
                 FROM sessions
                 ORDER BY position ASC, id ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    pub async fn count_sessions(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
            Ok(u64::try_from(count)?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::models::Session;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    fn sample(id: i64, offset_secs: i64, length_secs: i64) -> Session {
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap() + Duration::seconds(offset_secs);
        Session::new(id, start, start + Duration::seconds(length_secs))
    }

    #[tokio::test]
    async fn replace_then_list_preserves_order() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sessions.sqlite3")).unwrap();

        let sessions = vec![sample(30, 0, 10), sample(10, 60, 120), sample(20, 300, 5)];
        db.replace_sessions(sessions.clone()).await.unwrap();

        assert_eq!(db.list_sessions().await.unwrap(), sessions);
        assert_eq!(db.count_sessions().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn replacing_with_an_empty_snapshot_clears_the_table() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sessions.sqlite3")).unwrap();

        db.replace_sessions(vec![sample(1, 0, 10)]).await.unwrap();
        db.replace_sessions(Vec::new()).await.unwrap();

        assert!(db.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_survive_reopening() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.sqlite3");
        {
            let db = Database::new(path.clone()).unwrap();
            db.replace_sessions(vec![sample(1, 0, 42)]).await.unwrap();
        }

        let db = Database::new(path).unwrap();
        let loaded = db.list_sessions().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].duration_secs, 42.0);
    }
}
