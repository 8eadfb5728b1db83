use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::Mutex;

use super::StandupStore;
use crate::standup::Standup;

/// SQLite-backed stand-up records. The record itself is stored as JSON so
/// its field names stay the durable schema.
pub struct SqliteStandupStore {
    conn: Mutex<Connection>,
}

impl SqliteStandupStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open standup database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS standups (
                user_id    TEXT NOT NULL,
                date       TEXT NOT NULL,
                record     TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (user_id, date)
            );",
        )
        .context("failed to create standups table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }
}

#[async_trait]
impl StandupStore for SqliteStandupStore {
    async fn get(&self, user_id: &str, date: &str) -> Result<Option<Standup>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT record FROM standups WHERE user_id = ?1 AND date = ?2")?;
        let mut rows = stmt.query([user_id, date])?;
        match rows.next()? {
            Some(row) => {
                let json: String = row.get(0)?;
                let standup = serde_json::from_str(&json)
                    .with_context(|| format!("corrupt standup record for {user_id} on {date}"))?;
                Ok(Some(standup))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, standup: &Standup) -> Result<bool> {
        let json = serde_json::to_string(standup)?;
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT INTO standups (user_id, date, record) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, date) DO NOTHING",
            rusqlite::params![standup.user_id, standup.date, json],
        )?;
        Ok(inserted == 1)
    }

    async fn put(&self, standup: &Standup) -> Result<()> {
        let json = serde_json::to_string(standup)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO standups (user_id, date, record) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, date) DO UPDATE SET
                record = excluded.record,
                updated_at = datetime('now')",
            rusqlite::params![standup.user_id, standup.date, json],
        )?;
        Ok(())
    }
}
