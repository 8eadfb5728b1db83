//! Settings backed by SQLite.
//!
//! Shares a database with
//! [`SqliteStandupStore`](crate::store::sqlite::SqliteStandupStore). Pass
//! the same path to both.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::Mutex;

use super::{Setting, SettingStore};

/// Persistent setting store, one row per channel.
pub struct SqliteSettingStore {
    conn: Mutex<Connection>,
}

impl SqliteSettingStore {
    /// Open or create the settings table in the given database.
    /// Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open settings database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                channel_id         TEXT PRIMARY KEY,
                questions          TEXT NOT NULL,
                member_ids         TEXT NOT NULL,
                summary_channel_id TEXT NOT NULL
            )",
        )
        .context("failed to create settings table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl SettingStore for SqliteSettingStore {
    async fn get(&self, channel_id: &str) -> Result<Option<Setting>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT questions, member_ids, summary_channel_id
             FROM settings WHERE channel_id = ?1",
        )?;
        let mut rows = stmt.query([channel_id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let questions: String = row.get(0)?;
        let member_ids: String = row.get(1)?;
        Ok(Some(Setting {
            channel_id: channel_id.to_string(),
            questions: serde_json::from_str(&questions)
                .context("corrupt questions column")?,
            member_ids: serde_json::from_str(&member_ids)
                .context("corrupt member_ids column")?,
            summary_channel_id: row.get(2)?,
        }))
    }

    /// Replace the channel's setting (upsert).
    async fn put(&self, setting: &Setting) -> Result<()> {
        let questions = serde_json::to_string(&setting.questions)?;
        let member_ids = serde_json::to_string(&setting.member_ids)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO settings (channel_id, questions, member_ids, summary_channel_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(channel_id) DO UPDATE SET
                questions = excluded.questions,
                member_ids = excluded.member_ids,
                summary_channel_id = excluded.summary_channel_id",
            [
                setting.channel_id.as_str(),
                &questions,
                &member_ids,
                &setting.summary_channel_id,
            ],
        )?;
        Ok(())
    }
}
