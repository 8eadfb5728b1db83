pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::standup::Standup;

/// Durable home of stand-up records, keyed by `(user_id, date)`.
///
/// There is no partial update. Every change is a whole-record replace and
/// the last writer wins.
#[async_trait]
pub trait StandupStore: Send + Sync {
    async fn get(&self, user_id: &str, date: &str) -> Result<Option<Standup>>;

    /// Create the record unless one already exists for its key.
    /// Returns false, leaving the stored record untouched, if it did.
    async fn insert(&self, standup: &Standup) -> Result<bool>;

    /// Replace the whole record.
    async fn put(&self, standup: &Standup) -> Result<()>;
}
