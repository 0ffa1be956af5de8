use anyhow::Result;
use async_trait::async_trait;

use crate::db::Database;
use crate::models::HistoryMessage;

/// Append-only, time-ordered log of narration and user messages, scoped per
/// session. Reads return newest first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, session_key: &str, message: HistoryMessage) -> Result<()>;

    async fn most_recent(&self, session_key: &str, limit: i64) -> Result<Vec<HistoryMessage>>;
}

#[derive(Clone)]
pub struct SqliteHistory {
    db: Database,
}

impl SqliteHistory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    async fn append(&self, session_key: &str, message: HistoryMessage) -> Result<()> {
        self.db.append_message(session_key, &message).await
    }

    async fn most_recent(&self, session_key: &str, limit: i64) -> Result<Vec<HistoryMessage>> {
        self.db.latest_messages(session_key, limit).await
    }
}
