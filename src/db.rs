use std::str::FromStr;

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::config::AppConfig;
use crate::models::{Document, DocumentMetadata, HistoryMessage};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct FactRow {
    pub id: String,
    pub collection_key: String,
    pub content: String,
    pub name: Option<String>,
    pub attraction_type: Option<String>,
}

impl Database {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        Self::connect(&config.sqlite_dsn()).await
    }

    pub async fn connect(dsn: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(dsn)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS facts (
                id TEXT PRIMARY KEY,
                collection_key TEXT NOT NULL,
                content TEXT NOT NULL,
                name TEXT,
                attraction_type TEXT
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                content TEXT NOT NULL,
                is_user INTEGER NOT NULL,
                repeat INTEGER NOT NULL,
                location TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_facts(&self, facts: &[FactRow]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for fact in facts {
            sqlx::query(
                r#"
                INSERT INTO facts (id, collection_key, content, name, attraction_type)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&fact.id)
            .bind(&fact.collection_key)
            .bind(&fact.content)
            .bind(&fact.name)
            .bind(&fact.attraction_type)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn search_facts(
        &self,
        collection_key: &str,
        term: &str,
        limit: i64,
    ) -> Result<Vec<Document>> {
        if term.is_empty() || limit <= 0 {
            return Ok(vec![]);
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT content, name, attraction_type FROM facts WHERE collection_key = ",
        );
        qb.push_bind(collection_key);
        qb.push(" AND lower(content) LIKE ");
        qb.push_bind(format!("%{}%", term.to_lowercase()));
        qb.push(" LIMIT ");
        qb.push_bind(limit);

        let rows: Vec<SqliteRow> = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(row_to_document).collect())
    }

    pub async fn append_message(&self, session_id: &str, message: &HistoryMessage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (session_id, content, is_user, repeat, location, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(&message.text)
        .bind(message.is_user_authored)
        .bind(message.repeat_counter)
        .bind(&message.location)
        .bind(message.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn latest_messages(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<HistoryMessage>> {
        if limit <= 0 {
            return Ok(vec![]);
        }

        let rows = sqlx::query(
            r#"
            SELECT content, is_user, repeat, location, created_at
            FROM messages
            WHERE session_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_message).collect())
    }
}

fn row_to_document(row: SqliteRow) -> Document {
    Document {
        text: row.get("content"),
        metadata: DocumentMetadata {
            name: row.get("name"),
            attraction_type: row.get("attraction_type"),
            extra: Default::default(),
        },
    }
}

fn row_to_message(row: SqliteRow) -> HistoryMessage {
    HistoryMessage {
        timestamp: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        text: row.get("content"),
        is_user_authored: row.get("is_user"),
        repeat_counter: row.get("repeat"),
        location: row.get("location"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_db() -> Database {
        let path = std::env::temp_dir().join(format!(
            "tourguide-test-{}.sqlite3",
            uuid::Uuid::new_v4()
        ));
        Database::connect(&format!("sqlite://{}", path.display()))
            .await
            .expect("temp database")
    }

    fn fact(id: &str, key: &str, content: &str) -> FactRow {
        FactRow {
            id: id.to_string(),
            collection_key: key.to_string(),
            content: content.to_string(),
            name: None,
            attraction_type: None,
        }
    }

    fn message(text: &str, repeat: i64) -> HistoryMessage {
        HistoryMessage {
            timestamp: Utc::now(),
            text: text.to_string(),
            is_user_authored: false,
            repeat_counter: repeat,
            location: None,
        }
    }

    #[tokio::test]
    async fn facts_search_is_scoped_to_collection() {
        let db = temp_db().await;
        db.insert_facts(&[
            fact("1", "attractions", "The Merlion stands at Marina Bay."),
            fact("2", "wikipedia", "Merlion history entry."),
        ])
        .await
        .unwrap();

        let hits = db.search_facts("attractions", "merlion", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.contains("Marina Bay"));
    }

    #[tokio::test]
    async fn messages_come_back_newest_first() {
        let db = temp_db().await;
        db.append_message("s1", &message("first", 0)).await.unwrap();
        db.append_message("s1", &message("second", 1)).await.unwrap();
        db.append_message("s2", &message("other session", 0))
            .await
            .unwrap();

        let recent = db.latest_messages("s1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "second");
        assert_eq!(recent[0].repeat_counter, 1);
        assert_eq!(recent[1].text, "first");
    }
}
