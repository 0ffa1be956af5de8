use async_trait::async_trait;

use crate::collection::{CollectionClient, StoreError};
use crate::db::Database;
use crate::models::CollectionResult;

/// Lexical collection over the local SQLite facts table. Substring matching
/// carries no store-side ranking, so the retriever scores its results.
#[derive(Clone)]
pub struct FactsCollection {
    db: Database,
    key: String,
}

impl FactsCollection {
    pub fn new(db: Database, key: impl Into<String>) -> Self {
        Self {
            db,
            key: key.into(),
        }
    }
}

#[async_trait]
impl CollectionClient for FactsCollection {
    fn key(&self) -> &str {
        &self.key
    }

    fn ranked(&self) -> bool {
        false
    }

    async fn query(&self, term: &str, limit: usize) -> Result<CollectionResult, StoreError> {
        let documents = self
            .db
            .search_facts(&self.key, term, limit as i64)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        Ok(CollectionResult {
            collection_key: self.key.clone(),
            documents,
        })
    }

    async fn query_radius(
        &self,
        _lat: f64,
        _lng: f64,
        _limit: usize,
    ) -> Result<CollectionResult, StoreError> {
        // The facts table stores no coordinates; the geo fallback is a miss.
        Ok(CollectionResult {
            collection_key: self.key.clone(),
            documents: vec![],
        })
    }
}
