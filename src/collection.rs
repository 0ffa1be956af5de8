use async_trait::async_trait;

use crate::models::CollectionResult;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("collection store unreachable: {0}")]
    Unavailable(String),
    #[error("collection query failed: {0}")]
    Query(String),
}

/// One logical knowledge collection. Implementations may search by vector
/// similarity, lexically, or both; the retriever only sees this contract.
#[async_trait]
pub trait CollectionClient: Send + Sync {
    /// Stable logical name ("wikipedia", "attractions"), independent of the
    /// physical store collection.
    fn key(&self) -> &str;

    /// Whether query results arrive already ranked by the store. Unranked
    /// results are scored and ordered by the retriever.
    fn ranked(&self) -> bool;

    /// Returns candidate documents for a term. An empty document list is a
    /// successful miss, not an error.
    async fn query(&self, term: &str, limit: usize) -> Result<CollectionResult, StoreError>;

    /// Coordinate-radius lookup used as a last resort when no term matched.
    /// Stores without geo data return an empty result.
    async fn query_radius(
        &self,
        lat: f64,
        lng: f64,
        limit: usize,
    ) -> Result<CollectionResult, StoreError>;
}
