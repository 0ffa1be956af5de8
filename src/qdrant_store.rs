use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::collection::{CollectionClient, StoreError};
use crate::models::{CollectionResult, Document, DocumentMetadata};
use crate::openai::OpenAiClient;

const GEO_FALLBACK_RADIUS_METERS: f64 = 500.0;

/// Vector-similarity collection backed by a Qdrant REST endpoint. Query
/// terms are embedded first; results arrive ranked by cosine score.
#[derive(Clone)]
pub struct QdrantCollection {
    client: Client,
    base_url: String,
    collection: String,
    key: String,
    embedder: OpenAiClient,
    embedding_model: String,
}

impl QdrantCollection {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        key: impl Into<String>,
        embedder: OpenAiClient,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            collection: collection.into(),
            key: key.into(),
            embedder,
            embedding_model: embedding_model.into(),
        }
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<Document>, StoreError> {
        #[derive(Deserialize)]
        struct SearchResp {
            result: Vec<ScoredPoint>,
        }

        #[derive(Deserialize)]
        struct ScoredPoint {
            payload: Option<serde_json::Map<String, serde_json::Value>>,
        }

        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(|err| StoreError::Query(err.to_string()))?
            .json::<SearchResp>()
            .await
            .map_err(|err| StoreError::Query(err.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| point.payload.map(payload_to_document))
            .collect())
    }
}

#[async_trait]
impl CollectionClient for QdrantCollection {
    fn key(&self) -> &str {
        &self.key
    }

    fn ranked(&self) -> bool {
        true
    }

    async fn query(&self, term: &str, limit: usize) -> Result<CollectionResult, StoreError> {
        let vector = self
            .embedder
            .embed(&self.embedding_model, term)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        let documents = self.search(&vector, limit).await?;
        Ok(CollectionResult {
            collection_key: self.key.clone(),
            documents,
        })
    }

    async fn query_radius(
        &self,
        lat: f64,
        lng: f64,
        limit: usize,
    ) -> Result<CollectionResult, StoreError> {
        #[derive(Deserialize)]
        struct ScrollResp {
            result: ScrollResult,
        }

        #[derive(Deserialize)]
        struct ScrollResult {
            points: Vec<ScrollPoint>,
        }

        #[derive(Deserialize)]
        struct ScrollPoint {
            payload: Option<serde_json::Map<String, serde_json::Value>>,
        }

        let url = format!(
            "{}/collections/{}/points/scroll",
            self.base_url, self.collection
        );
        let body = json!({
            "filter": {
                "must": [{
                    "key": "location",
                    "geo_radius": {
                        "center": { "lat": lat, "lon": lng },
                        "radius": GEO_FALLBACK_RADIUS_METERS,
                    },
                }],
            },
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(|err| StoreError::Query(err.to_string()))?
            .json::<ScrollResp>()
            .await
            .map_err(|err| StoreError::Query(err.to_string()))?;

        let documents = response
            .result
            .points
            .into_iter()
            .filter_map(|point| point.payload.map(payload_to_document))
            .collect();

        Ok(CollectionResult {
            collection_key: self.key.clone(),
            documents,
        })
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_connect() || err.is_timeout() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Query(err.to_string())
    }
}

fn payload_to_document(payload: serde_json::Map<String, serde_json::Value>) -> Document {
    let mut text = String::new();
    let mut metadata = DocumentMetadata::default();
    let mut extra = HashMap::new();

    for (field, value) in payload {
        let Some(value) = value.as_str().map(str::to_string) else {
            continue;
        };
        match field.as_str() {
            "text" => text = value,
            "name" => metadata.name = Some(value),
            "attraction_type" => metadata.attraction_type = Some(value),
            _ => {
                extra.insert(field, value);
            }
        }
    }

    metadata.extra = extra;
    Document { text, metadata }
}
