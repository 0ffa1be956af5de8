use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub chat_model: String,
    pub vision_model: String,
    pub embedding_model: String,
}

#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    pub per_collection_limit: usize,
    pub query_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub openai_base_url: String,
    pub openai_api_key: String,
    pub qdrant_base_url: String,
    pub wikipedia_collection: String,
    pub attractions_collection: String,
    pub maps_base_url: String,
    pub maps_api_key: String,
    pub models: ModelConfig,
    pub retrieval: RetrievalConfig,
    pub max_output_tokens: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir = env::var("TOURGUIDE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        Self {
            bind_addr: env::var("TOURGUIDE_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            data_dir,
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            qdrant_base_url: env::var("QDRANT_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:6333".to_string()),
            wikipedia_collection: env::var("QDRANT_WIKIPEDIA_COLLECTION")
                .unwrap_or_else(|_| "wikipedia_collection".to_string()),
            attractions_collection: env::var("QDRANT_ATTRACTIONS_COLLECTION")
                .unwrap_or_else(|_| "singapore_attractions".to_string()),
            maps_base_url: env::var("MAPS_BASE_URL")
                .unwrap_or_else(|_| "https://maps.googleapis.com/maps/api".to_string()),
            maps_api_key: env::var("GOOGLE_API_KEY").unwrap_or_default(),
            models: ModelConfig {
                chat_model: env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
                vision_model: env::var("VISION_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                embedding_model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-ada-002".to_string()),
            },
            retrieval: RetrievalConfig {
                per_collection_limit: env::var("PER_COLLECTION_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3),
                query_timeout: Duration::from_millis(
                    env::var("QUERY_TIMEOUT_MS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(5_000),
                ),
            },
            max_output_tokens: env::var("MAX_OUTPUT_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
        }
    }

    pub fn sqlite_dsn(&self) -> String {
        format!(
            "sqlite://{}",
            self.data_dir.join("tourguide.sqlite3").display()
        )
    }
}
