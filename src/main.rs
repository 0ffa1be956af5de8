use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

use tourguide::chat::TourService;
use tourguide::collection::CollectionClient;
use tourguide::db::Database;
use tourguide::facts_store::FactsCollection;
use tourguide::history::SqliteHistory;
use tourguide::maps::GoogleMapsClient;
use tourguide::models::{ATTRACTIONS_KEY, WIKIPEDIA_KEY};
use tourguide::openai::OpenAiClient;
use tourguide::places::PlaceSelector;
use tourguide::qdrant_store::QdrantCollection;
use tourguide::retrieval::Retriever;
use tourguide::{run_server, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    tokio::fs::create_dir_all(&config.data_dir).await?;

    let db = Database::new(&config).await?;
    let openai = OpenAiClient::new(config.openai_base_url.clone(), config.openai_api_key.clone());
    let maps = GoogleMapsClient::new(config.maps_base_url.clone(), config.maps_api_key.clone());

    let wikipedia = QdrantCollection::new(
        config.qdrant_base_url.clone(),
        config.wikipedia_collection.clone(),
        WIKIPEDIA_KEY,
        openai.clone(),
        config.models.embedding_model.clone(),
    );
    let attractions = FactsCollection::new(db.clone(), ATTRACTIONS_KEY);

    let clients: Vec<Arc<dyn CollectionClient>> = vec![Arc::new(wikipedia), Arc::new(attractions)];
    let retriever = Retriever::new(
        clients,
        config.retrieval.per_collection_limit,
        config.retrieval.query_timeout,
    );

    let history = Arc::new(SqliteHistory::new(db.clone()));
    let selector = Arc::new(PlaceSelector::new(history.clone()));
    let generation_limit = Arc::new(Semaphore::new(1));

    let tour = TourService::new(
        config.clone(),
        maps.clone(),
        openai,
        retriever,
        selector,
        history.clone(),
        generation_limit,
    );

    run_server(config, tour, maps, history).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
