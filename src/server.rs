use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::chat::{parse_lat_lng, TourService, TurnError};
use crate::config::AppConfig;
use crate::history::HistoryStore;
use crate::maps::{GoogleMapsClient, NearbyRank};
use crate::models::{
    ChatRequest, ChatResponse, HistoryMessage, PhotoRequest, PhotoResponse, ScanRequest,
    ScanResponse,
};

#[derive(Clone)]
struct AppState {
    tour: TourService,
    maps: GoogleMapsClient,
    history: Arc<dyn HistoryStore>,
}

pub async fn run_server(
    config: AppConfig,
    tour: TourService,
    maps: GoogleMapsClient,
    history: Arc<dyn HistoryStore>,
) -> Result<()> {
    let state = AppState {
        tour,
        maps,
        history,
    };

    let app = Router::new()
        .route("/", get(home))
        .route("/chat", post(chat_handler))
        .route("/scan", post(scan_handler))
        .route("/image", post(photo_handler))
        .route("/messages", get(messages_handler))
        .route("/ping", get(ping))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn home() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Tour Guide API is running!" }))
}

async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Service is up!" }))
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let output = state.tour.handle_turn(request).await.map_err(ApiError::from)?;

    let prompt = output
        .prompt_parts
        .last()
        .map(|part| part.text.clone())
        .unwrap_or_default();
    let visited_place = (!output.is_repeat_fallback && !output.selected_place.is_empty())
        .then(|| output.selected_place.clone());

    Ok(Json(ChatResponse {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        prompt,
        response: output.response_text,
        visited_place,
    }))
}

async fn scan_handler(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, ApiError> {
    let (lat, lng) = parse_lat_lng(&request.location)
        .ok_or_else(|| ApiError::bad_request("location must be a lat,lng pair".to_string()))?;

    let rank = if request.is_distance {
        NearbyRank::Radius
    } else {
        NearbyRank::Distance
    };

    let locations = state
        .maps
        .places_nearby(lat, lng, rank)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ScanResponse {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        locations,
    }))
}

async fn photo_handler(
    State(state): State<AppState>,
    Json(request): Json<PhotoRequest>,
) -> Result<Json<PhotoResponse>, ApiError> {
    let bytes = state
        .maps
        .place_photo(&request.photo_reference, request.max_width.unwrap_or(400))
        .await
        .map_err(ApiError::from)?;

    let base64_image = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(Json(PhotoResponse { base64_image }))
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    session_id: Option<String>,
    limit: Option<i64>,
}

async fn messages_handler(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<HistoryMessage>>, ApiError> {
    let session = query.session_id.unwrap_or_else(|| "default".to_string());
    let messages = state
        .history
        .most_recent(&session, query.limit.unwrap_or(50))
        .await
        .map_err(ApiError::from)?;

    Ok(Json(messages))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: value.to_string(),
        }
    }
}

impl From<TurnError> for ApiError {
    fn from(value: TurnError) -> Self {
        let status = match value {
            TurnError::EmptyRequest => StatusCode::BAD_REQUEST,
            TurnError::Model(_) => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: value.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
