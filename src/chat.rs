use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;

use crate::config::AppConfig;
use crate::history::HistoryStore;
use crate::image;
use crate::maps::{GoogleMapsClient, NearbyRank};
use crate::models::{ChatRequest, ContextBundle, HistoryMessage, MessagePart, SelectionOutcome};
use crate::openai::OpenAiClient;
use crate::places::PlaceSelector;
use crate::prompt;
use crate::retrieval::Retriever;
use crate::terms;

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("no usable location, text, or image in request")]
    EmptyRequest,
    #[error("language model request failed: {0}")]
    Model(#[source] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub selected_place: String,
    pub is_repeat_fallback: bool,
    pub repeat_count: i64,
    pub context_bundle: ContextBundle,
    pub prompt_parts: Vec<MessagePart>,
    pub response_text: String,
}

#[derive(Clone)]
pub struct TourService {
    config: AppConfig,
    maps: GoogleMapsClient,
    openai: OpenAiClient,
    retriever: Retriever,
    selector: Arc<PlaceSelector>,
    history: Arc<dyn HistoryStore>,
    generation_limit: Arc<Semaphore>,
}

impl TourService {
    pub fn new(
        config: AppConfig,
        maps: GoogleMapsClient,
        openai: OpenAiClient,
        retriever: Retriever,
        selector: Arc<PlaceSelector>,
        history: Arc<dyn HistoryStore>,
        generation_limit: Arc<Semaphore>,
    ) -> Self {
        Self {
            config,
            maps,
            openai,
            retriever,
            selector,
            history,
            generation_limit,
        }
    }

    /// Runs one chat turn: resolve the location, pick the next unvisited
    /// place, retrieve supporting context, assemble the prompt, and generate
    /// the narration. Upstream failures degrade to empty or fallback values;
    /// only a model failure fails the turn.
    pub async fn handle_turn(&self, request: ChatRequest) -> Result<TurnOutput, TurnError> {
        let location = non_empty(request.location.as_deref());
        let text = non_empty(request.text.as_deref());
        let image_payload = non_empty(request.image.as_deref());

        if location.is_none() && text.is_none() && image_payload.is_none() {
            return Err(TurnError::EmptyRequest);
        }

        let image_data_uri = image_payload.map(image::normalize_data_uri);

        let coords = location.and_then(|raw| match parse_lat_lng(raw) {
            Some(coords) => Some(coords),
            None => {
                tracing::warn!(location = %raw, "malformed coordinates, skipping geocoding");
                None
            }
        });

        let mut address = location.unwrap_or_default().to_string();
        let mut candidates = Vec::new();

        if let Some((lat, lng)) = coords {
            match self.maps.reverse_geocode(lat, lng).await {
                Ok(Some(resolved)) => address = resolved,
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "reverse geocoding failed, keeping raw coordinates");
                }
            }

            match self.maps.places_nearby(lat, lng, NearbyRank::Distance).await {
                Ok(places) => candidates = places,
                Err(err) => {
                    tracing::warn!(error = %err, "nearby places lookup failed, no candidates");
                }
            }
        }

        let mut visited: HashSet<String> = request.visited_places.iter().cloned().collect();
        let outcome = if location.is_some() {
            self.selector
                .select(&request.session_id, &candidates, &mut visited, &address)
                .await
        } else {
            SelectionOutcome {
                selected_place: String::new(),
                is_repeat_fallback: false,
                repeat_count: 0,
                lookback_text: None,
            }
        };

        let query_text = text
            .map(str::to_string)
            .unwrap_or_else(|| outcome.selected_place.clone());
        let search_terms = terms::extract(
            text,
            Some(outcome.selected_place.as_str()),
            Some(address.as_str()),
        );

        let context_bundle = self
            .retriever
            .retrieve(&query_text, &search_terms, coords)
            .await;

        let prompt_parts = prompt::assemble(
            &outcome.selected_place,
            &address,
            &context_bundle,
            outcome.lookback_text.as_deref(),
            text,
            image_data_uri.as_deref(),
        );

        if let Some(text) = text {
            let message = HistoryMessage {
                timestamp: Utc::now(),
                text: text.to_string(),
                is_user_authored: true,
                repeat_counter: 0,
                location: location.map(str::to_string),
            };
            if let Err(err) = self.history.append(&request.session_id, message).await {
                tracing::warn!(error = %err, "failed to persist user message");
            }
        }

        let model = if image_data_uri.is_some() {
            &self.config.models.vision_model
        } else {
            &self.config.models.chat_model
        };
        let temperature = if text.is_some() { 0.0 } else { 0.5 };

        let _permit = self
            .generation_limit
            .acquire()
            .await
            .map_err(|err| TurnError::Model(err.into()))?;
        let response_text = self
            .openai
            .chat(model, &prompt_parts, self.config.max_output_tokens, temperature)
            .await
            .map_err(TurnError::Model)?;

        let narration = HistoryMessage {
            timestamp: Utc::now(),
            text: response_text.clone(),
            is_user_authored: false,
            repeat_counter: outcome.repeat_count,
            location: location.map(str::to_string),
        };
        if let Err(err) = self.history.append(&request.session_id, narration).await {
            tracing::warn!(error = %err, "failed to persist narration");
        }

        Ok(TurnOutput {
            selected_place: outcome.selected_place,
            is_repeat_fallback: outcome.is_repeat_fallback,
            repeat_count: outcome.repeat_count,
            context_bundle,
            prompt_parts,
            response_text,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_lat_lng(raw: &str) -> Option<(f64, f64)> {
    let (lat, lng) = raw.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    Some((lat, lng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_coordinates() {
        assert_eq!(parse_lat_lng("1.2840,103.8515"), Some((1.2840, 103.8515)));
        assert_eq!(parse_lat_lng(" 1.28 , 103.85 "), Some((1.28, 103.85)));
    }

    #[test]
    fn rejects_malformed_coordinates() {
        assert_eq!(parse_lat_lng("somewhere in town"), None);
        assert_eq!(parse_lat_lng("1.28"), None);
        assert_eq!(parse_lat_lng("1.28,north"), None);
    }

    #[test]
    fn blank_fields_count_as_absent() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some(" x ")), Some("x"));
        assert_eq!(non_empty(None), None);
    }
}
