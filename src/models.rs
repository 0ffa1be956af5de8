use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const WIKIPEDIA_KEY: &str = "wikipedia";
pub const ATTRACTIONS_KEY: &str = "attractions";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub name: Option<String>,
    pub attraction_type: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone)]
pub struct CollectionResult {
    pub collection_key: String,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextBundle {
    sections: BTreeMap<String, Vec<String>>,
}

impl ContextBundle {
    pub fn with_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut sections = BTreeMap::new();
        for key in keys {
            sections.insert(key.to_string(), Vec::new());
        }
        Self { sections }
    }

    /// Adds a snippet under a collection key, refusing byte-identical
    /// duplicates and anything past the per-collection cap.
    pub fn push_snippet(&mut self, key: &str, snippet: String, cap: usize) -> bool {
        let entries = self.sections.entry(key.to_string()).or_default();
        if entries.len() >= cap || entries.iter().any(|existing| *existing == snippet) {
            return false;
        }
        entries.push(snippet);
        true
    }

    pub fn snippets(&self, key: &str) -> &[String] {
        self.sections
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(Vec::is_empty)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub photo_reference: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub selected_place: String,
    pub is_repeat_fallback: bool,
    pub repeat_count: i64,
    pub lookback_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub is_user_authored: bool,
    pub repeat_counter: i64,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagePart {
    pub role: Role,
    pub text: String,
    pub image_data_uri: Option<String>,
}

impl MessagePart {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
            image_data_uri: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            image_data_uri: None,
        }
    }

    pub fn user_with_image(text: impl Into<String>, image_data_uri: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            image_data_uri: Some(image_data_uri.into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub location: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
    #[serde(default, rename = "visitedPlaces")]
    pub visited_places: Vec<String>,
    #[serde(default = "default_session")]
    pub session_id: String,
}

fn default_session() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "visitedPlace")]
    pub visited_place: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    pub location: String,
    #[serde(default)]
    pub is_distance: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub locations: Vec<PlaceCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoRequest {
    pub photo_reference: String,
    pub max_width: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhotoResponse {
    pub base64_image: String,
}
