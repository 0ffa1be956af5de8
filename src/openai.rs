use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::models::{MessagePart, Role};

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub async fn chat(
        &self,
        model: &str,
        parts: &[MessagePart],
        max_tokens: usize,
        temperature: f32,
    ) -> Result<String> {
        #[derive(Deserialize)]
        struct ChatResp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }

        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: String,
        }

        let messages: Vec<serde_json::Value> = parts.iter().map(message_to_json).collect();
        let body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call chat completions endpoint")?
            .error_for_status()
            .context("chat completions returned non-success status")?
            .json::<ChatResp>()
            .await
            .context("failed to decode chat completions response")?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("chat completion returned no choices"))?;

        Ok(choice.message.content.trim().to_string())
    }

    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        #[derive(Deserialize)]
        struct EmbedResp {
            data: Vec<EmbedEntry>,
        }

        #[derive(Deserialize)]
        struct EmbedEntry {
            embedding: Vec<f32>,
        }

        let input = text.trim();
        if input.is_empty() {
            anyhow::bail!("cannot embed empty text input");
        }

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": model, "input": input }))
            .send()
            .await
            .context("failed to call embeddings endpoint")?
            .error_for_status()
            .context("embeddings returned non-success status")?
            .json::<EmbedResp>()
            .await
            .context("failed to decode embeddings response")?;

        let entry = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embeddings response carried no vectors"))?;

        Ok(entry.embedding)
    }
}

fn message_to_json(part: &MessagePart) -> serde_json::Value {
    let role = match part.role {
        Role::System => "system",
        Role::User => "user",
    };

    match &part.image_data_uri {
        Some(image) => json!({
            "role": role,
            "content": [
                { "type": "text", "text": part.text },
                { "type": "image_url", "image_url": { "url": image } },
            ],
        }),
        None => json!({ "role": role, "content": part.text }),
    }
}
