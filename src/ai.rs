use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::time::Duration;

use crate::models::Recommendation;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const MODEL: &str = "gpt-4o-mini";

/// Text-generation seam for the recommendation layer. The live client talks
/// to an OpenAI-compatible chat endpoint; tests substitute a fake.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Ask the model for up to `max_results` candidate titles matching the
    /// free-text query.
    async fn suggest(&self, query: &str, max_results: usize) -> Result<Vec<Recommendation>>;
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
}

impl OpenAiClient {
    /// Returns `None` when no key is configured; the recommendation layer
    /// then runs on its static tables alone.
    pub fn from_env() -> Result<Option<Self>> {
        let Some(api_key) = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        let user_agent = format!("cinescout/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build completion HTTP client")?;
        Ok(Some(Self { client, api_key }))
    }
}

#[async_trait]
impl CompletionApi for OpenAiClient {
    async fn suggest(&self, query: &str, max_results: usize) -> Result<Vec<Recommendation>> {
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct Message {
            content: String,
        }

        let system = "You recommend movies and TV shows. Reply with a JSON array only; \
                      each element has the keys title, description, category and \
                      confidence (0.0-1.0). No prose around the JSON.";
        let user = format!("Recommend up to {max_results} titles for: {query}");
        let body = json!({
            "model": MODEL,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": 0.7,
        });

        let res = self
            .client
            .post(OPENAI_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("completion request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading completion body failed")?;
        if !status.is_success() {
            let snippet: String = text.chars().take(200).collect();
            return Err(anyhow!("completion endpoint -> {status}: {snippet}"));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).context("completion JSON parse failed")?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| anyhow!("completion response had no choices"))?;

        let mut recs: Vec<Recommendation> = serde_json::from_str(strip_fences(content))
            .context("model output was not a recommendation array")?;
        recs.truncate(max_results);
        Ok(recs)
    }
}

/// Models wrap JSON in markdown fences more often than not.
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}
