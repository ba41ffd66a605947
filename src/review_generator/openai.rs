//! OpenAI-compatible review generator.
//!
//! Works with any service implementing the OpenAI chat completions API. The
//! model is asked to answer with a JSON object `{"review", "sentimentScore"}`.

use super::{GeneratedReview, ReviewGenerationError, ReviewGenerator, ReviewRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You write short, honest cannabis cultivar reviews from a \
user's experience notes. Answer only with a JSON object with two fields: \"review\" \
(a string of at most 120 words) and \"sentimentScore\" (a number from -1 to 1).";

pub struct OpenAiReviewGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAiReviewGenerator {
    /// # Arguments
    /// * `base_url` - Base URL of the API (e.g., "https://api.openai.com/v1").
    /// * `model` - Model to use (e.g., "gpt-4o-mini").
    /// * `api_key` - Optional API key, sent as a bearer token.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            timeout,
        }
    }

    fn user_prompt(request: &ReviewRequest) -> String {
        format!(
            "Cultivar: {}\nExperience: {}",
            request.cultivar_name, request.experience_text
        )
    }
}

/// Parse the model's answer. Tolerates a surrounding markdown code fence.
pub(crate) fn parse_review_content(content: &str) -> Result<GeneratedReview, ReviewGenerationError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let answer: ReviewAnswer = serde_json::from_str(unfenced).map_err(|e| {
        ReviewGenerationError::InvalidResponse(format!("Review is not valid JSON: {}", e))
    })?;
    let review = answer.review.trim().to_string();
    if review.is_empty() {
        return Err(ReviewGenerationError::InvalidResponse(
            "Empty review text".to_string(),
        ));
    }
    let sentiment_score = answer
        .sentiment_score
        .as_f64()
        .ok_or_else(|| {
            ReviewGenerationError::InvalidResponse("sentimentScore is not a number".to_string())
        })?;
    Ok(GeneratedReview {
        review,
        sentiment_score,
    })
}

#[async_trait]
impl ReviewGenerator for OpenAiReviewGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: &ReviewRequest,
    ) -> Result<GeneratedReview, ReviewGenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::user_prompt(request),
                },
            ],
            temperature: 0.7,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        };

        debug!(
            model = %self.model,
            cultivar = %request.cultivar_name,
            "Requesting review generation"
        );

        let mut req_builder = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReviewGenerationError::Timeout
                } else {
                    ReviewGenerationError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ReviewGenerationError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReviewGenerationError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            ReviewGenerationError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ReviewGenerationError::InvalidResponse("No content in response".to_string())
            })?;

        parse_review_content(&content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewAnswer {
    review: String,
    #[serde(alias = "sentiment_score")]
    sentiment_score: serde_json::Value,
}
