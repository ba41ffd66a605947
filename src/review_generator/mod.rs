//! Generative review service collaborator.
//!
//! Turns a free-text experience report into a polished review plus a
//! sentiment score. The score is informational and stored as returned.

mod openai;

pub use openai::OpenAiReviewGenerator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub cultivar_name: String,
    pub experience_text: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReview {
    pub review: String,
    pub sentiment_score: f64,
}

#[derive(Debug, Error)]
pub enum ReviewGenerationError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited by review service")]
    RateLimited,

    #[error("Review service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Review generation is not configured")]
    NotConfigured,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewGenerator: Send + Sync {
    /// Name of the backing model, for logs.
    fn model(&self) -> &str;

    async fn generate(&self, request: &ReviewRequest)
        -> Result<GeneratedReview, ReviewGenerationError>;
}
