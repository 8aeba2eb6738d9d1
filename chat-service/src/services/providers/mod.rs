//! Text-generation provider abstraction.
//!
//! The proxy talks to exactly one provider at a time; the trait exists so
//! the HTTP layer can be driven by a scripted mock in tests.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
}

/// Stream chunk for streaming responses.
pub enum StreamChunk {
    /// Incremental text fragment, forwarded in emission order.
    Text(String),

    /// Final completion with usage stats.
    Complete {
        input_tokens: i32,
        output_tokens: i32,
        finish_reason: FinishReason,
    },
}

/// Type alias for provider streams.
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

/// Generation parameters for one model call.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    /// Temperature (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Top-p sampling.
    pub top_p: Option<f32>,

    /// Maximum output tokens.
    pub max_output_tokens: Option<i32>,
}

/// One conversational turn, in the provider's wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<ContentPart>,
}

impl Content {
    /// A user turn made of the given parts.
    pub fn user(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    /// A model turn holding a single text part.
    pub fn model(text: String) -> Self {
        Self {
            role: Some("model".to_string()),
            parts: vec![ContentPart::Text { text }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text { text: String },
    FileData { file_data: FileData },
}

/// Reference to a previously uploaded blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

/// Per-category safety threshold sent with every request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

impl SafetySetting {
    /// The fixed safety configuration this proxy requests: every built-in
    /// content category set to BLOCK_NONE.
    pub fn permissive() -> Vec<SafetySetting> {
        [
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_HARASSMENT",
        ]
        .into_iter()
        .map(|category| SafetySetting {
            category: category.to_string(),
            threshold: "BLOCK_NONE".to_string(),
        })
        .collect()
    }
}

/// Trait for streaming text providers (e.g., Gemini).
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Send one turn of a conversation and stream the reply back.
    ///
    /// `contents` is the full history including the new user turn, oldest
    /// first. The returned stream is finite and non-restartable.
    async fn stream_message(
        &self,
        model: &str,
        system_instruction: Option<&str>,
        contents: Vec<Content>,
        params: &GenerationParams,
        safety_settings: &[SafetySetting],
    ) -> Result<ProviderStream, ProviderError>;
}
