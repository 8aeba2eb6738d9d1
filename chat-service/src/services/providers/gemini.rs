//! Gemini provider implementation.
//!
//! Streams replies from the `streamGenerateContent` REST endpoint over SSE.

use super::{
    Content, ContentPart, FinishReason, GenerationParams, ProviderError, ProviderStream,
    SafetySetting, StreamChunk, TextProvider,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Gemini API base URL.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
}

/// Gemini streaming text provider.
pub struct GeminiTextProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiTextProvider {
    pub fn new(config: GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Build the API URL for the given model and method.
    fn api_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            GEMINI_API_BASE, model, method, self.config.api_key
        )
    }
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    async fn stream_message(
        &self,
        model: &str,
        system_instruction: Option<&str>,
        contents: Vec<Content>,
        params: &GenerationParams,
        safety_settings: &[SafetySetting],
    ) -> Result<ProviderStream, ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        let request = GenerateContentRequest {
            contents,
            system_instruction: system_instruction.map(|text| Content {
                role: None,
                parts: vec![ContentPart::Text {
                    text: text.to_string(),
                }],
            }),
            generation_config: Some(GenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                max_output_tokens: params.max_output_tokens,
            }),
            safety_settings: Some(safety_settings.to_vec()),
        };

        let url = self.api_url(model, "streamGenerateContent");
        let url = format!("{}&alt=sse", url);

        tracing::debug!(
            model = %model,
            turns = request.contents.len(),
            "Starting streaming request to Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        // Create channel for streaming
        let (tx, rx) = mpsc::channel(32);

        // Spawn task to process SSE stream
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();
            let mut total_input_tokens = 0i32;
            let mut total_output_tokens = 0i32;
            let mut last_finish_reason = FinishReason::Complete;

            while let Some(chunk_result) = stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        let chunk_str = String::from_utf8_lossy(&chunk);
                        buffer.push_str(&chunk_str);

                        // Process complete SSE events
                        while let Some(event_end) = buffer.find("\n\n") {
                            let event = buffer[..event_end].to_string();
                            buffer = buffer[event_end + 2..].to_string();

                            let Some(data) = event.strip_prefix("data: ") else {
                                continue;
                            };
                            let Ok(response) =
                                serde_json::from_str::<GenerateContentResponse>(data)
                            else {
                                continue;
                            };

                            if let Some(usage) = &response.usage_metadata {
                                total_input_tokens = usage.prompt_token_count.unwrap_or(0);
                                total_output_tokens = usage.candidates_token_count.unwrap_or(0);
                            }

                            if let Some(candidate) = response.candidates.first() {
                                let text = candidate
                                    .content
                                    .as_ref()
                                    .and_then(|c| c.parts.first())
                                    .and_then(|p| match p {
                                        ContentPart::Text { text } => Some(text.clone()),
                                        _ => None,
                                    });

                                if let Some(text) = text {
                                    if !text.is_empty()
                                        && tx.send(Ok(StreamChunk::Text(text))).await.is_err()
                                    {
                                        // Receiver dropped: the caller went away, so
                                        // abandon the upstream response as well.
                                        return;
                                    }
                                }

                                if let Some(reason) = &candidate.finish_reason {
                                    last_finish_reason = match reason.as_str() {
                                        "STOP" => FinishReason::Complete,
                                        "MAX_TOKENS" => FinishReason::Length,
                                        "SAFETY" => FinishReason::ContentFilter,
                                        _ => FinishReason::Complete,
                                    };
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::NetworkError(e.to_string())))
                            .await;
                        return;
                    }
                }
            }

            // Send completion
            let _ = tx
                .send(Ok(StreamChunk::Complete {
                    input_tokens: total_input_tokens,
                    output_tokens: total_output_tokens,
                    finish_reason: last_finish_reason,
                }))
                .await;
        });

        let stream = ReceiverStream::new(rx);
        Ok(Box::pin(stream) as ProviderStream)
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<Vec<SafetySetting>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    // Safety-terminated chunks arrive without content.
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}
