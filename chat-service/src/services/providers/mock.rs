//! Mock provider for tests.
//!
//! Streams a fixed script of text fragments and records every request it
//! receives so tests can assert on what the model would have been sent.

use super::{
    Content, FinishReason, GenerationParams, ProviderError, ProviderStream, SafetySetting,
    StreamChunk, TextProvider,
};
use async_trait::async_trait;
use std::sync::Mutex;

/// One recorded `stream_message` invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub params: GenerationParams,
    pub safety_settings: Vec<SafetySetting>,
}

/// Scripted text provider.
pub struct MockTextProvider {
    chunks: Vec<String>,
    fail_with: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTextProvider {
    /// A provider that streams the given fragments, in order.
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            fail_with: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A provider that rejects every call with an API error.
    pub fn failing(message: &str) -> Self {
        Self {
            chunks: Vec::new(),
            fail_with: Some(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn stream_message(
        &self,
        model: &str,
        system_instruction: Option<&str>,
        contents: Vec<Content>,
        params: &GenerationParams,
        safety_settings: &[SafetySetting],
    ) -> Result<ProviderStream, ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            system_instruction: system_instruction.map(str::to_string),
            contents,
            params: params.clone(),
            safety_settings: safety_settings.to_vec(),
        });

        if let Some(message) = &self.fail_with {
            return Err(ProviderError::ApiError(message.clone()));
        }

        let output_tokens = self.chunks.len() as i32;
        let mut items: Vec<Result<StreamChunk, ProviderError>> = self
            .chunks
            .iter()
            .map(|chunk| Ok(StreamChunk::Text(chunk.clone())))
            .collect();
        items.push(Ok(StreamChunk::Complete {
            input_tokens: 1,
            output_tokens,
            finish_reason: FinishReason::Complete,
        }));

        Ok(Box::pin(tokio_stream::iter(items)))
    }
}
