//! Drives one chat request through its conversation session and streams
//! the model's reply back as it arrives.

use crate::dtos::GenerationOptions;
use crate::services::providers::{
    Content, ContentPart, FileData, GenerationParams, ProviderError, SafetySetting, StreamChunk,
};
use crate::startup::AppState;
use futures::StreamExt;
use service_core::error::AppError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Incremental reply fragments, in provider emission order.
pub type ReplyStream = ReceiverStream<Result<String, ProviderError>>;

/// Resolve (or create) the conversation for `session_key`, send `message`
/// through it, and return the streamed reply.
///
/// The returned stream yields each fragment as soon as the provider emits
/// it. Once the provider signals completion the exchange is appended to
/// the conversation history; if the caller disconnects first, the
/// upstream call is abandoned and the turn is not recorded.
pub async fn stream_reply(
    state: &AppState,
    session_key: &str,
    message: String,
    image_uri: Option<String>,
    options: &GenerationOptions,
) -> Result<ReplyStream, AppError> {
    let session = state.sessions.get_or_create(session_key, &options.model_name);
    let guard = session.lock_owned().await;

    // The image reference goes first; its declared mime type is always
    // image/jpeg, whatever the upload actually contained.
    let mut parts = Vec::new();
    if let Some(uri) = image_uri {
        parts.push(ContentPart::FileData {
            file_data: FileData {
                mime_type: "image/jpeg".to_string(),
                file_uri: uri,
            },
        });
    }
    parts.push(ContentPart::Text {
        text: message.clone(),
    });
    let user_turn = Content::user(parts);

    let contents = guard.contents_with(user_turn.clone());
    let params = GenerationParams {
        temperature: Some(options.temperature),
        top_p: Some(options.top_p),
        max_output_tokens: Some(options.max_output_tokens),
    };

    let system_prompt = state.prompt.get().await;
    let system_instruction = (!system_prompt.is_empty()).then_some(system_prompt);

    let upstream = state
        .provider
        .stream_message(
            &options.model_name,
            system_instruction.as_deref(),
            contents,
            &params,
            &SafetySetting::permissive(),
        )
        .await
        .map_err(|e| AppError::ProviderError(anyhow::anyhow!(e)))?;

    let session_key = session_key.to_string();
    let (tx, rx) = mpsc::channel::<Result<String, ProviderError>>(32);

    tokio::spawn(async move {
        let mut guard = guard;
        let mut upstream = upstream;
        let mut reply = String::new();

        while let Some(item) = upstream.next().await {
            match item {
                Ok(StreamChunk::Text(text)) => {
                    reply.push_str(&text);
                    if tx.send(Ok(text)).await.is_err() {
                        // Caller disconnected mid-stream; dropping the
                        // upstream cancels the provider call, and the
                        // partial turn is not recorded.
                        tracing::debug!(session_key = %session_key, "caller disconnected mid-stream");
                        return;
                    }
                }
                Ok(StreamChunk::Complete {
                    input_tokens,
                    output_tokens,
                    finish_reason,
                }) => {
                    tracing::info!(
                        session_key = %session_key,
                        input_tokens,
                        output_tokens,
                        finish_reason = ?finish_reason,
                        "reply complete"
                    );
                    break;
                }
                Err(e) => {
                    tracing::error!(session_key = %session_key, error = %e, "provider stream failed");
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }

        guard.push_turn(user_turn, reply);
    });

    Ok(ReceiverStream::new(rx))
}
