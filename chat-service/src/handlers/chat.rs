use crate::dtos::{GenerationOptions, MessageResponse};
use crate::services::chat::stream_reply;
use crate::services::sessions::DEFAULT_SESSION_KEY;
use crate::startup::AppState;
use axum::{
    body::Body,
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

/// Parsed `POST /api/chat` form.
struct ChatForm {
    content: String,
    image: Option<(String, Vec<u8>)>,
    session_id: Option<String>,
    options: GenerationOptions,
}

async fn read_chat_form(mut multipart: Multipart) -> Result<ChatForm, AppError> {
    let mut content = None;
    let mut image = None;
    let mut session_id = None;
    let mut max_output_tokens = None;
    let mut temperature = None;
    let mut top_p = None;
    let mut model_name = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("content") => content = Some(read_text(field, "content").await?),
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "upload".to_string());
                let data = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read image bytes: {}", e))
                })?;
                image = Some((filename, data.to_vec()));
            }
            Some("session_id") => session_id = Some(read_text(field, "session_id").await?),
            Some("max_output_tokens") => {
                max_output_tokens = Some(parse_field(field, "max_output_tokens").await?)
            }
            Some("temperature") => temperature = Some(parse_field(field, "temperature").await?),
            Some("top_p") => top_p = Some(parse_field(field, "top_p").await?),
            Some("model_name") => model_name = Some(read_text(field, "model_name").await?),
            _ => {}
        }
    }

    let options = GenerationOptions {
        max_output_tokens: require(max_output_tokens, "max_output_tokens")?,
        temperature: require(temperature, "temperature")?,
        top_p: require(top_p, "top_p")?,
        model_name: require(model_name, "model_name")?,
    };
    options.validate()?;

    Ok(ChatForm {
        content: require(content, "content")?,
        image,
        session_id,
        options,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read field {}: {}", name, e)))
}

async fn parse_field<T: std::str::FromStr>(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<T, AppError> {
    let raw = read_text(field, name).await?;
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Field {} is not a valid number", name)))
}

fn require<T>(value: Option<T>, name: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Field {} is required", name)))
}

/// `POST /api/chat` — forward one message to the model and stream the
/// reply back as plain text.
pub async fn chat(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_chat_form(multipart).await?;

    let session_key = form
        .session_id
        .unwrap_or_else(|| DEFAULT_SESSION_KEY.to_string());

    // The image must be durable before the model is pointed at it.
    let image_uri = match form.image {
        Some((filename, data)) => {
            let images = state.images.as_ref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("storage bucket not configured"))
            })?;
            Some(images.store(&filename, data).await?)
        }
        None => None,
    };

    let stream = stream_reply(&state, &session_key, form.content, image_uri, &form.options).await?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

/// `POST /api/reset-chat` — drop every conversation, then clean stored
/// images up in the background.
pub async fn reset_chat(State(state): State<AppState>) -> Result<Json<MessageResponse>, AppError> {
    let images = state
        .images
        .clone()
        .ok_or_else(|| AppError::ConfigError(anyhow::anyhow!("storage bucket not configured")))?;

    let cleared = state.sessions.clear_all();
    tracing::info!(cleared, "chat sessions cleared");

    // Detached cleanup: the caller gets its response regardless of how
    // (or whether) deletion finishes.
    tokio::spawn(async move {
        match images.purge().await {
            Ok(deleted) => tracing::info!(deleted, "image cleanup finished"),
            Err(e) => tracing::error!(error = %e, "image cleanup failed"),
        }
    });

    Ok(Json(MessageResponse {
        message: "Chat history cleared".to_string(),
    }))
}
