use crate::dtos::{EditPromptRequest, MessageResponse, PromptResponse};
use crate::startup::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;

/// `GET /api/get-prompt` — the current system instruction, verbatim.
pub async fn get_prompt(State(state): State<AppState>) -> Json<PromptResponse> {
    Json(PromptResponse {
        prompt: state.prompt.get().await,
    })
}

/// `POST /api/edit-prompt` — replace the system instruction in full.
pub async fn edit_prompt(
    State(state): State<AppState>,
    Json(request): Json<EditPromptRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.prompt.edit(request.content).await?;
    tracing::info!(path = %state.prompt.path().display(), "system prompt replaced");

    Ok(Json(MessageResponse {
        message: "Prompt edited successfully".to_string(),
    }))
}
