use serde::{Deserialize, Serialize};
use validator::Validate;

/// Generation parameters accepted on every chat request.
///
/// All four fields are required form fields; values are validated against
/// the provider's accepted ranges before any upstream call is made.
#[derive(Debug, Clone, Validate)]
pub struct GenerationOptions {
    #[validate(range(min = 1, max = 8192))]
    pub max_output_tokens: i32,

    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,

    #[validate(range(min = 0.0, max = 1.0))]
    pub top_p: f32,

    #[validate(length(min = 1))]
    pub model_name: String,
}

/// Body of `POST /api/edit-prompt`.
///
/// The `image` field is accepted for wire compatibility with existing
/// clients but is ignored by the server.
#[derive(Debug, Deserialize)]
pub struct EditPromptRequest {
    pub content: String,

    #[serde(default)]
    pub image: Option<String>,
}

/// Generic `{"message": ...}` acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Body of `GET /api/get-prompt`.
#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub prompt: String,
}
