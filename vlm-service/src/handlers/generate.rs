use axum::{extract::State, Json};
use validator::Validate;

use crate::dtos::{GenerateRequest, GenerateResponse};
use crate::models::Conversation;
use crate::services::GenerationParams;
use crate::startup::AppState;
use service_core::error::AppError;

use super::generate_first;

/// POST /generate - text-only generation.
#[tracing::instrument(skip(state, request))]
pub async fn generate_text(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    request.validate()?;

    let conversation = Conversation::from_prompt(request.prompt.as_str());
    let params = GenerationParams {
        max_new_tokens: request.max_new_tokens,
        temperature: Some(request.temperature),
    };

    let generated_text = generate_first(&state, "generate", &conversation, &params).await?;

    Ok(Json(GenerateResponse {
        prompt: request.prompt,
        generated_text,
    }))
}
