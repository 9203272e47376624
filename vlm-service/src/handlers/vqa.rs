use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::dtos::{VqaResponse, DEFAULT_VQA_MAX_NEW_TOKENS};
use crate::models::Conversation;
use crate::services::image::decode_rgb;
use crate::services::GenerationParams;
use crate::startup::AppState;
use service_core::error::AppError;

use super::generate_first;

/// Fields of the `/vqa` multipart form.
struct VqaForm {
    image: Vec<u8>,
    file_name: Option<String>,
    question: String,
    max_new_tokens: u32,
}

async fn read_form(mut multipart: Multipart) -> Result<VqaForm, AppError> {
    let mut image = None;
    let mut file_name = None;
    let mut question = None;
    let mut max_new_tokens = DEFAULT_VQA_MAX_NEW_TOKENS;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e))
                })?;
                image = Some(bytes.to_vec());
            }
            "question" => {
                question = Some(field.text().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read question: {}", e))
                })?);
            }
            "max_new_tokens" => {
                let raw = field.text().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read max_new_tokens: {}", e))
                })?;
                max_new_tokens = raw
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        AppError::BadRequest(anyhow::anyhow!(
                            "max_new_tokens must be a positive integer, got '{}'",
                            raw
                        ))
                    })?;
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(VqaForm {
        image: image.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing field `file`")))?,
        file_name,
        question: question
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing field `question`")))?,
        max_new_tokens,
    })
}

/// POST /vqa - answer a question about an uploaded image.
#[tracing::instrument(skip(state, multipart))]
pub async fn visual_question_answering(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<VqaResponse>, AppError> {
    let form = read_form(multipart).await?;

    tracing::info!(
        file_name = ?form.file_name,
        size = form.image.len(),
        max_new_tokens = form.max_new_tokens,
        "VQA request received"
    );

    // Decoding is CPU bound; keep it off the async workers.
    let image = tokio::task::spawn_blocking(move || decode_rgb(&form.image))
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Image decode task failed: {}", e)))?
        .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

    let conversation = Conversation::from_image_question(image, form.question.as_str());
    let params = GenerationParams {
        max_new_tokens: form.max_new_tokens,
        temperature: None,
    };

    let answer = generate_first(&state, "vqa", &conversation, &params).await?;

    Ok(Json(VqaResponse {
        question: form.question,
        answer,
    }))
}
