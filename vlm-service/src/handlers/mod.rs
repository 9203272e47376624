pub mod generate;
pub mod health;
pub mod vqa;

pub use generate::generate_text;
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use vqa::visual_question_answering;

use crate::models::Conversation;
use crate::services::{record_generation, GenerationParams};
use crate::startup::AppState;
use service_core::error::AppError;
use std::time::Instant;

/// Run one generation call and keep the first decoded sequence.
///
/// Waits for a permit first when a concurrency limit is configured.
pub(crate) async fn generate_first(
    state: &AppState,
    endpoint: &'static str,
    conversation: &Conversation,
    params: &GenerationParams,
) -> Result<String, AppError> {
    let _permit = match &state.generation_permits {
        Some(permits) => Some(
            permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| AppError::ServiceUnavailable)?,
        ),
        None => None,
    };

    let start = Instant::now();
    let result = state.model.generate(conversation, params).await;
    let elapsed = start.elapsed();

    match result {
        Ok(output) => {
            record_generation(endpoint, "success", elapsed);
            tracing::info!(
                endpoint,
                model = %state.model.model_id(),
                prompt_tokens = ?output.prompt_tokens,
                completion_tokens = ?output.completion_tokens,
                sequences = output.sequences.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Generation completed"
            );
            output.into_first().ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!("Model returned no sequences"))
            })
        }
        Err(e) => {
            record_generation(endpoint, "error", elapsed);
            tracing::error!(endpoint, error = %e, "Generation failed");
            Err(e.into())
        }
    }
}
