//! Mock backend for tests and local development.

use super::{GenerationOutput, GenerationParams, ProviderError, VisionLanguageModel};
use crate::models::Conversation;
use async_trait::async_trait;
use std::time::Duration;

/// Deterministic backend that echoes the conversation back.
///
/// Output is cut to `max_new_tokens` whitespace-separated words so callers
/// can observe the generation budget.
pub struct MockVisionModel {
    model_id: String,
    enabled: bool,
    latency: Duration,
}

impl MockVisionModel {
    pub fn new(model_id: impl Into<String>, enabled: bool) -> Self {
        Self {
            model_id: model_id.into(),
            enabled,
            latency: Duration::ZERO,
        }
    }

    /// Simulate inference time on every generation call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn not_enabled() -> ProviderError {
        ProviderError::NotConfigured("Mock vision model not enabled".to_string())
    }
}

#[async_trait]
impl VisionLanguageModel for MockVisionModel {
    async fn generate(
        &self,
        conversation: &Conversation,
        params: &GenerationParams,
    ) -> Result<GenerationOutput, ProviderError> {
        if !self.enabled {
            return Err(Self::not_enabled());
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let prompt = conversation.prompt_text();
        let full = match conversation.images().next() {
            Some(image) => format!(
                "Mock answer for {}x{} image: {}",
                image.width(),
                image.height(),
                prompt
            ),
            None => format!("Mock response for: {}", prompt),
        };

        let words: Vec<&str> = full
            .split_whitespace()
            .take(params.max_new_tokens as usize)
            .collect();

        Ok(GenerationOutput {
            sequences: vec![words.join(" ")],
            prompt_tokens: Some(prompt.split_whitespace().count() as u32),
            completion_tokens: Some(words.len() as u32),
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.enabled {
            Ok(())
        } else {
            Err(Self::not_enabled())
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
