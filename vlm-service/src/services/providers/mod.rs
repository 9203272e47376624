//! Vision-language model backends.
//!
//! Handlers only see the [`VisionLanguageModel`] trait, so the backend is
//! chosen once at startup and injected through the application state.

pub mod mock;
pub mod openai;

pub use mock::MockVisionModel;
pub use openai::{OpenAiCompatibleConfig, OpenAiCompatibleModel};

use crate::models::Conversation;
use crate::services::image::ImageError;
use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;

/// Error type for backend operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Model '{model}' is not served by the backend (available: {available})")]
    ModelNotFound { model: String, available: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend timed out: {0}")]
    Timeout(String),

    #[error("Backend API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Image(#[from] ImageError),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(_) => AppError::ServiceUnavailable,
            ProviderError::Timeout(msg) => AppError::GatewayTimeout(msg),
            ProviderError::Image(e) => AppError::InternalError(anyhow::Error::new(e)),
            other @ (ProviderError::ModelNotFound { .. }
            | ProviderError::Network(_)
            | ProviderError::Api { .. }
            | ProviderError::InvalidResponse(_)) => AppError::BadGateway(other.to_string()),
        }
    }
}

/// Decoding knobs for a single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Upper bound on newly generated tokens.
    pub max_new_tokens: u32,

    /// Sampling temperature. `None` keeps the backend's default.
    pub temperature: Option<f32>,
}

/// Decoded output of one generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    /// Decoded sequences of the batch, special tokens stripped.
    pub sequences: Vec<String>,

    /// Prompt tokens consumed, when reported.
    pub prompt_tokens: Option<u32>,

    /// Tokens generated, when reported.
    pub completion_tokens: Option<u32>,
}

impl GenerationOutput {
    /// First decoded sequence of the batch.
    pub fn into_first(self) -> Option<String> {
        self.sequences.into_iter().next()
    }
}

/// A loaded processor/model pair able to answer a conversation.
#[async_trait]
pub trait VisionLanguageModel: Send + Sync {
    /// Template the conversation, generate, and decode.
    async fn generate(
        &self,
        conversation: &Conversation,
        params: &GenerationParams,
    ) -> Result<GenerationOutput, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;

    /// Identifier of the model being served.
    fn model_id(&self) -> &str;
}
