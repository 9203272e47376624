use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_GENERATE_MAX_NEW_TOKENS: u32 = 200;
pub const DEFAULT_GENERATE_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_VQA_MAX_NEW_TOKENS: u32 = 64;

fn default_max_new_tokens() -> u32 {
    DEFAULT_GENERATE_MAX_NEW_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_GENERATE_TEMPERATURE
}

/// Body of `POST /generate`.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default = "default_max_new_tokens")]
    #[validate(range(min = 1, message = "max_new_tokens must be at least 1"))]
    pub max_new_tokens: u32,
    #[serde(default = "default_temperature")]
    #[validate(range(min = 0.0, message = "temperature must not be negative"))]
    pub temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub prompt: String,
    pub generated_text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VqaResponse {
    pub question: String,
    pub answer: String,
}
