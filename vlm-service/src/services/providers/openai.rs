//! Backend for OpenAI-compatible inference servers.
//!
//! The processor and the model live in the inference server (llama.cpp
//! `llama-server`, vLLM, ...). It applies the model's chat template with the
//! generation prompt appended, runs generation and decodes the output with
//! special tokens skipped. This type only maps conversations onto the
//! `/chat/completions` wire format.

use super::{GenerationOutput, GenerationParams, ProviderError, VisionLanguageModel};
use crate::models::{ContentItem, Conversation};
use crate::services::image::to_png_data_url;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use service_core::observability::{TracedClientExt, TracedRequest};
use std::time::Duration;

/// Connection settings for the inference server.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    /// Base URL including the API prefix, without trailing slash.
    pub base_url: String,
    pub model_id: String,
    pub api_key: Option<SecretString>,
    /// `None` waits as long as generation takes.
    pub request_timeout: Option<Duration>,
}

pub struct OpenAiCompatibleModel {
    config: OpenAiCompatibleConfig,
    client: Client,
}

impl OpenAiCompatibleModel {
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, ProviderError> {
        let mut builder = Client::builder().connect_timeout(Duration::from_secs(10));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Connect and make sure the configured model is being served.
    ///
    /// Called once at startup; any error here aborts the process.
    pub async fn load(config: OpenAiCompatibleConfig) -> Result<Self, ProviderError> {
        let model = Self::new(config)?;

        tracing::info!(
            model = %model.config.model_id,
            backend = %model.config.base_url,
            "Loading vision-language model"
        );

        model.ensure_model_served().await?;

        tracing::info!(model = %model.config.model_id, "Vision-language model ready");
        Ok(model)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    fn authorized(&self, request: TracedRequest) -> TracedRequest {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let response = self
            .authorized(self.client.traced_get(&self.url("models")))
            .send()
            .await?;
        let response = check_status(response).await?;

        let models: ModelList = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    async fn ensure_model_served(&self) -> Result<(), ProviderError> {
        let served = self.list_models().await?;
        if served.iter().any(|id| id == &self.config.model_id) {
            Ok(())
        } else {
            Err(ProviderError::ModelNotFound {
                model: self.config.model_id.clone(),
                available: served.join(", "),
            })
        }
    }

    fn build_request(
        &self,
        conversation: &Conversation,
        params: &GenerationParams,
    ) -> Result<ChatCompletionRequest, ProviderError> {
        let messages = conversation
            .messages()
            .iter()
            .map(|message| -> Result<ChatMessage, ProviderError> {
                let content = message
                    .content
                    .iter()
                    .map(|item| -> Result<ContentPart, ProviderError> {
                        Ok(match item {
                            ContentItem::Text { text } => ContentPart::Text { text: text.clone() },
                            ContentItem::Image { image } => ContentPart::ImageUrl {
                                image_url: ImageUrl {
                                    url: to_png_data_url(image)?,
                                },
                            },
                        })
                    })
                    .collect::<Result<Vec<_>, ProviderError>>()?;

                Ok(ChatMessage {
                    role: message.role.as_str(),
                    content,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(ChatCompletionRequest {
            model: self.config.model_id.clone(),
            messages,
            max_tokens: params.max_new_tokens,
            temperature: params.temperature,
            n: 1,
            stream: false,
        })
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl VisionLanguageModel for OpenAiCompatibleModel {
    async fn generate(
        &self,
        conversation: &Conversation,
        params: &GenerationParams,
    ) -> Result<GenerationOutput, ProviderError> {
        let request = self.build_request(conversation, params)?;

        tracing::debug!(
            model = %self.config.model_id,
            max_tokens = request.max_tokens,
            temperature = ?request.temperature,
            "Sending chat completion request"
        );

        let response = self
            .authorized(self.client.traced_post(&self.url("chat/completions")))
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let mut completion: ChatCompletionResponse = response.json().await?;
        completion.choices.sort_by_key(|c| c.index);

        let sequences = completion
            .choices
            .into_iter()
            .map(|c| c.message.content.unwrap_or_default())
            .collect();
        let usage = completion.usage.unwrap_or_default();

        Ok(GenerationOutput {
            sequences,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.ensure_model_served().await
    }

    fn model_id(&self) -> &str {
        &self.config.model_id
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    n: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    index: u32,
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use serde_json::json;

    fn model() -> OpenAiCompatibleModel {
        OpenAiCompatibleModel::new(OpenAiCompatibleConfig {
            base_url: "http://localhost:8000/v1".to_string(),
            model_id: "org/vlm".to_string(),
            api_key: None,
            request_timeout: None,
        })
        .unwrap()
    }

    #[test]
    fn text_request_matches_wire_format() {
        let request = model()
            .build_request(
                &Conversation::from_prompt("Hello"),
                &GenerationParams {
                    max_new_tokens: 200,
                    temperature: Some(0.7),
                },
            )
            .unwrap();

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "org/vlm");
        assert_eq!(value["max_tokens"], 200);
        assert_eq!(value["n"], 1);
        assert_eq!(value["stream"], false);
        assert!((value["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(
            value["messages"],
            json!([{ "role": "user", "content": [{ "type": "text", "text": "Hello" }] }])
        );
    }

    #[test]
    fn image_request_omits_temperature_and_orders_parts() {
        let request = model()
            .build_request(
                &Conversation::from_image_question(RgbImage::new(2, 2), "What color is this?"),
                &GenerationParams {
                    max_new_tokens: 64,
                    temperature: None,
                },
            )
            .unwrap();

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("temperature").is_none());

        let content = &value["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image_url");
        assert!(content[0]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert_eq!(content[1], json!({ "type": "text", "text": "What color is this?" }));
    }

    #[test]
    fn parses_completion_with_missing_usage() {
        let parsed: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "hi" } }]
        }))
        .unwrap();

        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi"));
        assert!(parsed.usage.is_none());
    }
}
