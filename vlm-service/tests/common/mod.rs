#![allow(dead_code)]

use service_core::config::Config as CoreConfig;
use std::collections::HashMap;
use std::io::Cursor;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use vlm_service::config::VlmConfig;
use vlm_service::services::{MockVisionModel, VisionLanguageModel};
use vlm_service::startup::Application;

pub const TEST_MODEL_ID: &str = "test/lfm2-vl-mock";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
}

/// Configuration pointing at the mock backend on a random local port.
pub fn test_config(vars: &[(&str, &str)]) -> VlmConfig {
    let mut env: HashMap<String, String> = HashMap::from([
        ("VLM_BACKEND".to_string(), "mock".to_string()),
        ("VLM_MODEL_ID".to_string(), TEST_MODEL_ID.to_string()),
    ]);
    for (k, v) in vars {
        env.insert(k.to_string(), v.to_string());
    }

    let common = CoreConfig {
        port: 0, // Random port for testing
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
    };
    VlmConfig::from_lookup(common, false, |k| env.get(k).cloned())
        .expect("Failed to build test configuration")
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config(&[]), None).await
    }

    pub async fn spawn_with_model(model: Arc<dyn VisionLanguageModel>) -> Self {
        Self::spawn_with(test_config(&[]), Some(model)).await
    }

    pub async fn spawn_with(
        config: VlmConfig,
        model: Option<Arc<dyn VisionLanguageModel>>,
    ) -> Self {
        let app = match model {
            Some(model) => Application::build_with_model(config, model).await,
            None => Application::build(config).await,
        }
        .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            client,
        }
    }

    pub fn disabled_model() -> Arc<dyn VisionLanguageModel> {
        Arc::new(MockVisionModel::new(TEST_MODEL_ID, false))
    }

    pub async fn post_generate(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}/generate", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_vqa(&self, form: reqwest::multipart::Form) -> reqwest::Response {
        self.client
            .post(format!("{}/vqa", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// A small solid-color JPEG.
pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([30, 120, 220]),
    ));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .expect("Failed to encode JPEG");
    out.into_inner()
}

pub fn image_part(bytes: Vec<u8>, file_name: &str, mime: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .expect("Invalid mime type")
}
