//! Application startup and lifecycle management.
//!
//! The model is loaded once here and handed to every handler through
//! [`AppState`]; nothing about it is global.

use crate::config::{BackendKind, VlmConfig};
use crate::handlers;
use crate::services::{
    MockVisionModel, OpenAiCompatibleConfig, OpenAiCompatibleModel, VisionLanguageModel,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    tracing::{make_request_span, request_id_middleware},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: VlmConfig,
    pub model: Arc<dyn VisionLanguageModel>,
    /// Present when concurrent generation calls are capped.
    pub generation_permits: Option<Arc<Semaphore>>,
}

impl AppState {
    pub fn new(config: VlmConfig, model: Arc<dyn VisionLanguageModel>) -> Self {
        let generation_permits = config
            .server
            .max_concurrent_generations
            .map(|n| Arc::new(Semaphore::new(n)));

        Self {
            config,
            model,
            generation_permits,
        }
    }
}

/// Load the backend selected by the configuration.
///
/// Any failure here is fatal: the service never starts without a model.
pub async fn load_model(config: &VlmConfig) -> Result<Arc<dyn VisionLanguageModel>, AppError> {
    match config.backend.kind {
        BackendKind::OpenAi => {
            let model = OpenAiCompatibleModel::load(OpenAiCompatibleConfig {
                base_url: config.backend.base_url.clone(),
                model_id: config.model.id.clone(),
                api_key: config.backend.api_key.clone(),
                request_timeout: config.backend.request_timeout,
            })
            .await
            .map_err(|e| {
                tracing::error!(model = %config.model.id, "Failed to load model: {}", e);
                AppError::InternalError(anyhow::anyhow!(
                    "Failed to load model '{}': {}",
                    config.model.id,
                    e
                ))
            })?;
            Ok(Arc::new(model))
        }
        BackendKind::Mock => {
            tracing::warn!(model = %config.model.id, "Using mock vision-language model");
            Ok(Arc::new(MockVisionModel::new(config.model.id.clone(), true)))
        }
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return Some(layer.allow_origin(Any));
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    Some(layer.allow_origin(allowed))
}

/// Build the HTTP router around an already constructed state.
pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.server.max_upload_bytes;
    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    let router = Router::new()
        .route("/generate", post(handlers::generate_text))
        .route("/vqa", post(handlers::visual_question_answering))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route_layer(from_fn(metrics_middleware))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<axum::body::Body>))
        .layer(from_fn(request_id_middleware))
        .with_state(state);

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    /// Load the configured model and bind the listener.
    pub async fn build(config: VlmConfig) -> Result<Self, AppError> {
        let model = load_model(&config).await?;
        Self::build_with_model(config, model).await
    }

    /// Bind the listener around an injected model (used by tests).
    pub async fn build_with_model(
        config: VlmConfig,
        model: Arc<dyn VisionLanguageModel>,
    ) -> Result<Self, AppError> {
        let addr = config.common.listen_addr();
        let state = AppState::new(config, model);
        let router = build_router(state.clone());

        // Port 0 = random port for testing
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            model = %state.model.model_id(),
            max_concurrent_generations = ?state.config.server.max_concurrent_generations,
            "VLM service listening"
        );

        Ok(Self {
            port,
            listener,
            router,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }

    /// Run until `signal` resolves, then drain in-flight requests.
    pub async fn run_with_shutdown<F>(self, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await
    }
}
