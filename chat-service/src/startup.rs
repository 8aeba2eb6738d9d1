//! Application startup and lifecycle management.

use crate::config::ChatConfig;
use crate::handlers;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::mock::MockTextProvider;
use crate::services::providers::TextProvider;
use crate::services::{ImageStore, LocalStorage, PromptStore, S3Storage, SessionRegistry, Storage};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Uploads are read fully into memory before hitting blob storage.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ChatConfig,
    pub sessions: Arc<SessionRegistry>,
    pub provider: Arc<dyn TextProvider>,
    pub images: Option<Arc<ImageStore>>,
    pub prompt: Arc<PromptStore>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/chat", post(handlers::chat::chat))
        .route("/api/reset-chat", post(handlers::chat::reset_chat))
        .route("/api/get-prompt", get(handlers::prompt::get_prompt))
        .route("/api/edit-prompt", post(handlers::prompt::edit_prompt))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application from configuration alone, constructing the
    /// provider and storage backend it names.
    pub async fn build(config: ChatConfig) -> Result<Self, AppError> {
        let provider: Arc<dyn TextProvider> = match config.models.provider.as_str() {
            "mock" => Arc::new(MockTextProvider::new(["Mock", " reply"])),
            _ => Arc::new(GeminiTextProvider::new(GeminiConfig {
                api_key: config.google.api_key.clone(),
            })),
        };

        let storage = build_storage(&config).await?;

        Self::build_with(config, provider, storage).await
    }

    /// Build the application around an existing provider and storage
    /// backend. Tests use this to inject recording doubles.
    pub async fn build_with(
        config: ChatConfig,
        provider: Arc<dyn TextProvider>,
        storage: Option<Arc<dyn Storage>>,
    ) -> Result<Self, AppError> {
        let prompt = Arc::new(PromptStore::load(&config.prompt.path).await?);
        tracing::info!(path = %config.prompt.path, "system prompt loaded");

        let images = storage.map(|storage| {
            Arc::new(ImageStore::new(
                storage,
                config.storage.image_prefix.clone(),
                config.storage.pool_size,
            ))
        });
        if images.is_none() {
            tracing::warn!("no storage bucket configured; image requests will fail");
        }

        let state = AppState {
            config: config.clone(),
            sessions: Arc::new(SessionRegistry::new()),
            provider,
            images,
            prompt,
        };

        // Port 0 = random port for testing.
        let addr: SocketAddr = format!("{}:{}", config.common.host, config.common.port)
            .parse()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("invalid listen address: {}", e)))?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.listener, router).await
    }
}

async fn build_storage(config: &ChatConfig) -> Result<Option<Arc<dyn Storage>>, AppError> {
    match config.storage.backend.as_str() {
        "local" => {
            let storage = LocalStorage::new(&config.storage.local_path).await?;
            Ok(Some(Arc::new(storage)))
        }
        "s3" => {
            if config.storage.bucket.is_empty() {
                return Ok(None);
            }
            let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .load()
                .await;
            let client = aws_sdk_s3::Client::new(&sdk_config);
            Ok(Some(Arc::new(S3Storage::new(
                client,
                config.storage.bucket.clone(),
            ))))
        }
        other => Err(AppError::ConfigError(anyhow::anyhow!(
            "unknown storage backend: {}",
            other
        ))),
    }
}
