use chat_service::config::ChatConfig;
use chat_service::services::providers::mock::MockTextProvider;
use chat_service::services::{LocalStorage, Storage};
use chat_service::startup::Application;
use std::sync::Arc;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub provider: Arc<MockTextProvider>,
    pub storage_path: String,
    pub prompt_path: String,
}

impl TestApp {
    /// Spawn the application with a default three-fragment script.
    pub async fn spawn() -> Self {
        Self::spawn_with(MockTextProvider::new(["Hello", " from", " mock"])).await
    }

    /// Spawn the application around the given provider double.
    pub async fn spawn_with(provider: MockTextProvider) -> Self {
        std::env::set_var("GOOGLE_API_KEY", "test-api-key");

        let mut config = ChatConfig::load().expect("Failed to load configuration");
        config.common.port = 0; // Random port for testing
        config.storage.backend = "local".to_string();
        config.storage.local_path = format!("target/test-storage-{}", Uuid::new_v4());
        config.prompt.path = format!("target/test-prompt-{}.txt", Uuid::new_v4());

        let storage_path = config.storage.local_path.clone();
        let prompt_path = config.prompt.path.clone();

        let provider = Arc::new(provider);
        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(&storage_path)
                .await
                .expect("Failed to create test storage"),
        );

        let app = Application::build_with(config, provider.clone(), Some(storage))
            .await
            .expect("Failed to build test application");
        let port = app.port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        TestApp {
            address: format!("http://127.0.0.1:{}", port),
            port,
            provider,
            storage_path,
            prompt_path,
        }
    }

    /// A valid chat form carrying `content` and the required generation
    /// parameters.
    pub fn chat_form(content: &str) -> reqwest::multipart::Form {
        reqwest::multipart::Form::new()
            .text("content", content.to_string())
            .text("max_output_tokens", "8192")
            .text("temperature", "0.3")
            .text("top_p", "0.95")
            .text("model_name", "gemini-1.5-flash-002")
    }

    /// Files currently stored under the image prefix.
    pub fn stored_images(&self) -> Vec<String> {
        let dir = std::path::Path::new(&self.storage_path).join("images");
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Cleanup test resources (storage directory and prompt file).
    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.storage_path).await;
        let _ = tokio::fs::remove_file(&self.prompt_path).await;
    }
}
