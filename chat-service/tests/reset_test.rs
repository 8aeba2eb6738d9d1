mod common;

use chat_service::config::ChatConfig;
use chat_service::startup::Application;
use common::TestApp;
use reqwest::multipart;
use std::time::Duration;

#[tokio::test]
async fn reset_clears_sessions_and_schedules_image_cleanup() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    // Build up one session with an image attached.
    let form = TestApp::chat_form("describe this").part(
        "image",
        multipart::Part::bytes(vec![9, 9, 9])
            .file_name("photo.jpg")
            .mime_str("image/jpeg")
            .unwrap(),
    );
    client
        .post(format!("{}/api/chat", app.address))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read body");
    assert_eq!(app.stored_images().len(), 1);

    let response = client
        .post(format!("{}/api/reset-chat", app.address))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["message"], "Chat history cleared");

    // Cleanup is detached; poll until the prefix is empty.
    let mut cleaned = false;
    for _ in 0..50 {
        if app.stored_images().is_empty() {
            cleaned = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(cleaned, "stored images were not cleaned up");

    // The next message on the same (default) session starts a brand-new
    // conversation: the provider sees a single user turn, no history.
    client
        .post(format!("{}/api/chat", app.address))
        .multipart(TestApp::chat_form("are you still there?"))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read body");

    let calls = app.provider.calls();
    let last = calls.last().unwrap();
    assert_eq!(last.contents.len(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn reset_fails_with_500_when_bucket_is_unconfigured() {
    std::env::set_var("GOOGLE_API_KEY", "test-api-key");
    let mut config = ChatConfig::load().expect("Failed to load configuration");
    config.common.port = 0;
    config.models.provider = "mock".to_string();
    config.storage.backend = "s3".to_string();
    config.storage.bucket = String::new();
    config.prompt.path = format!("target/test-prompt-{}.txt", uuid::Uuid::new_v4());
    let prompt_path = config.prompt.path.clone();

    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let port = app.port();
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{}/api/reset-chat", port))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("storage bucket not configured"));

    let _ = tokio::fs::remove_file(&prompt_path).await;
}
