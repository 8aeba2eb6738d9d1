mod common;

use chat_service::services::PromptStore;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn get_prompt_is_empty_when_no_file_exists() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/get-prompt", app.address))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["prompt"], "");

    app.cleanup().await;
}

#[tokio::test]
async fn edit_prompt_roundtrips_and_persists() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/edit-prompt", app.address))
        .json(&json!({"content": "You are a terse assistant."}))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["message"], "Prompt edited successfully");

    // The running process serves the new prompt.
    let body: serde_json::Value = client
        .get(format!("{}/api/get-prompt", app.address))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(body["prompt"], "You are a terse assistant.");

    // The edit hit the file before it was served, so a fresh process
    // reading the same path observes it too.
    let on_disk = tokio::fs::read_to_string(&app.prompt_path)
        .await
        .expect("prompt file missing");
    assert_eq!(on_disk, "You are a terse assistant.");

    let fresh = PromptStore::load(&app.prompt_path).await.unwrap();
    assert_eq!(fresh.get().await, "You are a terse assistant.");

    app.cleanup().await;
}

#[tokio::test]
async fn edit_prompt_accepts_the_legacy_image_field() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/edit-prompt", app.address))
        .json(&json!({"content": "X", "image": "ignored"}))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: serde_json::Value = client
        .get(format!("{}/api/get-prompt", app.address))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(body["prompt"], "X");

    app.cleanup().await;
}

#[tokio::test]
async fn edited_prompt_is_sent_as_system_instruction() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/edit-prompt", app.address))
        .json(&json!({"content": "Answer in French."}))
        .send()
        .await
        .expect("Failed to send request");

    client
        .post(format!("{}/api/chat", app.address))
        .multipart(TestApp::chat_form("bonjour"))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read body");

    let calls = app.provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].system_instruction.as_deref(), Some("Answer in French."));

    app.cleanup().await;
}
