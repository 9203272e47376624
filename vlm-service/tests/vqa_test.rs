mod common;

use common::{image_part, sample_jpeg, test_config, TestApp};
use reqwest::multipart::Form;
use reqwest::StatusCode;

#[tokio::test]
async fn vqa_answers_question_about_jpeg() {
    let app = TestApp::spawn().await;

    let form = Form::new()
        .part("file", image_part(sample_jpeg(32, 24), "photo.jpg", "image/jpeg"))
        .text("question", "What color is this?");

    let response = app.post_vqa(form).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["question"], "What color is this?");
    let answer = body["answer"].as_str().expect("answer is a string");
    assert!(!answer.is_empty());
    assert!(answer.contains("32x24"), "image did not reach the model: {}", answer);
}

#[tokio::test]
async fn vqa_default_budget_is_64_tokens() {
    let app = TestApp::spawn().await;
    let question = vec!["why"; 100].join(" ");

    let form = Form::new()
        .part("file", image_part(sample_jpeg(8, 8), "photo.jpg", "image/jpeg"))
        .text("question", question);

    let response = app.post_vqa(form).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["answer"].as_str().unwrap().split_whitespace().count(), 64);
}

#[tokio::test]
async fn vqa_reads_max_new_tokens_form_field() {
    let app = TestApp::spawn().await;

    let form = Form::new()
        .part("file", image_part(sample_jpeg(8, 8), "photo.jpg", "image/jpeg"))
        .text("question", "この画像を説明してください")
        .text("max_new_tokens", "3");

    let response = app.post_vqa(form).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["question"], "この画像を説明してください");
    assert_eq!(body["answer"], "Mock answer for");
}

#[tokio::test]
async fn vqa_non_image_upload_is_server_error() {
    let app = TestApp::spawn().await;

    let form = Form::new()
        .part(
            "file",
            image_part(b"plain text, not pixels".to_vec(), "notes.txt", "text/plain"),
        )
        .text("question", "What color is this?");

    let response = app.post_vqa(form).await;

    assert!(response.status().is_server_error(), "got {}", response.status());
}

#[tokio::test]
async fn vqa_missing_question_is_client_error() {
    let app = TestApp::spawn().await;

    let form = Form::new().part("file", image_part(sample_jpeg(8, 8), "photo.jpg", "image/jpeg"));

    let response = app.post_vqa(form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Missing field `question`");
}

#[tokio::test]
async fn vqa_missing_file_is_client_error() {
    let app = TestApp::spawn().await;

    let response = app.post_vqa(Form::new().text("question", "Anything?")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn vqa_rejects_non_numeric_budget() {
    let app = TestApp::spawn().await;

    let form = Form::new()
        .part("file", image_part(sample_jpeg(8, 8), "photo.jpg", "image/jpeg"))
        .text("question", "What is this?")
        .text("max_new_tokens", "lots");

    let response = app.post_vqa(form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn vqa_rejects_uploads_over_limit() {
    let config = test_config(&[("VLM_MAX_UPLOAD_BYTES", "1024")]);
    let app = TestApp::spawn_with(config, None).await;

    let form = Form::new()
        .part("file", image_part(vec![0u8; 8 * 1024], "big.jpg", "image/jpeg"))
        .text("question", "Too big?");

    let response = app.post_vqa(form).await;

    assert!(response.status().is_client_error(), "got {}", response.status());
}
