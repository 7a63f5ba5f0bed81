use crate::e2e::helpers;

use helpers::TestContext;
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_context::test_context;
use voicebox::domain::speech::{Emotion, EmotionsResponse};

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_list_all_emotion_presets(ctx: &TestContext) {
    let response = ctx.client.get("/emotions").await.unwrap();
    response.assert_status(StatusCode::OK);

    let emotions: EmotionsResponse = response.json().unwrap();
    let names: Vec<&str> = emotions.emotions.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["happy", "sad", "angry", "excited", "calm", "whisper"]);

    let whisper = emotions
        .emotions
        .iter()
        .find(|e| e.name == "whisper")
        .unwrap();
    assert_eq!(whisper.speed, 0.85);
    assert_eq!(whisper.prefix, "**whispers** ");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_apply_whisper_preset(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak_emotion", &json!({ "text": "Hello", "emotion": "whisper" }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/wav");

    let request = &ctx.backend.requests()[0];
    assert_eq!(request.text, "**whispers** Hello");
    assert_eq!(request.emotion, Some(Emotion::Whisper));
    assert_eq!(request.params.temperature, 0.5);
    assert_eq!(request.params.speed, 0.85);
    assert_eq!(request.params.top_p, 0.6);
    // Untouched by the preset
    assert_eq!(request.params.top_k, 50);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_match_emotion_case_insensitively(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak_emotion", &json!({ "text": "Yes!", "emotion": "HAPPY" }))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(ctx.backend.requests()[0].text, "**excited** Yes!");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_unknown_emotion_listing_available(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak_emotion", &json!({ "text": "Grr", "emotion": "furious" }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("furious")
        .assert_error_message("happy, sad, angry, excited, calm, whisper");
    assert_eq!(ctx.backend.call_count(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_require_emotion_field(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak_emotion", &json!({ "text": "No feelings" }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("emotion");
    assert_eq!(ctx.backend.call_count(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_let_explicit_parameters_override_preset(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/speak",
            &json!({ "text": "Calm down", "emotion": "calm", "speed": 1.5 }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);

    let request = &ctx.backend.requests()[0];
    assert_eq!(request.text, "**calmly** Calm down");
    assert_eq!(request.params.speed, 1.5);
    assert_eq!(request.params.temperature, 0.6);
    assert_eq!(request.params.top_p, 0.7);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_validate_overrides_on_top_of_preset(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/speak",
            &json!({ "text": "Shh", "emotion": "whisper", "top_p": 1.5 }),
        )
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("top_p");
    assert_eq!(ctx.backend.call_count(), 0);
}
