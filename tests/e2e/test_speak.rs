use crate::e2e::helpers;

use helpers::fake_backend::FAKE_WAV;
use helpers::{TestContext, TestOptions};
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_context::test_context;
use voicebox::domain::speech::{DeliveryMode, VoiceKind, VoiceRef};

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_wav_audio_synchronously(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak", &json!({ "text": "Hello there" }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/wav")
        .assert_header_exists("x-job-id")
        .assert_header_exists("x-artifact-id")
        .assert_header_exists("content-disposition");
    assert_eq!(response.body_bytes, FAKE_WAV);

    let requests = ctx.backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].text, "Hello there");
    assert!(matches!(&requests[0].voice, VoiceRef::SpeakerFile(path) if path.ends_with("test.wav")));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_forward_explicit_voice_controls(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/speak",
            &json!({
                "text": "Slow and steady",
                "speaker_wav": "narrator.wav",
                "language": "es",
                "speed": 0.75,
                "temperature": 0.4,
                "top_k": 20
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);

    let request = &ctx.backend.requests()[0];
    assert_eq!(request.language.as_str(), "es");
    assert_eq!(request.params.speed, 0.75);
    assert_eq!(request.params.temperature, 0.4);
    assert_eq!(request.params.top_k, 20);
    assert!(matches!(&request.voice, VoiceRef::SpeakerFile(path) if path.ends_with("narrator.wav")));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_out_of_range_speed_without_calling_backend(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak", &json!({ "text": "Too fast", "speed": 3.0 }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("speed");
    assert_eq!(ctx.backend.call_count(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_non_numeric_parameter(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak", &json!({ "text": "Hi", "temperature": "warm" }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("temperature");
    assert_eq!(ctx.backend.call_count(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_missing_or_blank_text(ctx: &TestContext) {
    let response = ctx.client.post("/speak", &json!({})).await.unwrap();
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("text");

    let response = ctx
        .client
        .post("/speak", &json!({ "text": "   " }))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("text");

    assert_eq!(ctx.backend.call_count(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_malformed_json(ctx: &TestContext) {
    let response = ctx
        .client
        .post_raw("/speak", r#"{"text": "unterminated"#)
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.body.as_ref().and_then(|b| b.get("message")).is_some());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_unsupported_language(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak", &json!({ "text": "Hallo", "language": "xx" }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("language");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_voice_id_on_speaker_file_backend(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak", &json!({ "text": "Hi", "voice_id": "pNInz6obpgDQGcFmaJgB" }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("speaker_wav");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_speaker_paths_outside_speakers_dir(ctx: &TestContext) {
    for speaker in ["../secret.wav", "/etc/passwd", "missing.wav"] {
        let response = ctx
            .client
            .post("/speak", &json!({ "text": "Hi", "speaker_wav": speaker }))
            .await
            .unwrap();

        response
            .assert_status(StatusCode::BAD_REQUEST)
            .assert_error_message(speaker);
    }
    assert_eq!(ctx.backend.call_count(), 0);
}

#[tokio::test]
async fn it_should_accept_voice_id_on_cloud_backend() {
    let ctx = TestContext::start(TestOptions {
        voice_kind: VoiceKind::VoiceId,
        ..TestOptions::default()
    })
    .await
    .unwrap();

    let response = ctx
        .client
        .post("/speak", &json!({ "text": "Hi", "voice_id": "Joanna" }))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);

    let response = ctx
        .client
        .post("/speak", &json!({ "text": "Hi again" }))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);

    let requests = ctx.backend.requests();
    assert_eq!(requests[0].voice, VoiceRef::VoiceId("Joanna".to_string()));
    assert_eq!(requests[1].voice, VoiceRef::BackendDefault);

    let response = ctx
        .client
        .post("/speak", &json!({ "text": "Hi", "speaker_wav": "test.wav" }))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("voice_id");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_hide_backend_failure_detail(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak", &json!({ "text": "please explode" }))
        .await
        .unwrap();

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let message = response.message();
    assert!(!message.contains("CUDA"), "leaked detail: {}", message);
    assert!(message.contains("Speech synthesis failed"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_503_when_backend_is_unavailable(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak", &json!({ "text": "go offline" }))
        .await
        .unwrap();

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert!(!response.message().contains("10.0.0.7"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_serve_generated_artifact_again(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak", &json!({ "text": "Keep me" }))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    let artifact_id = response.header("x-artifact-id").unwrap().clone();

    let response = ctx
        .client
        .get(&format!("/artifacts/{}", artifact_id))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/wav")
        .assert_header("x-artifact-id", &artifact_id);
    assert_eq!(response.body_bytes, FAKE_WAV);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_404_for_unknown_artifact(ctx: &TestContext) {
    let response = ctx
        .client
        .get(&format!("/artifacts/{}", uuid::Uuid::new_v4()))
        .await
        .unwrap();

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn it_should_report_expired_artifact() {
    let ctx = TestContext::start(TestOptions {
        artifact_ttl: std::time::Duration::from_millis(50),
        ..TestOptions::default()
    })
    .await
    .unwrap();

    let response = ctx
        .client
        .post("/speak", &json!({ "text": "Short lived" }))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    let artifact_id = response.header("x-artifact-id").unwrap().clone();

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    let response = ctx
        .client
        .get(&format!("/artifacts/{}", artifact_id))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_error_message("no longer available");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_accept_async_mode_override(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak?mode=async", &json!({ "text": "Later please" }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::ACCEPTED)
        .assert_header_exists("x-job-id");

    let job_id = response.header("x-job-id").unwrap().clone();
    response.assert_header("location", &format!("/jobs/{}", job_id));

    let body = response.body.as_ref().unwrap();
    assert_eq!(body["job_id"], job_id.as_str());
    assert!(matches!(
        body["state"].as_str(),
        Some("queued") | Some("running") | Some("done")
    ));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_unknown_delivery_mode(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak?mode=eventually", &json!({ "text": "Hi" }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("mode");
    assert_eq!(ctx.backend.call_count(), 0);
}

#[tokio::test]
async fn it_should_default_to_async_when_configured() {
    let ctx = TestContext::start(TestOptions {
        delivery_mode: DeliveryMode::Async,
        ..TestOptions::default()
    })
    .await
    .unwrap();

    let response = ctx
        .client
        .post("/speak", &json!({ "text": "Queued by default" }))
        .await
        .unwrap();
    response.assert_status(StatusCode::ACCEPTED);

    let response = ctx
        .client
        .post("/speak?mode=sync", &json!({ "text": "Right now" }))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/wav");
}
