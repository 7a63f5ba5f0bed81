use crate::e2e::helpers;

use helpers::{TestContext, TestOptions};
use hyper::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use test_context::test_context;
use tokio::sync::Semaphore;

async fn wait_for_calls(ctx: &TestContext, expected: usize) {
    for _ in 0..200 {
        if ctx.backend.call_count() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("backend never received {} calls", expected);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_complete_async_job_and_link_audio(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak?mode=async", &json!({ "text": "Poll me" }))
        .await
        .unwrap();
    response.assert_status(StatusCode::ACCEPTED);
    let job_id = response.header("x-job-id").unwrap().clone();

    let job = ctx.wait_for_job(&job_id).await.unwrap();
    assert_eq!(job["state"], "done");
    assert!(job.get("error").is_none());

    let audio_url = job["audio_url"].as_str().unwrap();
    let artifact_id = job["artifact_id"].as_str().unwrap();
    assert_eq!(audio_url, format!("/artifacts/{}", artifact_id));

    let response = ctx.client.get(audio_url).await.unwrap();
    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/wav");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_record_failure_on_async_job(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak?mode=async", &json!({ "text": "explode later" }))
        .await
        .unwrap();
    response.assert_status(StatusCode::ACCEPTED);
    let job_id = response.header("x-job-id").unwrap().clone();

    let job = ctx.wait_for_job(&job_id).await.unwrap();
    assert_eq!(job["state"], "failed");
    assert_eq!(job["error"]["kind"], "synthesis_failed");
    assert!(!job["error"]["message"].as_str().unwrap().contains("CUDA"));
    assert!(job.get("artifact_id").is_none());
}

#[tokio::test]
async fn it_should_cancel_queued_job_but_not_running_one() {
    let gate = Arc::new(Semaphore::new(0));
    let ctx = TestContext::start(TestOptions {
        gate: Some(gate.clone()),
        ..TestOptions::default()
    })
    .await
    .unwrap();

    let running = ctx
        .client
        .post("/speak?mode=async", &json!({ "text": "first" }))
        .await
        .unwrap();
    running.assert_status(StatusCode::ACCEPTED);
    let running_id = running.header("x-job-id").unwrap().clone();
    wait_for_calls(&ctx, 1).await;

    let queued = ctx
        .client
        .post("/speak?mode=async", &json!({ "text": "second" }))
        .await
        .unwrap();
    queued.assert_status(StatusCode::ACCEPTED);
    let queued_id = queued.header("x-job-id").unwrap().clone();

    let response = ctx
        .client
        .get(&format!("/jobs/{}", queued_id))
        .await
        .unwrap();
    assert_eq!(response.body.as_ref().unwrap()["state"], "queued");

    let response = ctx
        .client
        .delete(&format!("/jobs/{}", queued_id))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["state"], "failed");
    assert_eq!(body["error"]["kind"], "cancelled");

    let response = ctx
        .client
        .delete(&format!("/jobs/{}", running_id))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::CONFLICT)
        .assert_error_message("running");

    gate.add_permits(1);
    let job = ctx.wait_for_job(&running_id).await.unwrap();
    assert_eq!(job["state"], "done");

    // The cancelled job never reached the backend
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.backend.call_count(), 1);
}

#[tokio::test]
async fn it_should_answer_409_to_sync_waiter_when_its_job_is_cancelled() {
    let gate = Arc::new(Semaphore::new(0));
    let ctx = TestContext::start(TestOptions {
        gate: Some(gate.clone()),
        ..TestOptions::default()
    })
    .await
    .unwrap();

    let running = ctx
        .client
        .post("/speak?mode=async", &json!({ "text": "first" }))
        .await
        .unwrap();
    let running_id = running.header("x-job-id").unwrap().clone();
    wait_for_calls(&ctx, 1).await;

    let client = ctx.client.clone();
    let waiter = tokio::spawn(async move {
        client
            .post("/speak?mode=sync", &json!({ "text": "I will wait" }))
            .await
            .unwrap()
    });

    let mut queued = Vec::new();
    for _ in 0..200 {
        queued = ctx.service.queued_jobs();
        if !queued.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(queued.len(), 1, "sync request never reached the queue");

    ctx.client
        .delete(&format!("/jobs/{}", queued[0]))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let response = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("sync waiter did not return")
        .unwrap();
    response
        .assert_status(StatusCode::CONFLICT)
        .assert_error_message("cancelled");
    assert!(response.header("x-artifact-id").is_none());

    gate.add_permits(1);
    let job = ctx.wait_for_job(&running_id).await.unwrap();
    assert_eq!(job["state"], "done");
    assert_eq!(ctx.backend.call_count(), 1);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_refuse_to_cancel_finished_job(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/speak", &json!({ "text": "Done already" }))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    let job_id = response.header("x-job-id").unwrap().clone();

    let response = ctx
        .client
        .delete(&format!("/jobs/{}", job_id))
        .await
        .unwrap();
    response.assert_status(StatusCode::CONFLICT);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_404_for_unknown_job(ctx: &TestContext) {
    let path = format!("/jobs/{}", uuid::Uuid::new_v4());

    ctx.client
        .get(&path)
        .await
        .unwrap()
        .assert_status(StatusCode::NOT_FOUND);
    ctx.client
        .delete(&path)
        .await
        .unwrap()
        .assert_status(StatusCode::NOT_FOUND);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_malformed_job_id(ctx: &TestContext) {
    let response = ctx.client.get("/jobs/not-a-uuid").await.unwrap();
    response.assert_status(StatusCode::BAD_REQUEST);
}
