//! Integration tests for `CommandGateway` against an in-process executor stub.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use common::{closed_port_url, spawn_executor};
use striker_client::gateway::{Command, CommandError, CommandGateway, TRANSPORT_CAUSE};

fn gateway(api_url: String) -> CommandGateway {
    CommandGateway::with_client(reqwest::Client::new(), api_url)
}

// ---------------------------------------------------------------------------
// Test: 2xx with a job uuid
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accepted_command_reports_job_uuid() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/api/server/{uuid}/start",
            put(
                |State(hits): State<Arc<AtomicUsize>>, Path(uuid): Path<String>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "jobUuid": format!("job-for-{uuid}") }))
                },
            ),
        )
        .with_state(Arc::clone(&hits));
    let api_url = spawn_executor(router).await;

    let ack = gateway(api_url)
        .send(&Command::put("/server/s-1/start"))
        .await
        .unwrap();

    assert_eq!(ack.status, 200);
    assert_eq!(ack.job_uuid.as_deref(), Some("job-for-s-1"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Test: request body is forwarded, empty 2xx body means no job
// ---------------------------------------------------------------------------

#[tokio::test]
async fn body_is_forwarded_and_empty_ack_has_no_job() {
    let router = Router::new().route(
        "/api/server",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["name"], "srv02-db");
            assert_eq!(body["cpu"]["cores"], 4);
            StatusCode::CREATED
        }),
    );
    let api_url = spawn_executor(router).await;

    let command = Command::post("/server").with_body(json!({
        "name": "srv02-db",
        "cpu": { "cores": 4 },
    }));
    let ack = gateway(api_url).send(&command).await.unwrap();

    assert_eq!(ack.status, 201);
    assert_eq!(ack.job_uuid, None);
}

// ---------------------------------------------------------------------------
// Test: structured failure bodies are surfaced verbatim
// ---------------------------------------------------------------------------

#[tokio::test]
async fn structured_failure_message_is_verbatim() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/api/host/{uuid}",
            delete(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (
                    StatusCode::CONFLICT,
                    Json(json!({
                        "code": "a8d1",
                        "message": "Host an-a01n02 still runs 3 servers.",
                        "name": "HostBusyError",
                    })),
                )
            }),
        )
        .with_state(Arc::clone(&hits));
    let api_url = spawn_executor(router).await;

    let err = gateway(api_url)
        .send(&Command::delete("/host/h-2"))
        .await
        .unwrap_err();

    assert_eq!(err.cause(), "Host an-a01n02 still runs 3 servers.");
    assert_matches!(
        err,
        CommandError::Application { status: 409, ref code, ref name, .. }
            if code.as_deref() == Some("a8d1") && name.as_deref() == Some("HostBusyError")
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1, "failures are never retried");
}

#[tokio::test]
async fn unknown_route_gets_generic_cause() {
    let api_url = spawn_executor(Router::new()).await;

    let err = gateway(api_url)
        .send(&Command::put("/anvil/a-1/join"))
        .await
        .unwrap_err();

    assert_matches!(err, CommandError::Application { status: 404, .. });
    assert_eq!(err.cause(), "The request failed with 404 Not Found.");
}

// ---------------------------------------------------------------------------
// Test: transport failures warn that the effect is unknown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_executor_is_transport_failure() {
    let err = gateway(closed_port_url().await)
        .send(&Command::put("/server/s-1/stop"))
        .await
        .unwrap_err();

    assert_matches!(err, CommandError::Transport(_));
    assert_eq!(err.cause(), TRANSPORT_CAUSE);
}

#[tokio::test]
async fn relative_path_is_rejected_before_sending() {
    let err = gateway(closed_port_url().await)
        .send(&Command::put("server/s-1/stop"))
        .await
        .unwrap_err();

    assert_matches!(err, CommandError::InvalidPath(_));
}

#[tokio::test]
async fn dot_segments_are_rejected_before_sending() {
    let gateway = gateway(closed_port_url().await);
    for path in ["/server/../anvil", "/job/..", "/./host"] {
        let err = gateway.send(&Command::delete(path)).await.unwrap_err();
        assert_matches!(err, CommandError::InvalidPath(p) if p == path);
    }
}
