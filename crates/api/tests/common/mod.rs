//! Local axum server standing in for the job REST endpoints.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

/// Job id the fake server answers with 404.
pub const MISSING_JOB_ID: i64 = 404;

/// Body served by the result endpoint.
pub const RESULT_BODY: &[u8] = b"fake-mp4-bytes";

/// Authorization headers observed by the server, in request order.
pub type SeenAuth = Arc<Mutex<Vec<Option<String>>>>;

pub struct TestServer {
    pub base_url: String,
    pub seen_auth: SeenAuth,
}

/// Start the fake server on an ephemeral port.
pub async fn spawn_server() -> TestServer {
    let seen_auth: SeenAuth = Arc::new(Mutex::new(Vec::new()));

    let app = Router::new()
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/{job_id}", get(job_detail))
        .route("/api/jobs/{job_id}/result", get(job_result))
        .route("/api/replays/{replay_id}/exports/{kind}", post(export))
        .with_state(Arc::clone(&seen_auth));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        seen_auth,
    }
}

fn record(seen: &SeenAuth, headers: &HeaderMap) {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    seen.lock().unwrap().push(value);
}

async fn job_detail(
    State(seen): State<SeenAuth>,
    headers: HeaderMap,
    Path(job_id): Path<i64>,
) -> Response {
    record(&seen, &headers);
    if job_id == MISSING_JOB_ID {
        return (StatusCode::NOT_FOUND, "job not found").into_response();
    }
    Json(json!({
        "jobId": job_id,
        "jobType": "REPLAY_MP4",
        "status": "RUNNING",
        "progress": 30,
        "createdAt": "2024-05-01T10:00:00Z",
        "resultUri": null,
    }))
    .into_response()
}

async fn job_result(
    State(seen): State<SeenAuth>,
    headers: HeaderMap,
    Path(job_id): Path<i64>,
) -> Response {
    record(&seen, &headers);
    if job_id == MISSING_JOB_ID {
        return (StatusCode::NOT_FOUND, "no result").into_response();
    }
    RESULT_BODY.to_vec().into_response()
}

async fn export(
    State(seen): State<SeenAuth>,
    headers: HeaderMap,
    Path((replay_id, kind)): Path<(i64, String)>,
) -> Response {
    record(&seen, &headers);
    match kind.as_str() {
        // Replay 0 simulates a server that forgets to return the id.
        _ if replay_id == 0 => Json(json!({ "jobId": null })).into_response(),
        "mp4" => Json(json!({ "jobId": replay_id * 100 })).into_response(),
        "thumbnail" => Json(json!({ "jobId": replay_id * 100 + 1 })).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_jobs(
    State(seen): State<SeenAuth>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    record(&seen, &headers);
    let page: i32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
    let size: i32 = params.get("size").and_then(|p| p.parse().ok()).unwrap_or(20);
    let status = params.get("status").cloned().unwrap_or_else(|| "RUNNING".into());
    let job_type = params.get("type").cloned();
    Json(json!({
        "items": [
            { "jobId": 1, "status": status, "jobType": job_type },
            { "jobId": 2, "status": status, "jobType": job_type },
        ],
        "page": page,
        "size": size,
        "totalItems": 2,
        "totalPages": 1,
    }))
    .into_response()
}
