use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use serde_json::{Value, json};

use xpchat_services::{HttpAssistant, HttpMediaStore};
use xpchat_types::ChatError;
use xpchat_types::api::{Ack, CompletionRequest};
use xpchat_types::collab::{Assistant, MediaStore};
use xpchat_types::models::{Identity, MediaFile, RoomRef};

async fn complete(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    match body["prompt"].as_str().unwrap_or_default() {
        "busy" => (
            StatusCode::OK,
            Json(json!({ "ok": false, "code": "AI_BUSY", "message": "try later" })),
        ),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            (StatusCode::OK, Json(json!({ "ok": true })))
        }
        _ if body["spaceId"] == "europe" && body["roomId"] == "general" && body["uid"] == "u1" => {
            (StatusCode::OK, Json(json!({ "ok": true })))
        }
        _ => (StatusCode::BAD_REQUEST, Json(json!({ "ok": false, "code": "BAD_BODY" }))),
    }
}

async fn upload(
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let mime = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let path = query.get("path").cloned().unwrap_or_default();
    if mime != "image/png" || body.len() != 4 || !path.starts_with("chat/europe/general/u1/") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "ok": false, "code": "BAD_UPLOAD" })));
    }
    (StatusCode::OK, Json(json!({ "url": format!("https://cdn.test/{path}") })))
}

async fn serve() -> SocketAddr {
    let app = Router::new()
        .route("/ai", post(complete))
        .route("/upload", post(upload))
        .route(
            "/down",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn request(prompt: &str) -> CompletionRequest {
    CompletionRequest {
        room: RoomRef::new("europe", "general"),
        identity: Identity::new("u1", "ana"),
        prompt: prompt.into(),
    }
}

fn png() -> MediaFile {
    MediaFile {
        name: "shot.PNG".into(),
        mime: "image/png".into(),
        data: Bytes::from_static(b"\x89PNG"),
    }
}

#[tokio::test]
async fn assistant_ack_and_rejection() {
    let addr = serve().await;
    let ai = HttpAssistant::new(format!("http://{addr}/ai"), Duration::from_secs(5)).unwrap();

    assert_eq!(ai.complete(request("hola")).await.unwrap(), Ack { ok: true });
    assert_eq!(
        ai.complete(request("busy")).await.unwrap_err(),
        ChatError::backend("AI_BUSY", "try later")
    );
}

#[tokio::test]
async fn assistant_timeout_is_reported() {
    let addr = serve().await;
    let ai = HttpAssistant::new(format!("http://{addr}/ai"), Duration::from_millis(200)).unwrap();
    assert_eq!(ai.complete(request("slow")).await.unwrap_err(), ChatError::Timeout);
}

#[tokio::test]
async fn status_without_reply_body_uses_http_code() {
    let addr = serve().await;
    let ai = HttpAssistant::new(format!("http://{addr}/down"), Duration::from_secs(5)).unwrap();
    assert_eq!(
        ai.complete(request("hola")).await.unwrap_err(),
        ChatError::backend("HTTP_503", "maintenance")
    );
}

#[tokio::test]
async fn unreachable_endpoint_is_network_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let ai = HttpAssistant::new(format!("http://{addr}/ai"), Duration::from_secs(2)).unwrap();
    let err = ai.complete(request("hola")).await.unwrap_err();
    assert!(matches!(err, ChatError::NetworkUnavailable(_)), "{err:?}");
}

#[tokio::test]
async fn upload_returns_public_url() {
    let addr = serve().await;
    let media = HttpMediaStore::new(format!("http://{addr}/upload"), Duration::from_secs(5)).unwrap();
    let room = RoomRef::new("europe", "general");

    let url = media.upload(&room, &Identity::new("u1", "ana"), png()).await.unwrap();
    assert!(url.starts_with("https://cdn.test/chat/europe/general/u1/"));
    assert!(url.ends_with(".png"));
}

#[tokio::test]
async fn upload_rejects_non_images_before_sending() {
    let media = HttpMediaStore::new("http://127.0.0.1:9/upload", Duration::from_secs(1)).unwrap();
    let file = MediaFile {
        name: "notes.txt".into(),
        mime: "text/plain".into(),
        data: Bytes::from_static(b"hi"),
    };
    let err = media
        .upload(&RoomRef::new("europe", "general"), &Identity::new("u1", "ana"), file)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_IMAGE");
}
