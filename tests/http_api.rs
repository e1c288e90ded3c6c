use std::sync::Arc;

use axum::{body::Bytes, http::StatusCode};
use axum_test::TestServer;
use serde_json::{Value, json};
use videosvc::{
    VideoStore,
    data::MemoryDataManager,
    http::{self, AppState, USER_ID_HEADER},
};

const BASE_URL: &str = "http://videos.test";

fn setup_server() -> TestServer {
    let state = AppState::new(
        Arc::new(VideoStore::new()),
        Arc::new(MemoryDataManager::new()),
        "http://127.0.0.1:8080",
    )
    .with_public_base_url(Some(BASE_URL.to_string()));
    TestServer::new(http::router(state, 1024 * 1024)).expect("Failed to create test server")
}

async fn add_video(server: &TestServer, title: &str, duration: u64) -> Value {
    let response = server
        .post("/video")
        .json(&json!({ "title": title, "duration": duration }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json::<Value>()
}

fn titles(videos: &Value) -> Vec<&str> {
    videos
        .as_array()
        .unwrap()
        .iter()
        .map(|video| video["title"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn add_assigns_id_and_data_url() {
    let server = setup_server();

    let first = add_video(&server, "cat", 30).await;
    assert_eq!(first["id"], 1);
    assert_eq!(first["dataUrl"], "http://videos.test/video/1/data");
    assert_eq!(first["likes"], 0);
    assert_eq!(first["usersWhoLiked"], json!([]));

    let second = add_video(&server, "dog", 12).await;
    assert_eq!(second["id"], 2);

    let fetched = server.get("/video/1").await;
    assert_eq!(fetched.status_code(), StatusCode::OK);
    assert_eq!(fetched.json::<Value>(), first);
}

#[tokio::test]
async fn client_supplied_like_fields_are_ignored() {
    let server = setup_server();
    let response = server
        .post("/video")
        .json(&json!({
            "title": "cat",
            "duration": 30,
            "likes": 42,
            "usersWhoLiked": ["mallory"],
            "dataUrl": "http://elsewhere/video/1/data"
        }))
        .await;
    let video = response.json::<Value>();
    assert_eq!(video["likes"], 0);
    assert_eq!(video["usersWhoLiked"], json!([]));
    assert_eq!(video["dataUrl"], "http://videos.test/video/1/data");
}

#[tokio::test]
async fn duplicate_client_id_is_bad_request() {
    let server = setup_server();
    add_video(&server, "cat", 30).await;

    let response = server
        .post("/video")
        .json(&json!({ "id": 1, "title": "dog", "duration": 5 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_unknown_video_is_not_found() {
    let server = setup_server();
    let response = server.get("/video/999").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.json::<Value>()["error"],
        "Missing video with id 999"
    );
}

#[tokio::test]
async fn malformed_path_id_is_json_bad_request() {
    let server = setup_server();
    let response = server.get("/video/abc").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());

    let like = server
        .post("/video/-1/like")
        .add_header(USER_ID_HEADER, "alice")
        .await;
    assert_eq!(like.status_code(), StatusCode::BAD_REQUEST);
    assert!(like.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn malformed_query_is_json_bad_request() {
    let server = setup_server();
    let response = server
        .get("/video/find")
        .add_query_param("duration", "abc")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn malformed_video_body_is_json_error() {
    let server = setup_server();
    let not_json = server.post("/video").text("title=cat").await;
    assert_eq!(not_json.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(not_json.json::<Value>()["error"].is_string());

    let bad_duration = server
        .post("/video")
        .json(&json!({ "title": "cat", "duration": "long" }))
        .await;
    assert_eq!(bad_duration.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(bad_duration.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn list_returns_every_video() {
    let server = setup_server();
    add_video(&server, "a", 1).await;
    add_video(&server, "b", 2).await;

    let response = server.get("/video").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(titles(&response.json::<Value>()), vec!["a", "b"]);
}

#[tokio::test]
async fn find_by_title_and_duration() {
    let server = setup_server();
    add_video(&server, "cat", 10).await;
    add_video(&server, "cats", 20).await;
    add_video(&server, "cat", 30).await;

    let by_title = server.get("/video/find").add_query_param("title", "cat").await;
    assert_eq!(by_title.status_code(), StatusCode::OK);
    assert_eq!(titles(&by_title.json::<Value>()), vec!["cat", "cat"]);

    let by_duration = server
        .get("/video/find")
        .add_query_param("duration", 20)
        .await;
    assert_eq!(titles(&by_duration.json::<Value>()), vec!["cat"]);

    let combined = server
        .get("/video/find")
        .add_query_param("title", "cat")
        .add_query_param("duration", 31)
        .await;
    assert_eq!(combined.json::<Value>().as_array().unwrap().len(), 2);

    let missing = server.get("/video/find").await;
    assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn like_and_unlike_flow() {
    let server = setup_server();
    add_video(&server, "cat", 30).await;

    let liked = server
        .post("/video/1/like")
        .add_header(USER_ID_HEADER, "alice")
        .await;
    assert_eq!(liked.status_code(), StatusCode::OK);
    assert_eq!(liked.json::<Value>()["likes"], 1);

    let twice = server
        .post("/video/1/like")
        .add_header(USER_ID_HEADER, "alice")
        .await;
    assert_eq!(twice.status_code(), StatusCode::BAD_REQUEST);

    server
        .post("/video/1/like")
        .add_header(USER_ID_HEADER, "bob")
        .await;
    let likers = server.get("/video/1/likedby").await;
    assert_eq!(likers.json::<Value>(), json!(["alice", "bob"]));

    let unliked = server
        .post("/video/1/unlike")
        .add_header(USER_ID_HEADER, "alice")
        .await;
    assert_eq!(unliked.status_code(), StatusCode::OK);
    let video = unliked.json::<Value>();
    assert_eq!(video["likes"], 1);
    assert_eq!(video["usersWhoLiked"], json!(["bob"]));

    let again = server
        .post("/video/1/unlike")
        .add_header(USER_ID_HEADER, "alice")
        .await;
    assert_eq!(again.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn like_requires_identity() {
    let server = setup_server();
    add_video(&server, "cat", 30).await;

    let anonymous = server.post("/video/1/like").await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

    let blank = server
        .post("/video/1/like")
        .add_header(USER_ID_HEADER, "   ")
        .await;
    assert_eq!(blank.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn like_endpoints_on_unknown_video_are_not_found() {
    let server = setup_server();
    for path in ["/video/5/like", "/video/5/unlike"] {
        let response = server.post(path).add_header(USER_ID_HEADER, "alice").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }
    let likers = server.get("/video/5/likedby").await;
    assert_eq!(likers.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_then_download_data() {
    let server = setup_server();
    add_video(&server, "cat", 30).await;

    let before = server.get("/video/1/data").await;
    assert_eq!(before.status_code(), StatusCode::NOT_FOUND);

    let payload = Bytes::from_static(b"\x00\x00\x01\xbamovie-bytes");
    let status = server.post("/video/1/data").bytes(payload.clone()).await;
    assert_eq!(status.status_code(), StatusCode::OK);
    assert_eq!(status.json::<Value>(), json!({ "state": "READY" }));

    let download = server.get("/video/1/data").await;
    assert_eq!(download.status_code(), StatusCode::OK);
    assert_eq!(download.as_bytes(), &payload);
    assert_eq!(download.header("content-type"), "video/mpeg");
}

#[tokio::test]
async fn download_uses_declared_content_type() {
    let server = setup_server();
    server
        .post("/video")
        .json(&json!({ "title": "clip", "duration": 4, "contentType": "video/mp4" }))
        .await;
    server
        .post("/video/1/data")
        .bytes(Bytes::from_static(b"mp4"))
        .await;

    let download = server.get("/video/1/data").await;
    assert_eq!(download.header("content-type"), "video/mp4");
}

#[tokio::test]
async fn upload_to_unknown_video_is_not_found() {
    let server = setup_server();
    let response = server
        .post("/video/3/data")
        .bytes(Bytes::from_static(b"orphan"))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let server = setup_server();
    add_video(&server, "cat", 30).await;
    let response = server
        .post("/video/1/data")
        .bytes(Bytes::from(vec![0u8; 2 * 1024 * 1024]))
        .await;
    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

    let download = server.get("/video/1/data").await;
    assert_eq!(download.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_at_limit_is_accepted() {
    let server = setup_server();
    add_video(&server, "cat", 30).await;
    let payload = Bytes::from(vec![7u8; 1024 * 1024]);
    let response = server.post("/video/1/data").bytes(payload.clone()).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let download = server.get("/video/1/data").await;
    assert_eq!(download.as_bytes().len(), payload.len());
}

#[tokio::test]
async fn health_and_unknown_routes() {
    let server = setup_server();
    let health = server.get("/health").await;
    assert_eq!(health.json::<Value>(), json!({ "status": "ok" }));

    let missing = server.get("/nope").await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}
