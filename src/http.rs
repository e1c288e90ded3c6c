//! HTTP surface of the video service.
//!
//! Handlers stay thin: pull the id, caller and body out of the request, call
//! the store or the data manager, and turn a [`VideoError`] into a status
//! code through [`ApiError`].

use std::{collections::BTreeSet, io, sync::Arc};

use axum::{
    Json, Router,
    body::Body,
    extract::{
        FromRequestParts, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use mime_guess::MimeGuess;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    data::{DATA_FILE_EXT, VideoDataManager, reader_from_body},
    error::VideoError,
    store::VideoStore,
    video::{NewVideo, Video, VideoStatus},
};

/// Header carrying the caller identity set by the fronting proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    store: Arc<VideoStore>,
    data: Arc<dyn VideoDataManager>,
    public_base_url: Option<Arc<str>>,
    fallback_base_url: Arc<str>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        store: Arc<VideoStore>,
        data: Arc<dyn VideoDataManager>,
        fallback_base_url: impl Into<String>,
    ) -> Self {
        let fallback_base_url: String = fallback_base_url.into();
        Self {
            store,
            data,
            public_base_url: None,
            fallback_base_url: fallback_base_url.into(),
            max_upload_bytes: usize::MAX,
        }
    }

    /// Pins every `dataUrl` to `url` regardless of the request's `Host`.
    pub fn with_public_base_url(mut self, url: Option<String>) -> Self {
        self.public_base_url = url.map(Into::into);
        self
    }

    pub fn store(&self) -> &Arc<VideoStore> {
        &self.store
    }

    fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.public_base_url {
            return url.to_string();
        }
        headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .filter(|host| !host.is_empty())
            .map(|host| format!("http://{host}"))
            .unwrap_or_else(|| self.fallback_base_url.to_string())
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<VideoError> for ApiError {
    fn from(err: VideoError) -> Self {
        match err {
            VideoError::NotFound(_) => Self::not_found(err.to_string()),
            VideoError::InvalidOperation(message) => Self::bad_request(message),
            VideoError::Io(ref io_err) => {
                warn!(error = %io_err, "video data operation failed");
                Self::not_found(err.to_string())
            }
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// Extractors whose rejections come back as `ApiError` JSON.
type VideoId = WithRejection<Path<u64>, ApiError>;
type ApiQuery<T> = WithRejection<Query<T>, ApiError>;
type ApiJson<T> = WithRejection<Json<T>, ApiError>;

/// Identity of the user issuing the request, read from [`USER_ID_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized(format!("Missing {USER_ID_HEADER} header")))?;
        let user = value
            .to_str()
            .map_err(|_| ApiError::unauthorized(format!("Invalid {USER_ID_HEADER} header")))?
            .trim();
        if user.is_empty() {
            return Err(ApiError::unauthorized(format!(
                "Empty {USER_ID_HEADER} header"
            )));
        }
        Ok(Caller(user.to_owned()))
    }
}

/// Builds the API. Uploads larger than `max_upload_bytes` get 413.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let state = AppState {
        max_upload_bytes,
        ..state
    };
    Router::new()
        .route("/health", get(health))
        .route("/video", post(add_video).get(list_videos))
        .route("/video/find", get(find_videos))
        .route("/video/{id}", get(get_video))
        .route("/video/{id}/like", post(like_video))
        .route("/video/{id}/unlike", post(unlike_video))
        .route("/video/{id}/likedby", get(liked_by))
        .route("/video/{id}/data", post(upload_data).get(download_data))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    ApiError::not_found("route not found")
}

async fn add_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    WithRejection(Json(new), _): ApiJson<NewVideo>,
) -> ApiResult<Json<Video>> {
    let base_url = state.base_url(&headers);
    let video = state.store.add(new, &base_url)?;
    Ok(Json(video))
}

async fn list_videos(State(state): State<AppState>) -> Json<Vec<Video>> {
    Json(state.store.list())
}

#[derive(Debug, Deserialize)]
struct FindParams {
    title: Option<String>,
    duration: Option<u64>,
}

/// `?title=` and `?duration=` may be combined; both filters then apply.
async fn find_videos(
    State(state): State<AppState>,
    WithRejection(Query(params), _): ApiQuery<FindParams>,
) -> ApiResult<Json<Vec<Video>>> {
    let videos = match (params.title, params.duration) {
        (None, None) => {
            return Err(ApiError::bad_request(
                "expected a title or duration query parameter",
            ));
        }
        (Some(title), None) => state.store.find_by_title(&title),
        (None, Some(duration)) => state.store.find_by_duration_less_than(duration),
        (Some(title), Some(duration)) => state
            .store
            .filter(|video| video.title == title && video.duration < duration),
    };
    Ok(Json(videos))
}

async fn get_video(
    State(state): State<AppState>,
    WithRejection(Path(id), _): VideoId,
) -> ApiResult<Json<Video>> {
    Ok(Json(state.store.get(id)?))
}

async fn like_video(
    State(state): State<AppState>,
    WithRejection(Path(id), _): VideoId,
    Caller(user): Caller,
) -> ApiResult<Json<Video>> {
    Ok(Json(state.store.like(id, &user)?))
}

async fn unlike_video(
    State(state): State<AppState>,
    WithRejection(Path(id), _): VideoId,
    Caller(user): Caller,
) -> ApiResult<Json<Video>> {
    Ok(Json(state.store.unlike(id, &user)?))
}

async fn liked_by(
    State(state): State<AppState>,
    WithRejection(Path(id), _): VideoId,
) -> ApiResult<Json<BTreeSet<String>>> {
    Ok(Json(state.store.likers(id)?))
}

async fn upload_data(
    State(state): State<AppState>,
    WithRejection(Path(id), _): VideoId,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Json<VideoStatus>> {
    state.store.get(id)?;
    let limit = state.max_upload_bytes;
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(ApiError::payload_too_large(format!(
            "upload exceeds {limit} bytes"
        )));
    }

    let bytes = state
        .data
        .save_data(id, reader_from_body(body, limit))
        .await
        .map_err(|err| match err.kind() {
            io::ErrorKind::FileTooLarge => ApiError::payload_too_large(err.to_string()),
            _ => VideoError::Io(err).into(),
        })?;
    info!(video_id = id, bytes, "video data uploaded");
    Ok(Json(VideoStatus::ready()))
}

async fn download_data(
    State(state): State<AppState>,
    WithRejection(Path(id), _): VideoId,
) -> ApiResult<Response> {
    let video = state.store.get(id)?;
    if !state.data.has_data(id).await {
        return Err(ApiError::not_found(format!("Missing data for video [{id}]")));
    }
    let reader = state.data.open_data(id).await.map_err(VideoError::Io)?;

    let mut response = Body::from_stream(ReaderStream::new(reader)).into_response();
    let mime = video
        .content_type
        .clone()
        .or_else(|| {
            MimeGuess::from_ext(DATA_FILE_EXT)
                .first()
                .map(|mime| mime.to_string())
        });
    if let Some(mime) = mime {
        if let Ok(value) = mime.parse() {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
    }
    Ok(response)
}
