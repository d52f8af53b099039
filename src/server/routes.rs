//! HTTP routes
//!
//! `GET {prefix}/video` streams multipart frames for as long as the client
//! stays connected; `GET {prefix}/snap` (alias `/snapshot`) returns one
//! image.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::broadcast::FrameBroadcaster;
use crate::mjpeg::{multipart_stream, MultipartEncoder};
use crate::pacing::{FrameRate, Pacer};
use crate::snapshot::Snapshotter;

fn no_cache() -> HeaderValue {
    HeaderValue::from_static("no-cache")
}

/// Shared state for the request handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub(crate) broadcaster: Arc<FrameBroadcaster>,
    pub(crate) snapshotter: Snapshotter,
    pub(crate) encoder: Arc<MultipartEncoder>,
    pub(crate) rate: FrameRate,
    pub(crate) max_lag_ticks: u32,
    pub(crate) wait_timeout: Duration,
    pub(crate) stream_content_type: HeaderValue,
    pub(crate) image_content_type: HeaderValue,
    pub(crate) streams: Option<Arc<Semaphore>>,
}

/// Build the router with all routes under `prefix`
pub fn router(state: AppState, prefix: &str) -> Router {
    Router::new()
        .route(&format!("{}/video", prefix), get(video))
        .route(&format!("{}/snap", prefix), get(snapshot))
        .route(&format!("{}/snapshot", prefix), get(snapshot))
        .with_state(state)
}

async fn video(State(state): State<AppState>) -> Response {
    let permit = match state.streams {
        Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!("Stream rejected: limit reached");
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    [(header::CACHE_CONTROL, no_cache())],
                    "Too many streams",
                )
                    .into_response();
            }
        },
        None => None,
    };

    let handle = state.broadcaster.subscribe();
    let pacer = Pacer::new(state.rate).max_lag_ticks(state.max_lag_ticks);

    // The permit lives as long as the body stream
    let stream = multipart_stream(handle, pacer, Arc::clone(&state.encoder), state.wait_timeout)
        .map(move |chunk| {
            let _permit = &permit;
            chunk
        });

    (
        [
            (header::CONTENT_TYPE, state.stream_content_type.clone()),
            (header::CACHE_CONTROL, no_cache()),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

async fn snapshot(State(state): State<AppState>) -> Response {
    match state.snapshotter.snapshot().await {
        Ok(data) => (
            [
                (header::CONTENT_TYPE, state.image_content_type.clone()),
                (header::CACHE_CONTROL, no_cache()),
            ],
            data,
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CACHE_CONTROL, no_cache())],
            e.to_string(),
        )
            .into_response(),
    }
}
