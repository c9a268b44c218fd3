//! HTTP endpoints for health checks, service info, and the topic board.

use std::{future::Future, net::SocketAddr, sync::Arc, time::Instant};

use anyhow::Result;
use axum::{
    extract::{Query as AxumQuery, State},
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::{
    config::Tuning,
    relay::RelayClient,
    topics::{self, Topic, TopicStats},
};

struct HttpState {
    client: RelayClient,
    tuning: Tuning,
    cache: Mutex<Option<Board>>,
}

/// One computed topic board and when it was fetched.
struct Board {
    fetched_at: Instant,
    topics: Vec<Topic>,
}

/// Response body for the `/healthz` endpoint.
#[derive(Serialize, Deserialize)]
struct Health {
    /// Always "ok" when the server is running.
    status: String,
}

/// Service information document served at `/`.
#[derive(Serialize, Deserialize)]
struct ServiceInfo {
    name: String,
    software: String,
    version: String,
}

/// Error body returned when an aggregation fails.
#[derive(Serialize, Deserialize)]
struct ErrorBody {
    error: String,
}

/// URL query parameters accepted by the `/topics` endpoint.
#[derive(Deserialize)]
struct TopicsParams {
    /// Ordering: `posts` (default) or `zaps`.
    by: Option<String>,
    /// Prefix of the board to return, clamped to the configured cap.
    limit: Option<usize>,
}

/// Response body for the `/topics` endpoint.
#[derive(Serialize, Deserialize)]
pub(crate) struct TopicsResponse {
    pub(crate) topics: Vec<Topic>,
    pub(crate) stats: TopicStats,
}

/// Start an HTTP server exposing `/healthz`, `/topics`, and service info.
pub async fn serve_http(
    addr: SocketAddr,
    client: RelayClient,
    tuning: Tuning,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let state = Arc::new(HttpState {
        client,
        tuning,
        cache: Mutex::new(None),
    });
    let app = Router::new()
        .route("/", get(service_info))
        .route("/healthz", get(healthz))
        .route("/topics", get(topics_endpoint))
        .with_state(state);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Health check endpoint.
async fn healthz() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

/// Basic service information document.
async fn service_info() -> impl axum::response::IntoResponse {
    (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(ServiceInfo {
            name: "trendr".into(),
            software: "trendr".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }),
    )
}

/// Return the cached board while it is fresh, otherwise rescan. The cache
/// is only replaced on success, so a failed rescan surfaces the error and
/// the next request retries.
async fn cached_board(state: &HttpState) -> Result<Vec<Topic>> {
    let mut cache = state.cache.lock().await;
    if let Some(board) = cache.as_ref() {
        if board.fetched_at.elapsed() < state.tuning.cache_ttl {
            return Ok(board.topics.clone());
        }
    }
    let topics = topics::scan(&state.client, &state.tuning, std::future::pending()).await?;
    *cache = Some(Board {
        fetched_at: Instant::now(),
        topics: topics.clone(),
    });
    Ok(topics)
}

/// Serve the ranked board. Both orderings and any prefix come from the same
/// cached aggregate.
async fn topics_endpoint(
    State(state): State<Arc<HttpState>>,
    AxumQuery(params): AxumQuery<TopicsParams>,
) -> Result<Json<TopicsResponse>, (StatusCode, Json<ErrorBody>)> {
    let board = cached_board(&state).await.map_err(|e| {
        warn!("topic scan failed: {e}");
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
    })?;
    let cap = params
        .limit
        .unwrap_or(state.tuning.topic_cap)
        .min(state.tuning.topic_cap);
    let ranked = match params.by.as_deref() {
        Some("zaps") => topics::top_by_zaps(&board, cap),
        _ => topics::top_by_posts(&board, cap),
    };
    let stats = topics::stats(&ranked);
    Ok(Json(TopicsResponse {
        topics: ranked,
        stats,
    }))
}
