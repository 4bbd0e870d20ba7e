//! HTTP server for MCP over the SSE transport.
//!
//! Two routes make up one logical connection:
//!
//! - `GET /sse` opens the push channel. The first event (`endpoint`) tells
//!   the client where to post; every later event (`message`) carries one
//!   encoded envelope.
//! - `POST /messages/?session_id=<id>` accepts one envelope and answers
//!   `202 Accepted` right away. The actual response arrives on the push
//!   channel.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::mcp::codec;
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::session::SessionRegistry;

/// Path clients post envelopes to.
pub const MESSAGES_PATH: &str = "/messages/";

/// Interval between SSE keep-alive comments.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// HTTP server state.
#[derive(Clone)]
pub struct HttpState {
    dispatcher: Arc<Dispatcher>,
}

impl HttpState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

/// Build the router.
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/sse", get(open_stream))
        .route("/messages", post(post_message))
        .route(MESSAGES_PATH, post(post_message))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn start_server(config: &Config, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let sessions = dispatcher.sessions().clone();
    let app = router(HttpState::new(dispatcher));

    let addr = SocketAddr::new(config.host, config.port);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sessions))
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Resolve on Ctrl-C, closing every session so open streams end.
async fn shutdown_signal(sessions: Arc<SessionRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, closing {} sessions", sessions.len());
    sessions.close_all();
}

/// Health check endpoint.
async fn health_check(State(state): State<HttpState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "sessions": state.dispatcher.sessions().len(),
        "tools": state.dispatcher.tools().tool_count()
    }))
}

/// Prometheus metrics endpoint.
async fn metrics(State(state): State<HttpState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.dispatcher.metrics().to_prometheus(),
    )
}

/// Removes its session when the push channel is dropped.
struct SessionGuard {
    sessions: Arc<SessionRegistry>,
    id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.sessions.remove(&self.id) {
            debug!("Push channel for session {} closed", self.id);
        }
    }
}

/// Build the event stream for one session.
///
/// The stream ends when the session is closed from the server side.
fn session_events(
    guard: SessionGuard,
    frames: UnboundedReceiverStream<String>,
    shutdown: CancellationToken,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{}?session_id={}", MESSAGES_PATH, guard.id));

    // The guard lives inside the closure, so it drops with the stream.
    let messages = frames.map(move |frame| {
        let _guard = &guard;
        Ok::<_, Infallible>(Event::default().event("message").data(frame))
    });

    stream::once(async move { Ok::<_, Infallible>(endpoint) })
        .chain(messages)
        .take_until(shutdown.cancelled_owned())
}

/// `GET /sse`: open a push channel and its session.
async fn open_stream(State(state): State<HttpState>) -> impl IntoResponse {
    let sessions = state.dispatcher.sessions().clone();
    let (session, rx) = sessions.create();

    let guard = SessionGuard {
        sessions,
        id: session.id().to_string(),
    };
    let events = session_events(
        guard,
        UnboundedReceiverStream::new(rx),
        session.shutdown_token(),
    );

    Sse::new(events)
        .keep_alive(KeepAlive::default().interval(KEEP_ALIVE_INTERVAL))
}

/// Query string of `POST /messages/`.
#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: Option<String>,
}

/// `POST /messages/`: accept one envelope for an existing session.
async fn post_message(
    State(state): State<HttpState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let session_id = match query.session_id {
        Some(id) if !id.is_empty() => id,
        _ => return reject(StatusCode::BAD_REQUEST, "session_id is required"),
    };

    let message = match codec::decode(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!("Session {}: {}", session_id, e);
            return reject(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    match state.dispatcher.dispatch(&session_id, message) {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(e @ Error::SessionNotFound(_)) => {
            debug!("{}", e);
            reject(StatusCode::NOT_FOUND, "Could not find session")
        }
        Err(e) => {
            warn!("Session {}: {}", session_id, e);
            // The session can no longer deliver responses; drop it.
            state.dispatcher.sessions().remove(&session_id);
            reject(StatusCode::GONE, &e.to_string())
        }
    }
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::handler::ToolRegistry;
    use crate::metrics::Metrics;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state() -> HttpState {
        let metrics = Metrics::new();
        let sessions = Arc::new(SessionRegistry::new(metrics.clone()));
        let dispatcher = Dispatcher::new(Arc::new(ToolRegistry::new()), sessions, metrics, "test");
        HttpState::new(Arc::new(dispatcher))
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    const INIT: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;

    #[tokio::test]
    async fn test_post_without_session_id() {
        let response = router(state()).oneshot(post("/messages/", INIT)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_to_unknown_session() {
        let response = router(state())
            .oneshot(post("/messages/?session_id=missing", INIT))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_accepts_and_enqueues() {
        let state = state();
        let (session, mut rx) = state.dispatcher.sessions().create();

        let uri = format!("/messages/?session_id={}", session.id());
        let response = router(state.clone()).oneshot(post(&uri, INIT)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["id"], 1);
        assert!(value["result"]["protocolVersion"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_body_leaves_session_open() {
        let state = state();
        let (session, _rx) = state.dispatcher.sessions().create();

        let uri = format!("/messages?session_id={}", session.id());
        let response = router(state.clone())
            .oneshot(post(&uri, "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.dispatcher.sessions().get(session.id()).is_some());
    }

    #[tokio::test]
    async fn test_dead_push_channel_removes_session() {
        let state = state();
        let (session, rx) = state.dispatcher.sessions().create();
        drop(rx);

        let uri = format!("/messages/?session_id={}", session.id());
        let response = router(state.clone()).oneshot(post(&uri, INIT)).await.unwrap();
        assert_eq!(response.status(), StatusCode::GONE);
        assert!(state.dispatcher.sessions().get(session.id()).is_none());
    }

    #[tokio::test]
    async fn test_event_stream_announces_endpoint_and_cleans_up() {
        let state = state();
        let sessions = state.dispatcher.sessions().clone();
        let (session, rx) = sessions.create();
        let id = session.id().to_string();
        let shutdown = session.shutdown_token();
        drop(session);

        let guard = SessionGuard {
            sessions: sessions.clone(),
            id: id.clone(),
        };
        let mut events = Box::pin(session_events(
            guard,
            UnboundedReceiverStream::new(rx),
            shutdown,
        ));

        assert!(events.next().await.is_some());
        sessions
            .get(&id)
            .unwrap()
            .enqueue(&codec::decode(r#"{"jsonrpc":"2.0","id":2,"result":{}}"#).unwrap())
            .unwrap();
        assert!(events.next().await.is_some());

        drop(events);
        assert!(sessions.get(&id).is_none());
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_event_stream_ends_when_session_closes() {
        let state = state();
        let sessions = state.dispatcher.sessions().clone();
        let (session, rx) = sessions.create();
        let guard = SessionGuard {
            sessions: sessions.clone(),
            id: session.id().to_string(),
        };
        let mut events = Box::pin(session_events(
            guard,
            UnboundedReceiverStream::new(rx),
            session.shutdown_token(),
        ));

        assert!(events.next().await.is_some());
        sessions.close_all();
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_health_reports_sessions() {
        let state = state();
        let (_session, _rx) = state.dispatcher.sessions().create();

        let response = router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["sessions"], 1);
    }
}
