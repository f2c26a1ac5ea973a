//! HTTP/WebSocket IO adapter: serves rendered views, accepts POSTed events
//! on the **source** broker, and bridges WebSocket traffic into the model
//! update loop via the reserved `viewEvents` topic.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;

use crate::broker::Broker;
use crate::core::constants::TOPIC_VIEW_EVENTS;
use crate::model::AppModel;
use crate::registry::Registry;

#[derive(Clone)]
struct HttpState {
    registry: Arc<Registry>,
    source: Arc<Broker>,
}

/// Serves `GET /<key>`, `GET /ws/<key>`, and `POST /<topic>` against one
/// epoch's registry and brokers.
pub struct HttpPlugin {
    port: u16,
}

impl HttpPlugin {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn start(
        self,
        token: CancellationToken,
        tracker: &TaskTracker,
        registry: Arc<Registry>,
        source: Arc<Broker>,
        _view: Arc<Broker>,
        _sink: Arc<Broker>,
    ) {
        let port = self.port;
        let state = HttpState { registry, source };

        tracker.spawn(async move {
            let router = build_router(state);

            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = match TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!(error = %err, %addr, "failed to bind http listener, cancelling epoch");
                    token.cancel();
                    return;
                }
            };

            tracing::info!(%addr, "http adapter listening");
            if let Err(err) = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                tracing::error!(error = %err, "http server error");
            }
        });
    }
}

fn build_router(state: HttpState) -> Router {
    // `/{*topic}` is a catch-all: the full remaining path (slashes and
    // all) becomes the captured string, mirroring the Go original's
    // `topic := r.URL.Path[1:]` wildcard handler. GET against it looks the
    // path up as a view key; POST publishes it as a topic verbatim, so a
    // multi-segment topic like `yokai/delay` round-trips through the HTTP
    // surface the same way a single-segment one does. A second route with
    // a plain `{key}` segment would conflict with this one at the router
    // level (both would claim single-segment paths), so GET and POST are
    // dispatched from the same route instead of two.
    Router::new()
        .route("/", post(empty_topic))
        .route("/{*topic}", get(view_handler).post(post_handler))
        .route("/ws/{key}", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn empty_topic() -> Response {
    (StatusCode::BAD_REQUEST, "topic path required").into_response()
}

async fn view_handler(State(state): State<HttpState>, Path(key): Path<String>) -> Response {
    let Some(model) = state.registry.key_to_model.get(&key) else {
        return (StatusCode::NOT_FOUND, "unknown key").into_response();
    };
    match model.view().await {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            tracing::error!(key = %key, error = %err, "view render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "view render failed").into_response()
        }
    }
}

async fn post_handler(
    State(state): State<HttpState>,
    Path(topic): Path<String>,
    body: axum::body::Body,
) -> Response {
    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            let payload = String::from_utf8_lossy(&bytes).into_owned();
            state.source.publish(topic, payload);
            StatusCode::OK.into_response()
        }
        Err(err) => {
            tracing::error!(topic = %topic, error = %err, "failed to read request body");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn ws_handler(
    State(state): State<HttpState>,
    Path(key): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(model) = state.registry.key_to_model.get(&key).cloned() else {
        return (StatusCode::NOT_FOUND, "unknown key").into_response();
    };
    let source = state.source.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, model, source))
}

async fn handle_socket(socket: WebSocket, model: Arc<AppModel>, source: Arc<Broker>) {
    let (mut sender, mut receiver) = socket.split();
    let (mut view_rx, _subscription) = model.subscribe_view();

    let mut send_task = tokio::spawn(async move {
        while let Some(fragment) = view_rx.recv().await {
            if sender.send(Message::Text(fragment.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task_model = model.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            match recv_task_model.update(TOPIC_VIEW_EVENTS, &text).await {
                Ok(outcome) => {
                    for (topic, payload) in outcome.outputs {
                        source.publish(topic, payload);
                    }
                }
                Err(err) => tracing::error!(key = %recv_task_model.key(), error = %err, "viewEvents update failed"),
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
        _ = &mut recv_task => {
            send_task.abort();
            let _ = send_task.await;
        }
    }
}
