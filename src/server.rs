//! HTTP/WebSocket server surface and inbound message dispatch.
//!
//! One task pair per connection: a writer forwarding frames from an
//! unbounded channel to the socket sink, and a reader parsing inbound text
//! frames and dispatching them. Session teardown happens on the read path
//! when the socket closes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::datasource::TransitDataSource;
use crate::message::{self, Request};
use crate::model::{Location, Mode, StopPoint};
use crate::registry::SessionRegistry;
use crate::session::DeparturesSession;

/// Search radius for nearby-stop resolution, in meters.
const STOP_SEARCH_RADIUS_METERS: u32 = 500;

/// Shared state behind every connection handler.
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub source: Arc<dyn TransitDataSource>,
    pub poll_interval: Duration,
    next_connection: AtomicU64,
}

impl AppState {
    pub fn new(
        registry: Arc<SessionRegistry>,
        source: Arc<dyn TransitDataSource>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            registry,
            source,
            poll_interval,
            next_connection: AtomicU64::new(0),
        }
    }

    fn next_connection_id(&self) -> String {
        let n = self.next_connection.fetch_add(1, Ordering::Relaxed) + 1;
        format!("conn-{n}")
    }
}

/// Builds the router: a liveness route at `/` and the WebSocket endpoint at
/// `/socket`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Application running" }))
        .route("/socket", get(ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Binds the listener and starts serving. Returns once bound, with the
/// server running in a background task.
pub async fn start(state: Arc<AppState>, port: u16) -> std::io::Result<ServerHandle> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    let local_addr = listener.local_addr()?;

    info!(port = local_addr.port(), "live departures server started");

    let task = tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router).await {
            error!(error = %error, "server exited");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        task,
    })
}

/// Keeps the serve task alive; awaiting it runs the server to completion.
pub struct ServerHandle {
    pub port: u16,
    pub task: tokio::task::JoinHandle<()>,
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Runs one connection: writer task, acknowledgement, read loop, teardown.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = state.next_connection_id();
    info!(connection_id = %connection_id, "connection received");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_tx.send(WsMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    if let Some(frame) = message::status_frame("Connection acknowledged") {
        let _ = tx.send(frame);
    }

    while let Some(Ok(frame)) = ws_rx.next().await {
        match frame {
            WsMessage::Text(text) => dispatch(&state, &connection_id, &tx, &text).await,
            WsMessage::Close(_) => break,
            // Pings are answered by axum itself; binary frames are not part
            // of the protocol.
            _ => {}
        }
    }

    info!(connection_id = %connection_id, "connection closed");
    if let Some(session) = state.registry.remove(&connection_id) {
        session.stop_updates();
    }
    drop(tx);
    let _ = writer.await;
}

/// Parses one inbound text frame and routes it.
///
/// Protocol errors and unknown tags are logged and dropped; the connection
/// stays open and no error frame is sent back.
pub async fn dispatch(
    state: &AppState,
    connection_id: &str,
    outbound: &mpsc::UnboundedSender<String>,
    text: &str,
) {
    let request = match Request::parse(text) {
        Ok(request) => request,
        Err(error) => {
            warn!(connection_id, error = %error, "dropping malformed frame");
            return;
        }
    };

    match request {
        Request::Location(location) => handle_location(state, connection_id, outbound, location).await,
        Request::Mode(mode_id) => handle_mode(state, connection_id, &mode_id),
        Request::Unknown(tag) => {
            warn!(connection_id, tag = %tag, "unknown message type");
        }
    }
}

/// Resolves nearby stops, replaces any existing session for the connection,
/// sends `STOP_POINTS`, and begins polling for the first available mode.
async fn handle_location(
    state: &AppState,
    connection_id: &str,
    outbound: &mpsc::UnboundedSender<String>,
    location: Location,
) {
    let raw = match state
        .source
        .fetch_nearby_stops(location, STOP_SEARCH_RADIUS_METERS)
        .await
    {
        Ok(raw) => raw,
        Err(error) => {
            error!(connection_id, error = %error, "nearby stop resolution failed");
            return;
        }
    };

    let stop_points: Vec<StopPoint> = raw.places.iter().map(StopPoint::from_tfl).collect();
    info!(
        connection_id,
        stop_count = stop_points.len(),
        "resolved nearby stop points"
    );

    // Latest location wins: tear down any session from a previous LOCATION
    // message before registering the new one.
    if let Some(previous) = state.registry.remove(connection_id) {
        previous.stop_updates();
    }

    let session = Arc::new(DeparturesSession::new(
        connection_id.to_string(),
        stop_points.clone(),
        outbound.clone(),
    ));
    if let Err(error) = state.registry.register(connection_id, Arc::clone(&session)) {
        error!(connection_id, error = %error, "failed to register session");
        return;
    }

    let modes = session.available_modes();
    if let Some(first_mode) = modes.first() {
        session.start_updates_for_mode(*first_mode, &state.source, state.poll_interval);
    }

    if let Some(frame) = message::stop_points_frame(stop_points, modes) {
        if outbound.send(frame).is_err() {
            warn!(connection_id, "failed to send stop points, connection write channel closed");
        }
    }
}

/// Switches the session's active mode, if a session exists and the id is a
/// known mode.
fn handle_mode(state: &AppState, connection_id: &str, mode_id: &str) {
    let Some(session) = state.registry.lookup(connection_id) else {
        warn!(connection_id, "MODE message before any LOCATION, ignoring");
        return;
    };
    match Mode::from_mode_id(mode_id) {
        Some(mode) => session.start_updates_for_mode(mode, &state.source, state.poll_interval),
        None => warn!(connection_id, mode_id, "unknown mode id, ignoring"),
    }
}
