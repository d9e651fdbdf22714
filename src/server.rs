//! HTTP and WebSocket surface for the session hub.

use crate::config::{MIN_OUTBOX_CAPACITY, ServerConfig};
use crate::games::chess::{ChessRules, RulesError};
use crate::hub::{Hub, HubEvent, HubHandle, HubOptions};
use crate::protocol::{ClientMessage, FrameError, decode_client_frame};
use crate::session::{ConnectionId, Session};
use anyhow::Result;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// State shared by request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    hub: HubHandle,
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Wraps a hub handle and the config it was built from.
    pub fn new(hub: HubHandle, config: ServerConfig) -> Self {
        Self {
            hub,
            config: Arc::new(config),
        }
    }

    /// Handle into the running hub.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }
}

/// Builds the session, spawns its hub and returns the shared state.
///
/// Must be called from within a tokio runtime.
#[instrument(skip(config))]
pub fn spawn_hub(config: &ServerConfig) -> Result<AppState, RulesError> {
    let rules = match config.starting_fen() {
        Some(fen) => ChessRules::from_fen(fen)?,
        None => ChessRules::new(),
    };
    let options = HubOptions {
        notify_rejections: *config.notify_rejections(),
    };
    let hub = Hub::new(Session::new(rules), options);
    let (handle, _task) = hub.spawn(*config.event_capacity());
    info!(notify_rejections = options.notify_rejections, "Session hub spawned");
    Ok(AppState::new(handle, config.clone()))
}

/// Routes: `/` page, `/health`, `/ws` socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Serves on an already bound listener until the server stops.
#[instrument(skip_all)]
pub async fn serve(listener: TcpListener, config: ServerConfig) -> Result<()> {
    let state = spawn_hub(&config)?;
    let app = router(state);
    info!(addr = %listener.local_addr()?, "Server ready");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Binds the configured address and serves.
#[instrument(skip(config), fields(addr = %config.bind_addr()))]
pub async fn run_http_server(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!("✅ Listening on http://{}/ (socket at /ws)", config.bind_addr());
    serve(listener, config).await
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(index_page(state.config.title()))
}

/// Landing page with the configured title.
fn index_page(title: &str) -> String {
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1><p>Connect a client to <code>/ws</code>.</p></body></html>\n",
        title = escape_html(title)
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Runs one connection from upgrade through close.
#[instrument(skip_all, fields(conn))]
async fn handle_socket(socket: WebSocket, state: AppState) {
    let hub = state.hub().clone();
    let conn = hub.next_connection_id();
    tracing::Span::current().record("conn", conn);

    let capacity = (*state.config.outbox_capacity()).max(MIN_OUTBOX_CAPACITY);
    let (outbox, mut outgoing) = mpsc::channel(capacity);
    if !hub.send(HubEvent::Connected { conn, outbox }).await {
        return;
    }

    let (mut sink, mut stream) = socket.split();

    // Writer drains the outbox; it ends when the hub drops the sender.
    let writer = tokio::spawn(async move {
        while let Some(message) = outgoing.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!(conn, error = %e, "Failed to encode message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                debug!(conn, "Socket closed while sending");
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => forward(&hub, conn, text.as_str()).await,
            Ok(Message::Close(_)) => {
                debug!(conn, "Client sent close frame");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(conn, error = %e, "Socket error");
                break;
            }
        }
    }

    hub.send(HubEvent::Disconnected { conn }).await;
    writer.abort();
}

async fn forward(hub: &HubHandle, conn: ConnectionId, text: &str) {
    let event = match decode_client_frame(text) {
        Ok(ClientMessage::Move(request)) => HubEvent::Move { conn, request },
        Err(FrameError::MalformedMove { data, error }) => {
            HubEvent::MalformedMove { conn, data, error }
        }
        Err(e) => {
            warn!(conn, error = %e, "Dropping undecodable frame");
            return;
        }
    };
    hub.send(event).await;
}
