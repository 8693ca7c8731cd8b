//! Connection handlers for the Parley server.
//!
//! This module handles the connection lifecycle and message processing.
//! Each WebSocket gets a writer task draining its session queue; the read
//! loop feeds decoded messages into the shared hub.

use crate::config::Config;
use crate::identity::{ConnectParams, Identity, IdentityResolver};
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use parley_core::{ConnectionId, Hub, HubError, RouteOutcome, SessionSink};
use parley_protocol::{codec, ProtocolError, ServerMessage};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The hub. Every event takes this lock, so events are processed one at
    /// a time.
    pub hub: Mutex<Hub>,
    /// Identity assignment for new connections.
    pub identities: IdentityResolver,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            hub: Mutex::new(Hub::with_config(config.hub_config())),
            identities: IdentityResolver::new(),
            config,
        }
    }
}

/// Build the HTTP router.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = build_app(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Parley server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Parley server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Root handler.
async fn root_handler() -> &'static str {
    "Hello world"
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.hub.lock().await.stats();
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": stats.connection_count,
        "groups": stats.group_count,
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let connections = state.hub.lock().await.stats().connection_count;
    if connections >= state.config.limits.max_connections {
        warn!(connections, "Connection limit reached, refusing upgrade");
        metrics::record_rejected_connection("max_connections");
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    }

    ws.max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, state, params))
}

/// Why an upgraded socket was not admitted to the hub.
#[derive(Debug)]
enum Refusal {
    Full,
    Hub(HubError),
}

impl Refusal {
    fn label(&self) -> &'static str {
        match self {
            Refusal::Full => "max_connections",
            Refusal::Hub(e) => e.label(),
        }
    }

    fn close_frame(&self) -> CloseFrame<'static> {
        match self {
            Refusal::Full => CloseFrame {
                code: close_code::AGAIN,
                reason: "Too many connections".into(),
            },
            Refusal::Hub(e) => CloseFrame {
                code: close_code::POLICY,
                reason: e.to_string().into(),
            },
        }
    }
}

/// Resolve an identity and register it with the hub.
///
/// The limit check, ID generation and registration share one hub lock, so
/// concurrent upgrades cannot exceed `max_connections` or race for an ID.
async fn admit(
    state: &AppState,
    params: ConnectParams,
    sink: Box<dyn SessionSink>,
) -> Result<Identity, Refusal> {
    let mut hub = state.hub.lock().await;
    if hub.stats().connection_count >= state.config.limits.max_connections {
        return Err(Refusal::Full);
    }

    let identity = state
        .identities
        .resolve(params, |id| hub.registry().contains(id));
    hub.connect(identity.id.clone(), identity.name.clone(), sink)
        .map_err(Refusal::Hub)?;
    Ok(identity)
}

/// Handle a WebSocket connection.
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>, params: ConnectParams) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<ServerMessage>>();

    let id = match admit(&state, params, Box::new(tx)).await {
        Ok(Identity { id, .. }) => id,
        Err(refusal) => {
            match &refusal {
                Refusal::Full => warn!("Connection limit reached, closing socket"),
                Refusal::Hub(e) => error!(error = %e, "Refusing connection"),
            }
            metrics::record_rejected_connection(refusal.label());
            if let Err(e) = socket.send(Message::Close(Some(refusal.close_frame()))).await {
                debug!(error = %e, "Failed to send close frame");
            }
            return;
        }
    };

    let _metrics_guard = ConnectionMetricsGuard::new();
    debug!(connection = %id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();

    // Drain the session queue into the socket
    let writer_id = id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match codec::encode(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!(connection = %writer_id, error = %e, "Failed to encode message");
                    metrics::record_error(e.label());
                    continue;
                }
            };
            metrics::record_message(text.len(), "outbound", message.kind());
            if sender.send(Message::Text(text)).await.is_err() {
                debug!(connection = %writer_id, "Socket closed while sending");
                break;
            }
        }
        if let Err(e) = sender.close().await {
            debug!(connection = %writer_id, error = %e, "Failed to close socket");
        }
    });

    // Message processing loop
    loop {
        tokio::select! {
            _ = &mut writer => {
                debug!(connection = %id, "Writer finished");
                break;
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(&state, &id, &text).await;
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => handle_text(&state, &id, &text).await,
                        Err(e) => {
                            let e = ProtocolError::Malformed(e.to_string());
                            reject(&state, &id, &e).await;
                        }
                    },
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // Pongs are answered by the socket itself
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    {
        let mut hub = state.hub.lock().await;
        hub.disconnect(&id);
        metrics::set_active_groups(hub.stats().group_count);
    }
    writer.abort();

    debug!(connection = %id, "WebSocket disconnected");
}

/// Decode and route one text message.
async fn handle_text(state: &AppState, id: &ConnectionId, text: &str) {
    let start = Instant::now();

    match codec::decode_with_limit(text, state.config.limits.max_message_size) {
        Ok(message) => {
            metrics::record_message(text.len(), "inbound", message.kind());

            let mut hub = state.hub.lock().await;
            match hub.handle_message(id, message) {
                RouteOutcome::Routed { delivered } => metrics::record_deliveries(delivered),
                RouteOutcome::Rejected(e) => metrics::record_error(e.label()),
                RouteOutcome::UnknownSender => metrics::record_error("unknown_sender"),
            }
            metrics::set_active_groups(hub.stats().group_count);
        }
        Err(e) => reject(state, id, &e).await,
    }

    metrics::record_latency(start.elapsed().as_secs_f64());
}

/// Report an undecodable message to its sender.
async fn reject(state: &AppState, id: &ConnectionId, error: &ProtocolError) {
    warn!(connection = %id, error = %error, "Invalid message");
    metrics::record_error(error.label());
    state.hub.lock().await.reject_message(id, error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::{
        connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
    };

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn spawn_server(config: Config) -> SocketAddr {
        let state = Arc::new(AppState::new(config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_app(state)).await.unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr, id: &str, name: &str) -> Client {
        let url = format!("ws://{addr}/chat?userId={id}&username={name}");
        let (ws, _) = connect_async(url).await.unwrap();
        ws
    }

    async fn next_frame(ws: &mut Client) -> Option<WsMessage> {
        tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .and_then(|r| r.ok())
    }

    async fn recv(ws: &mut Client) -> ServerMessage {
        loop {
            match next_frame(ws).await {
                Some(WsMessage::Text(text)) => return codec::decode_server(&text).unwrap(),
                Some(_) => continue,
                None => panic!("connection closed"),
            }
        }
    }

    async fn recv_n(ws: &mut Client, n: usize) -> Vec<ServerMessage> {
        let mut messages = Vec::with_capacity(n);
        for _ in 0..n {
            messages.push(recv(ws).await);
        }
        messages
    }

    async fn send(ws: &mut Client, text: &str) {
        ws.send(WsMessage::Text(text.to_string())).await.unwrap();
    }

    #[tokio::test]
    async fn test_chat_roundtrip() {
        let addr = spawn_server(Config::default()).await;

        let mut alice = connect(addr, "u1", "Alice").await;
        let welcome = recv_n(&mut alice, 5).await;
        assert_eq!(
            welcome[1],
            ServerMessage::system("Welcome, Alice! You've been added to the general chat.")
        );

        let mut bob = connect(addr, "u2", "Bob").await;
        recv_n(&mut bob, 5).await;
        let to_alice = recv_n(&mut alice, 3).await;
        assert_eq!(
            to_alice[2],
            ServerMessage::UserJoined {
                user_id: "u2".into(),
                username: "Bob".into(),
            }
        );

        send(&mut alice, r#"{"type":"group","group":"general","content":"hi"}"#).await;
        let hi = ServerMessage::Group {
            group: "general".into(),
            from: "Alice".into(),
            content: "hi".into(),
        };
        assert_eq!(recv(&mut alice).await, hi);
        assert_eq!(recv(&mut bob).await, hi);

        send(&mut bob, r#"{"type":"individual","targetId":"u1","content":"hey"}"#).await;
        assert_eq!(
            recv(&mut alice).await,
            ServerMessage::Individual {
                from: "Bob".into(),
                from_id: "u2".into(),
                content: "hey".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_messages_keep_connection_open() {
        let addr = spawn_server(Config::default()).await;
        let mut alice = connect(addr, "u1", "Alice").await;
        recv_n(&mut alice, 5).await;

        send(&mut alice, "not json").await;
        assert!(matches!(recv(&mut alice).await, ServerMessage::Error { .. }));

        send(&mut alice, r#"{"type":"shout","content":"hi"}"#).await;
        assert_eq!(
            recv(&mut alice).await,
            ServerMessage::error("Unknown message type: shout")
        );

        send(&mut alice, r#"{"type":"joinGroup","group":"missing"}"#).await;
        assert_eq!(
            recv(&mut alice).await,
            ServerMessage::error("Group missing does not exist")
        );
    }

    #[tokio::test]
    async fn test_disconnect_notifies_remaining() {
        let addr = spawn_server(Config::default()).await;
        let mut alice = connect(addr, "u1", "Alice").await;
        recv_n(&mut alice, 5).await;
        let mut bob = connect(addr, "u2", "Bob").await;
        recv_n(&mut bob, 5).await;
        recv_n(&mut alice, 3).await;

        bob.close(None).await.unwrap();

        assert_eq!(
            recv(&mut alice).await,
            ServerMessage::system("Bob has left the chat")
        );
        assert_eq!(
            recv(&mut alice).await,
            ServerMessage::UserLeft {
                user_id: "u2".into(),
                username: "Bob".into(),
            }
        );
        match recv(&mut alice).await {
            ServerMessage::GroupList { groups } => {
                assert_eq!(groups[0].members, vec!["u1".to_string()]);
            }
            other => panic!("Expected groupList, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_id_is_closed() {
        let addr = spawn_server(Config::default()).await;
        let mut alice = connect(addr, "u1", "Alice").await;
        recv_n(&mut alice, 5).await;

        let mut impostor = connect(addr, "u1", "Mallory").await;
        assert!(matches!(
            next_frame(&mut impostor).await,
            Some(WsMessage::Close(_)) | None
        ));
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let mut config = Config::default();
        config.limits.max_connections = 1;
        let addr = spawn_server(config).await;

        let mut alice = connect(addr, "u1", "Alice").await;
        recv_n(&mut alice, 5).await;

        let url = format!("ws://{addr}/chat?userId=u2&username=Bob");
        assert!(connect_async(url).await.is_err());
    }

    #[tokio::test]
    async fn test_anonymous_client_skips_claimed_id() {
        let addr = spawn_server(Config::default()).await;
        let mut alice = connect(addr, "user_1", "Alice").await;
        recv_n(&mut alice, 5).await;

        let (mut anon, _) = connect_async(format!("ws://{addr}/chat")).await.unwrap();
        let welcome = recv_n(&mut anon, 5).await;
        assert_eq!(
            welcome[1],
            ServerMessage::system("Welcome, User2! You've been added to the general chat.")
        );
        assert_eq!(
            welcome[4],
            ServerMessage::UserJoined {
                user_id: "user_2".into(),
                username: "User2".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_admit_enforces_connection_limit() {
        let mut config = Config::default();
        config.limits.max_connections = 1;
        let state = AppState::new(config);

        let (tx, _rx1) = mpsc::unbounded_channel::<Arc<ServerMessage>>();
        let first = admit(&state, ConnectParams::default(), Box::new(tx)).await;
        assert_eq!(first.unwrap().id.as_str(), "user_1");

        // Both upgrades passed the early check; only one may register
        let (tx, _rx2) = mpsc::unbounded_channel::<Arc<ServerMessage>>();
        let second = admit(&state, ConnectParams::default(), Box::new(tx)).await;
        assert!(matches!(second, Err(Refusal::Full)));
        assert_eq!(state.hub.lock().await.stats().connection_count, 1);
    }

    #[tokio::test]
    async fn test_admit_refuses_duplicate_id() {
        let state = AppState::new(Config::default());
        let params = || ConnectParams {
            user_id: Some("u1".into()),
            username: Some("Alice".into()),
        };

        let (tx, _rx1) = mpsc::unbounded_channel::<Arc<ServerMessage>>();
        assert!(admit(&state, params(), Box::new(tx)).await.is_ok());

        let (tx, _rx2) = mpsc::unbounded_channel::<Arc<ServerMessage>>();
        let refused = admit(&state, params(), Box::new(tx)).await;
        match refused {
            Err(refusal @ Refusal::Hub(HubError::DuplicateConnection(_))) => {
                assert_eq!(refusal.close_frame().code, close_code::POLICY);
            }
            other => panic!("Expected duplicate refusal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let addr = spawn_server(Config::default()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(r#""status":"ok""#));
        assert!(response.contains(r#""groups":1"#));
    }
}
