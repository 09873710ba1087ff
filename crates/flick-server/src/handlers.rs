//! Connection handlers for the Flick relay.
//!
//! This is the Policy-A path: every published event passes through the
//! server, which mutates the authoritative cursor registry and switch
//! before re-emitting to the other subscribers. The sender is always
//! excluded from its own fan-out.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use flick_core::{
    CursorRegistry, Envelope, Hub, HubConfig, SessionDirectory, SessionIdentity, SwitchState,
    SwitchStore,
};
use flick_protocol::{codec, topics, BroadcastEvent, Frame, RosterEntry};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The broadcast hub.
    pub hub: Hub,
    /// Session identities keyed by token.
    pub sessions: SessionDirectory,
    /// Authoritative cursor registry. A single mutex serializes mutation
    /// from concurrent connections.
    pub registry: Mutex<CursorRegistry>,
    /// The shared switch, persisted to disk.
    pub switch: Mutex<SwitchState>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let hub_config = HubConfig {
            max_subscriptions_per_subscriber: config.limits.max_subscriptions_per_connection,
            topic_capacity: config.limits.topic_capacity,
            auto_delete_empty_topics: true,
        };

        let switch = SwitchState::with_store(SwitchStore::new(&config.switch.path));

        Self {
            hub: Hub::with_config(hub_config),
            sessions: SessionDirectory::new(),
            registry: Mutex::new(CursorRegistry::new()),
            switch: Mutex::new(switch),
            config,
        }
    }
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

    let app = Router::new()
        .route(&config.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Flick relay listening on {}", addr);
    info!("WebSocket endpoint: ws://{}{}", addr, config.websocket_path);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = format!(
        "conn_{:x}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    );

    debug!(connection = %connection_id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();

    // Handshake: the first frame must be Hello, carrying a session token
    // when the browser has one from an earlier connection.
    let (token, identity) = match await_hello(&mut receiver, &mut sender, &state, &connection_id).await
    {
        Some(session) => session,
        None => return,
    };

    debug!(connection = %connection_id, user = %identity.user_id, "Session identified");

    // Subscribe to both topics and forward deliveries into one mpsc
    // stream, dropping this connection's own echoes along the way.
    let (sub_tx, mut sub_rx) = mpsc::unbounded_channel::<Arc<Envelope>>();
    let mut subscription_tasks: HashMap<String, tokio::task::JoinHandle<()>> = HashMap::new();

    for topic in [topics::SWITCH, topics::MOUSE_MOVEMENT] {
        match state.hub.subscribe(&connection_id, topic) {
            Ok(rx) => {
                let handle = spawn_forwarder(rx, sub_tx.clone(), connection_id.clone());
                subscription_tasks.insert(topic.to_string(), handle);
            }
            Err(e) => {
                error!(connection = %connection_id, topic = %topic, error = %e, "Subscribe failed");
                let _ = send_frame(&mut sender, &Frame::error(1002, e.to_string())).await;
                state.hub.unsubscribe_all(&connection_id);
                return;
            }
        }
    }
    metrics::set_active_topics(state.hub.stats().topic_count);

    // Welcome carries the identity plus current shared state, so the
    // client renders existing cursors and the right switch position
    // without waiting for traffic.
    let welcome = build_welcome(&state, token, &identity).await;
    if send_frame(&mut sender, &welcome).await.is_err() {
        error!(connection = %connection_id, "Failed to send Welcome frame");
        cleanup(&state, &connection_id, &identity, subscription_tasks).await;
        return;
    }

    loop {
        tokio::select! {
            biased;

            // Deliveries from subscribed topics
            Some(envelope) = sub_rx.recv() => {
                let frame = match Frame::event(&envelope.event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!(connection = %connection_id, error = %e, "Failed to encode event");
                        continue;
                    }
                };
                metrics::record_event("outbound");
                if send_frame(&mut sender, &frame).await.is_err() {
                    break;
                }
            }

            // Frames from the client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match codec::decode(&text) {
                            Ok(frame) => {
                                if let Err(e) = handle_frame(
                                    &frame,
                                    &connection_id,
                                    &identity,
                                    &state,
                                    &mut sender,
                                ).await {
                                    error!(connection = %connection_id, error = %e, "Frame handling error");
                                    break;
                                }
                            }
                            Err(e) => {
                                // Malformed input degrades, never kills the session.
                                warn!(connection = %connection_id, error = %e, "Undecodable frame");
                                metrics::record_error("malformed_frame");
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!(connection = %connection_id, "Unexpected binary message");
                        metrics::record_error("binary_frame");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    cleanup(&state, &connection_id, &identity, subscription_tasks).await;
    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Wait for the Hello frame and resolve the session identity.
///
/// Returns `None` when the connection closed or sent something else
/// first, in which case an error frame has already been sent.
async fn await_hello(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    sender: &mut SplitSink<WebSocket, Message>,
    state: &Arc<AppState>,
    connection_id: &str,
) -> Option<(String, SessionIdentity)> {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match codec::decode(&text) {
                Ok(Frame::Hello { token }) => {
                    return Some(state.sessions.identify(token.as_deref()));
                }
                Ok(frame) => {
                    warn!(connection = %connection_id, kind = frame.kind(), "Expected hello frame");
                    let _ = send_frame(sender, &Frame::error(1001, "Expected hello")).await;
                    return None;
                }
                Err(e) => {
                    warn!(connection = %connection_id, error = %e, "Undecodable handshake");
                    metrics::record_error("malformed_frame");
                    let _ = send_frame(sender, &Frame::error(1001, "Expected hello")).await;
                    return None;
                }
            },
            Ok(Message::Ping(data)) => {
                if sender.send(Message::Pong(data)).await.is_err() {
                    return None;
                }
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

/// Build the Welcome frame from the current shared state.
async fn build_welcome(state: &Arc<AppState>, token: String, identity: &SessionIdentity) -> Frame {
    let toggle_switch = state.switch.lock().await.get();
    let roster: Vec<RosterEntry> = state
        .registry
        .lock()
        .await
        .snapshot()
        .into_iter()
        .map(|entry| RosterEntry {
            user_id: entry.user_id,
            position: entry.position,
            color: entry.color,
        })
        .collect();

    Frame::Welcome {
        token,
        user_id: identity.user_id.clone(),
        color: identity.color.clone(),
        toggle_switch,
        roster,
        heartbeat: state.config.heartbeat.interval_ms,
    }
}

/// Spawn a task forwarding hub deliveries to the connection's mpsc,
/// suppressing the connection's own echoes.
fn spawn_forwarder(
    mut rx: broadcast::Receiver<Arc<Envelope>>,
    tx: mpsc::UnboundedSender<Arc<Envelope>>,
    connection_id: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if envelope.is_from(&connection_id) {
                        continue; // exclude_sender
                    }
                    if tx.send(envelope).is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Best-effort delivery: stale cursor frames are
                    // superseded by the next one anyway.
                    debug!(connection = %connection_id, skipped, "Receiver lagged");
                }
            }
        }
    })
}

/// Handle a decoded frame from the client.
async fn handle_frame(
    frame: &Frame,
    connection_id: &str,
    identity: &SessionIdentity,
    state: &Arc<AppState>,
    sender: &mut SplitSink<WebSocket, Message>,
) -> Result<()> {
    match frame {
        Frame::Publish {
            topic,
            event,
            payload,
        } => {
            metrics::record_event("inbound");

            let event = match BroadcastEvent::decode(topic, event, payload.clone()) {
                Ok(event) => event,
                Err(e) => {
                    warn!(connection = %connection_id, error = %e, "Malformed event payload");
                    metrics::record_error("malformed_event");
                    return Ok(());
                }
            };

            // Policy A: mutate authoritative state before re-emitting.
            match &event {
                BroadcastEvent::SwitchFlipped(p) => {
                    state.switch.lock().await.apply_remote(p.toggle_switch);
                }
                BroadcastEvent::MouseMoved(p) => {
                    if p.user_id != identity.user_id {
                        warn!(
                            connection = %connection_id,
                            claimed = %p.user_id,
                            "Cursor event for another user dropped"
                        );
                        metrics::record_error("user_mismatch");
                        return Ok(());
                    }
                    let mut registry = state.registry.lock().await;
                    registry.upsert(&p.user_id, p.position, p.color.as_deref());
                    metrics::set_active_cursors(registry.active_count() - 1);
                }
            }

            let count = state.hub.publish(event, Some(connection_id));
            debug!(connection = %connection_id, topic = %topic, recipients = count, "Relayed");
        }

        Frame::Ping { timestamp } => {
            send_frame(sender, &Frame::pong(*timestamp)).await?;
        }

        Frame::Pong { .. } => {
            // Keepalive response, nothing to do
        }

        Frame::Hello { .. } => {
            debug!(connection = %connection_id, user = %identity.user_id, "Duplicate hello ignored");
        }

        _ => {
            warn!(connection = %connection_id, kind = frame.kind(), "Unexpected frame from client");
        }
    }

    Ok(())
}

/// Tear down a connection: drop forwarders, unsubscribe, and remove the
/// user's cursor from the authoritative registry, telling everyone else.
async fn cleanup(
    state: &Arc<AppState>,
    connection_id: &str,
    identity: &SessionIdentity,
    subscription_tasks: HashMap<String, tokio::task::JoinHandle<()>>,
) {
    for (_, handle) in subscription_tasks {
        handle.abort();
    }

    // Transport-level leave detection. Best-effort: another tab of the
    // same session re-registers on its next movement.
    let removed = {
        let mut registry = state.registry.lock().await;
        let removed = registry.remove(&identity.user_id);
        metrics::set_active_cursors(registry.active_count() - 1);
        removed
    };
    if removed.is_some() {
        state.hub.publish(
            BroadcastEvent::mouse_left(&identity.user_id),
            Some(connection_id),
        );
    }

    state.hub.unsubscribe_all(connection_id);
    metrics::set_active_topics(state.hub.stats().topic_count);
}

/// Send a frame to the WebSocket.
async fn send_frame(sender: &mut SplitSink<WebSocket, Message>, frame: &Frame) -> Result<()> {
    let text = codec::encode(frame)?;
    sender.send(Message::Text(text)).await?;
    Ok(())
}
