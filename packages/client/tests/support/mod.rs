//! In-process fake of the CRM support backend for integration tests.
//!
//! Serves the notification and chat sockets plus the chat REST endpoints on an
//! ephemeral port, and records what the client did so tests can assert on it.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crm_live_client::{LiveConfig, domain::ReconnectPolicy};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{sync::mpsc, task::JoinHandle};

/// Shared state of the fake backend
#[derive(Default)]
pub struct Backend {
    /// Upgrade requests received on any socket endpoint
    pub ws_attempts: AtomicUsize,
    pub open_sockets: AtomicUsize,
    pub max_open_sockets: AtomicUsize,
    pub pings: AtomicUsize,
    /// Answer upgrades with 503 instead of switching protocols
    pub reject_upgrades: AtomicBool,
    /// Close every socket right after the handshake
    pub drop_after_open: AtomicBool,
    /// Echo chat frames back with a server id
    pub echo_chat: AtomicBool,
    /// Echo chat frames without any id, and only after the message was persisted
    pub echo_without_ids: AtomicBool,
    /// `user_id` of every accepted notification socket
    pub notification_users: Mutex<Vec<String>>,
    /// Session id of every accepted chat socket
    pub chat_sessions: Mutex<Vec<String>>,
    /// Non-keepalive text frames received
    pub received: Mutex<Vec<String>>,
    pub sessions: Mutex<Vec<Value>>,
    pub history: Mutex<Vec<Value>>,
    /// Status returned by the assign endpoint instead of success
    pub assign_failure: Mutex<Option<StatusCode>>,
    pub assigned: Mutex<Vec<String>>,
    pub closed: Mutex<Vec<String>>,
    pub persisted: Mutex<Vec<Value>>,
    next_id: AtomicUsize,
    pushers: Mutex<Vec<mpsc::UnboundedSender<String>>>,
}

impl Backend {
    /// Push a text frame to every open socket.
    pub fn push(&self, text: &str) {
        let pushers = self.pushers.lock().unwrap();
        for pusher in pushers.iter() {
            let _ = pusher.send(text.to_string());
        }
    }

    pub fn attempts(&self) -> usize {
        self.ws_attempts.load(Ordering::SeqCst)
    }

    pub fn open_now(&self) -> usize {
        self.open_sockets.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.max_open_sockets.load(Ordering::SeqCst)
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

pub struct FakeBackend {
    pub addr: SocketAddr,
    pub state: Arc<Backend>,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = Arc::new(Backend::default());
        let app = Router::new()
            .route("/ws/notifications", get(notifications_ws))
            .route("/ws/chat/{session_id}", get(chat_ws))
            .route("/support/chat/sessions", get(list_sessions))
            .route("/support/chat/sessions/{id}/assign", post(assign_session))
            .route("/support/chat/sessions/{id}/close", post(close_session))
            .route("/support/chat/sessions/{id}/messages", get(session_messages))
            .route("/support/chat/messages", post(persist_message))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Fake backend failed");
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Client configuration with short keepalive and reconnect timings
    pub fn config(&self) -> LiveConfig {
        self.config_with(ReconnectPolicy::new(3, Duration::from_millis(50)))
    }

    pub fn config_with(&self, policy: ReconnectPolicy) -> LiveConfig {
        LiveConfig::new(&format!("http://{}", self.addr))
            .expect("valid test URL")
            .with_keepalive_interval(Duration::from_millis(50))
            .with_reconnect_policy(policy)
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for: {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SocketKind {
    Notifications,
    Chat,
}

async fn notifications_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<Backend>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.ws_attempts.fetch_add(1, Ordering::SeqCst);
    if state.reject_upgrades.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let user_id = query.get("user_id").cloned().unwrap_or_default();
    state.notification_users.lock().unwrap().push(user_id);
    ws.on_upgrade(move |socket| serve_socket(socket, state, SocketKind::Notifications))
}

async fn chat_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<Backend>>,
    Path(session_id): Path<String>,
) -> Response {
    state.ws_attempts.fetch_add(1, Ordering::SeqCst);
    if state.reject_upgrades.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    state.chat_sessions.lock().unwrap().push(session_id);
    ws.on_upgrade(move |socket| serve_socket(socket, state, SocketKind::Chat))
}

async fn serve_socket(socket: WebSocket, state: Arc<Backend>, kind: SocketKind) {
    let open = state.open_sockets.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_open_sockets.fetch_max(open, Ordering::SeqCst);

    let (mut sender, mut receiver) = socket.split();

    if state.drop_after_open.load(Ordering::SeqCst) {
        let _ = sender.send(Message::Close(None)).await;
        state.open_sockets.fetch_sub(1, Ordering::SeqCst);
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.pushers.lock().unwrap().push(tx);

    loop {
        tokio::select! {
            Some(text) = rx.recv() => {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if text.as_str() == "ping" {
                        state.pings.fetch_add(1, Ordering::SeqCst);
                        if sender.send(Message::Text("pong".into())).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    state.received.lock().unwrap().push(text.to_string());
                    if kind == SocketKind::Chat
                        && state.echo_chat.load(Ordering::SeqCst)
                        && let Ok(mut frame) = serde_json::from_str::<Value>(text.as_str())
                    {
                        if state.echo_without_ids.load(Ordering::SeqCst) {
                            wait_until_persisted(&state, &frame["message"]).await;
                            if let Some(fields) = frame.as_object_mut() {
                                fields.remove("client_message_id");
                                fields.remove("id");
                            }
                        } else {
                            frame["id"] = json!(format!("ws-{}", state.next_id()));
                        }
                        if sender.send(Message::Text(frame.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }

    state.open_sockets.fetch_sub(1, Ordering::SeqCst);
}

async fn wait_until_persisted(state: &Backend, message: &Value) {
    for _ in 0..100 {
        let persisted = state
            .persisted
            .lock()
            .unwrap()
            .iter()
            .any(|record| &record["message"] == message);
        if persisted {
            // Leave the client time to receive the REST response first.
            tokio::time::sleep(Duration::from_millis(200)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn list_sessions(State(state): State<Arc<Backend>>) -> Json<Vec<Value>> {
    Json(state.sessions.lock().unwrap().clone())
}

async fn assign_session(
    State(state): State<Arc<Backend>>,
    Path(id): Path<String>,
) -> Response {
    if let Some(status) = *state.assign_failure.lock().unwrap() {
        return (status, Json(json!({"detail": "Session already assigned"}))).into_response();
    }
    state.assigned.lock().unwrap().push(id);
    Json(json!({"status": "assigned"})).into_response()
}

async fn close_session(State(state): State<Arc<Backend>>, Path(id): Path<String>) -> Json<Value> {
    state.closed.lock().unwrap().push(id);
    Json(json!({"status": "closed"}))
}

async fn session_messages(
    State(state): State<Arc<Backend>>,
    Path(_id): Path<String>,
) -> Json<Vec<Value>> {
    Json(state.history.lock().unwrap().clone())
}

async fn persist_message(State(state): State<Arc<Backend>>, Json(body): Json<Value>) -> Json<Value> {
    state.persisted.lock().unwrap().push(body.clone());
    Json(json!({
        "id": state.next_id(),
        "session_id": body["session_id"],
        "sender_id": body["sender_id"],
        "message": body["message"],
        "client_message_id": body["client_message_id"],
        "created_at": "2024-01-01T00:00:00Z",
    }))
}
