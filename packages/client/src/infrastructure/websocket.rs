//! WebSocket connection manager.
//!
//! A [`ConnectionManager`] owns at most one socket for one logical channel.
//! The socket itself lives in a background actor task: the manager sends it
//! commands, and the actor reports [`ConnectionEvent`]s back to the owning
//! channel. The actor also runs the keepalive timer and the reconnect loop,
//! so aborting or shutting down the actor cancels all three at once.

use std::{sync::Arc, time::Duration};

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        self, Message,
        client::IntoClientRequest,
        http::{
            HeaderValue,
            header::{COOKIE, InvalidHeaderValue},
        },
    },
};

use crate::{
    config::LiveConfig,
    domain::{
        ChannelKey, ConnectionEvent, ConnectionState, ReconnectDecision, ReconnectPolicy,
        connection::{DEFAULT_KEEPALIVE_INTERVAL, KEEPALIVE_PING, KEEPALIVE_PONG},
    },
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for the close handshake when shutting a socket down
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-socket settings
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub keepalive_interval: Duration,
    pub reconnect: ReconnectPolicy,
    /// Cookie header value for the handshake
    pub credential: Option<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            reconnect: ReconnectPolicy::default(),
            credential: None,
        }
    }
}

impl From<&LiveConfig> for ConnectionOptions {
    fn from(config: &LiveConfig) -> Self {
        Self {
            keepalive_interval: config.keepalive_interval(),
            reconnect: config.reconnect_policy(),
            credential: config.credential().map(str::to_string),
        }
    }
}

enum Command {
    Send(String),
    Shutdown,
}

struct Worker {
    commands: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

/// Owner of one channel's socket lifecycle.
///
/// # Example
///
/// ```ignore
/// let (mut manager, mut events) =
///     ConnectionManager::new(ChannelKey::notification("42"), ConnectionOptions::default());
/// manager.open(config.notification_url(&user_id).as_str()).await;
/// while let Some(event) = events.recv().await {
///     // ConnectionEvent::Opened / Frame / Closed
/// }
/// ```
pub struct ConnectionManager {
    key: ChannelKey,
    options: ConnectionOptions,
    state: Arc<watch::Sender<ConnectionState>>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    worker: Option<Worker>,
}

impl ConnectionManager {
    /// Create a closed manager and the receiver its events are delivered to.
    ///
    /// The receiver outlives individual sockets: every `open` reports into it.
    pub fn new(
        key: ChannelKey,
        options: ConnectionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Closed);
        let manager = Self {
            key,
            options,
            state: Arc::new(state),
            events,
            worker: None,
        };
        (manager, events_rx)
    }

    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Whether an actor is still running (connected, connecting or waiting to retry).
    pub fn is_active(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Open a socket to `url`, closing any socket this manager already owns first.
    pub async fn open(&mut self, url: &str) {
        self.close().await;

        let (commands, command_rx) = mpsc::unbounded_channel();
        self.state.send_replace(ConnectionState::Connecting);
        let actor = ConnectionActor {
            key: self.key.clone(),
            url: url.to_string(),
            credential: self.options.credential.clone(),
            keepalive_interval: self.options.keepalive_interval,
            policy: self.options.reconnect,
            commands: command_rx,
            events: self.events.clone(),
            state: Arc::clone(&self.state),
        };
        tracing::debug!("Opening {} at {}", self.key, url);
        let handle = tokio::spawn(actor.run());
        self.worker = Some(Worker { commands, handle });
    }

    /// Send a text frame. Dropped (returns `false`) unless the socket is open.
    pub fn send(&self, payload: impl Into<String>) -> bool {
        if self.state() != ConnectionState::Open {
            tracing::debug!("Dropping outbound frame on {}: socket not open", self.key);
            return false;
        }
        match &self.worker {
            Some(worker) => worker.commands.send(Command::Send(payload.into())).is_ok(),
            None => false,
        }
    }

    /// Close the socket and cancel any keepalive or pending retry.
    ///
    /// Idempotent. Returns once the actor has finished, so a following `open`
    /// never overlaps the previous socket.
    pub async fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.commands.send(Command::Shutdown);
            if let Err(e) = worker.handle.await
                && !e.is_cancelled()
            {
                tracing::warn!("Connection task for {} failed: {}", self.key, e);
            }
            tracing::debug!("Closed {}", self.key);
        }
        self.state.send_replace(ConnectionState::Closed);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.handle.abort();
        }
    }
}

#[derive(Debug, Error)]
enum ConnectError {
    #[error(transparent)]
    Handshake(#[from] tungstenite::Error),

    #[error("invalid credential header: {0}")]
    Credential(#[from] InvalidHeaderValue),
}

enum SocketEnd {
    /// The peer or the network ended the connection
    Dropped,
    /// The owner asked to shut down
    Shutdown,
}

struct ConnectionActor {
    key: ChannelKey,
    url: String,
    credential: Option<String>,
    keepalive_interval: Duration,
    policy: ReconnectPolicy,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl ConnectionActor {
    async fn run(mut self) {
        loop {
            self.state.send_replace(ConnectionState::Connecting);

            let connected = tokio::select! {
                result = connect(&self.url, self.credential.as_deref()) => result,
                _ = wait_for_shutdown(&mut self.commands) => {
                    self.finish();
                    return;
                }
            };

            match connected {
                Ok(socket) => {
                    self.policy.on_open();
                    self.state.send_replace(ConnectionState::Open);
                    tracing::info!("Connected {}", self.key);
                    self.emit(ConnectionEvent::Opened);

                    if let SocketEnd::Shutdown = self.drive(socket).await {
                        self.finish();
                        return;
                    }
                    tracing::info!("Connection {} ended", self.key);
                }
                Err(e) => {
                    tracing::warn!("Failed to connect {}: {}", self.key, e);
                }
            }

            self.state.send_replace(ConnectionState::Closed);
            match self.policy.on_close() {
                ReconnectDecision::RetryAfter(delay) => {
                    tracing::info!(
                        "Reconnecting {} in {:?} (attempt {}/{})",
                        self.key,
                        delay,
                        self.policy.attempts(),
                        self.policy.max_attempts()
                    );
                    self.emit(ConnectionEvent::Closed {
                        reconnect_in: Some(delay),
                    });
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = wait_for_shutdown(&mut self.commands) => {
                            self.finish();
                            return;
                        }
                    }
                }
                ReconnectDecision::GiveUp => {
                    tracing::warn!(
                        "Giving up on {} after {} reconnection attempts",
                        self.key,
                        self.policy.max_attempts()
                    );
                    self.emit(ConnectionEvent::Closed { reconnect_in: None });
                    return;
                }
            }
        }
    }

    /// Pump one open socket until it ends or a shutdown is requested.
    async fn drive(&mut self, socket: Socket) -> SocketEnd {
        let (mut write, mut read) = socket.split();
        let mut keepalive = tokio::time::interval_at(
            Instant::now() + self.keepalive_interval,
            self.keepalive_interval,
        );
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if text.as_str() == KEEPALIVE_PONG {
                            tracing::trace!("Keepalive reply on {}", self.key);
                            continue;
                        }
                        self.emit(ConnectionEvent::Frame(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!("Ignoring {} bytes of binary data on {}", data.len(), self.key);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!("Close frame on {}: {:?}", self.key, frame);
                        return SocketEnd::Dropped;
                    }
                    Some(Ok(_)) => {}
                    // tungstenite errors are terminal for the stream; the
                    // connection end is what drives the reconnect decision.
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error on {}: {}", self.key, e);
                        return SocketEnd::Dropped;
                    }
                    None => return SocketEnd::Dropped,
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send(payload)) => {
                        if let Err(e) = write.send(Message::text(payload)).await {
                            tracing::warn!("Failed to send on {}: {}", self.key, e);
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        close_gracefully(&mut write, &mut read).await;
                        return SocketEnd::Shutdown;
                    }
                },
                _ = keepalive.tick() => {
                    match write.send(Message::text(KEEPALIVE_PING)).await {
                        Ok(()) => tracing::trace!("Sent keepalive ping on {}", self.key),
                        Err(e) => tracing::warn!("Failed to send keepalive on {}: {}", self.key, e),
                    }
                }
            }
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        // The owner may already be gone during teardown.
        let _ = self.events.send(event);
    }

    fn finish(&self) {
        self.state.send_replace(ConnectionState::Closed);
        self.emit(ConnectionEvent::Closed { reconnect_in: None });
    }
}

async fn connect(url: &str, credential: Option<&str>) -> Result<Socket, ConnectError> {
    let mut request = url.into_client_request()?;
    if let Some(cookie) = credential {
        request
            .headers_mut()
            .insert(COOKIE, HeaderValue::from_str(cookie)?);
    }
    let (socket, response) = connect_async(request).await?;
    tracing::debug!("Handshake with {} completed: {}", url, response.status());
    Ok(socket)
}

/// Resolve once a shutdown is requested, discarding sends meanwhile.
async fn wait_for_shutdown(commands: &mut mpsc::UnboundedReceiver<Command>) {
    loop {
        match commands.recv().await {
            Some(Command::Send(_)) => {
                tracing::debug!("Dropping outbound frame: socket not open");
            }
            Some(Command::Shutdown) | None => return,
        }
    }
}

/// Send a Close frame and wait for the peer to finish the handshake.
async fn close_gracefully(
    write: &mut SplitSink<Socket, Message>,
    read: &mut SplitStream<Socket>,
) {
    let handshake = async {
        if write.send(Message::Close(None)).await.is_err() {
            return;
        }
        while let Some(Ok(_)) = read.next().await {}
    };
    if tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, handshake)
        .await
        .is_err()
    {
        tracing::debug!("Close handshake timed out");
    }
}
