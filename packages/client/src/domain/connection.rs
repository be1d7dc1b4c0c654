//! Connection-level types shared by the WebSocket actor and the channels.

use std::{fmt, time::Duration};

/// Text frame sent periodically to keep an idle socket alive
pub const KEEPALIVE_PING: &str = "ping";

/// Server reply to [`KEEPALIVE_PING`], never forwarded to decoders
pub const KEEPALIVE_PONG: &str = "pong";

/// Default interval between keepalive pings
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Logical real-time stream a socket belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Notification,
    Chat,
}

/// Identifies the channel a ConnectionManager serves: kind plus endpoint key
/// (user id for notifications, session id for chat).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub kind: ChannelKind,
    pub endpoint_key: String,
}

impl ChannelKey {
    pub fn notification(user_id: impl Into<String>) -> Self {
        Self {
            kind: ChannelKind::Notification,
            endpoint_key: user_id.into(),
        }
    }

    pub fn chat(session_id: impl Into<String>) -> Self {
        Self {
            kind: ChannelKind::Chat,
            endpoint_key: session_id.into(),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChannelKind::Notification => write!(f, "notifications/{}", self.endpoint_key),
            ChannelKind::Chat => write!(f, "chat/{}", self.endpoint_key),
        }
    }
}

/// Lifecycle state of one socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Typed events emitted by the WebSocket actor to the owning channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket completed its handshake
    Opened,
    /// An inbound text frame (keepalive replies excluded)
    Frame(String),
    /// The socket ended. `reconnect_in` is the scheduled retry delay, `None`
    /// when the connection was closed on purpose or retries are exhausted.
    Closed { reconnect_in: Option<Duration> },
}
