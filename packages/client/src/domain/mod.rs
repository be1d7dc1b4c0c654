//! Domain layer: pure types and state machines, free of I/O.

pub mod chat;
pub mod connection;
pub mod notification;
pub mod reconnect;
pub mod support;
pub mod value_object;

pub use chat::{
    ChatMessage, ChatSession, Delivery, MessageId, Reconciliation, SessionStatus, Transcript,
};
pub use connection::{ChannelKey, ChannelKind, ConnectionEvent, ConnectionState};
pub use notification::{NotificationEvent, NotificationFeed, NotificationKind, NotificationPayload};
pub use reconnect::{ReconnectDecision, ReconnectPolicy};
pub use support::TicketStatus;
pub use value_object::{IdError, SessionId, Timestamp, UserId};
