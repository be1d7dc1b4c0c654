//! Real-time channels built on [`crate::infrastructure::ConnectionManager`].
//!
//! Each channel owns its manager and its state (feed or transcript). Callers
//! drive a channel by awaiting `next_update` in their event loop; all state
//! changes happen on that call or on direct `&mut self` methods, so no locking
//! is involved.

pub mod chat;
pub mod notification;

pub use chat::{ChatChannel, ChatUpdate};
pub use notification::{NotificationChannel, NotificationUpdate};
