//! Real-time core of the CRM support client.
//!
//! This library provides the push notification feed, the live chat channel
//! and the agent-side session workflow, all built on a single reconnecting
//! WebSocket connection manager, plus the REST client for the support API.

// layers
pub mod domain;
pub mod infrastructure;

// real-time core
pub mod channel;
pub mod coordinator;

pub mod config;
pub mod error;
pub mod ui;

pub use channel::{ChatChannel, ChatUpdate, NotificationChannel, NotificationUpdate};
pub use config::LiveConfig;
pub use coordinator::ChatSessionCoordinator;
