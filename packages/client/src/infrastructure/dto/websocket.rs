//! WebSocket frame DTOs.

use serde::{Deserialize, Serialize};

use super::{RawId, RawTimestamp};

/// Inbound frame on the notification socket.
///
/// Only `type` is meaningful for every frame; the rest depends on it. Backends
/// spell some keys in both camelCase and snake_case, so each spelling has its
/// own field and the conversion picks one.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationFrame {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default, rename = "localId")]
    pub local_id: Option<RawId>,
    #[serde(default)]
    pub created_at: Option<RawTimestamp>,
    #[serde(default, rename = "createdAt")]
    pub created_at_camel: Option<RawTimestamp>,
    #[serde(default, rename = "territoryName")]
    pub territory_name: Option<String>,
    #[serde(default, rename = "territory_name")]
    pub territory_name_snake: Option<String>,
    #[serde(default, rename = "leadName")]
    pub lead_name: Option<String>,
    #[serde(default, rename = "lead_name")]
    pub lead_name_snake: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "taskId")]
    pub task_id: Option<RawId>,
    #[serde(default, rename = "task_id")]
    pub task_id_snake: Option<RawId>,
}

/// Chat frame, both directions: `{sender_id, message, timestamp?}`.
///
/// `id` is the server's message id when the backend echoes a stored message;
/// `client_message_id` travels with locally composed messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatFrame {
    pub sender_id: RawId,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<RawTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RawId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}
