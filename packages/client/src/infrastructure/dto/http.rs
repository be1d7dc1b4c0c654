//! HTTP request / response DTOs for the support REST surface.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::{RawId, RawTimestamp, deserialize_id};
use crate::domain::TicketStatus;

/// List responses come either bare or wrapped in an object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged, bound = "T: DeserializeOwned")]
pub enum ListEnvelope<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(
            alias = "sessions",
            alias = "tickets",
            alias = "subscriptions",
            alias = "messages",
            alias = "results"
        )]
        items: Vec<T>,
    },
}

impl<T> ListEnvelope<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { items } => items,
        }
    }
}

/// `GET /support/chat/sessions` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSessionDto {
    pub id: RawId,
    #[serde(default)]
    pub user_id: Option<RawId>,
    #[serde(default, alias = "user_name", alias = "customer_name")]
    pub participant_name: Option<String>,
    #[serde(default, alias = "assigned_agent_id")]
    pub agent_id: Option<RawId>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Stored chat message as returned by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessageRecordDto {
    pub id: RawId,
    #[serde(default)]
    pub session_id: Option<RawId>,
    pub sender_id: RawId,
    #[serde(alias = "content")]
    pub message: String,
    #[serde(default, alias = "timestamp")]
    pub created_at: Option<RawTimestamp>,
    #[serde(default)]
    pub client_message_id: Option<String>,
}

/// `POST /support/chat/messages` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewChatMessageDto {
    pub session_id: String,
    pub sender_id: String,
    pub message: String,
    pub client_message_id: String,
}

/// `GET /support/stats`: dashboard counters, passed through as-is
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SupportStats(pub BTreeMap<String, serde_json::Value>);

/// `GET /support/tickets` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Ticket {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, alias = "title")]
    pub subject: Option<String>,
    pub status: TicketStatus,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// `PUT /support/tickets/{id}` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketUpdate {
    pub status: TicketStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// `GET /support/subscriptions` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Subscription {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, alias = "customer", alias = "user_name")]
    pub customer_name: Option<String>,
    #[serde(default, alias = "plan_name")]
    pub plan: Option<String>,
    pub status: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// `PUT /support/subscriptions/{id}/status` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatusUpdate {
    pub status: String,
}
