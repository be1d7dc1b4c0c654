//! Conversion logic between DTOs and domain entities.

use crm_live_shared::time::timestamp_to_rfc3339;
use uuid::Uuid;

use crate::{
    domain::{
        ChatMessage, ChatSession, Delivery, MessageId, NotificationKind, NotificationPayload,
        SessionId, SessionStatus, Timestamp, UserId,
    },
    error::FrameError,
};

use super::{
    RawId, RawTimestamp,
    http::{ChatMessageRecordDto, ChatSessionDto, NewChatMessageDto},
    websocket::{ChatFrame, NotificationFrame},
};

// ========================================
// DTO → Domain Entity
// ========================================

/// Decode a raw notification frame.
pub fn decode_notification(text: &str) -> Result<NotificationPayload, FrameError> {
    let frame: NotificationFrame = serde_json::from_str(text)?;
    Ok(frame.into())
}

/// Decode a raw chat frame received on the socket of `session_id`.
pub fn decode_chat_frame(
    text: &str,
    session_id: &SessionId,
    arrived_at: Timestamp,
) -> Result<ChatMessage, FrameError> {
    let frame: ChatFrame = serde_json::from_str(text)?;
    chat_frame_to_message(frame, session_id, arrived_at)
}

impl From<NotificationFrame> for NotificationPayload {
    fn from(frame: NotificationFrame) -> Self {
        Self {
            kind: NotificationKind::from_wire(&frame.kind),
            local_id: frame.id.or(frame.local_id).map(|id| id.into_string()),
            created_at: to_timestamp(frame.created_at.as_ref())
                .or_else(|| to_timestamp(frame.created_at_camel.as_ref())),
            territory_name: frame.territory_name.or(frame.territory_name_snake),
            lead_name: frame.lead_name.or(frame.lead_name_snake),
            company: frame.company,
            title: frame.title,
            task_id: frame
                .task_id
                .or(frame.task_id_snake)
                .map(|id| id.into_string()),
        }
    }
}

pub fn chat_frame_to_message(
    frame: ChatFrame,
    session_id: &SessionId,
    arrived_at: Timestamp,
) -> Result<ChatMessage, FrameError> {
    Ok(ChatMessage {
        id: server_or_temp_id(frame.id.map(|id| id.into_string())),
        client_message_id: parse_client_id(frame.client_message_id.as_deref()),
        session_id: session_id.clone(),
        sender_id: UserId::new(frame.sender_id.into_string())?,
        text: frame.message,
        created_at: to_timestamp(frame.timestamp.as_ref()).unwrap_or(arrived_at),
        delivery: Delivery::Confirmed,
    })
}

/// Convert a stored record; `session_id` is used when the record omits it.
pub fn record_to_message(
    record: ChatMessageRecordDto,
    session_id: &SessionId,
    fallback_time: Timestamp,
) -> Result<ChatMessage, FrameError> {
    let session_id = match record.session_id {
        Some(id) => SessionId::new(id.into_string())?,
        None => session_id.clone(),
    };
    Ok(ChatMessage {
        id: MessageId::Server(record.id.into_string()),
        client_message_id: parse_client_id(record.client_message_id.as_deref()),
        session_id,
        sender_id: UserId::new(record.sender_id.into_string())?,
        text: record.message,
        created_at: to_timestamp(record.created_at.as_ref()).unwrap_or(fallback_time),
        delivery: Delivery::Confirmed,
    })
}

impl TryFrom<ChatSessionDto> for ChatSession {
    type Error = FrameError;

    fn try_from(dto: ChatSessionDto) -> Result<Self, Self::Error> {
        let participant = dto
            .participant_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| dto.user_id.map(|id| id.into_string()))
            .unwrap_or_else(|| "unknown".to_string());
        let assigned_agent_id = match dto.agent_id {
            Some(id) => Some(UserId::new(id.into_string())?),
            None => None,
        };
        let status = match dto.status.as_deref() {
            Some(status) if status.eq_ignore_ascii_case("closed") => SessionStatus::Closed,
            _ => SessionStatus::Active,
        };
        Ok(Self {
            id: SessionId::new(dto.id.into_string())?,
            participant,
            assigned_agent_id,
            status,
        })
    }
}

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&ChatMessage> for ChatFrame {
    fn from(message: &ChatMessage) -> Self {
        Self {
            sender_id: RawId::Text(message.sender_id.as_str().to_string()),
            message: message.text.clone(),
            timestamp: Some(RawTimestamp::Text(timestamp_to_rfc3339(
                message.created_at.value(),
            ))),
            id: None,
            client_message_id: message.client_message_id.map(|id| id.to_string()),
        }
    }
}

impl From<&ChatMessage> for NewChatMessageDto {
    fn from(message: &ChatMessage) -> Self {
        Self {
            session_id: message.session_id.as_str().to_string(),
            sender_id: message.sender_id.as_str().to_string(),
            message: message.text.clone(),
            client_message_id: message
                .client_message_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        }
    }
}

fn to_timestamp(raw: Option<&RawTimestamp>) -> Option<Timestamp> {
    raw.and_then(RawTimestamp::to_millis).map(Timestamp::new)
}

fn parse_client_id(raw: Option<&str>) -> Option<Uuid> {
    raw.and_then(|id| Uuid::parse_str(id.trim()).ok())
}

fn server_or_temp_id(server_id: Option<String>) -> MessageId {
    match server_id {
        Some(id) if !id.trim().is_empty() => MessageId::Server(id),
        _ => MessageId::Temp(Uuid::new_v4()),
    }
}
