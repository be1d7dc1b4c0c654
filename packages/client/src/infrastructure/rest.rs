//! REST client for the support backend.
//!
//! [`SupportApi`] is the seam the coordinator and the chat channel depend on;
//! [`HttpSupportApi`] implements it over `reqwest`. Exact payload shapes belong
//! to the backend, so responses are decoded leniently (see [`super::dto`]).

use std::sync::Arc;

use async_trait::async_trait;
use crm_live_shared::time::Clock;
use reqwest::{
    RequestBuilder, Response, Url,
    header::{COOKIE, HeaderMap, HeaderValue},
};
use serde::de::DeserializeOwned;

use crate::{
    config::LiveConfig,
    domain::{ChatMessage, ChatSession, SessionId, TicketStatus, Timestamp},
    error::ApiError,
};

use super::dto::{
    conversion::record_to_message,
    http::{
        ChatMessageRecordDto, ChatSessionDto, ListEnvelope, NewChatMessageDto, Subscription,
        SubscriptionStatusUpdate, SupportStats, Ticket, TicketUpdate,
    },
};

/// Support REST surface consumed by the real-time core and the console
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SupportApi: Send + Sync {
    /// `GET /support/stats`
    async fn stats(&self) -> Result<SupportStats, ApiError>;

    /// `GET /support/tickets?status=`
    async fn tickets(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, ApiError>;

    /// `PUT /support/tickets/{id}`
    async fn update_ticket(&self, ticket_id: &str, update: &TicketUpdate) -> Result<(), ApiError>;

    /// `GET /support/chat/sessions`: sessions not yet closed
    async fn active_sessions(&self) -> Result<Vec<ChatSession>, ApiError>;

    /// `POST /support/chat/sessions/{id}/assign`: claim for the calling agent
    async fn assign_session(&self, session_id: &SessionId) -> Result<(), ApiError>;

    /// `POST /support/chat/sessions/{id}/close`
    async fn close_session(&self, session_id: &SessionId) -> Result<(), ApiError>;

    /// `GET /support/chat/sessions/{id}/messages`
    async fn session_messages(&self, session_id: &SessionId)
    -> Result<Vec<ChatMessage>, ApiError>;

    /// `POST /support/chat/messages`: persist a sent message
    async fn persist_message(&self, message: &NewChatMessageDto) -> Result<ChatMessage, ApiError>;

    /// `GET /support/subscriptions`
    async fn subscriptions(&self) -> Result<Vec<Subscription>, ApiError>;

    /// `POST /support/subscriptions/{id}/overdue-email`
    async fn send_overdue_email(&self, subscription_id: &str) -> Result<(), ApiError>;

    /// `PUT /support/subscriptions/{id}/status`
    async fn update_subscription_status(
        &self,
        subscription_id: &str,
        status: &str,
    ) -> Result<(), ApiError>;
}

/// `reqwest` implementation of [`SupportApi`]
pub struct HttpSupportApi {
    client: reqwest::Client,
    config: LiveConfig,
    clock: Arc<dyn Clock>,
}

impl HttpSupportApi {
    /// Build a client sending the configured cookie credential on every call.
    pub fn new(config: &LiveConfig, clock: Arc<dyn Clock>) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = config.credential() {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ApiError::InvalidRequest(format!("invalid credential: {}", e)))?;
            headers.insert(COOKIE, value);
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            clock,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        self.config.api_url(segments)
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    async fn get_list<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>, ApiError> {
        let envelope: ListEnvelope<T> = send(request).await?.json().await?;
        Ok(envelope.into_items())
    }
}

#[async_trait]
impl SupportApi for HttpSupportApi {
    async fn stats(&self) -> Result<SupportStats, ApiError> {
        let request = self.client.get(self.url(&["support", "stats"]));
        Ok(send(request).await?.json().await?)
    }

    async fn tickets(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, ApiError> {
        let mut request = self.client.get(self.url(&["support", "tickets"]));
        if let Some(status) = status {
            request = request.query(&[("status", status.as_wire())]);
        }
        self.get_list(request).await
    }

    async fn update_ticket(&self, ticket_id: &str, update: &TicketUpdate) -> Result<(), ApiError> {
        let request = self
            .client
            .put(self.url(&["support", "tickets", ticket_id]))
            .json(update);
        send(request).await?;
        tracing::info!("Ticket {} moved to {}", ticket_id, update.status);
        Ok(())
    }

    async fn active_sessions(&self) -> Result<Vec<ChatSession>, ApiError> {
        let request = self.client.get(self.url(&["support", "chat", "sessions"]));
        let dtos: Vec<ChatSessionDto> = self.get_list(request).await?;
        let sessions = dtos
            .into_iter()
            .filter_map(|dto| match ChatSession::try_from(dto) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!("Skipping malformed chat session: {}", e);
                    None
                }
            })
            .collect();
        Ok(sessions)
    }

    async fn assign_session(&self, session_id: &SessionId) -> Result<(), ApiError> {
        let request = self.client.post(self.url(&[
            "support",
            "chat",
            "sessions",
            session_id.as_str(),
            "assign",
        ]));
        send(request).await?;
        Ok(())
    }

    async fn close_session(&self, session_id: &SessionId) -> Result<(), ApiError> {
        let request = self.client.post(self.url(&[
            "support",
            "chat",
            "sessions",
            session_id.as_str(),
            "close",
        ]));
        send(request).await?;
        Ok(())
    }

    async fn session_messages(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let request = self.client.get(self.url(&[
            "support",
            "chat",
            "sessions",
            session_id.as_str(),
            "messages",
        ]));
        let records: Vec<ChatMessageRecordDto> = self.get_list(request).await?;
        let now = self.now();
        let messages = records
            .into_iter()
            .filter_map(|record| match record_to_message(record, session_id, now) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!("Skipping malformed message in session {}: {}", session_id, e);
                    None
                }
            })
            .collect();
        Ok(messages)
    }

    async fn persist_message(&self, message: &NewChatMessageDto) -> Result<ChatMessage, ApiError> {
        let request = self
            .client
            .post(self.url(&["support", "chat", "messages"]))
            .json(message);
        let record: ChatMessageRecordDto = send(request).await?.json().await?;
        let session_id = SessionId::new(message.session_id.as_str())
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        record_to_message(record, &session_id, self.now())
            .map_err(|e| ApiError::InvalidRequest(format!("unexpected message record: {}", e)))
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>, ApiError> {
        let request = self.client.get(self.url(&["support", "subscriptions"]));
        self.get_list(request).await
    }

    async fn send_overdue_email(&self, subscription_id: &str) -> Result<(), ApiError> {
        let request = self.client.post(self.url(&[
            "support",
            "subscriptions",
            subscription_id,
            "overdue-email",
        ]));
        send(request).await?;
        Ok(())
    }

    async fn update_subscription_status(
        &self,
        subscription_id: &str,
        status: &str,
    ) -> Result<(), ApiError> {
        let request = self
            .client
            .put(self.url(&["support", "subscriptions", subscription_id, "status"]))
            .json(&SubscriptionStatusUpdate {
                status: status.to_string(),
            });
        send(request).await?;
        Ok(())
    }
}

/// Send a request and turn non-success statuses into [`ApiError`]s.
async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let error = ApiError::from_status(status.as_u16(), extract_detail(&body));
    if error.is_authorization() {
        tracing::warn!("Support API refused the request: {}", error);
    } else {
        tracing::debug!("Support API error: {}", error);
    }
    Err(error)
}

/// Pull the human-readable message out of an error body.
///
/// Understands `{"detail": "..."}`, validation lists
/// `{"detail": [{"msg": "..."}]}`, `{"message": "..."}` and `{"error": "..."}`;
/// falls back to the raw body.
fn extract_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return Some(body.to_string());
    };
    match json.get("detail") {
        Some(serde_json::Value::String(detail)) => return Some(detail.clone()),
        Some(serde_json::Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if !messages.is_empty() {
                return Some(messages.join("; "));
            }
        }
        _ => {}
    }
    ["message", "error"]
        .iter()
        .find_map(|key| json.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .or_else(|| Some(body.to_string()))
}
