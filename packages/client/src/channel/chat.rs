//! Live chat channel for one session.
//!
//! Sending is optimistic: the entry is appended as pending before anything
//! leaves the process, the frame goes out on the socket, and the message is
//! persisted over REST in the background. Whichever confirmation arrives
//! first (socket echo or REST response) upgrades the pending entry in place.

use std::{sync::Arc, time::Duration};

use crm_live_shared::time::Clock;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    config::LiveConfig,
    domain::{
        ChannelKey, ChatMessage, ConnectionEvent, ConnectionState, MessageId, Reconciliation,
        SessionId, Timestamp, Transcript, UserId,
    },
    error::{ApiError, SendError},
    infrastructure::{
        ConnectionManager, ConnectionOptions, SupportApi,
        dto::{conversion::decode_chat_frame, http::NewChatMessageDto, websocket::ChatFrame},
    },
};

type PersistOutcome = (Uuid, Result<ChatMessage, ApiError>);

/// What changed after one inbound event
#[derive(Debug)]
pub enum ChatUpdate {
    Connected,
    Disconnected {
        reconnect_in: Option<Duration>,
    },
    /// A message not seen before was appended
    Appended(ChatMessage),
    /// A pending local message was confirmed in place
    Confirmed(ChatMessage),
    /// REST persistence failed; the entry stays pending
    PersistFailed {
        client_message_id: Uuid,
        error: ApiError,
    },
}

/// Socket plus transcript for the session currently open in the chat pane
pub struct ChatChannel {
    session_id: SessionId,
    user_id: UserId,
    manager: ConnectionManager,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    transcript: Transcript,
    api: Arc<dyn SupportApi>,
    clock: Arc<dyn Clock>,
    persist_tx: mpsc::UnboundedSender<PersistOutcome>,
    persist_rx: mpsc::UnboundedReceiver<PersistOutcome>,
}

impl ChatChannel {
    /// Seed the transcript with `history` and open the session socket.
    pub async fn open(
        config: &LiveConfig,
        api: Arc<dyn SupportApi>,
        clock: Arc<dyn Clock>,
        session_id: SessionId,
        user_id: UserId,
        is_agent: bool,
        history: Vec<ChatMessage>,
    ) -> Self {
        let (mut manager, events) = ConnectionManager::new(
            ChannelKey::chat(session_id.as_str()),
            ConnectionOptions::from(config),
        );
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();

        let mut transcript = Transcript::new(session_id.clone());
        transcript.replace_history(history);

        let url = config.chat_url(&session_id, &user_id, is_agent);
        manager.open(url.as_str()).await;
        tracing::info!(
            "Opened chat session {} as {} ({} messages of history)",
            session_id,
            user_id,
            transcript.len()
        );

        Self {
            session_id,
            user_id,
            manager,
            events,
            transcript,
            api,
            clock,
            persist_tx,
            persist_rx,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Send `text` to the session.
    ///
    /// The returned entry is already in the transcript, marked pending.
    pub fn send_message(&mut self, text: &str) -> Result<&ChatMessage, SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::EmptyMessage);
        }

        let client_message_id = Uuid::new_v4();
        let message = ChatMessage::local(
            self.session_id.clone(),
            self.user_id.clone(),
            text.to_string(),
            Timestamp::new(self.clock.now_millis()),
            client_message_id,
        );

        match serde_json::to_string(&ChatFrame::from(&message)) {
            Ok(frame) => {
                if !self.manager.send(frame) {
                    tracing::debug!(
                        "Chat socket for {} not open; relying on REST persistence",
                        self.session_id
                    );
                }
            }
            Err(e) => tracing::error!("Failed to encode chat frame: {}", e),
        }

        let api = Arc::clone(&self.api);
        let persist_tx = self.persist_tx.clone();
        let request = NewChatMessageDto::from(&message);
        tokio::spawn(async move {
            let result = api.persist_message(&request).await;
            let _ = persist_tx.send((client_message_id, result));
        });

        Ok(self.transcript.push_local(message))
    }

    /// Wait for the next visible change to the transcript or connection.
    ///
    /// Cancel-safe: both sources are channel receivers.
    pub async fn next_update(&mut self) -> Option<ChatUpdate> {
        loop {
            tokio::select! {
                event = self.events.recv() => {
                    match event? {
                        ConnectionEvent::Opened => return Some(ChatUpdate::Connected),
                        ConnectionEvent::Closed { reconnect_in } => {
                            return Some(ChatUpdate::Disconnected { reconnect_in });
                        }
                        ConnectionEvent::Frame(text) => {
                            if let Some(update) = self.handle_frame(&text) {
                                return Some(update);
                            }
                        }
                    }
                }
                outcome = self.persist_rx.recv() => {
                    let (client_message_id, result) = outcome?;
                    if let Some(update) = self.handle_persisted(client_message_id, result) {
                        return Some(update);
                    }
                }
            }
        }
    }

    /// Merge one socket frame into the transcript.
    pub fn handle_frame(&mut self, text: &str) -> Option<ChatUpdate> {
        let arrived_at = Timestamp::new(self.clock.now_millis());
        let message = match decode_chat_frame(text, &self.session_id, arrived_at) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    "Dropping malformed chat frame on {}: {}",
                    self.session_id,
                    e
                );
                return None;
            }
        };
        let outcome = self.transcript.apply_confirmed(message);
        self.update_for(outcome)
    }

    /// Apply the result of a background persistence call.
    pub fn handle_persisted(
        &mut self,
        client_message_id: Uuid,
        result: Result<ChatMessage, ApiError>,
    ) -> Option<ChatUpdate> {
        match result {
            Ok(stored) => {
                let server_id = match &stored.id {
                    MessageId::Server(id) => Some(id.as_str()),
                    MessageId::Temp(_) => None,
                };
                let outcome = self.transcript.confirm_local(client_message_id, server_id)?;
                self.update_for(outcome)
            }
            Err(error) => {
                tracing::warn!(
                    "Failed to persist message {} in {}: {}",
                    client_message_id,
                    self.session_id,
                    error
                );
                Some(ChatUpdate::PersistFailed {
                    client_message_id,
                    error,
                })
            }
        }
    }

    /// Re-fetch the transcript from the backend, keeping unconfirmed local entries.
    pub async fn reload_history(&mut self) -> Result<(), ApiError> {
        let history = self.api.session_messages(&self.session_id).await?;
        self.transcript.replace_history(history);
        Ok(())
    }

    /// Close the socket and cancel pending retries.
    pub async fn shutdown(&mut self) {
        self.manager.close().await;
        tracing::info!("Chat session {} closed", self.session_id);
    }

    fn update_for(&self, outcome: Reconciliation) -> Option<ChatUpdate> {
        let messages = self.transcript.messages();
        match outcome {
            Reconciliation::Appended(index) => {
                Some(ChatUpdate::Appended(messages[index].clone()))
            }
            Reconciliation::Confirmed(index) => {
                Some(ChatUpdate::Confirmed(messages[index].clone()))
            }
            Reconciliation::Duplicate(_) => None,
        }
    }
}
