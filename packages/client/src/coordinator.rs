//! Agent-side chat session workflow: list, claim, open and close sessions.
//!
//! At most one [`ChatChannel`] is live at a time. Selecting another session
//! always finishes closing the previous socket before anything else happens.

use std::sync::Arc;

use crm_live_shared::time::{Clock, SystemClock};

use crate::{
    channel::{ChatChannel, ChatUpdate},
    config::LiveConfig,
    domain::{ChatSession, SessionId, SessionStatus, UserId},
    error::{ApiError, SessionError},
    infrastructure::SupportApi,
};

pub struct ChatSessionCoordinator {
    config: LiveConfig,
    api: Arc<dyn SupportApi>,
    clock: Arc<dyn Clock>,
    agent_id: UserId,
    sessions: Vec<ChatSession>,
    active: Option<ChatChannel>,
}

impl ChatSessionCoordinator {
    pub fn new(config: LiveConfig, api: Arc<dyn SupportApi>, agent_id: UserId) -> Self {
        Self::with_clock(config, api, agent_id, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: LiveConfig,
        api: Arc<dyn SupportApi>,
        agent_id: UserId,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            api,
            clock,
            agent_id,
            sessions: Vec::new(),
            active: None,
        }
    }

    pub fn agent_id(&self) -> &UserId {
        &self.agent_id
    }

    /// Sessions from the last [`Self::list_active`] call, updated by select/close.
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn find_session(&self, session_id: &SessionId) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| &s.id == session_id)
    }

    pub fn active(&self) -> Option<&ChatChannel> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ChatChannel> {
        self.active.as_mut()
    }

    /// Fetch the sessions that are not closed yet.
    pub async fn list_active(&mut self) -> Result<&[ChatSession], ApiError> {
        let mut sessions = self.api.active_sessions().await?;
        sessions.retain(|s| s.status != SessionStatus::Closed);
        tracing::debug!("{} active chat sessions", sessions.len());
        self.sessions = sessions;
        Ok(&self.sessions)
    }

    /// Make `session` the open chat.
    ///
    /// Unassigned sessions are claimed for this agent first; if the claim is
    /// rejected, or the session belongs to someone else, no socket is opened.
    pub async fn select(&mut self, session: &ChatSession) -> Result<&mut ChatChannel, SessionError> {
        self.teardown().await;

        match &session.assigned_agent_id {
            Some(owner) if owner != &self.agent_id => {
                return Err(SessionError::NotOwner {
                    session_id: session.id.clone(),
                    agent_id: owner.clone(),
                });
            }
            Some(_) => {}
            None => self.claim(&session.id).await?,
        }

        let history = self.api.session_messages(&session.id).await?;
        let channel = ChatChannel::open(
            &self.config,
            Arc::clone(&self.api),
            Arc::clone(&self.clock),
            session.id.clone(),
            self.agent_id.clone(),
            true,
            history,
        )
        .await;
        Ok(self.active.insert(channel))
    }

    /// Mark `session_id` closed on the backend and drop its channel if open.
    ///
    /// Safe to call when no channel is open.
    pub async fn close(&mut self, session_id: &SessionId) -> Result<(), ApiError> {
        self.api.close_session(session_id).await?;
        if self
            .active
            .as_ref()
            .is_some_and(|channel| channel.session_id() == session_id)
        {
            self.teardown().await;
        }
        self.sessions.retain(|s| &s.id != session_id);
        tracing::info!("Chat session {} closed by agent {}", session_id, self.agent_id);
        Ok(())
    }

    /// Next update from the open chat; pending forever when none is open.
    ///
    /// Cancel-safe, so it can sit in a `select!` loop next to other sources.
    pub async fn next_update(&mut self) -> Option<ChatUpdate> {
        match self.active.as_mut() {
            Some(channel) => channel.next_update().await,
            None => std::future::pending().await,
        }
    }

    /// Close the open chat, if any.
    pub async fn shutdown(&mut self) {
        self.teardown().await;
    }

    async fn claim(&mut self, session_id: &SessionId) -> Result<(), SessionError> {
        match self.api.assign_session(session_id).await {
            Ok(()) => {
                if let Some(cached) = self.sessions.iter_mut().find(|s| &s.id == session_id) {
                    cached.assigned_agent_id = Some(self.agent_id.clone());
                }
                tracing::info!("Assigned session {} to agent {}", session_id, self.agent_id);
                Ok(())
            }
            Err(error @ (ApiError::Conflict(_) | ApiError::BadRequest(_))) => {
                tracing::warn!("Claim of session {} rejected: {}", session_id, error);
                Err(SessionError::AssignmentConflict {
                    session_id: session_id.clone(),
                    detail: error.toast_message(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn teardown(&mut self) {
        if let Some(mut channel) = self.active.take() {
            channel.shutdown().await;
        }
    }
}
