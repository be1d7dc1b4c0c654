//! Per-user push notification channel.

use std::{sync::Arc, time::Duration};

use crm_live_shared::time::{Clock, SystemClock};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    config::LiveConfig,
    domain::{
        ChannelKey, ConnectionEvent, ConnectionState, NotificationEvent, NotificationFeed,
        Timestamp, UserId,
    },
    infrastructure::{
        ConnectionManager, ConnectionOptions, dto::conversion::decode_notification,
    },
};

/// What changed after one inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationUpdate {
    Connected,
    Disconnected { reconnect_in: Option<Duration> },
    /// A new notification was prepended to the feed
    Received(NotificationEvent),
}

/// Live, deduplicated notification feed for the logged-in user
pub struct NotificationChannel {
    config: LiveConfig,
    user_id: UserId,
    manager: ConnectionManager,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    feed: NotificationFeed,
    clock: Arc<dyn Clock>,
}

impl NotificationChannel {
    /// Connect the notification socket for `user_id`.
    pub async fn connect(config: &LiveConfig, user_id: UserId) -> Self {
        Self::connect_with_clock(config, user_id, Arc::new(SystemClock)).await
    }

    pub async fn connect_with_clock(
        config: &LiveConfig,
        user_id: UserId,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (manager, events) = new_manager(config, &user_id);
        let mut channel = Self {
            config: config.clone(),
            user_id,
            manager,
            events,
            feed: NotificationFeed::new(),
            clock,
        };
        channel.open().await;
        channel
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn feed(&self) -> &NotificationFeed {
        &self.feed
    }

    pub fn unread_count(&self) -> usize {
        self.feed.unread_count()
    }

    /// User acknowledged (clicked) a notification.
    pub fn mark_read(&mut self, local_id: &str) -> bool {
        self.feed.mark_read(local_id)
    }

    pub fn mark_all_read(&mut self) {
        self.feed.mark_all_read();
    }

    pub fn clear_all(&mut self) {
        self.feed.clear_all();
    }

    /// Wait for the next change. Malformed frames are logged and skipped.
    ///
    /// Cancel-safe: no state is touched until an event has been received.
    pub async fn next_update(&mut self) -> Option<NotificationUpdate> {
        loop {
            match self.events.recv().await? {
                ConnectionEvent::Opened => return Some(NotificationUpdate::Connected),
                ConnectionEvent::Closed { reconnect_in } => {
                    return Some(NotificationUpdate::Disconnected { reconnect_in });
                }
                ConnectionEvent::Frame(text) => {
                    if let Some(event) = self.handle_frame(&text) {
                        return Some(NotificationUpdate::Received(event));
                    }
                }
            }
        }
    }

    /// Decode, normalize and store one frame.
    ///
    /// Returns the stored event, or `None` if the frame was dropped.
    pub fn handle_frame(&mut self, text: &str) -> Option<NotificationEvent> {
        let payload = match decode_notification(text) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Dropping malformed notification frame: {}", e);
                return None;
            }
        };
        let arrived_at = Timestamp::new(self.clock.now_millis());
        let event = NotificationEvent::normalize(payload, arrived_at, || {
            Uuid::new_v4().to_string()
        });

        if !self.feed.push(event.clone()) {
            tracing::debug!("Ignoring duplicate notification {}", event.local_id);
            return None;
        }
        tracing::debug!(
            "Notification {} ({}) for user {}: {}",
            event.local_id,
            event.kind.as_str(),
            self.user_id,
            event.title
        );
        Some(event)
    }

    /// Tear down and reconnect for another user; the feed starts empty.
    pub async fn switch_user(&mut self, user_id: UserId) {
        self.manager.close().await;
        let (manager, events) = new_manager(&self.config, &user_id);
        self.manager = manager;
        self.events = events;
        self.user_id = user_id;
        self.feed.clear_all();
        self.open().await;
    }

    /// Logout: close the socket and cancel pending retries.
    pub async fn shutdown(&mut self) {
        self.manager.close().await;
        tracing::info!("Notification channel for user {} closed", self.user_id);
    }

    async fn open(&mut self) {
        let url = self.config.notification_url(&self.user_id);
        self.manager.open(url.as_str()).await;
    }
}

fn new_manager(
    config: &LiveConfig,
    user_id: &UserId,
) -> (ConnectionManager, mpsc::UnboundedReceiver<ConnectionEvent>) {
    ConnectionManager::new(
        ChannelKey::notification(user_id.as_str()),
        ConnectionOptions::from(config),
    )
}
