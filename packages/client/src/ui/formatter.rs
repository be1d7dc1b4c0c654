//! Text rendering for the agent console.

use std::time::Duration;

use crm_live_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::{ChatMessage, ChatSession, NotificationEvent, NotificationFeed, Transcript, UserId},
    infrastructure::dto::http::{Subscription, SupportStats, Ticket},
};

const RULE: &str = "============================================================";

/// Message formatter for console display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the session list, marking sessions owned by `agent_id`
    pub fn format_sessions(sessions: &[ChatSession], agent_id: &UserId) -> String {
        let mut output = format!("\n{}\nActive sessions:\n", RULE);
        if sessions.is_empty() {
            output.push_str("(No active sessions)\n");
        }
        for session in sessions {
            let owner = match &session.assigned_agent_id {
                Some(owner) if owner == agent_id => "mine".to_string(),
                Some(owner) => format!("agent {}", owner),
                None => "unassigned".to_string(),
            };
            output.push_str(&format!(
                "{}  {} [{}]\n",
                session.id, session.participant, owner
            ));
        }
        output.push_str(RULE);
        output.push('\n');
        output
    }

    /// Format one transcript entry; pending entries carry a marker
    ///
    /// # Arguments
    ///
    /// * `message` - The transcript entry
    /// * `me` - The current user, shown as "me"
    pub fn format_chat_message(message: &ChatMessage, me: &UserId) -> String {
        let sender = if &message.sender_id == me {
            "me".to_string()
        } else {
            message.sender_id.to_string()
        };
        let pending = if message.is_pending() { " (sending)" } else { "" };
        format!(
            "[{}] @{}: {}{}",
            timestamp_to_rfc3339(message.created_at.value()),
            sender,
            message.text,
            pending
        )
    }

    pub fn format_transcript(transcript: &Transcript, me: &UserId) -> String {
        let mut output = format!("\n{}\nSession {}:\n", RULE, transcript.session_id());
        if transcript.is_empty() {
            output.push_str("(No messages yet)\n");
        }
        for message in transcript.messages() {
            output.push_str(&Self::format_chat_message(message, me));
            output.push('\n');
        }
        output.push_str(RULE);
        output.push('\n');
        output
    }

    /// Format the delivery confirmation of a locally sent message
    pub fn format_delivered(message: &ChatMessage) -> String {
        format!(
            "✓ delivered \"{}\" at {}",
            message.text,
            timestamp_to_rfc3339(message.created_at.value())
        )
    }

    /// Format an incoming notification as a one-line toast with the badge count
    pub fn format_notification(event: &NotificationEvent, unread: usize) -> String {
        format!("\n* {} ({} unread)", event.title, unread)
    }

    pub fn format_feed(feed: &NotificationFeed) -> String {
        let mut output = format!("\n{}\nNotifications ({} unread):\n", RULE, feed.unread_count());
        if feed.is_empty() {
            output.push_str("(No notifications)\n");
        }
        for event in feed.events() {
            let marker = if event.read { ' ' } else { '*' };
            output.push_str(&format!(
                "{} {}  {}  [{}]\n",
                marker,
                timestamp_to_rfc3339(event.created_at.value()),
                event.title,
                event.local_id
            ));
        }
        output.push_str(RULE);
        output.push('\n');
        output
    }

    /// Format a connection state change for `channel` ("notifications", "chat 42")
    pub fn format_connected(channel: &str) -> String {
        format!("\n+ {} connected", channel)
    }

    pub fn format_disconnected(channel: &str, reconnect_in: Option<Duration>) -> String {
        match reconnect_in {
            Some(delay) => format!(
                "\n- {} disconnected, retrying in {}s",
                channel,
                delay.as_secs_f32()
            ),
            None => format!("\n- {} disconnected", channel),
        }
    }

    /// Format a user-facing error
    pub fn format_toast(message: &str) -> String {
        format!("! {}", message)
    }

    pub fn format_stats(stats: &SupportStats) -> String {
        let mut output = format!("\n{}\nSupport stats:\n", RULE);
        for (name, value) in &stats.0 {
            output.push_str(&format!("{}: {}\n", name, value));
        }
        output.push_str(RULE);
        output.push('\n');
        output
    }

    pub fn format_tickets(tickets: &[Ticket]) -> String {
        let mut output = format!("\n{}\nTickets:\n", RULE);
        if tickets.is_empty() {
            output.push_str("(No tickets)\n");
        }
        for ticket in tickets {
            output.push_str(&format!(
                "#{} [{}] {}{}\n",
                ticket.id,
                ticket.status,
                ticket.subject.as_deref().unwrap_or("(no subject)"),
                ticket
                    .priority
                    .as_deref()
                    .map(|p| format!(" ({})", p))
                    .unwrap_or_default()
            ));
        }
        output.push_str(RULE);
        output.push('\n');
        output
    }

    pub fn format_subscriptions(subscriptions: &[Subscription]) -> String {
        let mut output = format!("\n{}\nSubscriptions:\n", RULE);
        if subscriptions.is_empty() {
            output.push_str("(No subscriptions)\n");
        }
        for subscription in subscriptions {
            output.push_str(&format!(
                "#{} {} - {} [{}]\n",
                subscription.id,
                subscription.customer_name.as_deref().unwrap_or("unknown customer"),
                subscription.plan.as_deref().unwrap_or("unknown plan"),
                subscription.status
            ));
        }
        output.push_str(RULE);
        output.push('\n');
        output
    }
}
