//! Support chat model: sessions, messages and the reconciling transcript.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::value_object::{SessionId, Timestamp, UserId};

/// Lifecycle status of a chat session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Closed,
}

/// A support chat session between an end user and (eventually) one agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: SessionId,
    pub participant: String,
    pub assigned_agent_id: Option<UserId>,
    pub status: SessionStatus,
}

impl ChatSession {
    pub fn is_assigned(&self) -> bool {
        self.assigned_agent_id.is_some()
    }

    pub fn is_owned_by(&self, agent_id: &UserId) -> bool {
        self.assigned_agent_id.as_ref() == Some(agent_id)
    }
}

/// Message identity: a client-generated id until the server assigns one
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    Temp(Uuid),
    Server(String),
}

impl MessageId {
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server(_))
    }
}

/// Delivery state of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent locally, not yet echoed or persisted
    Pending,
    /// Seen on the socket or returned by the REST backend
    Confirmed,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub client_message_id: Option<Uuid>,
    pub session_id: SessionId,
    pub sender_id: UserId,
    pub text: String,
    pub created_at: Timestamp,
    pub delivery: Delivery,
}

impl ChatMessage {
    /// Build an optimistic entry for a message composed locally.
    pub fn local(
        session_id: SessionId,
        sender_id: UserId,
        text: String,
        created_at: Timestamp,
        client_message_id: Uuid,
    ) -> Self {
        Self {
            id: MessageId::Temp(client_message_id),
            client_message_id: Some(client_message_id),
            session_id,
            sender_id,
            text,
            created_at,
            delivery: Delivery::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.delivery == Delivery::Pending
    }

    fn server_id(&self) -> Option<&str> {
        match &self.id {
            MessageId::Server(id) => Some(id),
            MessageId::Temp(_) => None,
        }
    }

    fn confirm(&mut self, server_id: Option<&str>) {
        self.delivery = Delivery::Confirmed;
        if let Some(id) = server_id
            && !self.id.is_server()
        {
            self.id = MessageId::Server(id.to_string());
        }
    }

    fn echoes(&self, other: &ChatMessage) -> bool {
        self.sender_id == other.sender_id && self.text == other.text
    }
}

/// Outcome of feeding an authoritative message into the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// New entry at the given index
    Appended(usize),
    /// A pending local entry at the given index became confirmed
    Confirmed(usize),
    /// Already known; nothing rendered twice
    Duplicate(usize),
}

/// Append-ordered transcript of one session.
///
/// Entries are never re-sorted after insertion. Identity is explicit: server
/// ids, then client message ids, then (for id-less echoes) sender and text
/// against the oldest local entry whose socket echo has not arrived yet.
#[derive(Debug, Clone)]
pub struct Transcript {
    session_id: SessionId,
    messages: Vec<ChatMessage>,
    /// Local sends still expecting their socket echo. A REST confirmation
    /// does not remove an entry from here.
    awaiting_echo: HashSet<Uuid>,
}

impl Transcript {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
            awaiting_echo: HashSet::new(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_pending()).count()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.awaiting_echo.clear();
    }

    /// Append an optimistic local entry and return it.
    pub fn push_local(&mut self, message: ChatMessage) -> &ChatMessage {
        if let Some(client_id) = message.client_message_id {
            self.awaiting_echo.insert(client_id);
        }
        let index = self.messages.len();
        self.messages.push(message);
        &self.messages[index]
    }

    /// Merge a message coming from the socket or the REST backend.
    pub fn apply_confirmed(&mut self, incoming: ChatMessage) -> Reconciliation {
        if let Some(server_id) = incoming.server_id()
            && let Some(index) = self
                .messages
                .iter()
                .position(|m| m.server_id() == Some(server_id))
        {
            self.mark_echoed(index);
            return Reconciliation::Duplicate(index);
        }

        let matched = match incoming.client_message_id {
            Some(client_id) => self.position_of_client_id(client_id),
            None => self.messages.iter().position(|m| {
                m.client_message_id
                    .is_some_and(|id| self.awaiting_echo.contains(&id))
                    && (m.server_id().is_none() || incoming.server_id().is_none())
                    && m.echoes(&incoming)
            }),
        };
        if let Some(index) = matched {
            let was_pending = self.messages[index].is_pending();
            self.messages[index].confirm(incoming.server_id());
            self.mark_echoed(index);
            return if was_pending {
                Reconciliation::Confirmed(index)
            } else {
                Reconciliation::Duplicate(index)
            };
        }

        let mut incoming = incoming;
        incoming.delivery = Delivery::Confirmed;
        self.messages.push(incoming);
        Reconciliation::Appended(self.messages.len() - 1)
    }

    /// Confirm the local entry a persistence call was issued for.
    ///
    /// The entry stays eligible for its socket echo.
    pub fn confirm_local(
        &mut self,
        client_message_id: Uuid,
        server_id: Option<&str>,
    ) -> Option<Reconciliation> {
        let index = self.position_of_client_id(client_message_id)?;
        let was_pending = self.messages[index].is_pending();
        self.messages[index].confirm(server_id);
        Some(if was_pending {
            Reconciliation::Confirmed(index)
        } else {
            Reconciliation::Duplicate(index)
        })
    }

    /// Replace the log with server history, keeping local entries that are
    /// still pending and absent from that history at the end.
    ///
    /// Id-less history records are matched to pending entries by content only
    /// when the record was not already in the log before the reload.
    pub fn replace_history(&mut self, history: Vec<ChatMessage>) {
        let mut known: HashMap<String, Option<Uuid>> = HashMap::new();
        let mut pending = Vec::new();
        for message in self.messages.drain(..) {
            if let Some(server_id) = message.server_id() {
                known.insert(server_id.to_string(), message.client_message_id);
            }
            if message.is_pending() {
                pending.push(message);
            }
        }

        for mut message in history {
            if message.client_message_id.is_none()
                && let Some(server_id) = message.server_id()
                && let Some(client_id) = known.get(server_id).copied().flatten()
            {
                message.client_message_id = Some(client_id);
            }
            self.apply_confirmed(message);
        }

        let mut claimed = vec![false; self.messages.len()];
        for local in pending {
            let matched = self.messages.iter().enumerate().position(|(i, m)| {
                !claimed[i]
                    && match (m.client_message_id, local.client_message_id) {
                        (Some(a), Some(b)) => a == b,
                        (None, _) => {
                            m.server_id().is_some_and(|id| !known.contains_key(id))
                                && m.echoes(&local)
                        }
                        _ => false,
                    }
            });
            match matched {
                Some(index) => {
                    claimed[index] = true;
                    if self.messages[index].client_message_id.is_none() {
                        self.messages[index].client_message_id = local.client_message_id;
                    }
                }
                None => self.messages.push(local),
            }
        }

        let present: HashSet<Uuid> = self
            .messages
            .iter()
            .filter_map(|m| m.client_message_id)
            .collect();
        self.awaiting_echo.retain(|id| present.contains(id));
    }

    fn position_of_client_id(&self, client_message_id: Uuid) -> Option<usize> {
        self.messages
            .iter()
            .position(|m| m.client_message_id == Some(client_message_id))
    }

    fn mark_echoed(&mut self, index: usize) {
        if let Some(client_id) = self.messages[index].client_message_id {
            self.awaiting_echo.remove(&client_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionId {
        SessionId::new("s-1").unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn local(text: &str) -> ChatMessage {
        ChatMessage::local(
            session(),
            user("agent"),
            text.to_string(),
            Timestamp::new(100),
            Uuid::new_v4(),
        )
    }

    fn remote(server_id: Option<&str>, sender: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: match server_id {
                Some(id) => MessageId::Server(id.to_string()),
                None => MessageId::Temp(Uuid::new_v4()),
            },
            client_message_id: None,
            session_id: session(),
            sender_id: user(sender),
            text: text.to_string(),
            created_at: Timestamp::new(200),
            delivery: Delivery::Confirmed,
        }
    }

    #[test]
    fn test_session_ownership() {
        // テスト項目: 担当エージェントの判定ができる
        // given (前提条件):
        let mut s = ChatSession {
            id: session(),
            participant: "customer".to_string(),
            assigned_agent_id: None,
            status: SessionStatus::Active,
        };

        // when (操作):
        let unassigned = s.is_assigned();
        s.assigned_agent_id = Some(user("agent"));

        // then (期待する結果):
        assert!(!unassigned);
        assert!(s.is_owned_by(&user("agent")));
        assert!(!s.is_owned_by(&user("other")));
    }

    #[test]
    fn test_local_message_is_visible_immediately() {
        // テスト項目: ローカル送信メッセージは確定前から表示される
        // given (前提条件):
        let mut transcript = Transcript::new(session());

        // when (操作):
        let message = transcript.push_local(local("hello")).clone();

        // then (期待する結果):
        assert_eq!(transcript.len(), 1);
        assert_eq!(message.text, "hello");
        assert_eq!(message.sender_id, user("agent"));
        assert!(message.is_pending());
    }

    #[test]
    fn test_echo_with_client_id_confirms_in_place() {
        // テスト項目: client_message_id 付きのエコーはローカルエントリを確定させ重複しない
        // given (前提条件):
        let mut transcript = Transcript::new(session());
        let sent = local("hello");
        let client_id = sent.client_message_id;
        transcript.push_local(sent);
        let mut echo = remote(Some("m-1"), "agent", "hello");
        echo.client_message_id = client_id;

        // when (操作):
        let result = transcript.apply_confirmed(echo);

        // then (期待する結果):
        assert_eq!(result, Reconciliation::Confirmed(0));
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].id, MessageId::Server("m-1".to_string()));
        assert_eq!(transcript.pending_count(), 0);
    }

    #[test]
    fn test_idless_echo_confirms_oldest_pending_by_content() {
        // テスト項目: id のないエコーは送信者と本文が一致する最古の未確定エントリを確定させる
        // given (前提条件):
        let mut transcript = Transcript::new(session());
        transcript.push_local(local("ok"));
        transcript.push_local(local("ok"));

        // when (操作):
        let result = transcript.apply_confirmed(remote(None, "agent", "ok"));

        // then (期待する結果):
        assert_eq!(result, Reconciliation::Confirmed(0));
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.pending_count(), 1);
    }

    #[test]
    fn test_same_server_id_twice_is_duplicate() {
        // テスト項目: 同じサーバー id のメッセージは二重に追加されない
        // given (前提条件):
        let mut transcript = Transcript::new(session());
        transcript.apply_confirmed(remote(Some("m-1"), "customer", "hi"));

        // when (操作):
        let result = transcript.apply_confirmed(remote(Some("m-1"), "customer", "hi"));

        // then (期待する結果):
        assert_eq!(result, Reconciliation::Duplicate(0));
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_messages_from_other_sender_are_appended_in_arrival_order() {
        // テスト項目: 他の送信者のメッセージは到着順に追加され、並べ替えられない
        // given (前提条件):
        let mut transcript = Transcript::new(session());
        let mut late = remote(None, "customer", "second");
        late.created_at = Timestamp::new(50);

        // when (操作):
        transcript.apply_confirmed(remote(None, "customer", "first"));
        transcript.apply_confirmed(late);

        // then (期待する結果):
        let texts: Vec<&str> = transcript.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_persisted_record_after_echo_is_duplicate() {
        // テスト項目: エコーで確定済みのメッセージに永続化レコードが届いても重複しない
        // given (前提条件):
        let mut transcript = Transcript::new(session());
        let sent = local("hello");
        let client_id = sent.client_message_id.unwrap();
        transcript.push_local(sent);
        transcript.apply_confirmed(remote(None, "agent", "hello"));

        // when (操作):
        let result = transcript.confirm_local(client_id, Some("m-7"));

        // then (期待する結果):
        assert_eq!(result, Some(Reconciliation::Duplicate(0)));
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].id, MessageId::Server("m-7".to_string()));
    }

    #[test]
    fn test_replace_history_keeps_unpersisted_pending() {
        // テスト項目: 履歴の再読み込みで、履歴にない未確定メッセージは末尾に残る
        // given (前提条件):
        let mut transcript = Transcript::new(session());
        let persisted = local("already saved");
        let persisted_id = persisted.client_message_id;
        transcript.push_local(persisted);
        transcript.push_local(local("not saved yet"));
        let mut saved = remote(Some("m-1"), "agent", "already saved");
        saved.client_message_id = persisted_id;
        let history = vec![remote(Some("m-0"), "customer", "help!"), saved];

        // when (操作):
        transcript.replace_history(history);

        // then (期待する結果):
        let texts: Vec<&str> = transcript.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["help!", "already saved", "not saved yet"]);
        assert_eq!(transcript.pending_count(), 1);
    }

    #[test]
    fn test_replace_history_matches_idless_records_by_content() {
        // テスト項目: client_message_id を持たない履歴レコードは本文一致で未確定エントリと対応付けられる
        // given (前提条件):
        let mut transcript = Transcript::new(session());
        transcript.push_local(local("hello"));
        let history = vec![remote(Some("m-1"), "agent", "hello")];

        // when (操作):
        transcript.replace_history(history);

        // then (期待する結果):
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.pending_count(), 0);
    }

    #[test]
    fn test_idless_echo_after_persist_confirmation_is_duplicate() {
        // テスト項目: REST 保存で確定した後に id のないエコーが届いても二重に表示されない
        // given (前提条件):
        let mut transcript = Transcript::new(session());
        let sent = local("hello");
        let client_id = sent.client_message_id.unwrap();
        transcript.push_local(sent);
        transcript.confirm_local(client_id, Some("42"));

        // when (操作):
        let result = transcript.apply_confirmed(remote(None, "agent", "hello"));

        // then (期待する結果):
        assert_eq!(result, Reconciliation::Duplicate(0));
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].id, MessageId::Server("42".to_string()));
    }

    #[test]
    fn test_echo_is_consumed_once() {
        // テスト項目: エコーで対応付け済みのエントリは、同じ本文の新しいメッセージを吸収しない
        // given (前提条件):
        let mut transcript = Transcript::new(session());
        let sent = local("ok");
        let client_id = sent.client_message_id.unwrap();
        transcript.push_local(sent);
        transcript.confirm_local(client_id, Some("1"));
        transcript.apply_confirmed(remote(None, "agent", "ok"));

        // when (操作):
        let result = transcript.apply_confirmed(remote(Some("2"), "agent", "ok"));

        // then (期待する結果):
        assert_eq!(result, Reconciliation::Appended(1));
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_same_text_under_another_server_id_is_appended() {
        // テスト項目: 確定済みの送信と同じ内容でも、別のサーバー id を持つメッセージは別物として追加される
        // given (前提条件):
        let mut transcript = Transcript::new(session());
        let sent = local("ok");
        let cid = sent.client_message_id.unwrap();
        transcript.push_local(sent);
        transcript.confirm_local(cid, Some("5"));

        // when (操作):
        let outcome = transcript.apply_confirmed(remote(Some("6"), "agent", "ok"));

        // then (期待する結果):
        assert_eq!(outcome, Reconciliation::Appended(1));
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_replace_history_keeps_pending_repeat_of_old_message() {
        // テスト項目: 既存の履歴と同じ本文の未保存メッセージは、再読み込みで消えない
        // given (前提条件):
        let mut transcript = Transcript::new(session());
        let history = vec![remote(Some("m-1"), "agent", "ok")];
        transcript.replace_history(history.clone());
        transcript.push_local(local("ok"));

        // when (操作):
        transcript.replace_history(history);

        // then (期待する結果):
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.pending_count(), 1);
        assert!(transcript.messages()[1].is_pending());
    }

    #[test]
    fn test_echo_after_reload_still_matches_persisted_send() {
        // テスト項目: 送信後に履歴を再読み込みしても、その後の id のないエコーは重複しない
        // given (前提条件):
        let mut transcript = Transcript::new(session());
        let sent = local("hello");
        let client_id = sent.client_message_id.unwrap();
        transcript.push_local(sent);
        transcript.confirm_local(client_id, Some("m-5"));
        transcript.replace_history(vec![remote(Some("m-5"), "agent", "hello")]);

        // when (操作):
        let result = transcript.apply_confirmed(remote(None, "agent", "hello"));

        // then (期待する結果):
        assert_eq!(result, Reconciliation::Duplicate(0));
        assert_eq!(transcript.len(), 1);
    }
}
