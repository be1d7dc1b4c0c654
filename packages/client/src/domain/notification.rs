//! Notification feed model.
//!
//! Inbound payloads are normalized into [`NotificationEvent`]s (local id,
//! creation time and display title are always present) and kept in a
//! [`NotificationFeed`], newest first, together with an unread counter.

use super::value_object::Timestamp;

/// Title used for every notification type without a dedicated template
pub const DEFAULT_TITLE: &str = "New Notification";

/// Server-side notification type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    TerritoryAssignment,
    LeadAssignment,
    LeadUpdate,
    TaskAssignment,
    Other(String),
}

impl NotificationKind {
    /// Map the wire `type` string. Unknown values are kept verbatim.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "territory_assignment" => Self::TerritoryAssignment,
            "lead_assignment" | "lead_assigned" => Self::LeadAssignment,
            "lead_update" => Self::LeadUpdate,
            "task_assignment" => Self::TaskAssignment,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::TerritoryAssignment => "territory_assignment",
            Self::LeadAssignment => "lead_assignment",
            Self::LeadUpdate => "lead_update",
            Self::TaskAssignment => "task_assignment",
            Self::Other(other) => other,
        }
    }
}

/// Decoded but not yet normalized notification payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    pub local_id: Option<String>,
    pub created_at: Option<Timestamp>,
    pub territory_name: Option<String>,
    pub lead_name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub task_id: Option<String>,
}

impl NotificationPayload {
    pub fn new(kind: NotificationKind) -> Self {
        Self {
            kind,
            local_id: None,
            created_at: None,
            territory_name: None,
            lead_name: None,
            company: None,
            title: None,
            task_id: None,
        }
    }
}

/// A normalized entry of the notification feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub local_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub created_at: Timestamp,
    pub read: bool,
    pub task_id: Option<String>,
}

impl NotificationEvent {
    /// Normalize a payload, filling the local id and creation time when absent.
    ///
    /// `generate_id` is only called when the payload carries no id.
    pub fn normalize(
        payload: NotificationPayload,
        arrived_at: Timestamp,
        generate_id: impl FnOnce() -> String,
    ) -> Self {
        let title = derive_title(&payload);
        Self {
            local_id: payload
                .local_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(generate_id),
            kind: payload.kind,
            title,
            created_at: payload.created_at.unwrap_or(arrived_at),
            read: false,
            task_id: payload.task_id,
        }
    }
}

/// Derive the human-readable title. Never returns an empty string.
pub fn derive_title(payload: &NotificationPayload) -> String {
    match payload.kind {
        NotificationKind::TerritoryAssignment => format!(
            "assigned to {}",
            present(&payload.territory_name).unwrap_or("a new territory")
        ),
        NotificationKind::LeadAssignment => format!(
            "new lead assigned: {}",
            present(&payload.lead_name)
                .or_else(|| present(&payload.company))
                .unwrap_or("unnamed lead")
        ),
        NotificationKind::TaskAssignment => format!(
            "New Task Assigned: {}",
            present(&payload.title).unwrap_or("Untitled task")
        ),
        NotificationKind::LeadUpdate | NotificationKind::Other(_) => DEFAULT_TITLE.to_string(),
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Newest-first notification list with an unread counter.
///
/// Identity is the `local_id`: two events with identical content but
/// different ids are both kept.
#[derive(Debug, Default)]
pub struct NotificationFeed {
    events: Vec<NotificationEvent>,
    unread: usize,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend an event. Returns `false` if its `local_id` is already present.
    pub fn push(&mut self, event: NotificationEvent) -> bool {
        if self.events.iter().any(|e| e.local_id == event.local_id) {
            return false;
        }
        if !event.read {
            self.unread += 1;
        }
        self.events.insert(0, event);
        true
    }

    /// Mark one event read. Returns `true` if it was unread.
    pub fn mark_read(&mut self, local_id: &str) -> bool {
        match self
            .events
            .iter_mut()
            .find(|e| e.local_id == local_id && !e.read)
        {
            Some(event) => {
                event.read = true;
                self.unread = self.unread.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for event in &mut self.events {
            event.read = true;
        }
        self.unread = 0;
    }

    pub fn clear_all(&mut self) {
        self.events.clear();
        self.unread = 0;
    }

    pub fn events(&self) -> &[NotificationEvent] {
        &self.events
    }

    pub fn get(&self, local_id: &str) -> Option<&NotificationEvent> {
        self.events.iter().find(|e| e.local_id == local_id)
    }

    pub fn unread_count(&self) -> usize {
        self.unread
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(kind: &str) -> NotificationPayload {
        NotificationPayload::new(NotificationKind::from_wire(kind))
    }

    fn event(local_id: &str) -> NotificationEvent {
        NotificationEvent::normalize(payload("other"), Timestamp::new(1000), || {
            local_id.to_string()
        })
    }

    fn unread_by_scan(feed: &NotificationFeed) -> usize {
        feed.events().iter().filter(|e| !e.read).count()
    }

    #[test]
    fn test_task_assignment_title() {
        // テスト項目: task_assignment はタスク名付きのタイトルになる
        // given (前提条件):
        let mut p = payload("task_assignment");
        p.title = Some("Fix invoice".to_string());

        // when (操作):
        let title = derive_title(&p);

        // then (期待する結果):
        assert_eq!(title, "New Task Assigned: Fix invoice");
    }

    #[test]
    fn test_territory_assignment_title() {
        // テスト項目: territory_assignment はテリトリー名付きのタイトルになる
        // given (前提条件):
        let mut p = payload("territory_assignment");
        p.territory_name = Some("EMEA North".to_string());

        // when (操作):
        let title = derive_title(&p);

        // then (期待する結果):
        assert_eq!(title, "assigned to EMEA North");
    }

    #[test]
    fn test_lead_assignment_aliases_and_company_fallback() {
        // テスト項目: lead_assigned も lead_assignment と同じ扱いで、リード名がなければ会社名を使う
        // given (前提条件):
        let mut named = payload("lead_assignment");
        named.lead_name = Some("Ada Lovelace".to_string());
        let mut company_only = payload("lead_assigned");
        company_only.company = Some("Analytical Engines Ltd".to_string());

        // when (操作):
        let named_title = derive_title(&named);
        let company_title = derive_title(&company_only);

        // then (期待する結果):
        assert_eq!(named_title, "new lead assigned: Ada Lovelace");
        assert_eq!(company_title, "new lead assigned: Analytical Engines Ltd");
    }

    #[test]
    fn test_title_is_never_empty() {
        // テスト項目: どの種別でもフィールド欠落時にタイトルが空にならない
        // given (前提条件):
        let kinds = [
            "territory_assignment",
            "lead_assignment",
            "lead_assigned",
            "lead_update",
            "task_assignment",
            "",
            "something_new",
        ];

        // when (操作):
        let titles: Vec<String> = kinds.iter().map(|k| derive_title(&payload(k))).collect();

        // then (期待する結果):
        assert!(titles.iter().all(|t| !t.trim().is_empty()));
        assert_eq!(titles[3], DEFAULT_TITLE);
        assert_eq!(titles[6], DEFAULT_TITLE);
    }

    #[test]
    fn test_blank_fields_count_as_missing() {
        // テスト項目: 空白だけのフィールドは欠落として扱われる
        // given (前提条件):
        let mut p = payload("task_assignment");
        p.title = Some("   ".to_string());

        // when (操作):
        let title = derive_title(&p);

        // then (期待する結果):
        assert_eq!(title, "New Task Assigned: Untitled task");
    }

    #[test]
    fn test_normalize_fills_missing_id_and_time() {
        // テスト項目: id と作成時刻がない場合は生成値と到着時刻で補完される
        // given (前提条件):
        let p = payload("task_assignment");

        // when (操作):
        let event = NotificationEvent::normalize(p, Timestamp::new(42), || "gen-1".to_string());

        // then (期待する結果):
        assert_eq!(event.local_id, "gen-1");
        assert_eq!(event.created_at, Timestamp::new(42));
        assert!(!event.read);
    }

    #[test]
    fn test_normalize_keeps_server_values() {
        // テスト項目: ペイロードに id と作成時刻があればそれを使う
        // given (前提条件):
        let mut p = payload("lead_update");
        p.local_id = Some("n-9".to_string());
        p.created_at = Some(Timestamp::new(7));

        // when (操作):
        let event = NotificationEvent::normalize(p, Timestamp::new(42), || {
            panic!("id generator must not be called")
        });

        // then (期待する結果):
        assert_eq!(event.local_id, "n-9");
        assert_eq!(event.created_at, Timestamp::new(7));
    }

    #[test]
    fn test_push_prepends_and_counts_unread() {
        // テスト項目: 新しい通知は先頭に追加され未読数が増える
        // given (前提条件):
        let mut feed = NotificationFeed::new();

        // when (操作):
        feed.push(event("a"));
        feed.push(event("b"));

        // then (期待する結果):
        assert_eq!(feed.events()[0].local_id, "b");
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn test_same_content_different_ids_are_both_kept() {
        // テスト項目: 内容が同じでも local_id が異なれば両方保持される
        // given (前提条件):
        let mut feed = NotificationFeed::new();
        let first = event("a");
        let mut second = first.clone();
        second.local_id = "b".to_string();

        // when (操作):
        let pushed_first = feed.push(first);
        let pushed_second = feed.push(second);

        // then (期待する結果):
        assert!(pushed_first && pushed_second);
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn test_duplicate_local_id_is_dropped() {
        // テスト項目: 同じ local_id の通知は重複として破棄される
        // given (前提条件):
        let mut feed = NotificationFeed::new();
        feed.push(event("a"));

        // when (操作):
        let pushed = feed.push(event("a"));

        // then (期待する結果):
        assert!(!pushed);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.unread_count(), 1);
    }

    #[test]
    fn test_mark_read_decrements_once() {
        // テスト項目: 既読化は一度だけ未読数を減らし、負にならない
        // given (前提条件):
        let mut feed = NotificationFeed::new();
        feed.push(event("a"));

        // when (操作):
        let first = feed.mark_read("a");
        let second = feed.mark_read("a");
        let unknown = feed.mark_read("zzz");

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        assert!(!unknown);
        assert_eq!(feed.unread_count(), 0);
        assert_eq!(feed.unread_count(), unread_by_scan(&feed));
    }

    #[test]
    fn test_unread_counter_matches_scan_after_each_operation() {
        // テスト項目: 各操作後に未読数が未読イベント数と一致する
        // given (前提条件):
        let mut feed = NotificationFeed::new();
        for id in ["a", "b", "c", "d"] {
            feed.push(event(id));
        }

        // when (操作) / then (期待する結果):
        feed.mark_read("b");
        assert_eq!(feed.unread_count(), unread_by_scan(&feed));
        feed.mark_read("d");
        assert_eq!(feed.unread_count(), unread_by_scan(&feed));
        feed.push(event("e"));
        assert_eq!(feed.unread_count(), unread_by_scan(&feed));
        feed.mark_all_read();
        assert_eq!(feed.unread_count(), unread_by_scan(&feed));
        feed.push(event("f"));
        feed.clear_all();
        assert_eq!(feed.unread_count(), 0);
        assert!(feed.is_empty());
    }
}
