//! Conversation state: the bounded window, the persistent log, and the
//! running summary for one session.
//!
//! The window is what the model sees. It is trimmed by pure suffix
//! retention, so after [`ConversationState::enforce_window_bound`] it always
//! equals the last `window_size` appended messages. The persistent log is
//! append-only and only feeds the summarizer.

use chrono::{DateTime, Utc};
use memloop_core::message::{ContentBlock, Message, Role, SessionId};
use serde::{Deserialize, Serialize};

/// Prefix of the system message that carries the running summary.
pub const SUMMARY_PREFIX: &str = "Context summary: ";

const TRUNCATION_NOTE: &str = "[Earlier conversation was truncated.]";

/// One substantial turn, as recorded for later summarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentMemoryEntry {
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

/// A saved copy of the window, used to roll back a failed query.
#[derive(Debug, Clone)]
pub struct WindowSnapshot(Vec<Message>);

#[derive(Debug)]
pub struct ConversationState {
    id: SessionId,
    system_prompt: String,
    window: Vec<Message>,
    window_size: usize,
    persistent: Vec<PersistentMemoryEntry>,
    summary: String,
}

impl ConversationState {
    /// Start a conversation whose window opens with the system prompt.
    ///
    /// `window_size` is clamped to at least 1.
    pub fn new(system_prompt: impl Into<String>, window_size: usize) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            id: SessionId::new(),
            window: vec![Message::system(system_prompt.clone())],
            system_prompt,
            window_size: window_size.max(1),
            persistent: Vec::new(),
            summary: String::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn window(&self) -> &[Message] {
        &self.window
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn persistent_memory(&self) -> &[PersistentMemoryEntry] {
        &self.persistent
    }

    /// The running summary; empty until the first successful summarization.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub(crate) fn set_summary(&mut self, summary: String) {
        self.summary = summary;
    }

    /// Append a user query.
    ///
    /// When a summary exists, any earlier summary message is removed and a
    /// fresh one is placed right after the first window element.
    pub fn append_user(&mut self, query: impl Into<String>) {
        self.window.push(Message::user(query));

        if !self.summary.is_empty() {
            self.window.retain(|m| !is_summary_message(m));
            let at = self.window.len().min(1);
            let summary = self.summary_message();
            self.window.insert(at, summary);
        }
    }

    /// Commit one completion exactly as returned, even when empty.
    pub fn append_assistant(&mut self, blocks: Vec<ContentBlock>) {
        self.window.push(Message::assistant(blocks));
    }

    /// Commit one batch of tool results as a single user message.
    pub fn append_tool_results(&mut self, results: Vec<ContentBlock>) {
        self.window.push(Message::tool_results(results));
    }

    /// Record the turn in the persistent log when it produced more than one
    /// text chunk. Returns whether an entry was added.
    pub fn record_if_substantial(&mut self, text_chunks: &[String]) -> bool {
        if text_chunks.len() <= 1 {
            return false;
        }
        self.persistent.push(PersistentMemoryEntry {
            timestamp: Utc::now(),
            content: text_chunks.join("\n"),
        });
        true
    }

    /// Keep only the most recent `window_size` messages.
    pub fn enforce_window_bound(&mut self) {
        if self.window.len() > self.window_size {
            let excess = self.window.len() - self.window_size;
            self.window.drain(..excess);
        }
    }

    /// The message list to send for the next completion.
    ///
    /// The system prompt and, once one exists, the running summary always
    /// head the list, even after truncation dropped them from the window.
    /// Other system messages are kept. Non-system messages are sent starting
    /// at the first plain user query, so a tool result whose call was trimmed
    /// away never reaches the model. When the window holds no plain query the
    /// view starts at the first assistant message behind a truncation note.
    pub fn request_messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.window.len() + 3);
        out.push(Message::system(self.system_prompt.clone()));
        if !self.summary.is_empty() {
            out.push(self.summary_message());
        }

        let start = self
            .window
            .iter()
            .position(|m| m.role == Role::User && !m.has_tool_results());
        let (start, note) = match start {
            Some(i) => (i, false),
            None => match self.window.iter().position(|m| m.role == Role::Assistant) {
                Some(i) => (i, true),
                None => (self.window.len(), true),
            },
        };

        let mut noted = false;
        for (i, message) in self.window.iter().enumerate() {
            if message.role == Role::System {
                if !is_prompt_message(message, &self.system_prompt) && !is_summary_message(message) {
                    out.push(message.clone());
                }
                continue;
            }
            if i < start {
                continue;
            }
            if note && !noted {
                out.push(Message::user(TRUNCATION_NOTE));
                noted = true;
            }
            out.push(message.clone());
        }
        if note && !noted {
            out.push(Message::user(TRUNCATION_NOTE));
        }
        out
    }

    fn summary_message(&self) -> Message {
        Message::system(format!("{SUMMARY_PREFIX}{}", self.summary))
    }

    pub fn snapshot_window(&self) -> WindowSnapshot {
        WindowSnapshot(self.window.clone())
    }

    /// Put the window back as it was. The persistent log and summary are kept.
    pub fn restore_window(&mut self, snapshot: WindowSnapshot) {
        self.window = snapshot.0;
    }
}

fn is_summary_message(message: &Message) -> bool {
    message.role == Role::System
        && message
            .content
            .first()
            .and_then(ContentBlock::as_text)
            .is_some_and(|t| t.starts_with(SUMMARY_PREFIX))
}

fn is_prompt_message(message: &Message, prompt: &str) -> bool {
    message.role == Role::System && message.text() == prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunks(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn starts_with_system_prompt() {
        let state = ConversationState::new("be helpful", 20);
        assert_eq!(state.window().len(), 1);
        assert_eq!(state.window()[0], Message::system("be helpful"));
        assert!(state.summary().is_empty());
    }

    #[test]
    fn summary_inserted_after_first_element_and_replaced() {
        let mut state = ConversationState::new("sys", 20);
        state.set_summary("first".into());
        state.append_user("q1");
        assert_eq!(state.window()[1], Message::system("Context summary: first"));

        state.set_summary("second".into());
        state.append_user("q2");
        let summaries: Vec<_> = state
            .window()
            .iter()
            .filter(|m| is_summary_message(m))
            .collect();
        assert_eq!(summaries.len(), 1);
        assert_eq!(state.window()[1], Message::system("Context summary: second"));
        assert_eq!(state.window().last().unwrap(), &Message::user("q2"));
    }

    #[test]
    fn no_summary_message_without_summary() {
        let mut state = ConversationState::new("sys", 20);
        state.append_user("hi");
        assert_eq!(state.window().len(), 2);
        assert!(!state.window().iter().any(is_summary_message));
    }

    #[test]
    fn substantial_means_more_than_one_chunk() {
        let mut state = ConversationState::new("sys", 20);
        assert!(!state.record_if_substantial(&[]));
        assert!(!state.record_if_substantial(&chunks(&["only"])));
        assert!(state.record_if_substantial(&chunks(&["a", "b"])));
        assert_eq!(state.persistent_memory().len(), 1);
        assert_eq!(state.persistent_memory()[0].content, "a\nb");
    }

    #[test]
    fn window_keeps_last_messages_in_order() {
        let mut state = ConversationState::new("sys", 3);
        let mut appended = vec![Message::system("sys")];
        for i in 0..7 {
            state.append_user(format!("q{i}"));
            appended.push(Message::user(format!("q{i}")));
            state.enforce_window_bound();
            assert!(state.window().len() <= 3);
            let tail = &appended[appended.len().saturating_sub(3)..];
            assert_eq!(state.window(), tail);
        }
    }

    #[test]
    fn empty_assistant_message_is_committed() {
        let mut state = ConversationState::new("sys", 20);
        state.append_user("q");
        state.append_assistant(vec![]);
        assert_eq!(state.window().last().unwrap(), &Message::assistant(vec![]));
    }

    #[test]
    fn request_view_skips_orphaned_results() {
        let mut state = ConversationState::new("sys", 4);
        state.append_user("list files");
        state.append_assistant(vec![ContentBlock::tool_use("t1", "list_directory", json!({}))]);
        state.append_tool_results(vec![ContentBlock::tool_result("t1", json!("a\nb"), false)]);
        state.append_assistant(vec![ContentBlock::text("two files")]);
        state.append_user("thanks");
        state.enforce_window_bound();

        // window: [asst(tool_use), results, asst(text), user("thanks")]
        assert_eq!(state.window().len(), 4);
        let view = state.request_messages();
        assert_eq!(view[0], Message::system("sys"));
        assert_eq!(view[1], Message::user("thanks"));
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn request_view_without_plain_query_adds_note() {
        let mut state = ConversationState::new("sys", 3);
        state.append_user("go");
        state.append_assistant(vec![ContentBlock::tool_use("t1", "a", json!({}))]);
        state.append_tool_results(vec![ContentBlock::tool_result("t1", json!("x"), false)]);
        state.append_assistant(vec![ContentBlock::tool_use("t2", "b", json!({}))]);
        state.append_tool_results(vec![ContentBlock::tool_result("t2", json!("y"), false)]);
        state.enforce_window_bound();

        // window: [results(t1), asst(t2), results(t2)]
        let view = state.request_messages();
        assert_eq!(view[0], Message::system("sys"));
        assert_eq!(view[1], Message::user(TRUNCATION_NOTE));
        assert_eq!(view[2].tool_use_ids().collect::<Vec<_>>(), vec!["t2"]);
        assert_eq!(view[3].tool_result_ids().collect::<Vec<_>>(), vec!["t2"]);
        assert_eq!(view.len(), 4);
    }

    #[test]
    fn request_view_is_window_when_intact() {
        let mut state = ConversationState::new("sys", 20);
        state.append_user("q");
        state.append_assistant(vec![ContentBlock::text("a")]);
        assert_eq!(state.request_messages(), state.window().to_vec());
    }

    #[test]
    fn request_view_keeps_summary_after_truncation() {
        let mut state = ConversationState::new("sys", 3);
        state.set_summary("S".into());
        state.append_user("q");
        state.enforce_window_bound();
        state.append_assistant(vec![ContentBlock::tool_use("t1", "a", json!({}))]);
        state.enforce_window_bound();
        state.append_tool_results(vec![ContentBlock::tool_result("t1", json!("x"), false)]);
        state.enforce_window_bound();

        // window: [user("q"), asst(t1), results(t1)]
        assert!(!state.window().iter().any(is_summary_message));
        let view = state.request_messages();
        assert_eq!(view[0], Message::system("sys"));
        assert_eq!(view[1], Message::system("Context summary: S"));
        assert_eq!(view[2], Message::user("q"));
        assert_eq!(view.len(), 5);
    }

    #[test]
    fn request_view_uses_current_summary_once() {
        let mut state = ConversationState::new("sys", 20);
        state.set_summary("old".into());
        state.append_user("q");
        state.set_summary("new".into());

        let view = state.request_messages();
        let summaries: Vec<_> = view.iter().filter(|m| is_summary_message(m)).collect();
        assert_eq!(summaries, vec![&Message::system("Context summary: new")]);
        assert_eq!(view[1], Message::system("Context summary: new"));
    }

    #[test]
    fn snapshot_restores_window_only() {
        let mut state = ConversationState::new("sys", 20);
        state.append_user("q1");
        let snap = state.snapshot_window();
        state.append_user("q2");
        state.record_if_substantial(&chunks(&["x", "y"]));
        state.restore_window(snap);
        assert_eq!(state.window().len(), 2);
        assert_eq!(state.persistent_memory().len(), 1);
    }
}
