//! The agent orchestration loop with bounded memory.
//!
//! A query flows through one bounded loop:
//!
//! 1. **Append** the query to the conversation window (plus the running summary)
//! 2. **Complete** via the configured provider with the current tool list
//! 3. **Commit** the reply, record substantial turns, summarize when due
//! 4. **Dispatch** requested tools one at a time and append their results
//! 5. **Repeat** until the model stops calling tools or the ceiling is hit
//!
//! The window is trimmed by suffix retention; the persistent log and the
//! summary carry older context forward.

pub mod conversation;
pub mod loop_runner;
pub mod session;
pub mod summarizer;

#[cfg(test)]
mod test_helpers;

pub use conversation::{ConversationState, PersistentMemoryEntry, WindowSnapshot};
pub use loop_runner::{AgentLoop, QueryOutcome, StopReason, DEPTH_LIMIT_NOTICE};
pub use session::AgentSession;
pub use summarizer::{Summarizer, SUMMARY_INSTRUCTION};
