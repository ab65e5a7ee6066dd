//! End-to-end tests: a scripted model driving the real built-in tools
//! through a configured session.

use async_trait::async_trait;
use memloop_agent::{AgentSession, StopReason, DEPTH_LIMIT_NOTICE};
use memloop_config::AppConfig;
use memloop_core::error::ProviderError;
use memloop_core::message::ContentBlock;
use memloop_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use memloop_core::DomainEvent;
use serde_json::json;
use std::sync::{Arc, Mutex};

struct ScriptedModel {
    replies: Mutex<Vec<Vec<ContentBlock>>>,
    seen: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Vec<ContentBlock>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.seen.lock().unwrap().push(request);
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(ProviderError::Network("script exhausted".into()));
        }
        Ok(ProviderResponse {
            content: replies.remove(0),
            usage: Some(Usage {
                input_tokens: 20,
                output_tokens: 10,
            }),
            model: "scripted-model".into(),
        })
    }
}

fn config_rooted_at(root: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.tools.allowed_roots = vec![root.canonicalize().unwrap().to_string_lossy().into_owned()];
    config
}

#[tokio::test]
async fn create_then_read_file_through_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    let path_str = path.to_string_lossy().into_owned();

    let model = ScriptedModel::new(vec![
        vec![ContentBlock::tool_use(
            "c1",
            "create_file",
            json!({"filepath": path_str, "content": "remember the milk"}),
        )],
        vec![ContentBlock::tool_use("r1", "read_file", json!({"filepath": path_str}))],
        vec![ContentBlock::text("The note says: remember the milk")],
    ]);

    let mut session = AgentSession::with_provider(&config_rooted_at(dir.path()), model.clone()).unwrap();
    let outcome = session.ask("write a note and read it back").await.unwrap();

    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.stop, StopReason::Completed);
    assert!(outcome.answer.ends_with("The note says: remember the milk"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "remember the milk");

    // the read result reached the model on the third request
    let third = &model.requests()[2];
    let last = third.messages.last().unwrap();
    assert_eq!(
        last.content[0],
        ContentBlock::tool_result("r1", json!("remember the milk"), false)
    );

    session.close().await;
}

#[tokio::test]
async fn path_outside_root_is_reported_not_fatal() {
    let root = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        vec![ContentBlock::tool_use("r1", "read_file", json!({"filepath": "/etc/passwd"}))],
        vec![ContentBlock::text("I am not allowed to read that.")],
    ]);

    let mut session = AgentSession::with_provider(&config_rooted_at(root.path()), model.clone()).unwrap();
    let outcome = session.ask("show /etc/passwd").await.unwrap();
    assert_eq!(outcome.iterations, 2);

    let second = &model.requests()[1];
    match &second.messages.last().unwrap().content[0] {
        ContentBlock::ToolResult { is_error, content, .. } => {
            assert!(*is_error);
            assert!(content.as_str().unwrap().contains("Permission denied"));
        }
        other => panic!("expected a tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn depth_limit_with_real_tools() {
    let mut config = AppConfig::default();
    config.agent.max_total_loops = 3;
    let replies = (0..3)
        .map(|i| {
            vec![ContentBlock::tool_use(
                format!("l{i}"),
                "list_allowed_commands",
                json!({}),
            )]
        })
        .collect();
    let model = ScriptedModel::new(replies);

    let mut session = AgentSession::with_provider(&config, model.clone()).unwrap();
    let outcome = session.ask("keep going").await.unwrap();

    assert_eq!(outcome.stop, StopReason::DepthLimitReached);
    assert_eq!(outcome.iterations, 3);
    assert!(outcome.answer.ends_with(DEPTH_LIMIT_NOTICE));
    assert_eq!(model.requests().len(), 3);
    assert_eq!(session.tool_metrics()["list_allowed_commands"].calls, 3);
}

#[tokio::test]
async fn summary_carried_into_next_query() {
    let mut config = AppConfig::default();
    config.agent.window_size = 200;

    let mut replies = Vec::new();
    for i in 0..6 {
        replies.push(vec![
            ContentBlock::text(format!("checking {i}")),
            ContentBlock::tool_use(format!("t{i}"), "list_allowed_commands", json!({})),
        ]);
    }
    replies.push(vec![ContentBlock::text("user is exploring the allowlist")]);
    replies.push(vec![ContentBlock::text("done")]);
    replies.push(vec![ContentBlock::text("second answer")]);
    let model = ScriptedModel::new(replies);

    let mut session = AgentSession::with_provider(&config, model.clone()).unwrap();
    let mut events = session.event_bus().subscribe();

    session.ask("explore").await.unwrap();
    assert_eq!(session.state().summary(), "user is exploring the allowlist");
    assert_eq!(session.state().persistent_memory().len(), 6);

    session.ask("what next?").await.unwrap();
    let last_request = model.requests().pop().unwrap();
    assert!(last_request
        .messages
        .iter()
        .any(|m| m.text() == "Context summary: user is exploring the allowlist"));

    let mut saw_summary_event = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event.as_ref(), DomainEvent::SummaryUpdated { .. }) {
            saw_summary_event = true;
        }
    }
    assert!(saw_summary_event);
}

#[tokio::test]
async fn failed_query_leaves_session_usable() {
    let model = ScriptedModel::new(vec![vec![ContentBlock::text("first")]]);
    let mut session = AgentSession::with_provider(&AppConfig::default(), model).unwrap();

    session.ask("one").await.unwrap();
    let window_before = session.state().window().to_vec();

    assert!(session.ask("two").await.is_err());
    assert_eq!(session.state().window(), window_before.as_slice());
}
