//! One chat request: moderation, then orchestration, always ending the
//! stream with exactly one terminal event.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::conversation::types::Message;
use crate::moderation::ModerationGate;
use crate::orchestrator::{Orchestrator, RunOutcome};
use crate::streaming::{channel, EventSink, FinishReason, StreamEvent};

pub const TIMEOUT_TEXT: &str = "request timed out";
const CANCELLED_TEXT: &str = "request cancelled";

pub struct ChatPipeline {
    gate: ModerationGate,
    orchestrator: Orchestrator,
    request_timeout: Duration,
    event_buffer: usize,
}

impl ChatPipeline {
    pub fn new(
        gate: ModerationGate,
        orchestrator: Orchestrator,
        request_timeout: Duration,
        event_buffer: usize,
    ) -> Self {
        Self {
            gate,
            orchestrator,
            request_timeout,
            event_buffer,
        }
    }

    /// Start handling `messages` on a new task.
    ///
    /// Returns the event receiver and the token that cancels the task.
    pub fn spawn(
        self: &Arc<Self>,
        messages: Vec<Message>,
    ) -> (mpsc::Receiver<StreamEvent>, CancellationToken) {
        let cancel = CancellationToken::new();
        let (sink, rx) = channel(self.event_buffer, cancel.clone());
        let pipeline = Arc::clone(self);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            pipeline.handle(messages, sink, task_cancel).await;
        });
        (rx, cancel)
    }

    pub async fn handle(&self, messages: Vec<Message>, mut sink: EventSink, cancel: CancellationToken) {
        let span = tracing::info_span!(
            "chat_request",
            message_id = %sink.message_id(),
            message_count = messages.len()
        );

        async {
            let work = self.process(&messages, &mut sink, &cancel);
            if tokio::time::timeout(self.request_timeout, work).await.is_err() {
                tracing::warn!(
                    timeout_secs = self.request_timeout.as_secs_f32(),
                    "chat request timed out"
                );
                cancel.cancel();
                sink.error(TIMEOUT_TEXT).await;
            }
            tracing::info!(
                terminated = sink.is_terminated(),
                closed = sink.is_closed(),
                answer_len = sink.answer_text().len(),
                "chat request finished"
            );
        }
        .instrument(span)
        .await
    }

    async fn process(&self, messages: &[Message], sink: &mut EventSink, cancel: &CancellationToken) {
        if messages.is_empty() {
            sink.start().await;
            sink.finish(FinishReason::Empty).await;
            return;
        }

        let verdict = self.gate.check_conversation(messages).await;
        if verdict.flagged {
            sink.emit_denial(verdict.denial_text()).await;
            return;
        }

        match self.orchestrator.run(messages, sink, cancel).await {
            Ok(summary) => {
                tracing::info!(
                    outcome = ?summary.outcome,
                    rounds = summary.rounds,
                    tool_calls = ?summary.tool_calls,
                    "orchestration complete"
                );
                match summary.outcome {
                    RunOutcome::Answered => sink.finish(FinishReason::Stop).await,
                    RunOutcome::BudgetExhausted => sink.finish(FinishReason::BudgetExhausted).await,
                    RunOutcome::Empty => sink.finish(FinishReason::Empty).await,
                    RunOutcome::Cancelled => sink.error(CANCELLED_TEXT).await,
                };
            }
            Err(e) => {
                tracing::error!(error = %e, transient = e.is_transient(), "orchestration failed");
                sink.error(e.user_message()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestrationConfig;
    use crate::moderation::types::DENIAL_VIOLENCE;
    use crate::test_support::{
        text_round, tool_round, FakeClassifier, FakeIndex, FakeSearch, ScriptedModel,
    };
    use crate::tools::{ReviewSearchTool, Toolbox, WebSearchTool};
    use serde_json::json;

    struct Fixture {
        pipeline: Arc<ChatPipeline>,
        model: Arc<ScriptedModel>,
        index: Arc<FakeIndex>,
        search: Arc<FakeSearch>,
        classifier: Arc<FakeClassifier>,
    }

    struct Setup {
        model: ScriptedModel,
        index: FakeIndex,
        search: FakeSearch,
        classifier: FakeClassifier,
        step_budget: u32,
        timeout: Duration,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                model: ScriptedModel::new(vec![]),
                index: FakeIndex::empty(),
                search: FakeSearch::with_results(vec![]),
                classifier: FakeClassifier::allowing(),
                step_budget: 20,
                timeout: Duration::from_secs(5),
            }
        }
    }

    fn fixture(setup: Setup) -> Fixture {
        let model = Arc::new(setup.model);
        let index = Arc::new(setup.index);
        let search = Arc::new(setup.search);
        let classifier = Arc::new(setup.classifier);
        let tools = Arc::new(Toolbox::new(
            ReviewSearchTool::new(index.clone(), 8, 0.3),
            WebSearchTool::new(search.clone(), 5),
        ));
        let config = OrchestrationConfig {
            step_budget: setup.step_budget,
            ..OrchestrationConfig::default()
        };
        let pipeline = ChatPipeline::new(
            ModerationGate::new(classifier.clone(), false),
            Orchestrator::new(model.clone(), tools, &config),
            setup.timeout,
            64,
        );
        Fixture {
            pipeline: Arc::new(pipeline),
            model,
            index,
            search,
            classifier,
        }
    }

    async fn events_for(f: &Fixture, messages: Vec<Message>) -> Vec<StreamEvent> {
        let (mut rx, _cancel) = f.pipeline.spawn(messages);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn assert_well_formed(events: &[StreamEvent]) {
        assert!(matches!(events.first(), Some(StreamEvent::Start { .. })));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(events.last().is_some_and(StreamEvent::is_terminal));
    }

    fn finish_reason(events: &[StreamEvent]) -> Option<FinishReason> {
        events.iter().find_map(|e| match e {
            StreamEvent::Finish { finish_reason } => Some(*finish_reason),
            _ => None,
        })
    }

    fn tool_calls(events: &[StreamEvent]) -> Vec<(String, serde_json::Value)> {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolCall {
                    tool_name, args, ..
                } => Some((tool_name.clone(), args.clone())),
                _ => None,
            })
            .collect()
    }

    fn answer(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::TextDelta { delta, .. } => Some(delta.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_flagged_message_never_reaches_engine() {
        let f = fixture(Setup {
            classifier: FakeClassifier::flagging(&["violence"]),
            model: ScriptedModel::new(vec![text_round(&["should not run"])]),
            ..Setup::default()
        });
        let events = events_for(&f, vec![Message::user("how do I hurt my competitor")]).await;

        assert_well_formed(&events);
        assert_eq!(events.len(), 5);
        assert_eq!(answer(&events), DENIAL_VIOLENCE);
        assert_eq!(finish_reason(&events), Some(FinishReason::Moderated));
        assert!(f.model.requests().is_empty());
        assert!(f.index.queries().is_empty());
        assert!(f.search.calls().is_empty());
    }

    #[tokio::test]
    async fn test_answer_is_framed_as_one_text_segment() {
        let f = fixture(Setup {
            model: ScriptedModel::new(vec![text_round(&["Hi"])]),
            ..Setup::default()
        });
        let events = events_for(&f, vec![Message::user("hello")]).await;

        let types: Vec<String> = events
            .iter()
            .map(|e| serde_json::to_value(e).unwrap()["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(types, ["start", "text-start", "text-delta", "text-end", "finish"]);
    }

    #[tokio::test]
    async fn test_empty_messages_finish_immediately() {
        let f = fixture(Setup::default());
        let events = events_for(&f, vec![]).await;
        assert_eq!(events.len(), 2);
        assert_eq!(finish_reason(&events), Some(FinishReason::Empty));
        assert_eq!(f.classifier.call_count(), 0);
        assert!(f.model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_literal_asin_scenario() {
        let messages: Vec<Message> = serde_json::from_value(json!([
            {"role": "user", "parts": [{"type": "text", "text": "Summarize complaints for B09XYZ1234"}]}
        ]))
        .unwrap();
        let f = fixture(Setup {
            model: ScriptedModel::new(vec![
                tool_round("call_1", "vectorDatabaseSearch", json!({"asin": "B09XYZ1234", "query": "complaints"})),
                text_round(&["Across many 1-2 star reviews, ", "battery life is the top complaint."]),
            ]),
            index: FakeIndex::with_passages(vec![
                FakeIndex::passage("Battery only lasts half a day", 0.88),
                FakeIndex::passage("Strap broke after two weeks", 0.71),
            ]),
            ..Setup::default()
        });
        let events = events_for(&f, messages).await;

        assert_well_formed(&events);
        let calls = tool_calls(&events);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "vectorDatabaseSearch");
        assert!(calls[0].1.to_string().contains("B09XYZ1234"));
        assert!(f.search.calls().is_empty());
        assert_eq!(f.index.queries()[0].asin.as_deref(), Some("B09XYZ1234"));
        assert_eq!(finish_reason(&events), Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_web_search_502_still_completes() {
        let f = fixture(Setup {
            model: ScriptedModel::new(vec![
                tool_round("call_1", "webSearch", json!({"query": "air fryer market trends 2026"})),
                text_round(&["I couldn't retrieve external data right now."]),
            ]),
            search: FakeSearch::failing(502),
            ..Setup::default()
        });
        let events = events_for(
            &f,
            vec![Message::user("What are the market trends for air fryers?")],
        )
        .await;

        assert_well_formed(&events);
        assert_eq!(f.search.calls().len(), 1);
        let failed = events.iter().any(|e| {
            matches!(e, StreamEvent::ToolResult { is_error: true, result, .. }
                if result["error"].as_str().is_some_and(|s| s.contains("could not be retrieved")))
        });
        assert!(failed);
        assert_eq!(finish_reason(&events), Some(FinishReason::Stop));
        // The failure was fed back to the model.
        let second = &f.model.requests()[1];
        assert!(second
            .messages
            .last()
            .and_then(|m| m.content.as_deref())
            .is_some_and(|c| c.contains("\"status\":\"error\"")));
    }

    #[tokio::test]
    async fn test_review_before_web_ordering() {
        let f = fixture(Setup {
            model: ScriptedModel::new(vec![
                tool_round("call_1", "webSearch", json!({"query": "B0C1234567 reviews"})),
                tool_round("call_2", "vectorDatabaseSearch", json!({"asin": "B0C1234567"})),
                tool_round("call_3", "webSearch", json!({"query": "kettle expectations"})),
                text_round(&["No indexed reviews; web context suggests..."]),
            ]),
            search: FakeSearch::with_results(vec![FakeSearch::result("Kettle buying guide")]),
            ..Setup::default()
        });
        let events = events_for(&f, vec![Message::user("Reviews for B0C1234567?")]).await;

        assert_well_formed(&events);
        // The premature web call was rejected; the post-miss one ran.
        assert_eq!(f.index.queries().len(), 1);
        assert_eq!(f.search.calls(), vec![("kettle expectations".to_string(), 5)]);
    }

    #[tokio::test]
    async fn test_unusable_review_call_keeps_web_locked() {
        let f = fixture(Setup {
            model: ScriptedModel::new(vec![
                tool_round("call_1", "vectorDatabaseSearch", json!({})),
                tool_round("call_2", "webSearch", json!({"query": "B09XYZ1234 reviews"})),
                text_round(&["Let me search the reviews properly."]),
            ]),
            ..Setup::default()
        });
        let events = events_for(&f, vec![Message::user("Summarize complaints for B09XYZ1234")]).await;

        assert_well_formed(&events);
        assert!(f.index.queries().is_empty());
        assert!(f.search.calls().is_empty());
        let web_rejected = events.iter().any(|e| {
            matches!(e, StreamEvent::ToolResult { is_error: true, result, .. }
                if result["rejectedTool"] == "webSearch")
        });
        assert!(web_rejected);
        for request in f.model.requests() {
            assert_eq!(request.tools, vec!["vectorDatabaseSearch"]);
        }
    }

    #[tokio::test]
    async fn test_review_index_outage_falls_back_to_web() {
        let f = fixture(Setup {
            model: ScriptedModel::new(vec![
                tool_round("call_1", "vectorDatabaseSearch", json!({"asin": "B09XYZ1234"})),
                tool_round("call_2", "webSearch", json!({"query": "B09XYZ1234 buyer feedback"})),
                text_round(&["Review data is unavailable; from external web sources: ..."]),
            ]),
            index: FakeIndex::failing(),
            search: FakeSearch::with_results(vec![FakeSearch::result("Smartwatch roundup")]),
            ..Setup::default()
        });
        let events = events_for(&f, vec![Message::user("What do buyers say about B09XYZ1234?")]).await;

        assert_well_formed(&events);
        let results: Vec<(&str, bool, &serde_json::Value)> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolResult {
                    tool_name,
                    is_error,
                    result,
                    ..
                } => Some((tool_name.as_str(), *is_error, result)),
                _ => None,
            })
            .collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "vectorDatabaseSearch");
        assert!(results[0].1);
        assert!(results[0].2["error"]
            .as_str()
            .is_some_and(|s| s.starts_with("Review search failed")));
        assert_eq!(results[1].0, "webSearch");
        assert!(!results[1].1);

        assert_eq!(f.index.queries().len(), 1);
        assert_eq!(f.search.calls().len(), 1);
        assert_eq!(f.model.requests()[1].tools, vec!["vectorDatabaseSearch", "webSearch"]);
        assert_eq!(finish_reason(&events), Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_finishes() {
        let f = fixture(Setup {
            model: ScriptedModel::looping(tool_round(
                "call_loop",
                "vectorDatabaseSearch",
                json!({"query": "battery"}),
            )),
            step_budget: 4,
            ..Setup::default()
        });
        let events = events_for(&f, vec![Message::user("battery reviews")]).await;

        assert_well_formed(&events);
        assert_eq!(finish_reason(&events), Some(FinishReason::BudgetExhausted));
        assert_eq!(f.model.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_text_deltas_concatenate_to_answer() {
        let tokens = ["Sellers ", "mention ", "ä, ", "ö and ", "🙂 ", "in reviews."];
        let f = fixture(Setup {
            model: ScriptedModel::new(vec![text_round(&tokens)]),
            ..Setup::default()
        });
        let events = events_for(&f, vec![Message::user("say something")]).await;

        assert_well_formed(&events);
        assert_eq!(answer(&events), tokens.concat());
    }

    #[tokio::test]
    async fn test_completion_failure_emits_error() {
        let f = fixture(Setup {
            model: ScriptedModel::failing(500),
            ..Setup::default()
        });
        let events = events_for(&f, vec![Message::user("hi")]).await;

        assert_well_formed(&events);
        match events.last() {
            Some(StreamEvent::Error { error_text }) => {
                assert!(!error_text.contains("upstream exploded"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_timeout_emits_error() {
        let f = fixture(Setup {
            model: ScriptedModel::stalled(),
            timeout: Duration::from_millis(50),
            ..Setup::default()
        });
        let events = events_for(&f, vec![Message::user("hi")]).await;

        assert_well_formed(&events);
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Error {
                error_text: TIMEOUT_TEXT.to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_fail_closed_moderation_outage() {
        let f = fixture(Setup {
            classifier: FakeClassifier::failing(),
            model: ScriptedModel::new(vec![text_round(&["should not run"])]),
            ..Setup::default()
        });
        let events = events_for(&f, vec![Message::user("top complaints?")]).await;
        assert_eq!(finish_reason(&events), Some(FinishReason::Moderated));
        assert!(f.model.requests().is_empty());
    }
}
