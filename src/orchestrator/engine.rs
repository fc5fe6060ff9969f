//! The tool-orchestration loop.
//!
//! Each round asks the model for a decision with the currently allowed tools
//! on offer. A text-only round ends the run; a tool call is dispatched (first
//! call only), its result appended to the conversation, and the loop goes
//! around again until the step budget runs out.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::budget::StepBudget;
use super::errors::EngineError;
use super::history::{cap_tool_result, to_model_messages};
use super::policy::{RequestIntent, ToolPolicy};
use super::prompts::system_prompt;
use crate::config::OrchestrationConfig;
use crate::conversation::types::{latest_user_text, Message};
use crate::inference::{ChatMessage, CompletionModel, ToolCall, ToolDefinition};
use crate::streaming::EventSink;
use crate::tools::{ToolKind, ToolOutcome, Toolbox};

/// Consecutive empty rounds (no text, no tool call) before giving up.
const MAX_EMPTY_ROUNDS: u32 = 2;

const EMPTY_ROUND_NUDGE: &str = "You returned an empty response. Answer the seller's question \
    now, or call vectorDatabaseSearch if you still need review data.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model gave a final text answer.
    Answered,
    /// The step budget ran out before a final answer.
    BudgetExhausted,
    /// The model produced nothing usable.
    Empty,
    /// The request was cancelled.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub rounds: u32,
    /// Tool names in the order the model requested them.
    pub tool_calls: Vec<String>,
}

pub struct Orchestrator {
    model: Arc<dyn CompletionModel>,
    tools: Arc<Toolbox>,
    step_budget: u32,
    max_tool_result_chars: usize,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        tools: Arc<Toolbox>,
        config: &OrchestrationConfig,
    ) -> Self {
        Self {
            model,
            tools,
            step_budget: config.step_budget,
            max_tool_result_chars: config.max_tool_result_chars,
        }
    }

    /// Run one request to completion, streaming into `sink`.
    ///
    /// Does not emit the terminal event; the caller maps the outcome.
    pub async fn run(
        &self,
        history: &[Message],
        sink: &mut EventSink,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, EngineError> {
        let intent = RequestIntent::classify(&latest_user_text(history).unwrap_or_default());
        tracing::info!(
            asins = ?intent.asins,
            about_reviews = intent.about_reviews,
            market_context = intent.market_context,
            "orchestration started"
        );

        let mut policy = ToolPolicy::new(intent);
        let mut budget = StepBudget::new(self.step_budget);
        let mut messages = to_model_messages(
            &system_prompt(Utc::now()),
            history,
            self.max_tool_result_chars,
        );
        let mut tool_calls: Vec<String> = Vec::new();
        let mut empty_rounds: u32 = 0;

        sink.start().await;

        loop {
            if cancel.is_cancelled() {
                return Ok(summary(RunOutcome::Cancelled, &budget, tool_calls));
            }
            if !budget.try_consume() {
                tracing::warn!(
                    rounds = budget.used(),
                    tool_calls = tool_calls.len(),
                    "step budget exhausted, returning partial answer"
                );
                return Ok(summary(RunOutcome::BudgetExhausted, &budget, tool_calls));
            }
            let round = budget.used();

            let offered: Vec<ToolDefinition> =
                policy.offered().into_iter().map(ToolKind::definition).collect();
            tracing::info!(
                round,
                model = %self.model.model_name(),
                message_count = messages.len(),
                tools = ?offered.iter().map(|d| d.function.name.as_str()).collect::<Vec<_>>(),
                "=== ROUND START ==="
            );

            let Some(decision) = self.decide(messages.clone(), offered, sink, cancel).await? else {
                return Ok(summary(RunOutcome::Cancelled, &budget, tool_calls));
            };

            tracing::info!(
                round,
                text_len = decision.text.len(),
                tool_calls = ?decision.calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "=== MODEL RESPONSE ==="
            );

            let mut calls = decision.calls.into_iter();
            let Some(call) = calls.next() else {
                if !decision.text.trim().is_empty() {
                    return Ok(summary(RunOutcome::Answered, &budget, tool_calls));
                }
                empty_rounds += 1;
                if empty_rounds >= MAX_EMPTY_ROUNDS {
                    tracing::warn!(round, "model returned empty responses, giving up");
                    return Ok(summary(RunOutcome::Empty, &budget, tool_calls));
                }
                tracing::warn!(round, "empty model response, nudging");
                messages.push(ChatMessage::user(EMPTY_ROUND_NUDGE));
                continue;
            };
            empty_rounds = 0;

            let dropped: Vec<String> = calls.map(|c| c.name).collect();
            if !dropped.is_empty() {
                tracing::warn!(round, kept = %call.name, ?dropped, "dropping extra tool calls");
            }

            if cancel.is_cancelled() {
                return Ok(summary(RunOutcome::Cancelled, &budget, tool_calls));
            }

            tool_calls.push(call.name.clone());
            messages.push(ChatMessage::assistant_tool_call(Some(decision.text), &call));
            sink.tool_call(&call).await;

            let started = Instant::now();
            let outcome = self.dispatch(&call, &mut policy).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            if cancel.is_cancelled() {
                tracing::info!(tool = %call.name, "request cancelled, discarding tool result");
                return Ok(summary(RunOutcome::Cancelled, &budget, tool_calls));
            }

            let value = outcome.to_value();
            tracing::info!(
                round,
                tool = %call.name,
                is_error = outcome.is_error(),
                duration_ms,
                "tool call complete"
            );
            sink.tool_result(&call, value.clone(), outcome.is_error(), duration_ms)
                .await;
            messages.push(ChatMessage::tool_result(
                call.id.clone(),
                cap_tool_result(&value.to_string(), self.max_tool_result_chars, &call.name),
            ));
        }
    }

    /// Stream one model round into the sink. `None` means cancelled.
    async fn decide(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
        sink: &mut EventSink,
        cancel: &CancellationToken,
    ) -> Result<Option<Decision>, EngineError> {
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            stream = self.model.stream_round(messages, tools) => stream?,
        };

        let mut decision = Decision::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;

            if let Some(reasoning) = &chunk.reasoning {
                sink.reasoning_delta(reasoning).await;
            }
            if let Some(token) = &chunk.token {
                decision.text.push_str(token);
                sink.text_delta(token).await;
            }
            for call in chunk.tool_calls.into_iter().flatten() {
                if !decision.calls.iter().any(|c| c.id == call.id) {
                    decision.calls.push(call);
                }
            }
        }
        Ok(Some(decision))
    }

    /// Run a tool call the policy allows, or explain why not.
    async fn dispatch(&self, call: &ToolCall, policy: &mut ToolPolicy) -> ToolOutcome {
        let Some(kind) = ToolKind::from_name(&call.name) else {
            let available: Vec<&str> = policy.offered().into_iter().map(ToolKind::name).collect();
            tracing::warn!(tool = %call.name, "model requested an unknown tool");
            return ToolOutcome::Rejected {
                tool: call.name.clone(),
                reason: format!(
                    "Unknown tool '{}'. Available tools: {}.",
                    call.name,
                    available.join(", ")
                ),
            };
        };

        if !policy.allows(kind) {
            tracing::warn!(tool = %call.name, "tool not allowed yet, rejecting call");
            return ToolOutcome::Rejected {
                tool: call.name.clone(),
                reason: policy.rejection_reason(kind),
            };
        }

        let outcome = self.tools.invoke(kind, &call.arguments).await;
        policy.record(kind, &outcome);
        outcome
    }
}

#[derive(Debug, Default)]
struct Decision {
    text: String,
    calls: Vec<ToolCall>,
}

fn summary(outcome: RunOutcome, budget: &StepBudget, tool_calls: Vec<String>) -> RunSummary {
    RunSummary {
        outcome,
        rounds: budget.used(),
        tool_calls,
    }
}
