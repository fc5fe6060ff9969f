//! Scripted fakes for the provider traits, with call logs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::inference::{
    ChatMessage, ChunkStream, CompletionModel, InferenceError, StreamChunk, ToolCall,
    ToolDefinition,
};
use crate::moderation::{Classification, ModerationClassifier, ModerationError};
use crate::tools::{
    Passage, ReviewIndex, ReviewQuery, SearchProvider, ToolError, WebResult,
};

// ─── Completion model ────────────────────────────────────────────────────────

pub fn text_round(tokens: &[&str]) -> Vec<StreamChunk> {
    let mut chunks: Vec<StreamChunk> = tokens.iter().map(|t| StreamChunk::text(*t)).collect();
    chunks.push(StreamChunk {
        finish_reason: Some("stop".to_string()),
        ..StreamChunk::default()
    });
    chunks
}

pub fn tool_round(id: &str, name: &str, args: serde_json::Value) -> Vec<StreamChunk> {
    vec![StreamChunk::tool_calls(vec![ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args,
    }])]
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<String>,
}

enum Script {
    Rounds(Mutex<VecDeque<Vec<StreamChunk>>>),
    Looping(Vec<StreamChunk>),
    Failing(u16),
    Stalled,
}

pub struct ScriptedModel {
    script: Script,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    /// Plays `rounds` in order, then empty rounds.
    pub fn new(rounds: Vec<Vec<StreamChunk>>) -> Self {
        Self::with_script(Script::Rounds(Mutex::new(rounds.into())))
    }

    pub fn looping(round: Vec<StreamChunk>) -> Self {
        Self::with_script(Script::Looping(round))
    }

    pub fn failing(status: u16) -> Self {
        Self::with_script(Script::Failing(status))
    }

    /// Never yields a chunk.
    pub fn stalled() -> Self {
        Self::with_script(Script::Stalled)
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn stream_round(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ChunkStream, InferenceError> {
        self.requests.lock().unwrap().push(ModelRequest {
            messages,
            tools: tools.into_iter().map(|t| t.function.name).collect(),
        });

        let chunks = match &self.script {
            Script::Rounds(rounds) => rounds.lock().unwrap().pop_front().unwrap_or_default(),
            Script::Looping(round) => round.clone(),
            Script::Failing(status) => {
                return Err(InferenceError::HttpError {
                    status: *status,
                    body: "upstream exploded".to_string(),
                })
            }
            Script::Stalled => {
                return Ok(Box::pin(stream::pending::<Result<StreamChunk, InferenceError>>()))
            }
        };
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

// ─── Review index ────────────────────────────────────────────────────────────

pub struct FakeIndex {
    passages: Vec<Passage>,
    fail: bool,
    queries: Mutex<Vec<ReviewQuery>>,
}

impl FakeIndex {
    pub fn empty() -> Self {
        Self::with_passages(Vec::new())
    }

    pub fn with_passages(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::empty()
        }
    }

    pub fn passage(text: &str, score: f32) -> Passage {
        Passage {
            text: text.to_string(),
            asin: Some("B09XYZ1234".to_string()),
            score,
            rating: None,
            title: None,
        }
    }

    pub fn queries(&self) -> Vec<ReviewQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReviewIndex for FakeIndex {
    async fn query(&self, query: &ReviewQuery) -> Result<Vec<Passage>, ToolError> {
        self.queries.lock().unwrap().push(query.clone());
        if self.fail {
            return Err(ToolError::Upstream {
                provider: "pinecone",
                status: 503,
                body: "index unavailable".to_string(),
            });
        }
        Ok(self.passages.clone())
    }
}

// ─── Web search ──────────────────────────────────────────────────────────────

pub struct FakeSearch {
    results: Vec<WebResult>,
    fail_status: Option<u16>,
    unconfigured: bool,
    calls: Mutex<Vec<(String, u32)>>,
}

impl FakeSearch {
    pub fn with_results(results: Vec<WebResult>) -> Self {
        Self {
            results,
            fail_status: None,
            unconfigured: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::with_results(Vec::new())
        }
    }

    /// Behaves like a provider started without its API key.
    pub fn unconfigured() -> Self {
        Self {
            unconfigured: true,
            ..Self::with_results(Vec::new())
        }
    }

    pub fn result(title: &str) -> WebResult {
        WebResult {
            title: title.to_string(),
            url: "https://example.com/article".to_string(),
            snippet: "Buyers expect multi-day battery life.".to_string(),
        }
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    fn check_ready(&self) -> Result<(), ToolError> {
        if self.unconfigured {
            return Err(ToolError::MissingCredential { var: "EXA_API_KEY" });
        }
        Ok(())
    }

    async fn search(&self, query: &str, num_results: u32) -> Result<Vec<WebResult>, ToolError> {
        self.check_ready()?;
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), num_results));
        if let Some(status) = self.fail_status {
            return Err(ToolError::Upstream {
                provider: "exa",
                status,
                body: "bad gateway".to_string(),
            });
        }
        Ok(self.results.clone())
    }
}

// ─── Moderation ──────────────────────────────────────────────────────────────

pub struct FakeClassifier {
    flagged_categories: Option<Vec<String>>,
    fail: bool,
    texts: Mutex<Vec<String>>,
}

impl FakeClassifier {
    pub fn allowing() -> Self {
        Self {
            flagged_categories: None,
            fail: false,
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn flagging(categories: &[&str]) -> Self {
        Self {
            flagged_categories: Some(categories.iter().map(|c| c.to_string()).collect()),
            ..Self::allowing()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::allowing()
        }
    }

    pub fn call_count(&self) -> usize {
        self.texts.lock().unwrap().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModerationClassifier for FakeClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ModerationError> {
        self.texts.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(ModerationError::Timeout { duration_secs: 10 });
        }
        Ok(match &self.flagged_categories {
            Some(categories) => Classification {
                flagged: true,
                categories: categories
                    .iter()
                    .map(|c| (c.clone(), true))
                    .collect::<HashMap<_, _>>(),
            },
            None => Classification::default(),
        })
    }
}
