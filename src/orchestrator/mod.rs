//! Tool-Orchestration Engine.
//!
//! ```text
//! AwaitingModelDecision ──text──▶ Terminated
//!        ▲      │
//!        │      └──tool call──▶ InvokingTool ──result──┐
//!        └─────────────────────────────────────────────┘
//! ```
//!
//! The loop is bounded by [`StepBudget`] and the review-first
//! [`ToolPolicy`].

pub mod budget;
pub mod engine;
pub mod errors;
pub mod history;
pub mod policy;
pub mod prompts;

pub use budget::StepBudget;
pub use engine::{Orchestrator, RunOutcome, RunSummary};
pub use errors::EngineError;
pub use policy::{RequestIntent, ToolPolicy};
