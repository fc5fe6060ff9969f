//! Tool Adapters: review search over the vector index and web search.
//!
//! The model sees exactly two tools, modelled by the closed [`ToolKind`]
//! enum. Provider clients sit behind the [`ReviewIndex`] and
//! [`SearchProvider`] traits.

pub mod asin;
pub mod errors;
pub mod exa;
pub mod pinecone;
pub mod registry;
pub mod review_search;
pub mod types;
pub mod web_search;

pub use errors::ToolError;
pub use registry::{ToolArgs, ToolKind, ToolOutcome, Toolbox, TOOL_SCHEMA_VERSION};
pub use review_search::ReviewSearchTool;
pub use types::{Passage, ReviewIndex, ReviewQuery, SearchProvider, WebResult};
pub use web_search::WebSearchTool;
