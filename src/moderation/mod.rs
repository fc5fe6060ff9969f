//! Moderation Gate: classifies the latest user message before any model
//! or tool work happens.

pub mod classifier;
pub mod errors;
pub mod gate;
pub mod types;

pub use classifier::{ModerationClassifier, OpenAiModerationClient};
pub use errors::ModerationError;
pub use gate::ModerationGate;
pub use types::{Classification, ModerationCategory, ModerationVerdict, GENERIC_DENIAL};
