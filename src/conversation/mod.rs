//! Client Conversation Store and the wire message types it shares with the
//! server.

pub mod client;
pub mod store;
pub mod types;

pub use client::{ChatClient, ClientError};
pub use store::{ClientStatus, ConversationStore, StoreError, CLEAR_CHAT_TEXT, WELCOME_MESSAGE};
pub use types::{Message, MessagePart, MessageRole};
