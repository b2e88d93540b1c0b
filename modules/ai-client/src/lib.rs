pub mod client;
pub mod error;
pub mod types;

pub use client::OpenAiChat;
pub use error::{AiError, Result};
pub use types::{ChatModel, Completion, Message, MessageRole, ToolDefinition};
