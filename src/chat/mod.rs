// Chat module
// OpenAI-compatible chat client and the conversation orchestrator

pub mod client;
pub mod session;

pub use client::{ChatMessage, ChatModel, ChatStream, OpenAiChatClient, Role};
pub use session::{AnswerStream, ChatSession};
