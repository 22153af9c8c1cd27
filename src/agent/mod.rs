//! Agent loop: a language model choosing tools over a rolling memory.
//!
//! The decision making itself is delegated to a [`LanguageModel`]. This
//! module only supplies instructions, the tool registry and conversation
//! memory, runs requested tools one after another, and feeds their
//! outcomes back until the model produces a reply.

mod memory;
mod model;
mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use memory::{ConversationMemory, MemoryEntry, ModelToolCall};
pub use model::{to_openai_tools, to_request_messages, LanguageModel, ModelReply, OpenAIModel};
pub use runner::{Agent, AgentResponse, ToolCallRecord};
