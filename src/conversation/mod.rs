//! Conversation state: typed messages and the append-only log the agent loop owns.

mod message;
mod state;

pub use message::{Message, Role, ToolCallRequest};
pub use state::Conversation;
