pub mod conversation;
pub mod error;
pub mod types;

pub use conversation::{ActionDescriptor, ConversationState, Message, ToolCallRequest};
pub use error::{Error, Result};
pub use types::SessionId;
