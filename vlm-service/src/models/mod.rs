pub mod conversation;

pub use conversation::{ContentItem, Conversation, Message, Role};
