pub mod conversation_index;

pub use conversation_index::ConversationIndex;
