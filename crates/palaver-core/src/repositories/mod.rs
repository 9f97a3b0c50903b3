pub mod conversation_store;
pub mod http_store;
pub mod in_memory_store;

pub use conversation_store::{BoxFuture, ConversationStore};
pub use http_store::HttpConversationStore;
pub use in_memory_store::{InMemoryConversationStore, ReplyGate, StoreOperation};
