use std::future::Future;
use std::pin::Pin;

use crate::error::RemoteResult;
use crate::models::{ChatSettings, ConversationDetail, ConversationPatch, ConversationSummary, Message};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The remote service that owns durable conversation and message state.
///
/// The authenticated actor is implicit: implementations scope every call to
/// whoever is signed in.
pub trait ConversationStore: Send + Sync + 'static {
    /// All conversations of the actor, newest first.
    fn list_conversations(&self) -> BoxFuture<'static, RemoteResult<Vec<ConversationSummary>>>;

    /// One conversation with its full message history.
    fn get_conversation(&self, id: &str) -> BoxFuture<'static, RemoteResult<ConversationDetail>>;

    /// Create a conversation titled "New Conversation" with the given settings.
    fn create_conversation(
        &self,
        settings: &ChatSettings,
    ) -> BoxFuture<'static, RemoteResult<ConversationSummary>>;

    fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> BoxFuture<'static, RemoteResult<ConversationSummary>>;

    fn delete_conversation(&self, id: &str) -> BoxFuture<'static, RemoteResult<()>>;

    /// Post a user message and wait for the complete assistant reply.
    ///
    /// Dropping the returned future abandons the request.
    fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
        model: &str,
        temperature: f32,
    ) -> BoxFuture<'static, RemoteResult<Message>>;
}
