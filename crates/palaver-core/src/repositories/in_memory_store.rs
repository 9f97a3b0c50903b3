use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use super::conversation_store::{BoxFuture, ConversationStore};
use crate::error::{RemoteError, RemoteResult};
use crate::models::{
    ChatSettings, ConversationDetail, ConversationPatch, ConversationSummary, Message,
    NEW_CONVERSATION_TITLE,
};

/// Store operations, used to inject failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    List,
    Get,
    Create,
    Update,
    Delete,
    SendMessage,
}

#[derive(Default)]
struct StoreState {
    /// Newest first, like the backend's listing.
    conversations: Vec<ConversationDetail>,
    failing: HashSet<StoreOperation>,
    calls: HashMap<StoreOperation, usize>,
    scripted_replies: VecDeque<String>,
}

impl StoreState {
    fn enter(&mut self, op: StoreOperation) -> RemoteResult<()> {
        *self.calls.entry(op).or_default() += 1;
        if self.failing.contains(&op) {
            return Err(RemoteError::Unavailable(format!("{op:?} rejected")));
        }
        Ok(())
    }

    fn find_mut(&mut self, id: &str) -> RemoteResult<&mut ConversationDetail> {
        self.conversations
            .iter_mut()
            .find(|c| c.summary.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }
}

/// Holds `send_message` replies until released.
#[derive(Clone)]
pub struct ReplyGate {
    notify: Arc<Notify>,
}

impl ReplyGate {
    /// Let one held reply through.
    pub fn release(&self) {
        self.notify.notify_one();
    }
}

/// In-memory conversation store.
/// Useful for testing and offline development.
#[derive(Clone, Default)]
pub struct InMemoryConversationStore {
    state: Arc<Mutex<StoreState>>,
    reply_gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a conversation directly, bypassing call counting. Returns its id.
    pub fn seed(&self, title: &str, messages: Vec<Message>) -> String {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let detail = ConversationDetail {
            summary: ConversationSummary {
                id: id.clone(),
                title: title.to_string(),
                model: None,
                temperature: None,
                context_length: None,
                created_at: Some(now),
                updated_at: Some(now),
            },
            messages,
        };
        self.state.lock().conversations.insert(0, detail);
        id
    }

    /// Make every call of `op` fail until [`recover`](Self::recover).
    pub fn fail(&self, op: StoreOperation) {
        self.state.lock().failing.insert(op);
    }

    pub fn recover(&self, op: StoreOperation) {
        self.state.lock().failing.remove(&op);
    }

    pub fn calls(&self, op: StoreOperation) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Queue the content of the next assistant reply. Unscripted replies echo the input.
    pub fn push_reply(&self, content: impl Into<String>) {
        self.state.lock().scripted_replies.push_back(content.into());
    }

    /// From now on, `send_message` waits for [`ReplyGate::release`] before replying.
    pub fn hold_replies(&self) -> ReplyGate {
        let notify = Arc::new(Notify::new());
        *self.reply_gate.lock() = Some(notify.clone());
        ReplyGate { notify }
    }

    /// Stored history of a conversation.
    pub fn messages_of(&self, id: &str) -> Vec<Message> {
        self.state
            .lock()
            .conversations
            .iter()
            .find(|c| c.summary.id == id)
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.state.lock().conversations.len()
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn list_conversations(&self) -> BoxFuture<'static, RemoteResult<Vec<ConversationSummary>>> {
        let state = self.state.clone();

        Box::pin(async move {
            let mut store = state.lock();
            store.enter(StoreOperation::List)?;
            Ok(store.conversations.iter().map(|c| c.summary.clone()).collect())
        })
    }

    fn get_conversation(&self, id: &str) -> BoxFuture<'static, RemoteResult<ConversationDetail>> {
        let state = self.state.clone();
        let id = id.to_string();

        Box::pin(async move {
            let mut store = state.lock();
            store.enter(StoreOperation::Get)?;
            Ok(store.find_mut(&id)?.clone())
        })
    }

    fn create_conversation(
        &self,
        settings: &ChatSettings,
    ) -> BoxFuture<'static, RemoteResult<ConversationSummary>> {
        let state = self.state.clone();
        let settings = settings.clone();

        Box::pin(async move {
            let mut store = state.lock();
            store.enter(StoreOperation::Create)?;

            let now = Utc::now();
            let mut summary = ConversationSummary {
                id: Uuid::new_v4().to_string(),
                title: NEW_CONVERSATION_TITLE.to_string(),
                model: None,
                temperature: None,
                context_length: None,
                created_at: Some(now),
                updated_at: Some(now),
            };
            summary.apply_settings(&settings);

            store.conversations.insert(
                0,
                ConversationDetail {
                    summary: summary.clone(),
                    messages: Vec::new(),
                },
            );
            Ok(summary)
        })
    }

    fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> BoxFuture<'static, RemoteResult<ConversationSummary>> {
        let state = self.state.clone();
        let id = id.to_string();
        let mut patch = patch.clone();

        Box::pin(async move {
            let mut store = state.lock();
            store.enter(StoreOperation::Update)?;

            // Stored titles are normalized the way the backend does it.
            if let Some(title) = patch.title.as_mut() {
                *title = title.trim().to_string();
            }

            let conv = store.find_mut(&id)?;
            patch.apply_to(&mut conv.summary);
            conv.summary.updated_at = Some(Utc::now());
            Ok(conv.summary.clone())
        })
    }

    fn delete_conversation(&self, id: &str) -> BoxFuture<'static, RemoteResult<()>> {
        let state = self.state.clone();
        let id = id.to_string();

        Box::pin(async move {
            let mut store = state.lock();
            store.enter(StoreOperation::Delete)?;

            let before = store.conversations.len();
            store.conversations.retain(|c| c.summary.id != id);
            if store.conversations.len() == before {
                return Err(RemoteError::NotFound(id));
            }
            Ok(())
        })
    }

    fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
        _model: &str,
        _temperature: f32,
    ) -> BoxFuture<'static, RemoteResult<Message>> {
        let state = self.state.clone();
        let gate = self.reply_gate.clone();
        let conversation_id = conversation_id.to_string();
        let text = text.to_string();

        Box::pin(async move {
            {
                let mut store = state.lock();
                store.enter(StoreOperation::SendMessage)?;
                let conv = store.find_mut(&conversation_id)?;
                let mut user = Message::user(text.clone());
                user.id = Some(Uuid::new_v4().to_string());
                user.created_at = Some(Utc::now());
                conv.messages.push(user);
            }

            let held = gate.lock().clone();
            if let Some(notify) = held {
                notify.notified().await;
            }

            let mut store = state.lock();
            let content = store
                .scripted_replies
                .pop_front()
                .unwrap_or_else(|| format!("Echo: {text}"));
            let mut reply = Message::assistant(content);
            reply.id = Some(Uuid::new_v4().to_string());
            reply.created_at = Some(Utc::now());

            let conv = store.find_mut(&conversation_id)?;
            conv.messages.push(reply.clone());
            conv.summary.updated_at = Some(Utc::now());
            Ok(reply)
        })
    }
}
