use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::ChatEvent;
use crate::error::{ChatError, ChatResult};
use crate::models::{
    ActiveSession, ChatSettings, ConversationDirectory, ConversationPatch, ConversationSummary,
    ExchangePhase, ExchangeTracker, Message, Optimistic,
};
use crate::repositories::ConversationStore;
use crate::services::title_presenter::{self, TitleTarget};
use crate::settings::ClientSettings;

const EVENT_CAPACITY: usize = 1024;

/// How `rename_conversation` shows the new title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameMode {
    /// Show it at once, confirm with a single update.
    Direct,
    /// Type it out character by character, then persist.
    Presented,
}

/// Point-in-time copy of everything a view renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSnapshot {
    pub conversations: Vec<ConversationSummary>,
    pub active_conversation_id: Option<String>,
    pub messages: Vec<Message>,
    pub settings: ChatSettings,
    pub input: String,
    pub loading: bool,
    pub phase: Option<ExchangePhase>,
}

impl ChatSnapshot {
    pub fn active_title(&self) -> Option<&str> {
        let id = self.active_conversation_id.as_deref()?;
        self.conversations
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.title.as_str())
    }
}

pub(super) struct ChatState {
    pub(super) directory: ConversationDirectory,
    pub(super) session: ActiveSession,
    pub(super) exchanges: ExchangeTracker,
}

pub(super) struct ControllerInner {
    pub(super) store: Arc<dyn ConversationStore>,
    pub(super) settings: ClientSettings,
    pub(super) state: Mutex<ChatState>,
    events: broadcast::Sender<ChatEvent>,
    title_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ControllerInner {
    /// Publish an event; having no subscribers is fine.
    pub(super) fn emit(&self, event: ChatEvent) {
        let _ = self.events.send(event);
    }

    pub(super) fn emit_messages(&self, session: &ActiveSession) {
        self.emit(ChatEvent::MessagesChanged {
            conversation_id: session.conversation_id().map(str::to_string),
            messages: session.messages().to_vec(),
        });
    }

    /// Release any in-flight exchange without cancelling it.
    fn detach_exchange(&self, state: &mut ChatState) {
        if state.exchanges.detach().is_some() {
            self.emit(ChatEvent::LoadingChanged(false));
        }
    }

    /// Start presenting a title in the background. `settle` waits for it.
    pub(super) fn spawn_title(self: &Arc<Self>, conversation_id: String, title: String) {
        let target: Arc<dyn TitleTarget> = self.clone();
        let store = self.store.clone();
        let interval = self.settings.title_interval();

        let handle = tokio::spawn(async move {
            // Failures are logged by the presenter.
            let _ = title_presenter::present_title(target, store, conversation_id, title, interval)
                .await;
        });

        let mut tasks = self.title_tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }
}

impl TitleTarget for ControllerInner {
    fn show_title(&self, conversation_id: &str, title: &str) -> bool {
        let mut state = self.state.lock();
        if !state.directory.set_title(conversation_id, title) {
            return false;
        }
        self.emit(ChatEvent::TitleChanged {
            conversation_id: conversation_id.to_string(),
            title: title.to_string(),
        });
        true
    }

    fn confirm_title(&self, summary: ConversationSummary) {
        let mut state = self.state.lock();
        let Some(existing) = state.directory.get_mut(&summary.id) else {
            return;
        };
        *existing = summary.clone();
        self.emit(ChatEvent::TitleChanged {
            conversation_id: summary.id,
            title: summary.title,
        });
    }
}

/// Keeps the conversation directory and the active session in sync with the
/// remote store, and runs message exchanges against it.
///
/// Cheap to clone; all clones share state. The state lock is never held
/// across an `.await`.
#[derive(Clone)]
pub struct ChatController {
    pub(super) inner: Arc<ControllerInner>,
}

impl ChatController {
    pub fn new(store: Arc<dyn ConversationStore>, settings: ClientSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session = ActiveSession::new(settings.default_chat_settings());

        Self {
            inner: Arc::new(ControllerInner {
                store,
                settings,
                state: Mutex::new(ChatState {
                    directory: ConversationDirectory::new(),
                    session,
                    exchanges: ExchangeTracker::new(),
                }),
                events,
                title_tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn with_store(store: impl ConversationStore, settings: ClientSettings) -> Self {
        Self::new(Arc::new(store), settings)
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let state = self.inner.state.lock();
        ChatSnapshot {
            conversations: state.directory.list().to_vec(),
            active_conversation_id: state.directory.active_id().map(str::to_string),
            messages: state.session.messages().to_vec(),
            settings: state.session.settings().clone(),
            input: state.session.input().to_string(),
            loading: state.exchanges.is_loading(),
            phase: state.exchanges.phase(),
        }
    }

    /// Fetch all summaries and replace the local directory.
    ///
    /// Selects the first conversation when none is active. Only a failed
    /// listing fails the load; a failed selection is logged and the directory
    /// stays loaded.
    pub async fn load(&self) -> ChatResult<()> {
        self.load_directory().await?;

        let to_select = {
            let state = self.inner.state.lock();
            match state.directory.active_id() {
                Some(_) => None,
                None => state.directory.first_id().map(str::to_string),
            }
        };

        if let Some(id) = to_select
            && let Err(e) = self.select_conversation(&id).await
        {
            warn!(conv_id = %id, error = ?e, "Loaded conversations but could not select the first one");
        }
        Ok(())
    }

    /// Fetch all summaries and replace the local directory without selecting
    /// anything.
    pub async fn load_directory(&self) -> ChatResult<()> {
        let conversations = match self.inner.store.list_conversations().await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = ?e, "Failed to load conversations");
                return Err(e.into());
            }
        };
        info!(count = conversations.len(), "Loaded conversations");

        let mut state = self.inner.state.lock();
        state.directory.replace_all(conversations);

        // The active conversation vanished remotely.
        if state.directory.active_id().is_none() && state.session.conversation_id().is_some() {
            self.inner.detach_exchange(&mut state);
            state.session.clear();
            self.inner.emit(ChatEvent::ActiveConversationChanged {
                conversation_id: None,
            });
            self.inner.emit_messages(&state.session);
        }
        self.inner.emit(ChatEvent::DirectoryChanged);
        Ok(())
    }

    /// Create a conversation with `settings` and make it active with no messages.
    pub async fn create_conversation(&self, settings: ChatSettings) -> ChatResult<ConversationSummary> {
        settings.validate()?;

        let created = match self.inner.store.create_conversation(&settings).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = ?e, "Failed to create conversation");
                return Err(e.into());
            }
        };
        info!(conv_id = %created.id, "Created conversation");

        let mut state = self.inner.state.lock();
        self.inner.detach_exchange(&mut state);
        state.directory.prepend(created.clone());
        state.directory.set_active(&created.id);
        state
            .session
            .replace(created.id.clone(), Vec::new(), created.settings_or(&settings));

        self.inner.emit(ChatEvent::DirectoryChanged);
        self.inner.emit(ChatEvent::ActiveConversationChanged {
            conversation_id: Some(created.id.clone()),
        });
        self.inner.emit_messages(&state.session);
        Ok(created)
    }

    /// Make `id` the active conversation, replacing the session with its
    /// fetched history. Nothing changes when the fetch fails.
    pub async fn select_conversation(&self, id: &str) -> ChatResult<()> {
        let epoch = self.inner.state.lock().session.epoch();

        let detail = match self.inner.store.get_conversation(id).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!(conv_id = %id, error = ?e, "Failed to load conversation");
                return Err(e.into());
            }
        };

        let mut state = self.inner.state.lock();
        if state.session.epoch() != epoch {
            debug!(conv_id = %id, "Selection superseded while loading");
            return Err(ChatError::Cancelled);
        }

        self.inner.detach_exchange(&mut state);

        let settings = detail
            .summary
            .settings_or(&self.inner.settings.default_chat_settings());
        state.directory.upsert(detail.summary);
        state.directory.set_active(id);
        state.session.replace(id.to_string(), detail.messages, settings);
        debug!(conv_id = %id, messages = state.session.messages().len(), "Selected conversation");

        self.inner.emit(ChatEvent::DirectoryChanged);
        self.inner.emit(ChatEvent::ActiveConversationChanged {
            conversation_id: Some(id.to_string()),
        });
        self.inner.emit_messages(&state.session);
        Ok(())
    }

    pub async fn rename_conversation(&self, id: &str, title: &str, mode: RenameMode) -> ChatResult<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::validation("title must not be empty"));
        }
        let known = self.inner.state.lock().directory.contains(id);
        if !known {
            return Err(ChatError::UnknownConversation(id.to_string()));
        }

        match mode {
            RenameMode::Direct => self.rename_direct(id, title).await,
            RenameMode::Presented => {
                title_presenter::present_title(
                    self.inner.clone(),
                    self.inner.store.clone(),
                    id.to_string(),
                    title.to_string(),
                    self.inner.settings.title_interval(),
                )
                .await
            }
        }
    }

    async fn rename_direct(&self, id: &str, title: &str) -> ChatResult<()> {
        let pending = {
            let mut state = self.inner.state.lock();
            let summary = state
                .directory
                .get_mut(id)
                .ok_or_else(|| ChatError::UnknownConversation(id.to_string()))?;
            let pending = Optimistic::apply(summary, |s| s.title = title.to_string());
            self.inner.emit(ChatEvent::TitleChanged {
                conversation_id: id.to_string(),
                title: title.to_string(),
            });
            pending
        };

        let result = self
            .inner
            .store
            .update_conversation(id, &ConversationPatch::title(title))
            .await;

        let mut state = self.inner.state.lock();
        let Some(summary) = state.directory.get_mut(id) else {
            // Deleted meanwhile; nothing left to reconcile.
            return result.map(|_| ()).map_err(Into::into);
        };

        match result {
            Ok(updated) => {
                pending.commit(summary, updated);
                self.inner.emit(ChatEvent::TitleChanged {
                    conversation_id: id.to_string(),
                    title: summary.title.clone(),
                });
                Ok(())
            }
            Err(e) => {
                warn!(conv_id = %id, error = ?e, "Failed to rename conversation");
                pending.revert(summary);
                self.inner.emit(ChatEvent::TitleChanged {
                    conversation_id: id.to_string(),
                    title: summary.title.clone(),
                });
                Err(e.into())
            }
        }
    }

    /// Delete a conversation remotely, then locally.
    ///
    /// Deleting the active conversation moves to the first remaining one, or
    /// clears the selection when none remain.
    pub async fn delete_conversation(&self, id: &str) -> ChatResult<()> {
        if let Err(e) = self.inner.store.delete_conversation(id).await {
            warn!(conv_id = %id, error = ?e, "Failed to delete conversation");
            return Err(e.into());
        }
        info!(conv_id = %id, "Deleted conversation");

        let next = {
            let mut state = self.inner.state.lock();
            let was_active = state.directory.active_id() == Some(id);
            state.directory.remove(id);
            self.inner.emit(ChatEvent::DirectoryChanged);

            if !was_active {
                return Ok(());
            }

            self.inner.detach_exchange(&mut state);
            let next = state.directory.active().cloned();
            match &next {
                Some(summary) => {
                    let settings =
                        summary.settings_or(&self.inner.settings.default_chat_settings());
                    state.session.replace(summary.id.clone(), Vec::new(), settings);
                }
                None => state.session.clear(),
            }
            self.inner.emit(ChatEvent::ActiveConversationChanged {
                conversation_id: next.as_ref().map(|s| s.id.clone()),
            });
            self.inner.emit_messages(&state.session);
            next
        };

        if let Some(next) = next
            && let Err(e) = self.select_conversation(&next.id).await
        {
            warn!(conv_id = %next.id, error = ?e, "Failed to load history after delete");
        }
        Ok(())
    }

    /// Persist new generation settings for a conversation.
    pub async fn update_settings(&self, id: &str, settings: ChatSettings) -> ChatResult<()> {
        settings.validate()?;

        let updated = match self
            .inner
            .store
            .update_conversation(id, &ConversationPatch::settings(&settings))
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                warn!(conv_id = %id, error = ?e, "Failed to update settings");
                return Err(e.into());
            }
        };

        let mut state = self.inner.state.lock();
        if let Some(existing) = state.directory.get_mut(id) {
            *existing = updated.clone();
        }
        if state.session.conversation_id() == Some(id) {
            state.session.set_settings(updated.settings_or(&settings));
        }
        self.inner.emit(ChatEvent::DirectoryChanged);
        Ok(())
    }

    pub fn set_input(&self, input: impl Into<String>) {
        self.inner.state.lock().session.set_input(input);
    }

    /// Cancel the in-flight exchange. Returns false when nothing was running.
    pub fn stop_generation(&self) -> bool {
        let mut state = self.inner.state.lock();
        match state.exchanges.stop() {
            Some(conv_id) => {
                info!(conv_id = %conv_id, "Generation stopped");
                self.inner.emit(ChatEvent::LoadingChanged(false));
                true
            }
            None => false,
        }
    }

    /// Wait for background title presentations to finish.
    pub async fn settle(&self) {
        loop {
            let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.title_tasks.lock());
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                let _ = task.await;
            }
        }
    }
}
