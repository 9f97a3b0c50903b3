use super::conversation::ConversationSummary;

/// Client-side collection of conversation summaries.
///
/// Order is most-recently-created first. The active id, when set, always
/// names a summary present in the collection.
#[derive(Debug, Default, Clone)]
pub struct ConversationDirectory {
    conversations: Vec<ConversationSummary>,
    active_conversation_id: Option<String>,
}

impl ConversationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection with a fresh listing from the store.
    ///
    /// Duplicate ids keep their first occurrence. An active id that no longer
    /// exists is cleared.
    pub fn replace_all(&mut self, conversations: Vec<ConversationSummary>) {
        let mut unique: Vec<ConversationSummary> = Vec::with_capacity(conversations.len());
        for conv in conversations {
            if !unique.iter().any(|c| c.id == conv.id) {
                unique.push(conv);
            }
        }
        self.conversations = unique;

        if let Some(active) = self.active_conversation_id.as_deref()
            && !self.contains(active)
        {
            self.active_conversation_id = None;
        }
    }

    /// Insert a summary at the front, dropping any stale entry with the same id.
    pub fn prepend(&mut self, conversation: ConversationSummary) {
        self.conversations.retain(|c| c.id != conversation.id);
        self.conversations.insert(0, conversation);
    }

    /// Replace a summary in place, or prepend it when unknown.
    pub fn upsert(&mut self, conversation: ConversationSummary) {
        match self.get_mut(&conversation.id) {
            Some(existing) => *existing = conversation,
            None => self.prepend(conversation),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ConversationSummary> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Update entry point for titles; returns false when the id is unknown.
    pub fn set_title(&mut self, id: &str, title: &str) -> bool {
        match self.get_mut(id) {
            Some(conv) => {
                conv.title = title.to_string();
                true
            }
            None => false,
        }
    }

    /// Remove a summary. If it was active, the first remaining summary becomes
    /// active (or none when the collection is now empty).
    pub fn remove(&mut self, id: &str) -> Option<ConversationSummary> {
        let index = self.conversations.iter().position(|c| c.id == id)?;
        let removed = self.conversations.remove(index);

        if self.active_conversation_id.as_deref() == Some(id) {
            self.active_conversation_id = self.conversations.first().map(|c| c.id.clone());
        }

        Some(removed)
    }

    /// Mark a conversation active; refuses ids not in the collection.
    pub fn set_active(&mut self, id: &str) -> bool {
        if self.contains(id) {
            self.active_conversation_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_conversation_id.as_deref()
    }

    pub fn active(&self) -> Option<&ConversationSummary> {
        self.active_id().and_then(|id| self.get(id))
    }

    pub fn list(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn first_id(&self) -> Option<&str> {
        self.conversations.first().map(|c| c.id.as_str())
    }

    pub fn count(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
