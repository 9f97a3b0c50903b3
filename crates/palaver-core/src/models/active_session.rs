use super::conversation::ChatSettings;
use super::message::Message;

/// In-memory state of the selected conversation.
///
/// The session only keeps the conversation id; the summary itself is always
/// read back from the directory. Every wholesale replacement bumps `epoch`, so
/// work that suspended before the replacement can tell its target is gone.
#[derive(Debug, Clone, Default)]
pub struct ActiveSession {
    conversation_id: Option<String>,
    messages: Vec<Message>,
    settings: ChatSettings,
    input: String,
    epoch: u64,
}

impl ActiveSession {
    pub fn new(settings: ChatSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Switch to a conversation, replacing the history wholesale.
    pub fn replace(&mut self, conversation_id: String, messages: Vec<Message>, settings: ChatSettings) {
        self.conversation_id = Some(conversation_id);
        self.messages = messages;
        self.settings = settings;
        self.epoch += 1;
    }

    /// Drop the selection, e.g. after the last conversation was deleted.
    pub fn clear(&mut self) {
        self.conversation_id = None;
        self.messages.clear();
        self.epoch += 1;
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True while the session still shows the conversation captured at `epoch`.
    pub fn is_current(&self, conversation_id: &str, epoch: u64) -> bool {
        self.epoch == epoch && self.conversation_id.as_deref() == Some(conversation_id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append to the content of the newest message (the one being revealed).
    pub fn append_to_last(&mut self, text: &str) -> bool {
        match self.messages.last_mut() {
            Some(last) => {
                last.content.push_str(text);
                true
            }
            None => false,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ChatSettings) {
        self.settings = settings;
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub fn take_input(&mut self) -> String {
        std::mem::take(&mut self.input)
    }
}
