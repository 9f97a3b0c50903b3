use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle of one user-message-in / assistant-message-out round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    Sending,
    Revealing,
    Errored,
}

/// Why `send_message` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyInput,
    NoActiveConversation,
    ExchangeInFlight,
}

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The full reply was revealed.
    Completed,
    /// Stopped by the user or by the exchange timeout; not a failure.
    Stopped,
    /// The store failed; a diagnostic assistant message was appended.
    Failed(String),
    /// The session moved to another conversation before the result arrived.
    Discarded,
    /// Rejected before any request was issued.
    Skipped(SkipReason),
}

#[derive(Debug)]
struct InFlight {
    id: Uuid,
    conversation_id: String,
    phase: ExchangePhase,
    cancel: CancellationToken,
}

/// Handle returned to the exchange that won the slot.
#[derive(Debug, Clone)]
pub struct ExchangeTicket {
    pub id: Uuid,
    pub conversation_id: String,
    pub epoch: u64,
    pub cancel: CancellationToken,
}

/// Holds the at-most-one in-flight exchange of a session.
///
/// Does not own any message text; it only tracks lifecycle and cancellation.
#[derive(Debug, Default)]
pub struct ExchangeTracker {
    current: Option<InFlight>,
}

impl ExchangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a new exchange, or `None` if one is already running.
    pub fn begin(&mut self, conversation_id: &str, epoch: u64) -> Option<ExchangeTicket> {
        if self.current.is_some() {
            return None;
        }

        let ticket = ExchangeTicket {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.to_string(),
            epoch,
            cancel: CancellationToken::new(),
        };
        debug!(exchange_id = %ticket.id, conv_id = %conversation_id, "Exchange sending");

        self.current = Some(InFlight {
            id: ticket.id,
            conversation_id: ticket.conversation_id.clone(),
            phase: ExchangePhase::Sending,
            cancel: ticket.cancel.clone(),
        });
        Some(ticket)
    }

    /// Move the exchange `id` to `phase`; false if it no longer owns the slot.
    pub fn set_phase(&mut self, id: Uuid, phase: ExchangePhase) -> bool {
        match self.current.as_mut() {
            Some(current) if current.id == id => {
                debug!(exchange_id = %id, ?phase, "Exchange phase changed");
                current.phase = phase;
                true
            }
            _ => false,
        }
    }

    /// Release the slot if `id` still holds it.
    pub fn finish(&mut self, id: Uuid) -> bool {
        if self.current.as_ref().is_some_and(|c| c.id == id) {
            self.current = None;
            true
        } else {
            false
        }
    }

    /// Cancel the running exchange and free the slot.
    ///
    /// Returns the conversation the stopped exchange belonged to.
    pub fn stop(&mut self) -> Option<String> {
        let current = self.current.take()?;
        current.cancel.cancel();
        debug!(exchange_id = %current.id, conv_id = %current.conversation_id, "Exchange stopped");
        Some(current.conversation_id)
    }

    /// Like [`stop`](Self::stop), but only if exchange `id` still owns the slot.
    pub fn stop_exchange(&mut self, id: Uuid) -> Option<String> {
        if self.current.as_ref().is_some_and(|c| c.id == id) {
            self.stop()
        } else {
            None
        }
    }

    /// Let go of the running exchange without cancelling its request.
    ///
    /// Used when the session switches conversations: the request finishes in
    /// the background and its result is discarded.
    pub fn detach(&mut self) -> Option<String> {
        let current = self.current.take()?;
        debug!(exchange_id = %current.id, conv_id = %current.conversation_id, "Exchange detached");
        Some(current.conversation_id)
    }

    pub fn is_loading(&self) -> bool {
        self.current.is_some()
    }

    pub fn phase(&self) -> Option<ExchangePhase> {
        self.current.as_ref().map(|c| c.phase)
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.conversation_id.as_str())
    }
}
