use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::chat_controller::{ChatController, ControllerInner};
use super::events::ChatEvent;
use crate::models::{
    EXCHANGE_ERROR_CONTENT, ExchangeOutcome, ExchangePhase, ExchangeTicket, Message, SkipReason,
};
use crate::services::{derive_title, reveal_stream};

/// Where the text of an exchange comes from.
enum ExchangeInput {
    /// The session's input buffer, cleared once the exchange starts.
    Buffer,
    Text(String),
}

impl ChatController {
    /// Send the input buffer as a user message.
    pub async fn send(&self) -> ExchangeOutcome {
        let timeout = self.inner.settings.exchange_timeout();
        run_exchange(&self.inner, ExchangeInput::Buffer, timeout).await
    }

    /// Send `text` as a user message and reveal the reply.
    ///
    /// Uses the configured exchange timeout, if any.
    pub async fn send_message(&self, text: &str) -> ExchangeOutcome {
        let timeout = self.inner.settings.exchange_timeout();
        run_exchange(&self.inner, ExchangeInput::Text(text.to_string()), timeout).await
    }

    /// Like [`send_message`](Self::send_message) with an explicit deadline.
    /// Elapsing stops the exchange exactly like [`stop_generation`](Self::stop_generation).
    pub async fn send_message_with_timeout(&self, text: &str, timeout: Duration) -> ExchangeOutcome {
        run_exchange(&self.inner, ExchangeInput::Text(text.to_string()), Some(timeout)).await
    }
}

struct Started {
    ticket: ExchangeTicket,
    text: String,
    first: bool,
    model: String,
    temperature: f32,
}

fn begin(inner: &ControllerInner, input: ExchangeInput) -> Result<Started, SkipReason> {
    let mut state = inner.state.lock();

    let text = match &input {
        ExchangeInput::Buffer => state.session.input().to_string(),
        ExchangeInput::Text(text) => text.clone(),
    };
    if text.trim().is_empty() {
        return Err(SkipReason::EmptyInput);
    }

    let conversation_id = state
        .session
        .conversation_id()
        .map(str::to_string)
        .ok_or(SkipReason::NoActiveConversation)?;
    let epoch = state.session.epoch();
    let ticket = state
        .exchanges
        .begin(&conversation_id, epoch)
        .ok_or(SkipReason::ExchangeInFlight)?;

    if matches!(input, ExchangeInput::Buffer) {
        state.session.take_input();
    }
    let first = state.session.messages().is_empty();
    state.session.push(Message::user(text.clone()));
    let settings = state.session.settings().clone();

    inner.emit_messages(&state.session);
    inner.emit(ChatEvent::LoadingChanged(true));

    Ok(Started {
        ticket,
        text,
        first,
        model: settings.model,
        temperature: settings.temperature,
    })
}

/// Cancel the exchange through the normal stop path once `timeout` elapses.
fn spawn_watchdog(
    inner: &Arc<ControllerInner>,
    ticket: &ExchangeTicket,
    timeout: Duration,
    finished: CancellationToken,
) {
    let inner = inner.clone();
    let exchange_id = ticket.id;

    tokio::spawn(async move {
        tokio::select! {
            _ = finished.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                let mut state = inner.state.lock();
                if let Some(conv_id) = state.exchanges.stop_exchange(exchange_id) {
                    info!(conv_id = %conv_id, ?timeout, "Exchange timed out");
                    inner.emit(ChatEvent::LoadingChanged(false));
                }
            }
        }
    });
}

async fn run_exchange(
    inner: &Arc<ControllerInner>,
    input: ExchangeInput,
    timeout: Option<Duration>,
) -> ExchangeOutcome {
    let started = match begin(inner, input) {
        Ok(started) => started,
        Err(reason) => {
            debug!(?reason, "Exchange skipped");
            return ExchangeOutcome::Skipped(reason);
        }
    };

    let finished = CancellationToken::new();
    let _finished_guard = finished.clone().drop_guard();
    if let Some(timeout) = timeout {
        spawn_watchdog(inner, &started.ticket, timeout, finished);
    }

    let conversation_id = started.ticket.conversation_id.clone();
    let outcome = exchange(inner, &started).await;

    if inner.state.lock().exchanges.finish(started.ticket.id) {
        inner.emit(ChatEvent::LoadingChanged(false));
    }
    debug!(conv_id = %conversation_id, ?outcome, "Exchange finished");
    inner.emit(ChatEvent::ExchangeFinished {
        conversation_id,
        outcome: outcome.clone(),
    });
    outcome
}

async fn exchange(inner: &Arc<ControllerInner>, started: &Started) -> ExchangeOutcome {
    let ticket = &started.ticket;
    let request = inner.store.send_message(
        &ticket.conversation_id,
        &started.text,
        &started.model,
        started.temperature,
    );

    let result = tokio::select! {
        biased;
        _ = ticket.cancel.cancelled() => return ExchangeOutcome::Stopped,
        result = request => result,
    };

    let reply = match result {
        Ok(reply) => reply,
        Err(e) => {
            let mut state = inner.state.lock();
            if !state.session.is_current(&ticket.conversation_id, ticket.epoch) {
                return ExchangeOutcome::Discarded;
            }
            if ticket.cancel.is_cancelled() {
                return ExchangeOutcome::Stopped;
            }
            warn!(conv_id = %ticket.conversation_id, error = ?e, "Message exchange failed");
            state.exchanges.set_phase(ticket.id, ExchangePhase::Errored);
            state.session.push(Message::assistant(EXCHANGE_ERROR_CONTENT));
            inner.emit_messages(&state.session);
            return ExchangeOutcome::Failed(e.to_string());
        }
    };

    {
        let mut state = inner.state.lock();
        if !state.session.is_current(&ticket.conversation_id, ticket.epoch) {
            debug!(conv_id = %ticket.conversation_id, "Reply arrived after switch, discarded");
            return ExchangeOutcome::Discarded;
        }
        if ticket.cancel.is_cancelled() {
            return ExchangeOutcome::Stopped;
        }
        state.exchanges.set_phase(ticket.id, ExchangePhase::Revealing);
        state.session.push(Message::placeholder_for(&reply));
        inner.emit_messages(&state.session);
    }

    let mut deltas = reveal_stream(
        reply.content.clone(),
        inner.settings.reveal_interval(),
        ticket.cancel.clone(),
    );
    while let Some(delta) = deltas.next().await {
        let mut state = inner.state.lock();
        if !state.session.is_current(&ticket.conversation_id, ticket.epoch) {
            return ExchangeOutcome::Discarded;
        }
        if ticket.cancel.is_cancelled() {
            break;
        }
        state.session.append_to_last(&delta);
        inner.emit_messages(&state.session);
    }

    if ticket.cancel.is_cancelled() {
        return ExchangeOutcome::Stopped;
    }

    if started.first {
        inner.spawn_title(ticket.conversation_id.clone(), derive_title(&started.text));
    }
    ExchangeOutcome::Completed
}
