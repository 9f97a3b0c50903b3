use std::time::Duration;

use tokio::sync::broadcast::error::TryRecvError;

use super::chat_controller::{ChatController, ChatSnapshot, RenameMode};
use super::events::ChatEvent;
use crate::error::ChatError;
use crate::models::{
    ChatSettings, EXCHANGE_ERROR_CONTENT, ExchangeOutcome, Message, Role, SkipReason,
};
use crate::repositories::{InMemoryConversationStore, StoreOperation};
use crate::settings::ClientSettings;

fn fast_settings() -> ClientSettings {
    ClientSettings {
        reveal_interval_ms: 0,
        title_interval_ms: 0,
        ..ClientSettings::default()
    }
}

fn controller(store: &InMemoryConversationStore) -> ChatController {
    ChatController::with_store(store.clone(), fast_settings())
}

async fn wait_until(controller: &ChatController, pred: impl Fn(&ChatSnapshot) -> bool) {
    for _ in 0..1_000 {
        if pred(&controller.snapshot()) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

fn assert_active_not_dangling(snapshot: &ChatSnapshot) {
    if let Some(active) = snapshot.active_conversation_id.as_deref() {
        assert!(
            snapshot.conversations.iter().any(|c| c.id == active),
            "active id {active} missing from directory"
        );
    }
}

// --- directory ---

#[tokio::test]
async fn test_load_selects_first_and_is_idempotent() {
    let store = InMemoryConversationStore::new();
    let older = store.seed("Older", vec![Message::user("old question")]);
    let newer = store.seed("Newer", vec![Message::user("hi"), Message::assistant("hello")]);
    let chat = controller(&store);

    chat.load().await.unwrap();
    let first = chat.snapshot();
    let ids: Vec<&str> = first.conversations.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![newer.as_str(), older.as_str()]);
    assert_eq!(first.active_conversation_id.as_deref(), Some(newer.as_str()));
    assert_eq!(first.messages.len(), 2);
    assert_eq!(first.active_title(), Some("Newer"));

    chat.load().await.unwrap();
    let second = chat.snapshot();
    assert_eq!(first.conversations, second.conversations);
    assert_eq!(second.active_conversation_id, first.active_conversation_id);
}

#[tokio::test]
async fn test_load_failure_keeps_previous_directory() {
    let store = InMemoryConversationStore::new();
    store.seed("Only", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();
    let before = chat.snapshot();

    store.fail(StoreOperation::List);
    store.seed("Unseen", Vec::new());
    assert!(chat.load().await.is_err());
    assert_eq!(chat.snapshot(), before);
}

#[tokio::test]
async fn test_load_succeeds_when_first_conversation_fails_to_open() {
    let store = InMemoryConversationStore::new();
    store.seed("Older", Vec::new());
    store.seed("Newer", Vec::new());
    store.fail(StoreOperation::Get);
    let chat = controller(&store);

    chat.load().await.unwrap();
    let snapshot = chat.snapshot();
    assert_eq!(snapshot.conversations.len(), 2);
    assert!(snapshot.active_conversation_id.is_none());
    assert!(snapshot.messages.is_empty());
    assert_eq!(store.calls(StoreOperation::Get), 1);
}

#[tokio::test]
async fn test_load_directory_lists_without_opening() {
    let store = InMemoryConversationStore::new();
    store.seed("Only", vec![Message::user("hi")]);
    let chat = controller(&store);

    chat.load_directory().await.unwrap();
    let snapshot = chat.snapshot();
    assert_eq!(snapshot.conversations.len(), 1);
    assert!(snapshot.active_conversation_id.is_none());
    assert_eq!(store.calls(StoreOperation::Get), 0);
}

#[tokio::test]
async fn test_load_empty_store_selects_nothing() {
    let store = InMemoryConversationStore::new();
    let chat = controller(&store);

    chat.load().await.unwrap();
    let snapshot = chat.snapshot();
    assert!(snapshot.conversations.is_empty());
    assert!(snapshot.active_conversation_id.is_none());
    assert_eq!(store.calls(StoreOperation::Get), 0);
}

#[tokio::test]
async fn test_create_prepends_and_activates_empty_session() {
    let store = InMemoryConversationStore::new();
    store.seed("Existing", vec![Message::user("hi")]);
    let chat = controller(&store);
    chat.load().await.unwrap();

    let settings = ChatSettings {
        model: "gpt-4o".to_string(),
        temperature: 0.2,
        context_length: 2000,
    };
    let created = chat.create_conversation(settings.clone()).await.unwrap();

    let snapshot = chat.snapshot();
    assert_eq!(snapshot.conversations[0].id, created.id);
    assert_eq!(snapshot.conversations[0].title, "New Conversation");
    assert_eq!(snapshot.active_conversation_id.as_deref(), Some(created.id.as_str()));
    assert!(snapshot.messages.is_empty());
    assert_eq!(snapshot.settings, settings);
}

#[tokio::test]
async fn test_create_failure_changes_nothing() {
    let store = InMemoryConversationStore::new();
    store.seed("Existing", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();
    let before = chat.snapshot();

    store.fail(StoreOperation::Create);
    let err = chat.create_conversation(ChatSettings::default()).await.unwrap_err();
    assert!(err.is_remote());
    assert_eq!(chat.snapshot(), before);
}

#[tokio::test]
async fn test_create_rejects_invalid_settings_without_request() {
    let store = InMemoryConversationStore::new();
    let chat = controller(&store);

    let settings = ChatSettings {
        temperature: 1.5,
        ..ChatSettings::default()
    };
    let err = chat.create_conversation(settings).await.unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
    assert_eq!(store.calls(StoreOperation::Create), 0);
}

#[tokio::test]
async fn test_delete_active_falls_back_in_collection_order() {
    let store = InMemoryConversationStore::new();
    let a = store.seed("A", vec![Message::user("from a")]);
    let b = store.seed("B", vec![Message::user("from b")]);
    let c = store.seed("C", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();
    assert_eq!(chat.snapshot().active_conversation_id.as_deref(), Some(c.as_str()));

    chat.delete_conversation(&c).await.unwrap();
    let snapshot = chat.snapshot();
    assert_active_not_dangling(&snapshot);
    assert_eq!(snapshot.active_conversation_id.as_deref(), Some(b.as_str()));
    assert_eq!(snapshot.messages[0].content, "from b");

    chat.delete_conversation(&b).await.unwrap();
    let snapshot = chat.snapshot();
    assert_active_not_dangling(&snapshot);
    assert_eq!(snapshot.active_conversation_id.as_deref(), Some(a.as_str()));

    chat.delete_conversation(&a).await.unwrap();
    let snapshot = chat.snapshot();
    assert!(snapshot.active_conversation_id.is_none());
    assert!(snapshot.messages.is_empty());
    assert!(snapshot.conversations.is_empty());
}

#[tokio::test]
async fn test_create_delete_sequences_never_dangle() {
    let store = InMemoryConversationStore::new();
    let chat = controller(&store);
    let mut ids = Vec::new();

    for round in 0..4 {
        let created = chat.create_conversation(ChatSettings::default()).await.unwrap();
        ids.push(created.id);
        assert_active_not_dangling(&chat.snapshot());

        if round % 2 == 1 {
            let victim = ids.remove(0);
            chat.delete_conversation(&victim).await.unwrap();
            assert_active_not_dangling(&chat.snapshot());
        }
    }

    for id in ids {
        chat.delete_conversation(&id).await.unwrap();
        assert_active_not_dangling(&chat.snapshot());
    }
    assert!(chat.snapshot().active_conversation_id.is_none());
}

#[tokio::test]
async fn test_delete_failure_keeps_summary() {
    let store = InMemoryConversationStore::new();
    let id = store.seed("Keep me", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();

    store.fail(StoreOperation::Delete);
    assert!(chat.delete_conversation(&id).await.is_err());

    let snapshot = chat.snapshot();
    assert_eq!(snapshot.conversations.len(), 1);
    assert_eq!(snapshot.active_conversation_id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn test_delete_inactive_keeps_selection() {
    let store = InMemoryConversationStore::new();
    let other = store.seed("Other", Vec::new());
    let active = store.seed("Active", vec![Message::user("stay")]);
    let chat = controller(&store);
    chat.load().await.unwrap();

    chat.delete_conversation(&other).await.unwrap();
    let snapshot = chat.snapshot();
    assert_eq!(snapshot.active_conversation_id.as_deref(), Some(active.as_str()));
    assert_eq!(snapshot.messages.len(), 1);
}

#[tokio::test]
async fn test_rename_direct_commits_server_value() {
    let store = InMemoryConversationStore::new();
    let id = store.seed("Old", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();

    chat.rename_conversation(&id, "  Fresh title ", RenameMode::Direct)
        .await
        .unwrap();
    assert_eq!(chat.snapshot().active_title(), Some("Fresh title"));
    assert_eq!(store.calls(StoreOperation::Update), 1);
}

#[tokio::test]
async fn test_rename_direct_reverts_on_failure() {
    let store = InMemoryConversationStore::new();
    let id = store.seed("Old", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();
    let mut events = chat.subscribe();

    store.fail(StoreOperation::Update);
    assert!(chat.rename_conversation(&id, "New", RenameMode::Direct).await.is_err());
    assert_eq!(chat.snapshot().active_title(), Some("Old"));

    let mut titles = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ChatEvent::TitleChanged { title, .. } = event {
            titles.push(title);
        }
    }
    assert_eq!(titles, vec!["New".to_string(), "Old".to_string()]);
}

#[tokio::test]
async fn test_rename_rejects_blank_title() {
    let store = InMemoryConversationStore::new();
    let id = store.seed("Old", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();

    let err = chat
        .rename_conversation(&id, "   ", RenameMode::Direct)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
    assert_eq!(store.calls(StoreOperation::Update), 0);
}

#[tokio::test]
async fn test_rename_presented_types_then_persists_once() {
    let store = InMemoryConversationStore::new();
    let id = store.seed("Old", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();
    let mut events = chat.subscribe();

    chat.rename_conversation(&id, "Hey", RenameMode::Presented)
        .await
        .unwrap();

    let mut titles = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ChatEvent::TitleChanged { title, .. } = event {
            titles.push(title);
        }
    }
    assert_eq!(&titles[..3], ["H", "He", "Hey"]);
    assert_eq!(titles.last().map(String::as_str), Some("Hey"));
    assert_eq!(store.calls(StoreOperation::Update), 1);
    assert_eq!(chat.snapshot().active_title(), Some("Hey"));
}

#[tokio::test]
async fn test_update_settings_applies_to_active_session() {
    let store = InMemoryConversationStore::new();
    let id = store.seed("Chat", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();

    let settings = ChatSettings {
        model: "gpt-4o".to_string(),
        temperature: 0.1,
        context_length: 8000,
    };
    chat.update_settings(&id, settings.clone()).await.unwrap();

    let snapshot = chat.snapshot();
    assert_eq!(snapshot.settings, settings);
    assert_eq!(snapshot.conversations[0].model.as_deref(), Some("gpt-4o"));
}

#[tokio::test]
async fn test_update_settings_failure_leaves_session() {
    let store = InMemoryConversationStore::new();
    let id = store.seed("Chat", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();

    store.fail(StoreOperation::Update);
    let settings = ChatSettings {
        model: "gpt-4o".to_string(),
        ..ChatSettings::default()
    };
    assert!(chat.update_settings(&id, settings).await.is_err());
    assert_eq!(chat.snapshot().settings, ChatSettings::default());
}

// --- session ---

#[tokio::test]
async fn test_select_failure_keeps_session() {
    let store = InMemoryConversationStore::new();
    let other = store.seed("Other", vec![Message::user("other")]);
    store.seed("Active", vec![Message::user("active")]);
    let chat = controller(&store);
    chat.load().await.unwrap();
    let before = chat.snapshot();

    store.fail(StoreOperation::Get);
    assert!(chat.select_conversation(&other).await.is_err());
    assert_eq!(chat.snapshot(), before);
}

#[tokio::test]
async fn test_select_unlisted_conversation_joins_directory() {
    let store = InMemoryConversationStore::new();
    store.seed("Listed", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();

    let late = store.seed("Late", vec![Message::user("late")]);
    chat.select_conversation(&late).await.unwrap();

    let snapshot = chat.snapshot();
    assert_eq!(snapshot.conversations[0].id, late);
    assert_active_not_dangling(&snapshot);
    assert_eq!(snapshot.messages[0].content, "late");
}

// --- exchanges ---

#[tokio::test]
async fn test_blank_input_is_a_no_op() {
    let store = InMemoryConversationStore::new();
    store.seed("Chat", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();

    for input in ["", "   ", "\n\t"] {
        let outcome = chat.send_message(input).await;
        assert_eq!(outcome, ExchangeOutcome::Skipped(SkipReason::EmptyInput));
    }
    assert!(chat.snapshot().messages.is_empty());
    assert_eq!(store.calls(StoreOperation::SendMessage), 0);
}

#[tokio::test]
async fn test_send_without_active_conversation_is_skipped() {
    let store = InMemoryConversationStore::new();
    let chat = controller(&store);

    chat.set_input("hello?");
    assert_eq!(
        chat.send().await,
        ExchangeOutcome::Skipped(SkipReason::NoActiveConversation)
    );
    // Input survives a skipped send.
    assert_eq!(chat.snapshot().input, "hello?");
}

#[tokio::test(start_paused = true)]
async fn test_successful_exchange_appends_exactly_two() {
    let store = InMemoryConversationStore::new();
    store.seed("Chat", vec![Message::user("earlier"), Message::assistant("reply")]);
    store.push_reply("The full answer, revealed slowly.");
    let chat = ChatController::with_store(store.clone(), ClientSettings::default());
    chat.load().await.unwrap();

    let outcome = chat.send_message("Question?").await;
    assert_eq!(outcome, ExchangeOutcome::Completed);

    let snapshot = chat.snapshot();
    assert_eq!(snapshot.messages.len(), 4);
    assert_eq!(snapshot.messages[2].role, Role::User);
    assert_eq!(snapshot.messages[2].content, "Question?");
    assert_eq!(snapshot.messages[3].role, Role::Assistant);
    assert_eq!(snapshot.messages[3].content, "The full answer, revealed slowly.");
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn test_send_uses_and_clears_input_buffer() {
    let store = InMemoryConversationStore::new();
    store.seed("Chat", Vec::new());
    let chat = controller(&store);
    chat.load().await.unwrap();

    chat.set_input("Hello");
    assert_eq!(chat.send().await, ExchangeOutcome::Completed);

    let snapshot = chat.snapshot();
    assert!(snapshot.input.is_empty());
    assert_eq!(snapshot.messages[1].content, "Echo: Hello");
}

#[tokio::test]
async fn test_reveal_publishes_user_message_then_growing_prefixes() {
    let store = InMemoryConversationStore::new();
    store.seed("Chat", Vec::new());
    store.push_reply("abc");
    let chat = controller(&store);
    chat.load().await.unwrap();
    let mut events = chat.subscribe();

    chat.send_message("go").await;

    let mut frames = Vec::new();
    loop {
        match events.try_recv() {
            Ok(ChatEvent::MessagesChanged { messages, .. }) => frames.push(messages),
            Ok(_) => {}
            Err(TryRecvError::Empty) => break,
            Err(e) => panic!("unexpected: {e:?}"),
        }
    }

    assert_eq!(frames[0].len(), 1);
    assert!(frames[0][0].is_user());
    let revealed: Vec<&str> = frames[1..]
        .iter()
        .map(|m| m.last().map(|msg| msg.content.as_str()).unwrap_or_default())
        .collect();
    assert_eq!(revealed, vec!["", "a", "ab", "abc"]);
}

#[tokio::test]
async fn test_store_failure_appends_diagnostic_message() {
    let store = InMemoryConversationStore::new();
    store.seed("Chat", vec![Message::user("before")]);
    store.fail(StoreOperation::SendMessage);
    let chat = controller(&store);
    chat.load().await.unwrap();

    let outcome = chat.send_message("hello").await;
    assert!(matches!(outcome, ExchangeOutcome::Failed(_)));

    let snapshot = chat.snapshot();
    assert_eq!(snapshot.messages.len(), 3);
    assert_eq!(snapshot.messages[0].content, "before");
    assert_eq!(snapshot.messages[2].content, EXCHANGE_ERROR_CONTENT);
    assert!(!snapshot.loading);
    assert_eq!(store.calls(StoreOperation::SendMessage), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_reveal_leaves_prefix() {
    let store = InMemoryConversationStore::new();
    store.seed("Chat", Vec::new());
    let full = "abcdefghijklmnop";
    store.push_reply(full);
    let chat = ChatController::with_store(store.clone(), ClientSettings::default());
    chat.load().await.unwrap();
    let mut events = chat.subscribe();

    let task = tokio::spawn({
        let chat = chat.clone();
        async move { chat.send_message("go").await }
    });

    loop {
        if let ChatEvent::MessagesChanged { messages, .. } = events.recv().await.unwrap()
            && messages.len() == 2
            && messages[1].content.len() >= 3
        {
            assert!(chat.stop_generation());
            break;
        }
    }

    assert_eq!(task.await.unwrap(), ExchangeOutcome::Stopped);
    let snapshot = chat.snapshot();
    let revealed = &snapshot.messages[1].content;
    assert!(!revealed.is_empty());
    assert!(revealed.len() < full.len());
    assert!(full.starts_with(revealed.as_str()));
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn test_stop_while_request_pending() {
    let store = InMemoryConversationStore::new();
    store.seed("Chat", Vec::new());
    let gate = store.hold_replies();
    let chat = controller(&store);
    chat.load().await.unwrap();

    let task = tokio::spawn({
        let chat = chat.clone();
        async move { chat.send_message("anyone?").await }
    });
    wait_until(&chat, |s| s.loading).await;

    assert!(chat.stop_generation());
    assert!(!chat.snapshot().loading);
    assert_eq!(task.await.unwrap(), ExchangeOutcome::Stopped);

    let snapshot = chat.snapshot();
    assert_eq!(snapshot.messages.len(), 1);
    assert!(snapshot.messages[0].is_user());
    gate.release();
}

#[tokio::test]
async fn test_second_send_while_in_flight_is_skipped() {
    let store = InMemoryConversationStore::new();
    store.seed("Chat", Vec::new());
    let gate = store.hold_replies();
    let chat = controller(&store);
    chat.load().await.unwrap();

    let first = tokio::spawn({
        let chat = chat.clone();
        async move { chat.send_message("one").await }
    });
    wait_until(&chat, |s| s.loading).await;

    assert_eq!(
        chat.send_message("two").await,
        ExchangeOutcome::Skipped(SkipReason::ExchangeInFlight)
    );

    gate.release();
    assert_eq!(first.await.unwrap(), ExchangeOutcome::Completed);
    assert_eq!(chat.snapshot().messages.len(), 2);
    assert_eq!(store.calls(StoreOperation::SendMessage), 1);
}

#[tokio::test]
async fn test_switch_discards_late_reply() {
    let store = InMemoryConversationStore::new();
    let a = store.seed("A", Vec::new());
    let b = store.seed("B", vec![Message::user("b only")]);
    let chat = controller(&store);
    chat.load().await.unwrap();
    chat.select_conversation(&a).await.unwrap();

    let gate = store.hold_replies();
    let task = tokio::spawn({
        let chat = chat.clone();
        async move { chat.send_message("question for a").await }
    });
    wait_until(&chat, |s| s.loading).await;

    chat.select_conversation(&b).await.unwrap();
    assert!(!chat.snapshot().loading);

    gate.release();
    assert_eq!(task.await.unwrap(), ExchangeOutcome::Discarded);

    let snapshot = chat.snapshot();
    assert_eq!(snapshot.active_conversation_id.as_deref(), Some(b.as_str()));
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].content, "b only");

    // The request itself was not cancelled.
    assert_eq!(store.messages_of(&a).len(), 2);
    chat.settle().await;
    assert_eq!(store.calls(StoreOperation::Update), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_behaves_like_stop() {
    let store = InMemoryConversationStore::new();
    store.seed("Chat", Vec::new());
    let _gate = store.hold_replies();
    let chat = controller(&store);
    chat.load().await.unwrap();

    let outcome = chat
        .send_message_with_timeout("slow?", Duration::from_millis(50))
        .await;
    assert_eq!(outcome, ExchangeOutcome::Stopped);

    let snapshot = chat.snapshot();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.messages.len(), 1);
}

// --- titles ---

#[tokio::test]
async fn test_first_exchange_synthesizes_title() {
    let store = InMemoryConversationStore::new();
    let chat = controller(&store);
    let created = chat.create_conversation(ChatSettings::default()).await.unwrap();

    let input = "Explain quantum entanglement in simple terms please";
    assert_eq!(chat.send_message(input).await, ExchangeOutcome::Completed);
    chat.settle().await;

    let snapshot = chat.snapshot();
    assert_eq!(snapshot.active_conversation_id.as_deref(), Some(created.id.as_str()));
    assert_eq!(snapshot.active_title(), Some("Explain quantum entanglement i..."));
    assert_eq!(store.calls(StoreOperation::Update), 1);
}

#[tokio::test]
async fn test_short_first_message_is_title_verbatim() {
    let store = InMemoryConversationStore::new();
    let chat = controller(&store);
    chat.create_conversation(ChatSettings::default()).await.unwrap();

    chat.send_message("Hi").await;
    chat.settle().await;
    assert_eq!(chat.snapshot().active_title(), Some("Hi"));
}

#[tokio::test]
async fn test_later_exchanges_keep_title() {
    let store = InMemoryConversationStore::new();
    store.seed("Chosen title", vec![Message::user("first"), Message::assistant("ok")]);
    let chat = controller(&store);
    chat.load().await.unwrap();

    chat.send_message("second").await;
    chat.settle().await;
    assert_eq!(chat.snapshot().active_title(), Some("Chosen title"));
    assert_eq!(store.calls(StoreOperation::Update), 0);
}

#[tokio::test]
async fn test_title_persist_failure_keeps_displayed_title() {
    let store = InMemoryConversationStore::new();
    store.fail(StoreOperation::Update);
    let chat = controller(&store);
    chat.create_conversation(ChatSettings::default()).await.unwrap();

    chat.send_message("Hello there").await;
    chat.settle().await;
    assert_eq!(chat.snapshot().active_title(), Some("Hello there"));
}
