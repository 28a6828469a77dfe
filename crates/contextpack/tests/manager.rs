use std::sync::Arc;

use kd_contextpack::ContextManager;
use kd_domain::config::{ContextConfig, MemoryEviction};
use kd_domain::conversation::{MessageContent, NewMessage};
use kd_domain::emotion::{CompanionReaction, EmotionalState};
use kd_providers::ScriptedEngine;
use kd_store::{ConversationStore, InMemoryStore};

struct Fixture {
    store: Arc<InMemoryStore>,
    engine: Arc<ScriptedEngine>,
    manager: ContextManager,
}

fn fixture(cfg: ContextConfig) -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let engine = Arc::new(ScriptedEngine::new());
    let manager = ContextManager::new(store.clone(), engine.clone(), cfg);
    Fixture {
        store,
        engine,
        manager,
    }
}

fn emotion(label: &str) -> EmotionalState {
    EmotionalState {
        primary: label.into(),
        ..EmotionalState::neutral()
    }
}

#[tokio::test]
async fn emotional_history_keeps_last_ten() {
    let f = fixture(ContextConfig::default());
    for i in 0..15 {
        f.manager
            .update_emotional_context("c1", &emotion("sadness"), &format!("m{i}"))
            .await
            .unwrap();
    }
    let ctx = f.store.get_context("c1").await.unwrap().unwrap();
    assert_eq!(ctx.emotional_history.len(), 10);
    assert_eq!(ctx.emotional_history[0].message_id, "m5");
    assert_eq!(ctx.emotional_history[9].message_id, "m14");
    assert_eq!(ctx.companion_reaction, CompanionReaction::Empathy);
}

#[tokio::test]
async fn reaction_lookup_is_fixed() {
    let f = fixture(ContextConfig::default());
    let cases = [
        ("joy", CompanionReaction::SharedJoy),
        ("anxiety", CompanionReaction::Calm),
        ("frustration", CompanionReaction::Calm),
        ("loneliness", CompanionReaction::Empathy),
        ("curious", CompanionReaction::Neutral),
    ];
    for (label, expected) in cases {
        let ctx = f
            .manager
            .update_emotional_context("c1", &emotion(label), "m")
            .await
            .unwrap();
        assert_eq!(ctx.companion_reaction, expected, "label {label}");
    }
}

#[tokio::test]
async fn extracted_memories_are_logged_and_folded() {
    let f = fixture(ContextConfig::default());
    let conv = f.store.create_conversation("u", "c").await.unwrap();
    let msg = f
        .store
        .append_message(NewMessage::user(&conv.id, MessageContent::text("I just adopted a cat called Miso")))
        .await
        .unwrap();
    f.engine.push_mini_reply(
        r#"{"memories":[{"kind":"fact","content":"Has a cat named Miso","importance":0.8}]}"#,
    );

    let kept = f
        .manager
        .extract_and_store_memory(&conv.id, &[msg])
        .await
        .unwrap();
    assert_eq!(kept, 1);
    assert_eq!(f.store.list_memories(&conv.id).await.unwrap().len(), 1);
    let ctx = f.store.get_context(&conv.id).await.unwrap().unwrap();
    assert_eq!(ctx.memories[0].content, "Has a cat named Miso");
}

#[tokio::test]
async fn recency_eviction_keeps_most_recent_twenty() {
    let f = fixture(ContextConfig {
        memory_eviction: MemoryEviction::Recency,
        ..ContextConfig::default()
    });
    let conv = f.store.create_conversation("u", "c").await.unwrap();
    let msg = f
        .store
        .append_message(NewMessage::user(&conv.id, MessageContent::text("lots of facts")))
        .await
        .unwrap();
    for batch in 0..5 {
        let items: Vec<String> = (0..5)
            .map(|i| format!(r#"{{"content":"fact {batch}-{i}","importance":0.9}}"#))
            .collect();
        f.engine
            .push_mini_reply(format!(r#"{{"memories":[{}]}}"#, items.join(",")));
        f.manager
            .extract_and_store_memory(&conv.id, std::slice::from_ref(&msg))
            .await
            .unwrap();
    }
    let ctx = f.store.get_context(&conv.id).await.unwrap().unwrap();
    assert_eq!(ctx.memories.len(), 20);
    assert_eq!(ctx.memories[0].content, "fact 1-0");
    assert_eq!(f.store.list_memories(&conv.id).await.unwrap().len(), 25);
}

#[tokio::test]
async fn extraction_failure_adds_nothing() {
    let f = fixture(ContextConfig::default());
    let conv = f.store.create_conversation("u", "c").await.unwrap();
    let msg = f
        .store
        .append_message(NewMessage::user(&conv.id, MessageContent::text("hello")))
        .await
        .unwrap();
    assert!(f
        .manager
        .extract_and_store_memory(&conv.id, &[msg])
        .await
        .is_err());
    assert!(f.store.list_memories(&conv.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn topic_refresh_rotates_history() {
    let f = fixture(ContextConfig::default());
    let conv = f.store.create_conversation("u", "c").await.unwrap();
    let msg = f
        .store
        .append_message(NewMessage::user(&conv.id, MessageContent::text("the concert was great")))
        .await
        .unwrap();
    f.engine.push_mini_reply(r#"{"topic":"weekend plans"}"#);
    f.engine.push_mini_reply(r#"{"topic":"live music"}"#);

    for _ in 0..2 {
        f.manager
            .refresh_intelligence(&conv.id, std::slice::from_ref(&msg))
            .await
            .unwrap();
    }
    let ctx = f.store.get_context(&conv.id).await.unwrap().unwrap();
    assert_eq!(ctx.current_topic.as_deref(), Some("live music"));
    assert_eq!(ctx.topic_history, vec!["weekend plans".to_string()]);
}

#[tokio::test]
async fn record_turn_counts_and_progresses() {
    let f = fixture(ContextConfig::default());
    let before = f.manager.get_or_create_context("c1").await.unwrap();
    let after = f.manager.record_turn("c1", &emotion("joy")).await.unwrap();
    assert_eq!(after.turn_count, before.turn_count + 1);
    assert!(after.trust_level > before.trust_level);
}
