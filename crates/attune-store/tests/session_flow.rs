//! Store attached to a live dispatcher, driven by session events.

use std::sync::Arc;

use attune_client::{EventDispatcher, SessionEvent};
use attune_core::InboundMessage;
use attune_store::{LayoutKind, SessionStore, TaskFilter, TaskGrouping};
use serde_json::json;

fn publish(dispatcher: &EventDispatcher, raw: serde_json::Value) {
    let event = SessionEvent::Message(InboundMessage::parse(&raw.to_string()).unwrap());
    let _ = dispatcher.publish(event.name(), &event);
}

fn setup() -> (EventDispatcher, Arc<SessionStore>) {
    let dispatcher: EventDispatcher = EventDispatcher::new();
    let store = Arc::new(SessionStore::new());
    let _subscription = store.attach(&dispatcher);
    (dispatcher, store)
}

#[test]
fn each_chat_response_adds_exactly_one_assistant_message() {
    let (dispatcher, store) = setup();
    for n in 0..5 {
        publish(&dispatcher, json!({"type": "chat_response", "response": format!("r{n}")}));
        assert_eq!(store.messages().len(), n + 1);
    }
}

#[test]
fn duplicate_task_pushes_produce_distinct_entries() {
    let (dispatcher, store) = setup();
    let push = json!({
        "type": "chat_response",
        "response": "added",
        "tasks": {"tasks": [{"title": "Call dentist", "description": "before Friday"}]}
    });
    publish(&dispatcher, push.clone());
    publish(&dispatcher, push);

    let tasks = store.tasks();
    assert_eq!(tasks.len(), 2);
    assert_ne!(tasks[0].id, tasks[1].id);
    assert_eq!(tasks[0].draft.description, tasks[1].draft.description);
}

#[test]
fn empty_ui_config_resolves_without_error() {
    let (_dispatcher, store) = setup();
    let view = store.resolver().resolve();
    assert_eq!(view.layout, LayoutKind::Standard);
    assert_eq!(view.animation.container_duration, 0.0);
    assert_eq!(view.animation.item_duration, 0.0);
    assert!(view.chat_interface.is_empty());
    assert!(view.task_display.is_empty());
    assert!(view.personality_panel.is_empty());
}

#[test]
fn pushed_ui_config_flows_to_resolver() {
    let (dispatcher, store) = setup();
    publish(
        &dispatcher,
        json!({"type": "ui_config", "ui_config": {
            "layout": {"type": "minimal"},
            "components": {"taskDisplay": {"groupBy": "priority"}}
        }}),
    );
    // A later partial push replaces only `layout`.
    publish(&dispatcher, json!({"type": "ui_config", "layout": {"type": "detailed"}}));

    let resolver = store.resolver();
    assert_eq!(resolver.layout(), LayoutKind::Detailed);
    assert_eq!(resolver.task_grouping(), TaskGrouping::Priority);
}

#[test]
fn toggled_tasks_move_between_filters() {
    let (dispatcher, store) = setup();
    publish(
        &dispatcher,
        json!({"type": "chat_response", "response": "", "tasks": {"tasks": [
            {"title": "a", "priority": "high"},
            {"title": "b", "category": "home"}
        ]}}),
    );
    let id = store.tasks()[0].id.clone();
    let _ = store.toggle_task_status(&id).unwrap();

    assert_eq!(store.filtered_tasks(TaskFilter::Completed).len(), 1);
    assert_eq!(store.filtered_tasks(TaskFilter::Pending).len(), 1);

    let groups = store.grouped_tasks(TaskFilter::All, TaskGrouping::Category);
    let keys: Vec<_> = groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, ["Other", "home"]);
    assert_eq!(store.task_counts().high_priority, 1);
}

#[test]
fn lifecycle_and_unknown_events() {
    let (dispatcher, store) = setup();
    let _ = dispatcher.publish("connected", &SessionEvent::Connected);
    assert!(store.connection().connected);

    publish(&dispatcher, json!({"type": "typing"}));
    assert!(store.messages().is_empty());

    let exhausted = SessionEvent::ReconnectExhausted { attempts: 5 };
    let _ = dispatcher.publish(exhausted.name(), &exhausted);
    assert!(!store.connection().connected);
    assert!(store.connection().error.is_some());
}

#[test]
fn mistyped_task_block_still_records_the_reply() {
    let (dispatcher, store) = setup();
    publish(&dispatcher, json!({"type": "chat_response", "response": "first"}));
    publish(
        &dispatcher,
        json!({"type": "chat_response", "response": "nothing to add", "tasks": "I found no tasks"}),
    );
    publish(
        &dispatcher,
        json!({"type": "chat_response", "response": "still nothing", "tasks": {"tasks": null}}),
    );

    let contents: Vec<_> = store.messages().into_iter().map(|m| m.content).collect();
    assert_eq!(contents, ["first", "nothing to add", "still nothing"]);
    assert!(store.tasks().is_empty());
}

#[test]
fn bad_field_does_not_discard_valid_siblings() {
    let (dispatcher, store) = setup();
    publish(
        &dispatcher,
        json!({
            "type": "chat_response",
            "response": null,
            "personality_profile": {"traits": {"openness": 0.9}}
        }),
    );
    assert_eq!(store.messages().len(), 1);
    assert_eq!(store.messages()[0].content, "");
    assert_eq!(store.trait_value("openness"), 0.9);

    publish(
        &dispatcher,
        json!({
            "type": "chat_response",
            "response": "layout changed",
            "personality_profile": "n/a",
            "ui_config": {"layout": {"type": "minimal"}}
        }),
    );
    assert_eq!(store.messages().len(), 2);
    assert_eq!(store.resolver().layout(), LayoutKind::Minimal);
    assert_eq!(store.trait_value("openness"), 0.9);
}

#[test]
fn null_ui_config_push_leaves_configuration_untouched() {
    let (dispatcher, store) = setup();
    publish(
        &dispatcher,
        json!({"type": "ui_config", "ui_config": {"layout": {"type": "detailed"}}}),
    );
    publish(&dispatcher, json!({"type": "ui_config", "ui_config": null}));

    let config = store.ui_config();
    assert!(config.get("ui_config").is_none());
    assert_eq!(config.as_map().len(), 1);
    assert_eq!(store.resolver().layout(), LayoutKind::Detailed);
    assert_eq!(store.last_message().as_deref(), Some("ui_config"));
}
