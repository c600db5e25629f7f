use std::sync::Arc;
use std::time::Duration;

use todo_dispatch::prelude::*;
use todo_dispatch::testing::{EventRecorder, WidgetHarness};
use todo_dispatch::{assert_emitted, assert_not_emitted, count_emitted};

#[test]
fn test_shopping_list_session() {
    let harness = WidgetHarness::instant();
    let widget = &harness.widget;

    widget.publish(TodoEvent::AddTodo("milk".into()));
    widget.publish(TodoEvent::AddTodo("eggs".into()));
    let report = widget.publish(TodoEvent::AddTodo("milk".into()));

    assert!(!report.is_clean());
    assert_eq!(widget.keys(), vec!["milk", "eggs"]);
    let events = harness.recorder.events();
    assert_eq!(
        count_emitted!(events, TodoEvent::Toast(m) if m == "error: todo milk exists"),
        1
    );

    widget.set_done("milk", true).unwrap();
    widget.publish(TodoEvent::RemoveChecked);
    assert_eq!(widget.keys(), vec!["eggs"]);

    widget.publish(TodoEvent::AllClear);
    assert!(widget.keys().is_empty());
    assert!(harness.view.roots(NodeKind::TodoItem).is_empty());

    let events = harness.recorder.events();
    assert_emitted!(events, TodoEvent::DoneStateChanged { key, done: true } if key == "milk");
    assert_emitted!(events, TodoEvent::Toast(m) if m == "disconnected todo eggs");
}

#[test]
fn test_removed_item_ignores_bulk_events() {
    let harness = WidgetHarness::instant();
    let widget = &harness.widget;
    let x = widget.add("x").unwrap();
    let y = widget.add("y").unwrap();
    y.set_done(true).unwrap();

    widget.remove("x");
    harness.recorder.clear();
    widget.publish(TodoEvent::RenameTodo(RenameTransaction::new("x", "z")));
    widget.publish(TodoEvent::RemoveChecked);

    assert_eq!(x.key(), "x");
    assert_eq!(x.state(), LifecycleState::Disposed);
    assert!(widget.keys().is_empty());
    let events = harness.recorder.events();
    assert_not_emitted!(events, TodoEvent::Toast(m) if m.contains("todo z"));
    assert_emitted!(events, TodoEvent::Toast(m) if m == "removing todo y");
}

#[test]
fn test_rename_then_reuse_old_key() {
    let harness = WidgetHarness::instant();
    let widget = &harness.widget;
    widget.add("milk").unwrap();

    widget.rename("milk", "oat milk").unwrap();
    widget.add("milk").unwrap();

    assert_eq!(widget.keys(), vec!["oat milk", "milk"]);
    assert_eq!(
        harness.view.texts(NodeKind::TodoItem),
        vec!["oat milk", "milk"]
    );
}

#[test]
fn test_rename_to_empty_removes_item() {
    let harness = WidgetHarness::instant();
    harness.widget.add("milk").unwrap();
    harness.widget.add("eggs").unwrap();

    harness.widget.rename("milk", "").unwrap();

    assert_eq!(harness.widget.keys(), vec!["eggs"]);
}

#[tokio::test(start_paused = true)]
async fn test_animated_reorder_and_removal() {
    let harness = WidgetHarness::animated();
    let widget = &harness.widget;
    for key in ["a", "b", "c"] {
        widget.add(key).unwrap();
    }
    harness.settle().await;

    assert!(widget.move_item("a", Direction::Down).await.is_moved());
    assert_eq!(widget.keys(), vec!["b", "a", "c"]);
    assert_eq!(widget.move_item("c", Direction::Down).await, MoveOutcome::Boundary);

    assert!(widget.drop_before("c", "b").is_moved());
    assert_eq!(widget.keys(), vec!["c", "b", "a"]);

    let b = widget.controller("b").unwrap();
    widget.remove("b");
    assert_eq!(widget.keys(), vec!["c", "a"]);
    assert_eq!(b.state(), LifecycleState::Removing);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(b.state(), LifecycleState::Disposed);
    assert_eq!(harness.view.texts(NodeKind::TodoItem), vec!["a", "c"]);

    harness.settle().await;
    assert_eq!(widget.toasts().active(), 0);
    let toasts = harness.recorder.toasts();
    assert!(toasts.contains(&"moving todo a down".to_string()));
    assert!(toasts.contains(&"moving todo c to before b".to_string()));
    assert!(!toasts.iter().any(|t| t == "moving todo c down"));
}

#[test]
fn test_event_log_alongside_recorder() {
    let recorder = EventRecorder::new();
    let log = EventLog::new(EventLogConfig::new(
        8,
        EventLogFilter::new(None, Some("toast")),
    ));
    let mut middleware = ComposedMiddleware::<TodoEvent>::new();
    middleware.add(recorder.clone()).add(log.clone());

    let widget = TodoWidget::with_bus(
        Arc::new(EventBus::with_middleware(middleware)),
        Arc::new(MemoryView::new()),
        WidgetConfig::default().with_reduced_motion(true),
    );
    widget.publish(TodoEvent::AddTodo("milk".into()));
    widget.publish(TodoEvent::AddTodo("milk".into()));

    let logged: Vec<_> = log.entries().iter().map(|e| e.name).collect();
    assert_eq!(logged, vec!["addtodo", "addtodo"]);
    assert_eq!(log.entries()[1].failures, 1);
    assert!(recorder.count(names::TOAST) >= 2);
}

#[test]
fn test_config_from_json_drives_widget() {
    let config = WidgetConfig::from_json(r#"{"transition_ms": 0, "toast_history": 1}"#).unwrap();
    let harness = WidgetHarness::new(config);

    harness.widget.add("milk").unwrap();
    harness.widget.add("eggs").unwrap();

    assert_eq!(harness.widget.toasts().history(), vec!["connecting todo eggs"]);
}
