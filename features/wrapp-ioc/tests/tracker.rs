mod common;

use pretty_assertions::assert_eq;
use tracing::Level;
use wrapp_ioc::tracker::OperationTracker;

#[test]
fn failures_are_logged_once_with_the_operation_trace() {
    let tracker = OperationTracker::new();
    let (result, logged) = common::capture_events(Level::ERROR, || {
        tracker.invoke("Building 'Outer'", || {
            tracker.invoke("Building 'Inner'", || Err::<(), _>("broken".to_string()))
        })
    });

    assert_eq!(result, Err("broken".to_string()));
    assert_eq!(logged.len(), 1, "{logged:?}");
    assert_eq!(logged[0].message, "Operation failed: broken");
    assert_eq!(
        logged[0].field("operations"),
        Some("[ 1] Building 'Outer'\n[ 2] Building 'Inner'")
    );
}

#[test]
fn each_top_level_failure_is_logged() {
    let tracker = OperationTracker::new();
    let ((), logged) = common::capture_events(Level::ERROR, || {
        for attempt in ["first", "second"] {
            let _ = tracker.invoke(format!("Attempt {attempt}"), || Err::<(), _>(attempt));
        }
        tracker.run("Quiet", || ());
    });

    let messages: Vec<&str> = logged.iter().map(|event| event.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["Operation failed: first", "Operation failed: second"]
    );
    assert_eq!(logged[1].field("operations"), Some("[ 1] Attempt second"));
}
