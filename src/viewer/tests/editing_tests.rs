//! Optimistic edits, debounced saves, rollback and unmount.

use super::*;

fn network_error() -> RequestError {
    RequestError::network("connection reset")
}

fn labels_a() -> Vec<Label> {
    vec![label("a", 0.25, 0.25)]
}

fn position_of(viewer: &ImageViewer, id: &str) -> Point {
    viewer.label(&LabelId::new(id)).unwrap().position()
}

fn status_of(viewer: &ImageViewer, id: &str) -> LabelStatus {
    viewer.label(&LabelId::new(id)).unwrap().status
}

#[test]
fn test_marker_drag_saves_position_immediately() {
    let (mut viewer, now) = standard_viewer(labels_a());
    drag(
        &mut viewer,
        Point::new(200.0, 150.0),
        Point::new(400.0, 300.0),
        now,
    );

    let request = single_request(&mut viewer);
    assert_eq!(
        request.body,
        RequestBody::UpdatePosition {
            label: LabelId::new("a"),
            x: 0.5,
            y: 0.5,
        }
    );
    assert_eq!(status_of(&viewer, "a"), LabelStatus::Saving);
    assert_eq!(viewer.position_phase(&"a".into()), Some(FieldPhase::Saving));
    // Dragging a marker does not pan
    assert_eq!(viewer.state().pan_x, 0.0);

    viewer.complete(request.id, Ok(RequestOutcome::Done)).unwrap();
    assert_eq!(status_of(&viewer, "a"), LabelStatus::Pending);
    assert_eq!(viewer.position_phase(&"a".into()), Some(FieldPhase::Clean));
}

#[test]
fn test_failed_move_snaps_back() {
    let (mut viewer, now) = standard_viewer(labels_a());
    drag(
        &mut viewer,
        Point::new(200.0, 150.0),
        Point::new(400.0, 300.0),
        now,
    );
    let request = single_request(&mut viewer);

    viewer.complete(request.id, Err(network_error())).unwrap();

    assert_eq!(position_of(&viewer, "a"), Point::new(0.25, 0.25));
    assert_eq!(status_of(&viewer, "a"), LabelStatus::Error);
    let notices = viewer.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].label, Some(LabelId::new("a")));
    assert!(notices[0].message.contains("connection reset"));
}

#[test]
fn test_superseded_move_failure_does_not_reset() {
    let (mut viewer, now) = standard_viewer(labels_a());
    drag(
        &mut viewer,
        Point::new(200.0, 150.0),
        Point::new(400.0, 300.0),
        now,
    );
    let r1 = single_request(&mut viewer);
    drag(
        &mut viewer,
        Point::new(400.0, 300.0),
        Point::new(600.0, 450.0),
        now,
    );
    let r2 = single_request(&mut viewer);

    viewer.complete(r2.id, Ok(RequestOutcome::Done)).unwrap();
    viewer.complete(r1.id, Err(network_error())).unwrap();

    assert_eq!(position_of(&viewer, "a"), Point::new(0.75, 0.75));
    assert_eq!(status_of(&viewer, "a"), LabelStatus::Pending);
    assert!(viewer.take_notices().is_empty());
}

#[test]
fn test_older_move_landing_after_newer_failure_shows_server_position() {
    let (mut viewer, now) = standard_viewer(labels_a());
    drag(
        &mut viewer,
        Point::new(200.0, 150.0),
        Point::new(400.0, 300.0),
        now,
    );
    let r1 = single_request(&mut viewer);
    drag(
        &mut viewer,
        Point::new(400.0, 300.0),
        Point::new(600.0, 450.0),
        now,
    );
    let r2 = single_request(&mut viewer);

    viewer.complete(r2.id, Err(network_error())).unwrap();
    assert_eq!(position_of(&viewer, "a"), Point::new(0.25, 0.25));
    assert_eq!(status_of(&viewer, "a"), LabelStatus::Error);

    viewer.complete(r1.id, Ok(RequestOutcome::Done)).unwrap();

    // The server holds the first move, and so does the screen
    assert_eq!(position_of(&viewer, "a"), Point::new(0.5, 0.5));
    assert_eq!(status_of(&viewer, "a"), LabelStatus::Pending);
    assert_eq!(viewer.position_phase(&"a".into()), Some(FieldPhase::Clean));
    assert_eq!(viewer.in_flight_count(), 0);
    assert_eq!(viewer.take_notices().len(), 1);
}

#[test]
fn test_older_text_save_landing_after_newer_failure_restores_text() {
    let (mut viewer, now) = standard_viewer(labels_a());
    let edit = |text: &str| ViewerInput::EditText {
        id: LabelId::new("a"),
        field: TextField::Translation,
        text: text.to_string(),
    };

    viewer.handle(edit("one"), now).unwrap();
    viewer.tick(after(now, 1000));
    let r1 = single_request(&mut viewer);
    viewer.handle(edit("two"), after(now, 1100)).unwrap();
    viewer.tick(after(now, 2000));
    let r2 = single_request(&mut viewer);

    viewer.complete(r2.id, Err(network_error())).unwrap();
    assert_eq!(viewer.label(&"a".into()).unwrap().translation, "");

    viewer.complete(r1.id, Ok(RequestOutcome::Done)).unwrap();
    assert_eq!(viewer.label(&"a".into()).unwrap().translation, "one");
    assert_eq!(status_of(&viewer, "a"), LabelStatus::Pending);
    assert_eq!(
        viewer.text_phase(&"a".into(), TextField::Translation),
        Some(FieldPhase::Clean)
    );
}

#[test]
fn test_failure_rolls_back_to_last_acknowledged_position() {
    let (mut viewer, now) = standard_viewer(labels_a());
    drag(
        &mut viewer,
        Point::new(200.0, 150.0),
        Point::new(400.0, 300.0),
        now,
    );
    let r1 = single_request(&mut viewer);
    viewer.complete(r1.id, Ok(RequestOutcome::Done)).unwrap();

    drag(
        &mut viewer,
        Point::new(400.0, 300.0),
        Point::new(600.0, 450.0),
        now,
    );
    let r2 = single_request(&mut viewer);
    viewer.complete(r2.id, Err(network_error())).unwrap();

    assert_eq!(position_of(&viewer, "a"), Point::new(0.5, 0.5));
}

#[test]
fn test_create_confirm_replaces_transient_id() {
    let (mut viewer, now) = standard_viewer(vec![]);
    tap(&mut viewer, PointerButton::Left, Point::new(400.0, 300.0), now);
    let create = single_request(&mut viewer);
    let transient = viewer.labels()[0].id.clone();
    assert_eq!(viewer.focused_id(), Some(&transient));

    viewer
        .complete(
            create.id,
            Ok(RequestOutcome::Created {
                server_id: LabelId::new("srv-1"),
            }),
        )
        .unwrap();

    assert!(viewer.label(&transient).is_none());
    assert_eq!(status_of(&viewer, "srv-1"), LabelStatus::Pending);
    assert_eq!(viewer.focused_id(), Some(&LabelId::new("srv-1")));
    assert_eq!(
        viewer.position_phase(&"srv-1".into()),
        Some(FieldPhase::Clean)
    );
}

#[test]
fn test_failed_create_removes_label() {
    let (mut viewer, now) = standard_viewer(vec![]);
    tap(&mut viewer, PointerButton::Right, Point::new(400.0, 300.0), now);
    let create = single_request(&mut viewer);

    viewer.complete(create.id, Err(network_error())).unwrap();

    assert!(viewer.labels().is_empty());
    assert!(viewer.focused_id().is_none());
    assert!(viewer.markers().is_empty());
    assert_eq!(viewer.take_notices().len(), 1);
}

#[test]
fn test_text_edits_are_debounced() {
    let (mut viewer, now) = standard_viewer(labels_a());
    let edit = |text: &str| ViewerInput::EditText {
        id: LabelId::new("a"),
        field: TextField::Translation,
        text: text.to_string(),
    };

    viewer.handle(edit("he"), now).unwrap();
    viewer.handle(edit("hello"), after(now, 300)).unwrap();
    assert_eq!(viewer.label(&"a".into()).unwrap().translation, "hello");
    assert!(viewer.has_pending_saves());
    assert_eq!(viewer.next_deadline(), Some(after(now, 1100)));

    viewer.tick(after(now, 900));
    assert!(viewer.take_requests().is_empty());

    viewer.tick(after(now, 1100));
    let request = single_request(&mut viewer);
    assert_eq!(
        request.body,
        RequestBody::UpdateText {
            label: LabelId::new("a"),
            field: TextField::Translation,
            text: "hello".to_string(),
        }
    );
    assert_eq!(
        viewer.text_phase(&"a".into(), TextField::Translation),
        Some(FieldPhase::Saving)
    );
    assert_eq!(
        viewer.text_phase(&"a".into(), TextField::Proofread),
        Some(FieldPhase::Clean)
    );
}

#[test]
fn test_failed_text_save_rolls_back() {
    let mut original = label("a", 0.25, 0.25);
    original.proofread = "checked".to_string();
    let (mut viewer, now) = standard_viewer(vec![original]);

    viewer
        .handle(
            ViewerInput::EditText {
                id: "a".into(),
                field: TextField::Proofread,
                text: "rechecked".to_string(),
            },
            now,
        )
        .unwrap();
    viewer.tick(after(now, 1000));
    let request = single_request(&mut viewer);

    viewer.complete(request.id, Err(network_error())).unwrap();

    assert_eq!(viewer.label(&"a".into()).unwrap().proofread, "checked");
    assert_eq!(
        viewer.text_phase(&"a".into(), TextField::Proofread),
        Some(FieldPhase::Error)
    );
    assert_eq!(viewer.take_notices().len(), 1);
}

#[test]
fn test_typing_during_save_blocks_text_rollback() {
    let (mut viewer, now) = standard_viewer(labels_a());
    let edit = |text: &str| ViewerInput::EditText {
        id: LabelId::new("a"),
        field: TextField::Translation,
        text: text.to_string(),
    };

    viewer.handle(edit("first"), now).unwrap();
    viewer.tick(after(now, 1000));
    let request = single_request(&mut viewer);
    viewer.handle(edit("first draft"), after(now, 1100)).unwrap();

    viewer.complete(request.id, Err(network_error())).unwrap();

    assert_eq!(viewer.label(&"a".into()).unwrap().translation, "first draft");
    assert!(viewer.take_notices().is_empty());
    assert!(viewer.has_pending_saves());
}

#[test]
fn test_edits_of_unconfirmed_label_wait_for_server_id() {
    let (mut viewer, now) = standard_viewer(vec![]);
    tap(&mut viewer, PointerButton::Left, Point::new(400.0, 300.0), now);
    let create = single_request(&mut viewer);
    let transient = viewer.labels()[0].id.clone();

    viewer
        .handle(
            ViewerInput::EditText {
                id: transient.clone(),
                field: TextField::Translation,
                text: "hi".to_string(),
            },
            now,
        )
        .unwrap();
    viewer.tick(after(now, 5000));
    assert!(viewer.take_requests().is_empty());

    viewer
        .complete(
            create.id,
            Ok(RequestOutcome::Created {
                server_id: LabelId::new("srv-7"),
            }),
        )
        .unwrap();
    viewer.tick(after(now, 5001));

    let request = single_request(&mut viewer);
    assert_eq!(
        request.body,
        RequestBody::UpdateText {
            label: LabelId::new("srv-7"),
            field: TextField::Translation,
            text: "hi".to_string(),
        }
    );
}

#[test]
fn test_delete_confirm_and_failure() {
    let (mut viewer, now) = standard_viewer(vec![label("a", 0.25, 0.25), label("b", 0.75, 0.75)]);

    tap(&mut viewer, PointerButton::Right, Point::new(200.0, 150.0), now);
    let delete_a = single_request(&mut viewer);
    tap(&mut viewer, PointerButton::Right, Point::new(600.0, 450.0), now);
    let delete_b = single_request(&mut viewer);

    viewer.complete(delete_a.id, Ok(RequestOutcome::Done)).unwrap();
    viewer.complete(delete_b.id, Err(network_error())).unwrap();

    assert_eq!(viewer.labels().len(), 1);
    assert_eq!(status_of(&viewer, "b"), LabelStatus::Pending);
    assert!(viewer.position_phase(&"a".into()).is_none());
    assert_eq!(viewer.take_notices().len(), 1);
}

#[test]
fn test_repeated_delete_is_sent_once() {
    let (mut viewer, now) = standard_viewer(labels_a());
    tap(&mut viewer, PointerButton::Right, Point::new(200.0, 150.0), now);
    tap(&mut viewer, PointerButton::Right, Point::new(200.0, 150.0), now);

    assert_eq!(viewer.take_requests().len(), 1);
}

#[test]
fn test_failed_toggle_restores_position_type() {
    let (mut viewer, now) = standard_viewer(labels_a());
    tap(&mut viewer, PointerButton::Middle, Point::new(200.0, 150.0), now);
    let request = single_request(&mut viewer);

    viewer.complete(request.id, Err(network_error())).unwrap();

    let restored = viewer.label(&"a".into()).unwrap();
    assert_eq!(restored.position_type, PositionType::In);
    assert_eq!(restored.status, LabelStatus::Error);
}

#[test]
fn test_unknown_request_is_an_error() {
    let (mut viewer, _) = standard_viewer(labels_a());
    assert_eq!(
        viewer.complete(RequestId(42), Ok(RequestOutcome::Done)),
        Err(ViewerError::UnknownRequest(RequestId(42)))
    );
}

#[test]
fn test_edit_of_unknown_label_is_an_error() {
    let (mut viewer, now) = standard_viewer(labels_a());
    let result = viewer.handle(
        ViewerInput::EditText {
            id: "missing".into(),
            field: TextField::Translation,
            text: "x".to_string(),
        },
        now,
    );
    assert_eq!(result, Err(ViewerError::UnknownLabel("missing".into())));
}

#[test]
fn test_unmount_flushes_pending_and_cancels_in_flight() {
    let (mut viewer, now) = standard_viewer(labels_a());
    drag(
        &mut viewer,
        Point::new(200.0, 150.0),
        Point::new(400.0, 300.0),
        now,
    );
    let in_flight = single_request(&mut viewer);
    viewer
        .handle(
            ViewerInput::EditText {
                id: "a".into(),
                field: TextField::Translation,
                text: "unsaved".to_string(),
            },
            now,
        )
        .unwrap();

    let flushed = viewer.unmount();
    assert_eq!(flushed.len(), 1);
    assert_eq!(
        flushed[0].body,
        RequestBody::UpdateText {
            label: LabelId::new("a"),
            field: TextField::Translation,
            text: "unsaved".to_string(),
        }
    );
    assert!(!viewer.is_mounted());
    assert_eq!(viewer.in_flight_count(), 0);

    // Late completions do not touch the unmounted viewer
    viewer.complete(in_flight.id, Err(network_error())).unwrap();
    assert_eq!(position_of(&viewer, "a"), Point::new(0.5, 0.5));
    assert!(viewer.take_notices().is_empty());

    assert_eq!(
        viewer.handle(ViewerInput::PinchEnd, now),
        Err(ViewerError::Unmounted)
    );
    assert!(viewer.unmount().is_empty());
}

#[test]
fn test_request_json_format() {
    let request = LabelRequest {
        id: RequestId(3),
        body: RequestBody::Delete {
            label: LabelId::new("a"),
        },
    };
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json, serde_json::json!({"id": 3, "op": "delete", "label": "a"}));
}
