use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use taskboard_attachments::AttachmentError;
use taskboard_attachments::AttachmentRef;
use taskboard_attachments::DragReorderController;
use taskboard_attachments::EditSession;
use taskboard_attachments::MAX_ATTACHMENTS;
use taskboard_attachments::Point;
use taskboard_attachments::SlotKey;
use taskboard_attachments::SlotRect;
use taskboard_attachments_api::OwnerId;
use taskboard_attachments_api::Priority;
use taskboard_attachments_api::TaskId;

use super::harness;
use super::refs;

#[tokio::test]
async fn cancelled_session_touches_nothing() {
    let h = harness(&["a", "b"]);
    let record = h.records.record(&h.task).unwrap();
    let mut session = EditSession::open(&record).unwrap();
    session
        .attachments_mut()
        .remove(&SlotKey::Persisted(AttachmentRef::new("a")));
    session.attachments_mut().add(b"x".to_vec(), "image/png").unwrap();
    assert!(session.is_dirty());

    session.cancel();

    assert_eq!(h.blobs.upload_calls(), 0);
    assert!(h.blobs.delete_requests().is_empty());
    assert!(h.records.updates().is_empty());
    assert_eq!(h.records.record(&h.task).unwrap().ordered_refs, refs(&["a", "b"]));
}

#[tokio::test]
async fn commit_saves_fields_with_dragged_order() {
    let h = harness(&["a", "b", "c"]);
    let record = h.records.record(&h.task).unwrap();
    let mut session = EditSession::open(&record).unwrap();
    assert!(!session.is_dirty());
    session.fields_mut().title = "Renovate kitchen".to_string();
    session.fields_mut().priority = Priority::High;

    let layout: Vec<SlotRect> = (0..3)
        .map(|i| SlotRect::new(0.0, i as f32 * 80.0, 200.0, 72.0))
        .collect();
    let mut drag = DragReorderController::new();
    drag.grab(SlotKey::Persisted(AttachmentRef::new("c")));
    assert!(drag.hover(Point::new(100.0, 10.0), &layout, session.attachments_mut()));
    drag.release();
    assert!(session.is_dirty());
    assert!(session.plan().is_noop());

    let outcome = session.commit(&h.reconciler).await.unwrap();

    assert_eq!(outcome.ordered_refs, refs(&["c", "a", "b"]));
    let saved = h.records.record(&h.task).unwrap();
    assert_eq!(saved.fields.title, "Renovate kitchen");
    assert_eq!(saved.fields.priority, Priority::High);
    assert_eq!(saved.ordered_refs, refs(&["c", "a", "b"]));
    assert!(saved.updated_at.is_some());

    let reopened = outcome.into_attachment_set();
    assert_eq!(reopened.pending_count(), 0);
    assert_eq!(reopened.persisted_refs().cloned().collect::<Vec<_>>(), refs(&["c", "a", "b"]));
}

#[tokio::test]
async fn session_rejects_tenth_attachment() {
    let h = harness(&[]);
    let record = h.records.record(&h.task).unwrap();
    let mut session = EditSession::open(&record).unwrap();
    for i in 0..MAX_ATTACHMENTS {
        session
            .attachments_mut()
            .add(vec![i as u8], "image/png")
            .unwrap();
    }
    let err = session
        .attachments_mut()
        .add(vec![42], "image/png")
        .unwrap_err();
    assert_eq!(
        err,
        AttachmentError::CapacityExceeded {
            max: MAX_ATTACHMENTS
        }
    );
    assert_eq!(session.attachments().len(), MAX_ATTACHMENTS);
}

#[tokio::test]
async fn opening_an_overfull_record_is_rejected() {
    let h = harness(&[]);
    let too_many: Vec<String> = (0..=MAX_ATTACHMENTS).map(|i| format!("r{i}")).collect();
    let too_many: Vec<&str> = too_many.iter().map(String::as_str).collect();
    let record = h
        .records
        .seed(&TaskId::new("t2"), &OwnerId::new("u1"), &too_many);

    assert_matches!(
        EditSession::open(&record),
        Err(AttachmentError::CapacityExceeded { .. })
    );
}
