use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use taskboard_attachments::AttachmentRef;
use taskboard_attachments::ReconcileError;
use taskboard_attachments::ReconcileWarning;
use taskboard_attachments::SlotKey;
use taskboard_attachments_api::RecordError;
use taskboard_attachments_api::TaskFields;

use super::harness;
use super::refs;
use super::set_of;

#[tokio::test]
async fn unchanged_set_issues_no_blob_operations() {
    let h = harness(&["a", "b"]);
    let s = set_of(&["a", "b"]);

    let outcome = h
        .reconciler
        .reconcile(&h.task, &s, &s, &TaskFields::default())
        .await
        .unwrap();

    assert_eq!(outcome.ordered_refs, refs(&["a", "b"]));
    assert!(outcome.warnings.is_empty());
    assert_eq!(h.blobs.upload_calls(), 0);
    assert!(h.blobs.delete_requests().is_empty());
    assert_eq!(h.records.updates().len(), 1);
    assert_eq!(h.records.record(&h.task).unwrap().ordered_refs, refs(&["a", "b"]));
}

#[tokio::test]
async fn dropped_ref_is_deleted_and_pending_upload_takes_its_place() {
    let h = harness(&["a", "b"]);
    let initial = set_of(&["a", "b"]);
    let mut edited = initial.clone();
    edited.remove(&SlotKey::Persisted(AttachmentRef::new("a")));
    edited.add(b"x".to_vec(), "image/png").unwrap();

    let outcome = h
        .reconciler
        .reconcile(&h.task, &initial, &edited, &TaskFields::default())
        .await
        .unwrap();

    let c = AttachmentRef::new("u1/mock-1");
    assert_eq!(outcome.ordered_refs, vec![AttachmentRef::new("b"), c.clone()]);
    assert!(outcome.warnings.is_empty());
    assert_eq!(h.blobs.delete_requests(), refs(&["a"]));
    assert!(!h.blobs.contains(&AttachmentRef::new("a")));
    assert_eq!(h.blobs.get(&c).unwrap().mime, "image/png");
    assert_eq!(outcome.record.ordered_refs, outcome.ordered_refs);
}

#[tokio::test]
async fn failed_upload_is_dropped_but_delete_still_happens() {
    let h = harness(&["a", "b"]);
    h.blobs.fail_uploads_of(b"x".to_vec());
    let initial = set_of(&["a", "b"]);
    let mut edited = set_of(&["b"]);
    let x = edited.add(b"x".to_vec(), "image/png").unwrap();

    let outcome = h
        .reconciler
        .reconcile(&h.task, &initial, &edited, &TaskFields::default())
        .await
        .unwrap();

    assert_eq!(outcome.ordered_refs, refs(&["b"]));
    assert_eq!(outcome.warnings.len(), 1);
    assert_matches!(
        &outcome.warnings[0],
        ReconcileWarning::Upload { local_id, .. } if SlotKey::Local(*local_id) == x.key()
    );
    assert!(!h.blobs.contains(&AttachmentRef::new("a")));
    assert_eq!(h.records.record(&h.task).unwrap().ordered_refs, refs(&["b"]));
}

#[tokio::test]
async fn upload_and_delete_failures_are_both_reported_and_record_is_written() {
    let h = harness(&["a", "b"]);
    h.blobs.fail_uploads_of(b"x".to_vec());
    h.blobs.fail_deletes_of(AttachmentRef::new("a"));
    let initial = set_of(&["a", "b"]);
    let mut edited = set_of(&["b"]);
    edited.add(b"x".to_vec(), "image/png").unwrap();
    edited.add(b"y".to_vec(), "image/gif").unwrap();

    let outcome = h
        .reconciler
        .reconcile(&h.task, &initial, &edited, &TaskFields::default())
        .await
        .unwrap();

    assert_eq!(
        outcome.ordered_refs,
        vec![AttachmentRef::new("b"), AttachmentRef::new("u1/mock-1")]
    );
    assert!(outcome.has_warnings());
    assert_eq!(outcome.warnings.len(), 2);
    assert!(
        outcome
            .warnings
            .iter()
            .any(|w| matches!(w, ReconcileWarning::Delete { attachment_ref, .. } if attachment_ref.as_str() == "a"))
    );
    assert!(
        outcome
            .warnings
            .iter()
            .any(|w| matches!(w, ReconcileWarning::Upload { .. }))
    );
    // The blob whose delete failed is left in place.
    assert!(h.blobs.contains(&AttachmentRef::new("a")));
    assert_eq!(h.records.updates().len(), 1);
}

#[tokio::test]
async fn readded_file_is_always_uploaded_again() {
    let h = harness(&["a"]);
    let initial = set_of(&["a"]);
    let mut edited = initial.clone();
    let first = edited.add(b"same".to_vec(), "image/png").unwrap();
    edited.remove(&first.key());
    let second = edited.add(b"same".to_vec(), "image/png").unwrap();
    assert_ne!(first.key(), second.key());

    let outcome = h
        .reconciler
        .reconcile(&h.task, &initial, &edited, &TaskFields::default())
        .await
        .unwrap();

    assert_eq!(h.blobs.upload_calls(), 1);
    assert_eq!(
        outcome.ordered_refs,
        vec![AttachmentRef::new("a"), AttachmentRef::new("u1/mock-1")]
    );
}

#[tokio::test]
async fn reordered_mixed_set_keeps_post_reorder_order() {
    let h = harness(&["a", "b", "c"]);
    let initial = set_of(&["a", "b", "c"]);
    let mut edited = initial.clone();
    let x = edited.add(b"x".to_vec(), "image/png").unwrap();
    let y = edited.add(b"y".to_vec(), "image/png").unwrap();
    // [a, b, c, x, y] -> [y, c, a, x, b]
    edited.reorder(&y.key(), 0);
    edited.reorder(&SlotKey::Persisted(AttachmentRef::new("c")), 1);
    edited.reorder(&SlotKey::Persisted(AttachmentRef::new("b")), 9);
    assert_eq!(edited.position(&x.key()), Some(3));

    let outcome = h
        .reconciler
        .reconcile(&h.task, &initial, &edited, &TaskFields::default())
        .await
        .unwrap();

    let y_ref = h
        .blobs
        .get(&AttachmentRef::new("u1/mock-1"))
        .map(|blob| blob.payload);
    let x_ref = h
        .blobs
        .get(&AttachmentRef::new("u1/mock-2"))
        .map(|blob| blob.payload);
    // Uploads run concurrently, so map each new ref back through its payload.
    let (y_new, x_new) = if y_ref.as_deref() == Some(b"y".as_slice()) {
        ("u1/mock-1", "u1/mock-2")
    } else {
        assert_eq!(x_ref.as_deref(), Some(b"y".as_slice()));
        ("u1/mock-2", "u1/mock-1")
    };
    assert_eq!(outcome.ordered_refs, refs(&[y_new, "c", "a", x_new, "b"]));
    assert!(h.blobs.delete_requests().is_empty());
}

#[tokio::test]
async fn record_failure_aborts_and_reports_orphans() {
    let h = harness(&["a", "b"]);
    h.records
        .fail_next_update(RecordError::Transport("connection reset".to_string()));
    let initial = set_of(&["a", "b"]);
    let mut edited = set_of(&["b"]);
    edited.add(b"x".to_vec(), "image/png").unwrap();

    let err = h
        .reconciler
        .reconcile(&h.task, &initial, &edited, &TaskFields::default())
        .await
        .unwrap_err();

    let ReconcileError::Record {
        error,
        orphaned_refs,
        warnings,
    } = err;
    assert_eq!(error, RecordError::Transport("connection reset".to_string()));
    assert_eq!(orphaned_refs, refs(&["u1/mock-1"]));
    assert!(warnings.is_empty());
    // Nothing is rolled back: the delete happened, the upload is still stored,
    // and the record keeps its previous refs.
    assert!(!h.blobs.contains(&AttachmentRef::new("a")));
    assert!(h.blobs.contains(&AttachmentRef::new("u1/mock-1")));
    assert_eq!(h.records.record(&h.task).unwrap().ordered_refs, refs(&["a", "b"]));

    let still_failing = h.reconciler.cleanup_orphans(&orphaned_refs).await;
    assert!(still_failing.is_empty());
    assert_eq!(h.blobs.object_count(), 1);
}

#[tokio::test]
async fn cleanup_orphans_returns_refs_that_could_not_be_deleted() {
    let h = harness(&["a", "b"]);
    h.blobs.fail_deletes_of(AttachmentRef::new("b"));

    let failed = h.reconciler.cleanup_orphans(&refs(&["a", "b"])).await;

    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, AttachmentRef::new("b"));
}
