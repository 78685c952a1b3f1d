use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use taskboard_attachments::AttachmentRef;
use taskboard_attachments::ReconcileWarning;
use taskboard_attachments::Reconciler;
use taskboard_attachments::SlotKey;
use taskboard_attachments_api::BlobStore;
use taskboard_attachments_api::DeleteError;
use taskboard_attachments_api::DeleteOutcome;
use taskboard_attachments_api::OwnerId;
use taskboard_attachments_api::TaskFields;
use taskboard_attachments_api::TaskId;
use taskboard_attachments_api::UploadError;
use taskboard_attachments_client::MockRecordStore;
use tokio::sync::Notify;

use super::refs;
use super::set_of;

/// Acknowledges uploads but reports nothing back from `delete`.
struct SilentDeletes;

#[async_trait::async_trait]
impl BlobStore for SilentDeletes {
    async fn upload(
        &self,
        owner: &OwnerId,
        _payload: Bytes,
        _mime_hint: &str,
    ) -> Result<AttachmentRef, UploadError> {
        Ok(AttachmentRef::new(format!("{owner}/silent")))
    }

    fn resolve_public_ref(&self, attachment_ref: &AttachmentRef) -> String {
        attachment_ref.to_string()
    }

    async fn delete(&self, _refs: &[AttachmentRef]) -> Vec<DeleteOutcome> {
        Vec::new()
    }
}

/// Each side of a batch waits for the other to start, so the batches only
/// finish when they are in flight at the same time.
#[derive(Default)]
struct Rendezvous {
    upload_started: Notify,
    delete_started: Notify,
}

#[async_trait::async_trait]
impl BlobStore for Rendezvous {
    async fn upload(
        &self,
        owner: &OwnerId,
        _payload: Bytes,
        _mime_hint: &str,
    ) -> Result<AttachmentRef, UploadError> {
        self.upload_started.notify_one();
        self.delete_started.notified().await;
        Ok(AttachmentRef::new(format!("{owner}/met")))
    }

    fn resolve_public_ref(&self, attachment_ref: &AttachmentRef) -> String {
        attachment_ref.to_string()
    }

    async fn delete(&self, refs: &[AttachmentRef]) -> Vec<DeleteOutcome> {
        self.delete_started.notify_one();
        self.upload_started.notified().await;
        refs.iter().map(|r| (r.clone(), Ok(()))).collect()
    }
}

fn reconciler_over(blobs: Arc<dyn BlobStore>, seeded: &[&str]) -> (Reconciler, TaskId) {
    let owner = OwnerId::new("u1");
    let task = TaskId::new("t1");
    let records = Arc::new(MockRecordStore::new());
    records.seed(&task, &owner, seeded);
    (Reconciler::new(blobs, records, owner), task)
}

#[tokio::test]
async fn delete_without_reported_outcome_is_a_warning() {
    let (reconciler, task) = reconciler_over(Arc::new(SilentDeletes), &["a"]);
    let initial = set_of(&["a"]);
    let mut edited = initial.clone();
    edited.remove(&SlotKey::Persisted(AttachmentRef::new("a")));

    let outcome = reconciler
        .reconcile(&task, &initial, &edited, &TaskFields::default())
        .await
        .unwrap();

    assert!(outcome.ordered_refs.is_empty());
    assert_eq!(
        outcome.warnings,
        vec![ReconcileWarning::Delete {
            attachment_ref: AttachmentRef::new("a"),
            error: DeleteError::new("no outcome reported by blob store"),
        }]
    );
}

#[tokio::test]
async fn delete_and_upload_batches_are_in_flight_together() {
    let (reconciler, task) = reconciler_over(Arc::new(Rendezvous::default()), &["a"]);
    let initial = set_of(&["a"]);
    let mut edited = initial.clone();
    edited.remove(&SlotKey::Persisted(AttachmentRef::new("a")));
    edited.add(b"new".to_vec(), "image/png").unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        reconciler.reconcile(&task, &initial, &edited, &TaskFields::default()),
    )
    .await
    .expect("delete and upload batches ran one after the other")
    .unwrap();

    assert_eq!(outcome.ordered_refs, refs(&["u1/met"]));
    assert!(outcome.warnings.is_empty());
}
