mod blob_batches;
mod reconcile;
mod session;

use std::sync::Arc;

use taskboard_attachments::AttachmentRef;
use taskboard_attachments::AttachmentSet;
use taskboard_attachments::Reconciler;
use taskboard_attachments_api::OwnerId;
use taskboard_attachments_api::TaskId;
use taskboard_attachments_client::MockBlobStore;
use taskboard_attachments_client::MockRecordStore;

pub(crate) struct Harness {
    pub blobs: Arc<MockBlobStore>,
    pub records: Arc<MockRecordStore>,
    pub reconciler: Reconciler,
    pub task: TaskId,
}

/// Blob store already holding `refs`, and a task record pointing at them.
pub(crate) fn harness(refs: &[&str]) -> Harness {
    let owner = OwnerId::new("u1");
    let task = TaskId::new("t1");
    let blobs = Arc::new(MockBlobStore::with_objects(refs.iter().copied()));
    let records = Arc::new(MockRecordStore::new());
    records.seed(&task, &owner, refs);
    let reconciler = Reconciler::new(blobs.clone(), records.clone(), owner);
    Harness {
        blobs,
        records,
        reconciler,
        task,
    }
}

pub(crate) fn set_of(refs: &[&str]) -> AttachmentSet {
    AttachmentSet::from_refs(refs.iter().map(|r| AttachmentRef::new(*r))).unwrap()
}

pub(crate) fn refs(values: &[&str]) -> Vec<AttachmentRef> {
    values.iter().map(|r| AttachmentRef::new(*r)).collect()
}
